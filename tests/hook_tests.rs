//! Hook/injection engine integration tests

mod common;

use common::{TestApp, TestModule};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use workfold::error::WorkfoldError;
use workfold::hooks::{contributor, HookMap, InjectionEngine};

fn slow_contributor(label: &'static str, delay_ms: u64) -> workfold::hooks::HookContributor {
    contributor(move |_args| async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(json!(label))
    })
}

/// App whose default modules contribute to the "ledger" module's hooks.
fn fan_in_fixture() -> TestApp {
    let mut fixture = TestApp::new(&["ledger", "alpha", "beta", "gamma"]).unwrap();
    let log = Arc::clone(&fixture.subscribe_log);

    fixture.install_module(TestModule::new("ledger", log.clone()));
    // deliberately inverse latencies: first registered finishes last
    fixture.install_module(
        TestModule::new("alpha", log.clone())
            .with_hooks(HookMap::new().on("Ledger", "entries.postSave", slow_contributor("alpha", 40))),
    );
    fixture.install_module(
        TestModule::new("beta", log.clone())
            .with_hooks(HookMap::new().on("ledger", "entries.postSave", slow_contributor("beta", 10))),
    );
    fixture.install_module(
        TestModule::new("gamma", log.clone())
            .with_hooks(HookMap::new().on("LEDGER", "entries.postSave", slow_contributor("gamma", 1))),
    );
    fixture
}

#[tokio::test]
async fn results_keep_registration_order_regardless_of_latency() {
    let fixture = fan_in_fixture();
    let workspace = fixture.workspace();
    let engine = InjectionEngine::new(&fixture.app);

    let results = engine
        .inject(&workspace, "ledger", "entries.postSave", json!({}))
        .await
        .unwrap()
        .expect("three contributors registered");

    assert_eq!(results, vec![json!("alpha"), json!("beta"), json!("gamma")]);
}

#[tokio::test]
async fn missing_hook_returns_none_not_empty() {
    let fixture = fan_in_fixture();
    let workspace = fixture.workspace();
    let engine = InjectionEngine::new(&fixture.app);

    let results = engine
        .inject(&workspace, "ledger", "entries.preSave", json!({}))
        .await
        .unwrap();
    assert!(results.is_none());

    // unknown target module likewise has nothing registered
    let results = engine
        .inject(&workspace, "elsewhere", "entries.postSave", json!({}))
        .await
        .unwrap();
    assert!(results.is_none());
}

#[tokio::test]
async fn hook_names_match_case_insensitively() {
    let fixture = fan_in_fixture();
    let workspace = fixture.workspace();
    let engine = InjectionEngine::new(&fixture.app);

    let results = engine
        .inject(&workspace, "Ledger", "ENTRIES.POSTSAVE", json!({}))
        .await
        .unwrap();
    assert_eq!(results.map(|r| r.len()), Some(3));
}

#[tokio::test]
async fn contributors_receive_their_ordinal_key() {
    let mut fixture = TestApp::new(&["target", "one", "two"]).unwrap();
    let echo_key = || {
        contributor(|args: Value| async move {
            Ok(args.get("key").cloned().unwrap_or(Value::Null))
        })
    };
    let log = Arc::clone(&fixture.subscribe_log);
    fixture.install_module(TestModule::new("target", log.clone()));
    fixture.install_module(
        TestModule::new("one", log.clone())
            .with_hooks(HookMap::new().on("target", "list.params", echo_key())),
    );
    fixture.install_module(
        TestModule::new("two", log.clone())
            .with_hooks(HookMap::new().on("target", "list.params", echo_key())),
    );
    let workspace = fixture.workspace();
    let engine = InjectionEngine::new(&fixture.app);

    let results = engine
        .inject(&workspace, "target", "list.params", json!({ "page": 1 }))
        .await
        .unwrap()
        .expect("two contributors");
    assert_eq!(results, vec![json!(0), json!(1)]);
}

#[tokio::test]
async fn one_failing_contributor_fails_the_whole_dispatch() {
    let mut fixture = TestApp::new(&["target", "good", "bad"]).unwrap();
    let log = Arc::clone(&fixture.subscribe_log);
    fixture.install_module(TestModule::new("target", log.clone()));
    fixture.install_module(TestModule::new("good", log.clone()).with_hooks(
        HookMap::new().on("target", "save.preSave", contributor(|_| async { Ok(json!("ok")) })),
    ));
    fixture.install_module(TestModule::new("bad", log.clone()).with_hooks(HookMap::new().on(
        "target",
        "save.preSave",
        contributor(|_| async {
            Err::<Value, _>(WorkfoldError::Validation("broken contributor".to_string()))
        }),
    )));
    let workspace = fixture.workspace();
    let engine = InjectionEngine::new(&fixture.app);

    let err = engine
        .inject(&workspace, "target", "save.preSave", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkfoldError::HookContributor { .. }));
}

#[tokio::test]
async fn comma_separated_declaration_shares_one_contributor() {
    let mut fixture = TestApp::new(&["target", "helper"]).unwrap();
    let log = Arc::clone(&fixture.subscribe_log);
    fixture.install_module(TestModule::new("target", log.clone()));
    fixture.install_module(TestModule::new("helper", log.clone()).with_hooks(HookMap::new().on(
        "target",
        "main.login.params, main.getSelf.params",
        contributor(|_| async { Ok(json!({ "greeting": "hello" })) }),
    )));
    let workspace = fixture.workspace();
    let engine = InjectionEngine::new(&fixture.app);

    for hook in ["main.login.params", "main.getSelf.params"] {
        let results = engine
            .inject(&workspace, "target", hook, json!({}))
            .await
            .unwrap()
            .expect("contributor shared across both hooks");
        assert_eq!(results, vec![json!({ "greeting": "hello" })]);
    }
}

#[tokio::test]
async fn only_active_modules_contribute() {
    // "addon" is installed but neither default nor subscribed, so its
    // contribution must not fire
    let mut fixture = TestApp::new(&["target"]).unwrap();
    let log = Arc::clone(&fixture.subscribe_log);
    fixture.install_module(TestModule::new("target", log.clone()));
    fixture.install_module(TestModule::new("addon", log.clone()).with_hooks(HookMap::new().on(
        "target",
        "report.params",
        contributor(|_| async { Ok(json!("addon-data")) }),
    )));
    let workspace = fixture.workspace();
    let engine = InjectionEngine::new(&fixture.app);

    let results = engine
        .inject(&workspace, "target", "report.params", json!({}))
        .await
        .unwrap();
    assert!(results.is_none());
}

/// The params convention: shallow-merge results in order, later overrides
/// earlier. Consumer policy, but it depends on the engine's ordering
/// guarantee.
#[tokio::test]
async fn ordered_results_support_later_overrides_earlier_merges() {
    let mut fixture = TestApp::new(&["target", "first", "second"]).unwrap();
    let log = Arc::clone(&fixture.subscribe_log);
    fixture.install_module(TestModule::new("target", log.clone()));
    fixture.install_module(TestModule::new("first", log.clone()).with_hooks(HookMap::new().on(
        "target",
        "self.params",
        contributor(|_| async { Ok(json!({ "plan": "free", "badge": "starter" })) }),
    )));
    fixture.install_module(TestModule::new("second", log.clone()).with_hooks(HookMap::new().on(
        "target",
        "self.params",
        contributor(|_| async { Ok(json!({ "plan": "pro" })) }),
    )));
    let workspace = fixture.workspace();
    let engine = InjectionEngine::new(&fixture.app);

    let results = engine
        .inject(&workspace, "target", "self.params", json!({}))
        .await
        .unwrap()
        .expect("two contributors");

    let mut merged = serde_json::Map::new();
    for result in &results {
        if let Some(object) = result.as_object() {
            for (key, value) in object {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    assert_eq!(
        Value::Object(merged),
        json!({ "plan": "pro", "badge": "starter" })
    );
}
