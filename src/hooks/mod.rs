//! Hook / injection engine
//!
//! Central extension-point dispatcher. Any installed module can contribute
//! behavior to another module's named hooks without either depending on
//! the other's code: contributions are declared in a [`HookMap`] keyed by
//! target module and hook name (both normalized to lowercase at
//! registration time), gathered per workspace from every active module,
//! and invoked concurrently with results returned in registration order.
//!
//! The engine is agnostic to what callers do with the results; populate
//! spreading, params merging, and side-effect-only conventions are
//! consumer policy. What the engine guarantees is the `None`-versus-list
//! distinction and stable ordering, so "later overrides earlier" merges
//! stay reproducible.

use crate::error::{WorkfoldError, WorkfoldResult};
use crate::registry::AppContext;
use crate::workspace::WorkspaceRecord;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Future returned by one hook contributor.
pub type HookFuture = BoxFuture<'static, WorkfoldResult<Value>>;

/// One contributor function attached to a hook.
pub type HookContributor = Arc<dyn Fn(Value) -> HookFuture + Send + Sync>;

/// Dispatcher signature handed to operations that expose pre/post-save
/// hooks: `(hook_name, args) -> results`.
pub type InjectDispatch<'a> =
    &'a (dyn Fn(&str, Value) -> BoxFuture<'static, WorkfoldResult<Option<Vec<Value>>>> + Sync);

/// Wrap an async closure as a [`HookContributor`].
pub fn contributor<F, Fut>(f: F) -> HookContributor
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WorkfoldResult<Value>> + Send + 'static,
{
    Arc::new(move |args| f(args).boxed())
}

/// Hook contributions declared by one module.
///
/// Keys are normalized to lowercase when inserted. A hook-name key may be
/// a comma-separated list, attaching the same contributor to several
/// hooks. Registration order is preserved.
#[derive(Clone, Default)]
pub struct HookMap {
    entries: Vec<(String, String, HookContributor)>,
}

impl HookMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `contributor` to `hook_names` (comma-separated) of
    /// `target_module`.
    pub fn on(mut self, target_module: &str, hook_names: &str, contributor: HookContributor) -> Self {
        let target = target_module.to_lowercase();
        for hook in hook_names.split(',') {
            let hook = hook.trim().to_lowercase();
            if hook.is_empty() {
                continue;
            }
            self.entries
                .push((target.clone(), hook, Arc::clone(&contributor)));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Contributions targeting the given module, in registration order.
    /// `target` must already be lowercase.
    fn for_target<'a>(&'a self, target: &'a str) -> impl Iterator<Item = (&'a str, &'a HookContributor)> {
        self.entries
            .iter()
            .filter(move |(t, _, _)| t == target)
            .map(|(_, hook, contributor)| (hook.as_str(), contributor))
    }
}

impl std::fmt::Debug for HookMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self
            .entries
            .iter()
            .map(|(t, h, _)| format!("{t}.{h}"))
            .collect();
        f.debug_struct("HookMap").field("entries", &keys).finish()
    }
}

/// Contributors collected for one target module, grouped by hook name in
/// module-resolution order.
#[derive(Default)]
pub struct CollectedInjections {
    groups: Vec<(String, Vec<HookContributor>)>,
}

impl CollectedInjections {
    fn push(&mut self, hook: &str, contributor: HookContributor) {
        if let Some((_, group)) = self.groups.iter_mut().find(|(name, _)| name == hook) {
            group.push(contributor);
        } else {
            self.groups.push((hook.to_string(), vec![contributor]));
        }
    }

    /// Contributors registered under the hook name (already normalized).
    pub fn get(&self, hook: &str) -> Option<&[HookContributor]> {
        self.groups
            .iter()
            .find(|(name, _)| name == hook)
            .map(|(_, group)| group.as_slice())
    }

    pub fn hook_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(name, _)| name.as_str())
    }
}

/// Per-workspace hook dispatcher over an application's installed modules.
pub struct InjectionEngine<'a> {
    app: &'a AppContext,
}

impl<'a> InjectionEngine<'a> {
    pub fn new(app: &'a AppContext) -> Self {
        Self { app }
    }

    /// Gather every contribution targeting `target_module` from the
    /// modules active for the workspace. Order within a hook follows the
    /// deterministic module-resolution order.
    pub async fn collect_injections(
        &self,
        workspace: &WorkspaceRecord,
        target_module: &str,
    ) -> WorkfoldResult<CollectedInjections> {
        let target = target_module.to_lowercase();
        let modules = self.app.resolve_modules_hereditary(workspace).await?;

        let mut collected = CollectedInjections::default();
        for module in modules {
            let hooks = module.contributed_hooks();
            for (hook, contributor) in hooks.for_target(&target) {
                collected.push(hook, Arc::clone(contributor));
            }
        }
        Ok(collected)
    }

    /// Dispatch `hook_name` on `target_module` for the workspace.
    ///
    /// Returns `None` when no contributor is registered under the hook,
    /// so callers can distinguish "nothing to merge" from "merged empty".
    /// Otherwise all contributors run concurrently; results come back in
    /// registration order regardless of completion order, and any
    /// contributor failure fails the whole dispatch.
    ///
    /// Each contributor receives `args` extended with its ordinal under
    /// the `"key"` field (object args only; other values pass unchanged).
    pub async fn inject(
        &self,
        workspace: &WorkspaceRecord,
        target_module: &str,
        hook_name: &str,
        args: Value,
    ) -> WorkfoldResult<Option<Vec<Value>>> {
        let collected = self.collect_injections(workspace, target_module).await?;
        let hook = hook_name.to_lowercase();

        let Some(contributors) = collected.get(&hook) else {
            log::debug!("no contributors for {target_module}.{hook_name}");
            return Ok(None);
        };

        let calls = contributors.iter().enumerate().map(|(index, contributor)| {
            let call_args = match &args {
                Value::Object(map) => {
                    let mut map = map.clone();
                    map.insert("key".to_string(), Value::from(index));
                    Value::Object(map)
                }
                other => other.clone(),
            };
            contributor(call_args)
        });

        log::debug!(
            "dispatching {}.{} to {} contributor(s) for workspace '{}'",
            target_module,
            hook_name,
            contributors.len(),
            workspace.identifier
        );

        let results = try_join_all(calls)
            .await
            .map_err(|err| WorkfoldError::HookContributor {
                hook: format!("{}.{}", target_module.to_lowercase(), hook),
                message: err.to_string(),
            })?;

        Ok(Some(results))
    }
}
