//! Subscription ledger
//!
//! Time-bounded grants of subscribable entities (modules, storage plans)
//! to workspaces. A subscription is conceptually immutable once written.
//! Granting a module grants its whole hereditary closure, skipping members
//! the workspace already has, and notifies each granted module's runtime
//! counterpart through its `on_subscribe` lifecycle callback.
//!
//! Grants are processed sequentially without rollback. Instead of leaving
//! partial state silent, every call returns an explicit per-item
//! [`SubscriptionOutcome`] report; already-granted members make the
//! operation safe to retry.

use crate::error::{WorkfoldError, WorkfoldResult};
use crate::registry::{AppContext, ModuleRecord};
use crate::resolver::hereditary_closure;
use crate::store::CoreStore;
use crate::workspace::WorkspaceRecord;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Kind tag of a subscribable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribableKind {
    Module,
    StoragePlan,
}

/// Billing period of a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Period {
    Lifetime,
    Annually,
    SemiAnnually,
    Demo,
}

impl Period {
    /// Expiry instant for a grant starting at `from`; `None` means the
    /// grant never expires.
    pub fn valid_till(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Period::Lifetime => None,
            Period::Annually => from.checked_add_months(Months::new(12)),
            Period::SemiAnnually => from.checked_add_months(Months::new(6)),
            Period::Demo => Some(from + Duration::weeks(2)),
        }
    }
}

/// A time-bounded grant linking a workspace to a subscribable entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub workspace: Uuid,
    /// Id-or-identifier reference of the subscribed entity
    pub subscribed: String,
    pub kind: SubscribableKind,
    /// Inclusive start of the grant window
    pub valid_from: DateTime<Utc>,
    /// Exclusive end of the grant window; absent = perpetual
    pub valid_till: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Window check: `valid_from` inclusive, `valid_till` exclusive.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && self.valid_till.map_or(true, |till| now < till)
    }
}

/// A purchasable storage quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoragePlanRecord {
    pub id: Uuid,
    pub identifier: String,
    #[serde(default)]
    pub name: HashMap<String, String>,
    /// Capacity in bytes
    pub capacity: u64,
    pub created_at: DateTime<Utc>,
}

impl StoragePlanRecord {
    pub fn new(identifier: &str, capacity: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            identifier: identifier.to_lowercase(),
            name: HashMap::new(),
            capacity,
            created_at: Utc::now(),
        }
    }
}

/// Query mode for [`subscriptions_of_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Time window covers now
    Active,
    /// Time window covers now and, for module grants, the subscribed
    /// module still resolves in the catalog
    Current,
}

/// Outcome of one closure member in a subscribe call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionOutcome {
    pub identifier: String,
    pub outcome: GrantOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantOutcome {
    Granted,
    AlreadyCurrent,
    /// The item failed. A member whose runtime counterpart is missing
    /// fails before anything is written; a failing `on_subscribe`
    /// callback fails after its grant record was written, and that
    /// record survives.
    Failed(String),
}

/// Event passed to a module's `on_subscribe` lifecycle callback.
#[derive(Debug, Clone)]
pub struct SubscribeEvent {
    pub workspace: WorkspaceRecord,
    pub period: Period,
    pub subscription: SubscriptionRecord,
}

/// Subscriptions of the given kind for a workspace, filtered by status.
pub fn subscriptions_of_type(
    store: &CoreStore,
    workspace: &WorkspaceRecord,
    kind: SubscribableKind,
    status: SubscriptionStatus,
) -> WorkfoldResult<Vec<SubscriptionRecord>> {
    subscriptions_of_type_at(store, workspace, kind, status, Utc::now())
}

/// [`subscriptions_of_type`] evaluated at an explicit instant.
pub fn subscriptions_of_type_at(
    store: &CoreStore,
    workspace: &WorkspaceRecord,
    kind: SubscribableKind,
    status: SubscriptionStatus,
    now: DateTime<Utc>,
) -> WorkfoldResult<Vec<SubscriptionRecord>> {
    let mut matched = Vec::new();
    for subscription in store.subscriptions_for_workspace(&workspace.id)? {
        if subscription.kind != kind || !subscription.is_active_at(now) {
            continue;
        }
        if status == SubscriptionStatus::Current && kind == SubscribableKind::Module {
            // only a genuinely missing module makes the grant dangling;
            // store failures propagate
            match store.resolve_module(&subscription.subscribed) {
                Ok(_) => {}
                Err(WorkfoldError::NotFound { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
        matched.push(subscription);
    }
    Ok(matched)
}

/// The workspace's current modules: every current module grant expanded
/// through its hereditary closure, deduplicated by identifier.
pub fn current_modules(
    store: &CoreStore,
    workspace: &WorkspaceRecord,
) -> WorkfoldResult<Vec<ModuleRecord>> {
    current_modules_at(store, workspace, Utc::now())
}

/// [`current_modules`] evaluated at an explicit instant.
pub fn current_modules_at(
    store: &CoreStore,
    workspace: &WorkspaceRecord,
    now: DateTime<Utc>,
) -> WorkfoldResult<Vec<ModuleRecord>> {
    let subscriptions = subscriptions_of_type_at(
        store,
        workspace,
        SubscribableKind::Module,
        SubscriptionStatus::Current,
        now,
    )?;

    let mut identifiers: Vec<String> = Vec::new();
    for subscription in subscriptions {
        let subscribed = store.resolve_module(&subscription.subscribed)?;
        for member in hereditary_closure(store, &subscribed)? {
            if !identifiers.contains(&member.identifier) {
                identifiers.push(member.identifier);
            }
        }
    }

    store.modules_by_identifiers(&identifiers)
}

/// Whether the workspace currently has the module, matched by identifier
/// case-insensitively.
pub fn has_current_module(
    store: &CoreStore,
    workspace: &WorkspaceRecord,
    identifier: &str,
) -> WorkfoldResult<bool> {
    has_current_module_at(store, workspace, identifier, Utc::now())
}

pub fn has_current_module_at(
    store: &CoreStore,
    workspace: &WorkspaceRecord,
    identifier: &str,
    now: DateTime<Utc>,
) -> WorkfoldResult<bool> {
    let wanted = identifier.to_lowercase();
    Ok(current_modules_at(store, workspace, now)?
        .iter()
        .any(|m| m.identifier == wanted))
}

/// Write one grant record. Low-level; does not expand closures or notify
/// lifecycle callbacks.
pub fn grant(
    store: &CoreStore,
    workspace: &WorkspaceRecord,
    subscribed: &str,
    kind: SubscribableKind,
    valid_from: DateTime<Utc>,
    valid_till: Option<DateTime<Utc>>,
) -> WorkfoldResult<SubscriptionRecord> {
    let subscription = SubscriptionRecord {
        id: Uuid::new_v4(),
        workspace: workspace.id,
        subscribed: subscribed.to_string(),
        kind,
        valid_from,
        valid_till,
        created_at: Utc::now(),
    };
    store.save_subscription(&subscription)?;
    Ok(subscription)
}

/// Subscribe a workspace to a module for the given period.
///
/// Resolves the target (unknown references fail with `NotFound` before
/// anything is written), expands its hereditary closure, and grants every
/// member the workspace does not already have. Each granted member's
/// registered [`AppModule`](crate::registry::AppModule) receives an
/// `on_subscribe` callback; a member with no registered counterpart fails
/// that item with `ModuleNotRegistered` before its grant is written and
/// aborts the remaining items, so the call can be retried after the
/// module is registered.
pub async fn subscribe(
    app: &AppContext,
    workspace: &WorkspaceRecord,
    module_reference: &str,
    period: Period,
) -> WorkfoldResult<Vec<SubscriptionOutcome>> {
    subscribe_at(app, workspace, module_reference, period, Utc::now()).await
}

/// [`subscribe`] with an explicit grant start instant.
pub async fn subscribe_at(
    app: &AppContext,
    workspace: &WorkspaceRecord,
    module_reference: &str,
    period: Period,
    now: DateTime<Utc>,
) -> WorkfoldResult<Vec<SubscriptionOutcome>> {
    let store = app.store();
    let module = store.resolve_module(module_reference)?;
    let closure = hereditary_closure(store, &module)?;
    let current = current_modules_at(store, workspace, now)?;

    let mut report = Vec::with_capacity(closure.len());
    for member in closure {
        if current.iter().any(|m| m.identifier == member.identifier) {
            report.push(SubscriptionOutcome {
                identifier: member.identifier,
                outcome: GrantOutcome::AlreadyCurrent,
            });
            continue;
        }

        // resolve the runtime counterpart before writing anything, so a
        // failed item leaves no grant behind
        let Some(app_module) = app.module_by_name(&member.identifier) else {
            let err = WorkfoldError::ModuleNotRegistered(member.identifier.clone());
            log::warn!("subscription batch aborted: {err}");
            report.push(SubscriptionOutcome {
                identifier: member.identifier,
                outcome: GrantOutcome::Failed(err.to_string()),
            });
            break;
        };

        let subscription = grant(
            store,
            workspace,
            &member.identifier,
            SubscribableKind::Module,
            now,
            period.valid_till(now),
        )?;
        log::info!(
            "workspace '{}' granted module '{}' ({:?})",
            workspace.identifier,
            member.identifier,
            period
        );

        let event = SubscribeEvent {
            workspace: workspace.clone(),
            period,
            subscription,
        };
        if let Err(err) = app_module.on_subscribe(&event).await {
            log::warn!(
                "on_subscribe failed for '{}': {err}; aborting remaining grants",
                member.identifier
            );
            report.push(SubscriptionOutcome {
                identifier: member.identifier,
                outcome: GrantOutcome::Failed(err.to_string()),
            });
            break;
        }

        report.push(SubscriptionOutcome {
            identifier: member.identifier,
            outcome: GrantOutcome::Granted,
        });
    }

    Ok(report)
}

/// Subscribe a workspace to several modules in one call. Modules are
/// processed sequentially; a reference that fails to resolve is reported
/// as a failed item and aborts the remaining ones, so every attempted
/// reference appears in the returned report.
pub async fn subscribe_many(
    app: &AppContext,
    workspace: &WorkspaceRecord,
    module_references: &[String],
    period: Period,
) -> WorkfoldResult<Vec<SubscriptionOutcome>> {
    let mut report = Vec::new();
    for reference in module_references {
        match subscribe(app, workspace, reference, period).await {
            Ok(items) => report.extend(items),
            Err(err @ WorkfoldError::NotFound { .. }) => {
                log::warn!("subscription batch aborted: {err}");
                report.push(SubscriptionOutcome {
                    identifier: reference.clone(),
                    outcome: GrantOutcome::Failed(err.to_string()),
                });
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(valid_from: DateTime<Utc>, valid_till: Option<DateTime<Utc>>) -> SubscriptionRecord {
        SubscriptionRecord {
            id: Uuid::new_v4(),
            workspace: Uuid::new_v4(),
            subscribed: "core".to_string(),
            kind: SubscribableKind::Module,
            valid_from,
            valid_till,
            created_at: valid_from,
        }
    }

    #[test]
    fn window_bounds_are_from_inclusive_till_exclusive() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let till = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let subscription = record(from, Some(till));

        assert!(subscription.is_active_at(from));
        assert!(subscription.is_active_at(till - Duration::seconds(1)));
        assert!(!subscription.is_active_at(till));
        assert!(!subscription.is_active_at(from - Duration::seconds(1)));
    }

    #[test]
    fn perpetual_subscription_is_always_active() {
        let from = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
        let subscription = record(from, None);
        assert!(subscription.is_active_at(Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap()));
    }

    fn bare_workspace() -> WorkspaceRecord {
        let now = Utc::now();
        WorkspaceRecord {
            id: Uuid::new_v4(),
            identifier: "acme".to_string(),
            hostname: None,
            category: None,
            name: HashMap::new(),
            description: HashMap::new(),
            options: serde_json::json!({}),
            storage_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn corrupt_catalog_record_propagates_instead_of_hiding_grants() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        db.open_tree("core:modules")
            .unwrap()
            .insert(Uuid::new_v4().as_bytes(), &b"not json"[..])
            .unwrap();
        let store = CoreStore::new(db).unwrap();
        let workspace = bare_workspace();
        store.save_workspace(&workspace).unwrap();
        grant(
            &store,
            &workspace,
            "core",
            SubscribableKind::Module,
            Utc::now(),
            None,
        )
        .unwrap();

        // the window-only query never touches the catalog
        let active = subscriptions_of_type(
            &store,
            &workspace,
            SubscribableKind::Module,
            SubscriptionStatus::Active,
        )
        .unwrap();
        assert_eq!(active.len(), 1);

        // the current query must surface the store failure, not treat the
        // grant as dangling
        let err = subscriptions_of_type(
            &store,
            &workspace,
            SubscribableKind::Module,
            SubscriptionStatus::Current,
        )
        .unwrap_err();
        assert!(matches!(err, WorkfoldError::Serialization(_)));
    }

    #[test]
    fn period_arithmetic() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(Period::Lifetime.valid_till(from), None);
        assert_eq!(
            Period::Annually.valid_till(from),
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            Period::SemiAnnually.valid_till(from),
            Some(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            Period::Demo.valid_till(from),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
        );
    }
}
