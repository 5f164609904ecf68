//! Workspaces (tenants)
//!
//! A workspace owns memberships and subscriptions and carries a dedicated
//! storage locator for its composed data context. The factory generates a
//! unique identifier when none is supplied, derives the storage locator
//! from it, and seeds default options.

pub mod options;

use crate::capacity::CapacityOracle;
use crate::error::{WorkfoldError, WorkfoldResult};
use crate::membership::MembershipRecord;
use crate::store::CoreStore;
use crate::subscriptions::{
    subscriptions_of_type, SubscribableKind, SubscriptionStatus,
};
use crate::config::WorkfoldConfig;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Persisted tenant record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub id: Uuid,
    /// URL- and store-safe unique identifier (whitespace stripped)
    pub identifier: String,
    /// Unique when present
    pub hostname: Option<String>,
    pub category: Option<String>,
    /// Localized display name, locale -> text
    #[serde(default)]
    pub name: HashMap<String, String>,
    #[serde(default)]
    pub description: HashMap<String, String>,
    /// Free-form nested options document
    #[serde(default = "empty_object")]
    pub options: Value,
    /// Locator of the workspace's dedicated store; absent means no
    /// composed data context
    pub storage_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn empty_object() -> Value {
    json!({})
}

/// Input for [`create_new`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewWorkspace {
    pub identifier: Option<String>,
    pub hostname: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
}

/// Create and persist a new workspace.
///
/// When no identifier is supplied a random slug is generated and
/// regenerated until unique. Whitespace is stripped from supplied
/// identifiers. The dedicated storage locator and default options
/// (locale, currency) are seeded from configuration.
pub fn create_new(
    store: &CoreStore,
    config: &WorkfoldConfig,
    data: NewWorkspace,
) -> WorkfoldResult<WorkspaceRecord> {
    let identifier = match &data.identifier {
        Some(identifier) => {
            let identifier: String =
                identifier.chars().filter(|c| !c.is_whitespace()).collect();
            if identifier.is_empty() {
                return Err(WorkfoldError::Validation(
                    "workspace identifier must not be empty".to_string(),
                ));
            }
            if store.workspace_identifier_taken(&identifier)? {
                return Err(WorkfoldError::Validation(format!(
                    "workspace identifier '{identifier}' already taken"
                )));
            }
            identifier
        }
        None => {
            let mut slug = random_slug();
            while store.workspace_identifier_taken(&slug)? {
                slug = random_slug();
            }
            slug
        }
    };

    if let Some(hostname) = &data.hostname {
        if store.workspace_by_hostname(hostname)?.is_some() {
            return Err(WorkfoldError::Validation(format!(
                "hostname '{hostname}' already taken"
            )));
        }
    }

    let now = Utc::now();
    let mut name = HashMap::new();
    if let Some(text) = &data.name {
        name.insert(config.default_locale.clone(), text.clone());
    }

    let workspace = WorkspaceRecord {
        id: Uuid::new_v4(),
        identifier: identifier.clone(),
        hostname: data.hostname.clone(),
        category: data.category.clone(),
        name,
        description: HashMap::new(),
        options: json!({
            "locale": config.default_locale,
            "currency": config.default_currency,
        }),
        storage_path: Some(config.workspace_store_path(&identifier)),
        created_at: now,
        updated_at: now,
    };

    store.save_workspace(&workspace)?;
    log::info!("workspace '{}' created", workspace.identifier);
    Ok(workspace)
}

fn random_slug() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..10)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

impl WorkspaceRecord {
    /// Read one option by dotted path, falling back to `default`.
    pub fn get_option(&self, key: &str, default: Value) -> Value {
        options::get_path(&self.options, key)
            .cloned()
            .unwrap_or(default)
    }

    /// Read several options at once; missing paths come back as null.
    pub fn get_options(&self, keys: &[&str]) -> HashMap<String, Value> {
        keys.iter()
            .map(|key| ((*key).to_string(), self.get_option(key, Value::Null)))
            .collect()
    }

    /// Set one option by dotted path and persist the workspace.
    pub fn set_option(&mut self, store: &CoreStore, key: &str, value: Value) -> WorkfoldResult<()> {
        options::set_path(&mut self.options, key, value);
        self.updated_at = Utc::now();
        store.save_workspace(self)
    }

    /// Set several options and persist once.
    pub fn set_options(
        &mut self,
        store: &CoreStore,
        values: Vec<(String, Value)>,
    ) -> WorkfoldResult<()> {
        for (key, value) in values {
            options::set_path(&mut self.options, &key, value);
        }
        self.updated_at = Utc::now();
        store.save_workspace(self)
    }

    /// Membership of a specific user in this workspace.
    pub fn membership(&self, store: &CoreStore, user: &Uuid) -> WorkfoldResult<Option<MembershipRecord>> {
        store.membership(user, &self.id)
    }

    /// All memberships of this workspace.
    pub fn memberships(&self, store: &CoreStore) -> WorkfoldResult<Vec<MembershipRecord>> {
        store.memberships_for_workspace(&self.id)
    }

    pub fn has_member(&self, store: &CoreStore, user: &Uuid) -> WorkfoldResult<bool> {
        Ok(self.membership(store, user)?.is_some())
    }

    /// Total storage capacity in bytes granted by current storage-plan
    /// subscriptions.
    pub fn storage_capacity(&self, store: &CoreStore) -> WorkfoldResult<u64> {
        let subscriptions = subscriptions_of_type(
            store,
            self,
            SubscribableKind::StoragePlan,
            SubscriptionStatus::Current,
        )?;
        let mut total = 0u64;
        for subscription in subscriptions {
            let plan = store.resolve_storage_plan(&subscription.subscribed)?;
            total += plan.capacity;
        }
        Ok(total)
    }

    /// Bytes used by the workspace's dedicated store, via the capacity
    /// oracle. A workspace without a storage locator uses nothing.
    pub async fn storage_used_space(&self, oracle: &dyn CapacityOracle) -> WorkfoldResult<u64> {
        match &self.storage_path {
            Some(path) => oracle.used_space(path).await,
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_new_generates_unique_identifier() {
        let store = CoreStore::temporary().unwrap();
        let config = WorkfoldConfig::default();

        let first = create_new(&store, &config, NewWorkspace::default()).unwrap();
        let second = create_new(&store, &config, NewWorkspace::default()).unwrap();

        assert_eq!(first.identifier.len(), 10);
        assert_ne!(first.identifier, second.identifier);
        assert!(first.storage_path.is_some());
        assert_eq!(first.get_option("locale", Value::Null), json!("en-US"));
    }

    #[test]
    fn create_new_strips_whitespace_from_identifier() {
        let store = CoreStore::temporary().unwrap();
        let workspace = create_new(
            &store,
            &WorkfoldConfig::default(),
            NewWorkspace {
                identifier: Some("acme co".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(workspace.identifier, "acmeco");
    }

    #[test]
    fn create_new_rejects_taken_identifier() {
        let store = CoreStore::temporary().unwrap();
        let config = WorkfoldConfig::default();
        let data = NewWorkspace {
            identifier: Some("acme".to_string()),
            ..Default::default()
        };
        create_new(&store, &config, data.clone()).unwrap();

        assert!(matches!(
            create_new(&store, &config, data),
            Err(WorkfoldError::Validation(_))
        ));
    }

    #[test]
    fn create_new_rejects_taken_hostname() {
        let store = CoreStore::temporary().unwrap();
        let config = WorkfoldConfig::default();
        let data = NewWorkspace {
            hostname: Some("acme.example.com".to_string()),
            ..Default::default()
        };
        create_new(&store, &config, data.clone()).unwrap();

        assert!(matches!(
            create_new(&store, &config, data),
            Err(WorkfoldError::Validation(_))
        ));
    }

    #[test]
    fn set_option_persists_and_preserves_siblings() {
        let store = CoreStore::temporary().unwrap();
        let mut workspace =
            create_new(&store, &WorkfoldConfig::default(), NewWorkspace::default()).unwrap();

        workspace
            .set_option(&store, "invoices.numbering", json!("sequential"))
            .unwrap();
        workspace
            .set_option(&store, "invoices.prefix", json!("INV-"))
            .unwrap();

        let reloaded = store.workspace_by_id(&workspace.id).unwrap().unwrap();
        assert_eq!(
            reloaded.get_option("invoices.numbering", Value::Null),
            json!("sequential")
        );
        assert_eq!(
            reloaded.get_option("invoices.prefix", Value::Null),
            json!("INV-")
        );
        // seeded defaults survive option writes
        assert_eq!(reloaded.get_option("currency", Value::Null), json!("USD"));
    }
}
