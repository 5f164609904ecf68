//! Memberships
//!
//! The per-(user, workspace) relation: roles, a private credential
//! excluded from default reads, personal options, pinned shortcuts, and a
//! home path. At most one membership exists per pair; the workspace owns
//! the record and weak-references the user by id.

use crate::error::{WorkfoldError, WorkfoldResult};
use crate::registry::ModuleRecord;
use crate::store::CoreStore;
use crate::workspace::{options, WorkspaceRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Persisted membership record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub id: Uuid,
    pub user: Uuid,
    pub workspace: Uuid,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Private credential; persisted, but stripped from [`public_view`]
    /// so default reads never leak it
    ///
    /// [`public_view`]: MembershipRecord::public_view
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "empty_object")]
    pub options: Value,
    /// Shortcuts pinned to the member's taskbar
    #[serde(default)]
    pub pins: Vec<String>,
    pub home_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn empty_object() -> Value {
    json!({})
}

impl MembershipRecord {
    /// Read one option by dotted path, falling back to `default`.
    pub fn get_option(&self, key: &str, default: Value) -> Value {
        options::get_path(&self.options, key)
            .cloned()
            .unwrap_or(default)
    }

    /// Set one option by dotted path and persist the membership.
    pub fn set_option(&mut self, store: &CoreStore, key: &str, value: Value) -> WorkfoldResult<()> {
        options::set_path(&mut self.options, key, value);
        self.updated_at = Utc::now();
        store.save_membership(self)
    }

    /// Replace the pinned shortcuts and persist.
    pub fn set_pins(&mut self, store: &CoreStore, pins: Vec<String>) -> WorkfoldResult<()> {
        self.pins = pins;
        self.updated_at = Utc::now();
        store.save_membership(self)
    }

    /// Serialized form with the private credential stripped; what default
    /// reads hand to callers.
    pub fn public_view(&self) -> WorkfoldResult<Value> {
        let mut view = serde_json::to_value(self)?;
        if let Some(map) = view.as_object_mut() {
            map.remove("password");
        }
        Ok(view)
    }
}

/// Extra inputs for [`add_member`].
#[derive(Debug, Clone, Default)]
pub struct AddMember {
    pub password: Option<String>,
    /// Overlaid on the seeded defaults
    pub options: Option<Value>,
    /// Overrides the module-derived default when present
    pub pins: Option<Vec<String>>,
    /// Overrides the module-derived default when present
    pub home_path: Option<String>,
}

/// Pins and home path a new member starts with, aggregated from the
/// workspace's current modules: the ordered, deduplicated union of default
/// pins, and the first non-empty default home path.
pub fn member_defaults(current_modules: &[ModuleRecord]) -> (Vec<String>, Option<String>) {
    let mut pins: Vec<String> = Vec::new();
    for module in current_modules {
        for pin in &module.default_pins {
            if !pins.contains(pin) {
                pins.push(pin.clone());
            }
        }
    }
    let home_path = current_modules
        .iter()
        .filter_map(|m| m.default_home_path.clone())
        .find(|p| !p.is_empty());
    (pins, home_path)
}

fn default_options(config_locale: &str) -> Value {
    json!({
        "darkMode": false,
        "theme": "default",
        "displayLanguage": config_locale,
        "showWalkthrough": true,
    })
}

/// Add a user to a workspace.
///
/// Seeds the member options with platform defaults overlaid by the
/// caller's, and fills pins/home path from the given current-module set
/// unless explicitly supplied. Fails when the pair already has a
/// membership.
pub fn add_member(
    store: &CoreStore,
    workspace: &WorkspaceRecord,
    user: &Uuid,
    roles: Vec<String>,
    current_modules: &[ModuleRecord],
    locale: &str,
    extra: AddMember,
) -> WorkfoldResult<MembershipRecord> {
    if store.membership(user, &workspace.id)?.is_some() {
        return Err(WorkfoldError::Validation(format!(
            "user {user} already has a membership in workspace '{}'",
            workspace.identifier
        )));
    }

    let mut member_options = default_options(locale);
    if let Some(Value::Object(overrides)) = extra.options {
        if let Some(base) = member_options.as_object_mut() {
            for (key, value) in overrides {
                base.insert(key, value);
            }
        }
    }

    let (default_pins, default_home) = member_defaults(current_modules);
    let now = Utc::now();
    let membership = MembershipRecord {
        id: Uuid::new_v4(),
        user: *user,
        workspace: workspace.id,
        roles,
        password: extra.password,
        options: member_options,
        pins: extra.pins.unwrap_or(default_pins),
        home_path: extra.home_path.or(default_home),
        created_at: now,
        updated_at: now,
    };

    store.save_membership(&membership)?;
    log::info!(
        "user {} added to workspace '{}'",
        membership.user,
        workspace.identifier
    );
    Ok(membership)
}
