//! Core document store
//!
//! Sled-backed repository for the platform catalog: modules, workspaces,
//! subscriptions, memberships, and storage plans. One tree per record kind,
//! JSON-encoded records, durable flush after every write.
//!
//! References accepted by the `resolve_*` helpers may be either a record id
//! or the entity's unique identifier, mirroring how callers address
//! entities at the API boundary.

use crate::error::{WorkfoldError, WorkfoldResult};
use crate::membership::MembershipRecord;
use crate::registry::ModuleRecord;
use crate::subscriptions::{StoragePlanRecord, SubscriptionRecord};
use crate::workspace::WorkspaceRecord;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Unified access to the platform catalog store.
#[derive(Clone)]
pub struct CoreStore {
    db: sled::Db,
    modules_tree: sled::Tree,
    workspaces_tree: sled::Tree,
    subscriptions_tree: sled::Tree,
    memberships_tree: sled::Tree,
    storage_plans_tree: sled::Tree,
}

impl CoreStore {
    /// Open the catalog store at the given path, creating all trees.
    pub fn open(path: &std::path::Path) -> WorkfoldResult<Self> {
        let db = sled::open(path)?;
        Self::new(db)
    }

    /// Wrap an already-opened sled database.
    pub fn new(db: sled::Db) -> WorkfoldResult<Self> {
        let modules_tree = db.open_tree("core:modules")?;
        let workspaces_tree = db.open_tree("core:workspaces")?;
        let subscriptions_tree = db.open_tree("core:subscriptions")?;
        let memberships_tree = db.open_tree("core:memberships")?;
        let storage_plans_tree = db.open_tree("core:storage_plans")?;

        Ok(Self {
            db,
            modules_tree,
            workspaces_tree,
            subscriptions_tree,
            memberships_tree,
            storage_plans_tree,
        })
    }

    /// Open a temporary store for tests.
    pub fn temporary() -> WorkfoldResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::new(db)
    }

    fn put<T: Serialize>(&self, tree: &sled::Tree, id: &Uuid, record: &T) -> WorkfoldResult<()> {
        let bytes = serde_json::to_vec(record)?;
        tree.insert(id.as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, tree: &sled::Tree, id: &Uuid) -> WorkfoldResult<Option<T>> {
        match tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, tree: &sled::Tree) -> WorkfoldResult<Vec<T>> {
        let mut records = Vec::new();
        for entry in tree.iter() {
            let (_, bytes) = entry?;
            records.push(serde_json::from_slice(&bytes)?);
        }
        Ok(records)
    }

    // ----- modules -----

    pub fn save_module(&self, module: &ModuleRecord) -> WorkfoldResult<()> {
        self.put(&self.modules_tree, &module.id, module)
    }

    pub fn module_by_id(&self, id: &Uuid) -> WorkfoldResult<Option<ModuleRecord>> {
        self.get(&self.modules_tree, id)
    }

    pub fn module_by_identifier(&self, identifier: &str) -> WorkfoldResult<Option<ModuleRecord>> {
        let wanted = identifier.to_lowercase();
        Ok(self
            .all_modules()?
            .into_iter()
            .find(|m| m.identifier == wanted))
    }

    /// Resolve a module by id-or-identifier reference; missing is an error.
    pub fn resolve_module(&self, reference: &str) -> WorkfoldResult<ModuleRecord> {
        if let Ok(id) = Uuid::parse_str(reference) {
            if let Some(module) = self.module_by_id(&id)? {
                return Ok(module);
            }
        }
        self.module_by_identifier(reference)?
            .ok_or_else(|| WorkfoldError::not_found("module", reference))
    }

    pub fn modules_by_identifiers(&self, identifiers: &[String]) -> WorkfoldResult<Vec<ModuleRecord>> {
        let wanted: Vec<String> = identifiers.iter().map(|i| i.to_lowercase()).collect();
        Ok(self
            .all_modules()?
            .into_iter()
            .filter(|m| wanted.contains(&m.identifier))
            .collect())
    }

    pub fn all_modules(&self) -> WorkfoldResult<Vec<ModuleRecord>> {
        self.scan(&self.modules_tree)
    }

    // ----- workspaces -----

    pub fn save_workspace(&self, workspace: &WorkspaceRecord) -> WorkfoldResult<()> {
        self.put(&self.workspaces_tree, &workspace.id, workspace)
    }

    pub fn workspace_by_id(&self, id: &Uuid) -> WorkfoldResult<Option<WorkspaceRecord>> {
        self.get(&self.workspaces_tree, id)
    }

    pub fn workspace_by_identifier(&self, identifier: &str) -> WorkfoldResult<Option<WorkspaceRecord>> {
        Ok(self
            .all_workspaces()?
            .into_iter()
            .find(|w| w.identifier == identifier))
    }

    pub fn workspace_by_hostname(&self, hostname: &str) -> WorkfoldResult<Option<WorkspaceRecord>> {
        Ok(self
            .all_workspaces()?
            .into_iter()
            .find(|w| w.hostname.as_deref() == Some(hostname)))
    }

    /// Resolve a workspace by id-or-identifier reference; missing is an error.
    pub fn resolve_workspace(&self, reference: &str) -> WorkfoldResult<WorkspaceRecord> {
        if let Ok(id) = Uuid::parse_str(reference) {
            if let Some(workspace) = self.workspace_by_id(&id)? {
                return Ok(workspace);
            }
        }
        self.workspace_by_identifier(reference)?
            .ok_or_else(|| WorkfoldError::not_found("workspace", reference))
    }

    pub fn workspace_identifier_taken(&self, identifier: &str) -> WorkfoldResult<bool> {
        Ok(self.workspace_by_identifier(identifier)?.is_some())
    }

    pub fn all_workspaces(&self) -> WorkfoldResult<Vec<WorkspaceRecord>> {
        self.scan(&self.workspaces_tree)
    }

    // ----- subscriptions -----

    pub fn save_subscription(&self, subscription: &SubscriptionRecord) -> WorkfoldResult<()> {
        self.put(&self.subscriptions_tree, &subscription.id, subscription)
    }

    pub fn subscriptions_for_workspace(&self, workspace: &Uuid) -> WorkfoldResult<Vec<SubscriptionRecord>> {
        let mut subscriptions: Vec<SubscriptionRecord> = self
            .scan::<SubscriptionRecord>(&self.subscriptions_tree)?
            .into_iter()
            .filter(|s| &s.workspace == workspace)
            .collect();
        // stable order for deterministic downstream resolution
        subscriptions.sort_by_key(|s| s.created_at);
        Ok(subscriptions)
    }

    // ----- memberships -----

    pub fn save_membership(&self, membership: &MembershipRecord) -> WorkfoldResult<()> {
        self.put(&self.memberships_tree, &membership.id, membership)
    }

    pub fn membership(&self, user: &Uuid, workspace: &Uuid) -> WorkfoldResult<Option<MembershipRecord>> {
        Ok(self
            .scan::<MembershipRecord>(&self.memberships_tree)?
            .into_iter()
            .find(|m| &m.user == user && &m.workspace == workspace))
    }

    pub fn memberships_for_workspace(&self, workspace: &Uuid) -> WorkfoldResult<Vec<MembershipRecord>> {
        Ok(self
            .scan::<MembershipRecord>(&self.memberships_tree)?
            .into_iter()
            .filter(|m| &m.workspace == workspace)
            .collect())
    }

    pub fn memberships_for_user(&self, user: &Uuid) -> WorkfoldResult<Vec<MembershipRecord>> {
        Ok(self
            .scan::<MembershipRecord>(&self.memberships_tree)?
            .into_iter()
            .filter(|m| &m.user == user)
            .collect())
    }

    // ----- storage plans -----

    pub fn save_storage_plan(&self, plan: &StoragePlanRecord) -> WorkfoldResult<()> {
        self.put(&self.storage_plans_tree, &plan.id, plan)
    }

    pub fn storage_plan_by_id(&self, id: &Uuid) -> WorkfoldResult<Option<StoragePlanRecord>> {
        self.get(&self.storage_plans_tree, id)
    }

    /// Resolve a storage plan by id-or-identifier reference.
    pub fn resolve_storage_plan(&self, reference: &str) -> WorkfoldResult<StoragePlanRecord> {
        if let Ok(id) = Uuid::parse_str(reference) {
            if let Some(plan) = self.storage_plan_by_id(&id)? {
                return Ok(plan);
            }
        }
        let wanted = reference.to_lowercase();
        self.scan::<StoragePlanRecord>(&self.storage_plans_tree)?
            .into_iter()
            .find(|p| p.identifier == wanted)
            .ok_or_else(|| WorkfoldError::not_found("storage plan", reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModuleRecord;

    #[test]
    fn resolve_module_accepts_id_and_identifier() {
        let store = CoreStore::temporary().unwrap();
        let module = ModuleRecord::new("billing");
        store.save_module(&module).unwrap();

        let by_identifier = store.resolve_module("billing").unwrap();
        assert_eq!(by_identifier.id, module.id);

        let by_id = store.resolve_module(&module.id.to_string()).unwrap();
        assert_eq!(by_id.identifier, "billing");
    }

    #[test]
    fn resolve_module_unknown_reference_is_not_found() {
        let store = CoreStore::temporary().unwrap();
        let err = store.resolve_module("ghost").unwrap_err();
        assert!(matches!(err, WorkfoldError::NotFound { kind: "module", .. }));
    }

    #[test]
    fn module_identifier_lookup_is_case_insensitive() {
        let store = CoreStore::temporary().unwrap();
        store.save_module(&ModuleRecord::new("crm")).unwrap();
        assert!(store.module_by_identifier("CRM").unwrap().is_some());
    }
}
