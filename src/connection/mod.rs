//! Per-workspace composed data context
//!
//! A workspace's connection is its dedicated store opened with the merged
//! schema set of every module resolvable for it. Composition is lazy and
//! memoized per workspace id in the [`ConnectionRegistry`] owned by the
//! application context: first creation wins, later callers get the cached
//! context. Module activation changes are not picked up by a live
//! connection; callers must invalidate explicitly.
//!
//! sled allows one handle per path per process, so the registry also
//! caches the underlying database handle keyed by storage path.
//! Invalidation drops only the composed context; recomposition reuses the
//! cached handle and rebuilds the schema map, which keeps it safe while
//! earlier `Arc<WorkspaceConnection>` clones are still alive.

use crate::error::WorkfoldResult;
use crate::registry::AppContext;
use crate::schema::{merge_fragment, SchemaFragment};
use crate::workspace::WorkspaceRecord;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// A workspace-scoped data-access context: the dedicated store plus the
/// schema set composed from the workspace's resolved modules.
pub struct WorkspaceConnection {
    pub workspace_id: Uuid,
    db: sled::Db,
    schemas: HashMap<String, SchemaFragment>,
}

impl WorkspaceConnection {
    /// The merged schema registered under `name`, if any module
    /// contributed it.
    pub fn schema(&self, name: &str) -> Option<&SchemaFragment> {
        self.schemas.get(name)
    }

    pub fn schema_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Record collection backing a registered schema.
    pub fn collection(&self, schema_name: &str) -> WorkfoldResult<sled::Tree> {
        if !self.schemas.contains_key(schema_name) {
            return Err(crate::error::WorkfoldError::not_found(
                "schema",
                schema_name,
            ));
        }
        Ok(self.db.open_tree(schema_name)?)
    }
}

/// Merge the schema contributions of the workspace's resolved modules
/// into one fragment per schema name.
///
/// Fragments merge in module-resolution order; fragments a module injects
/// into another module's schemas apply only when that target module is
/// itself resolved.
pub async fn composed_schemas(
    app: &AppContext,
    workspace: &WorkspaceRecord,
) -> WorkfoldResult<HashMap<String, SchemaFragment>> {
    let modules = app.resolve_modules_hereditary(workspace).await?;
    let resolved_names: Vec<String> = modules.iter().map(|m| m.name().to_lowercase()).collect();

    let mut schemas: HashMap<String, SchemaFragment> = HashMap::new();
    let mut merge = |name: &str, fragment: &SchemaFragment| {
        let merged = match schemas.get(name) {
            Some(existing) => merge_fragment(existing, fragment),
            None => fragment.clone(),
        };
        schemas.insert(name.to_string(), merged);
    };

    for module in &modules {
        let contribution = module.schemas();
        for (name, fragment) in &contribution.own {
            merge(name, fragment);
        }
        for (target, target_schemas) in &contribution.injects {
            if !resolved_names.contains(target) {
                continue;
            }
            for (name, fragment) in target_schemas {
                merge(name, fragment);
            }
        }
    }

    Ok(schemas)
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<Uuid, Arc<WorkspaceConnection>>,
    databases: HashMap<PathBuf, sled::Db>,
}

/// Registry of composed connections, keyed by workspace id.
///
/// Initialize-once-per-key: composition runs under the registry lock, so
/// two concurrent first calls for the same workspace produce one
/// connection.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: Mutex<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached connection for the workspace, if one was composed.
    pub async fn get(&self, workspace_id: &Uuid) -> Option<Arc<WorkspaceConnection>> {
        self.state.lock().await.connections.get(workspace_id).cloned()
    }

    /// Return the cached connection or compose and cache a new one.
    /// Workspaces without a storage locator yield `None` and are not
    /// cached.
    pub async fn get_or_create(
        &self,
        app: &AppContext,
        workspace: &WorkspaceRecord,
    ) -> WorkfoldResult<Option<Arc<WorkspaceConnection>>> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.connections.get(&workspace.id) {
            return Ok(Some(Arc::clone(existing)));
        }
        let Some(storage_path) = &workspace.storage_path else {
            return Ok(None);
        };

        let schemas = composed_schemas(app, workspace).await?;

        let db = match state.databases.get(storage_path) {
            Some(db) => db.clone(),
            None => {
                if let Some(parent) = storage_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let db = sled::open(storage_path)?;
                state.databases.insert(storage_path.clone(), db.clone());
                db
            }
        };
        // register every composed schema as a collection up front
        for name in schemas.keys() {
            db.open_tree(name.as_str())?;
        }

        log::info!(
            "composed connection for workspace '{}' with {} schema(s)",
            workspace.identifier,
            schemas.len()
        );

        let connection = Arc::new(WorkspaceConnection {
            workspace_id: workspace.id,
            db,
            schemas,
        });
        state.connections.insert(workspace.id, Arc::clone(&connection));
        Ok(Some(connection))
    }

    /// Drop the cached connection for a workspace, forcing the next
    /// caller to recompose. The database handle stays cached, so live
    /// clones of the old connection keep working. Nothing invokes this
    /// automatically on module activation changes; callers opt in.
    pub async fn invalidate(&self, workspace_id: &Uuid) -> bool {
        self.state.lock().await.connections.remove(workspace_id).is_some()
    }
}
