//! Module registry
//!
//! Two faces of a feature module live here. [`ModuleRecord`] is the
//! persisted catalog entry: identifier, localized texts, declared
//! dependencies, pricing fields. [`AppModule`] is the runtime unit
//! registered with the application: it contributes schema fragments and
//! hooks and reacts to subscription lifecycle events.

use crate::config::WorkfoldConfig;
use crate::connection::ConnectionRegistry;
use crate::error::WorkfoldResult;
use crate::hooks::{HookMap, InjectDispatch};
use crate::schema::SchemaContribution;
use crate::store::CoreStore;
use crate::subscriptions::SubscribeEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Persisted catalog entry for a feature module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: Uuid,
    /// Globally unique, lowercase, immutable once referenced by the
    /// dependency graph
    pub identifier: String,
    /// Localized display name, locale -> text
    #[serde(default)]
    pub name: HashMap<String, String>,
    #[serde(default)]
    pub description: HashMap<String, String>,
    #[serde(default)]
    pub readme: HashMap<String, String>,
    /// Identifiers of modules this one depends on
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub micro: bool,
    /// Maintenanced modules are hidden from the store and cannot be
    /// subscribed
    #[serde(default)]
    pub maintenance: bool,
    /// Currency tag -> cost in minor units
    #[serde(default)]
    pub monthly_cost: HashMap<String, u64>,
    pub hourly_cost_factor_percent: Option<u32>,
    pub trimesterly_discount: Option<u32>,
    pub semiannually_discount: Option<u32>,
    pub annually_discount: Option<u32>,
    /// Shortcuts pinned by default for new members of a workspace running
    /// this module
    #[serde(default)]
    pub default_pins: Vec<String>,
    pub default_home_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModuleRecord {
    /// Create a bare module record with the given identifier.
    pub fn new(identifier: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            identifier: identifier.to_lowercase(),
            name: HashMap::new(),
            description: HashMap::new(),
            readme: HashMap::new(),
            dependencies: Vec::new(),
            permissions: Vec::new(),
            categories: Vec::new(),
            micro: false,
            maintenance: false,
            monthly_cost: HashMap::new(),
            hourly_cost_factor_percent: None,
            trimesterly_discount: None,
            semiannually_discount: None,
            annually_discount: None,
            default_pins: Vec::new(),
            default_home_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| d.to_lowercase()).collect();
        self
    }
}

/// Input for [`create_or_update`]. Localized texts arrive as plain strings
/// and are stored under the configured locale; absent fields leave the
/// existing value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleUpsert {
    pub identifier: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub readme: Option<String>,
    pub monthly_cost: Option<u64>,
    pub micro: Option<bool>,
    pub maintenance: Option<bool>,
    pub hourly_cost_factor_percent: Option<u32>,
    pub trimesterly_discount: Option<u32>,
    pub semiannually_discount: Option<u32>,
    pub annually_discount: Option<u32>,
    pub dependencies: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub default_pins: Option<Vec<String>>,
    pub default_home_path: Option<String>,
}

/// Create a new module or update an existing one, keyed by id-or-identifier.
///
/// `preSave` and `postSave` hooks are dispatched through `inject` when a
/// dispatcher is supplied; their results are awaited for side effects only.
pub async fn create_or_update(
    store: &CoreStore,
    data: ModuleUpsert,
    module_reference: Option<&str>,
    config: &WorkfoldConfig,
    inject: Option<InjectDispatch<'_>>,
) -> WorkfoldResult<ModuleRecord> {
    let mut module = match module_reference {
        Some(reference) => store.resolve_module(reference)?,
        None => {
            let identifier = data
                .identifier
                .clone()
                .ok_or_else(|| crate::error::WorkfoldError::Validation(
                    "module identifier is required for creation".to_string(),
                ))?;
            match store.module_by_identifier(&identifier)? {
                Some(existing) => existing,
                None => ModuleRecord::new(&identifier),
            }
        }
    };

    // localized texts land under the configured default locale
    if let Some(name) = &data.name {
        module.name.insert(config.default_locale.clone(), name.clone());
    }
    if let Some(description) = &data.description {
        module
            .description
            .insert(config.default_locale.clone(), description.clone());
    }
    if let Some(readme) = &data.readme {
        module
            .readme
            .insert(config.default_locale.clone(), readme.clone());
    }

    // monthly cost is replaced, not merged
    if let Some(cost) = data.monthly_cost {
        module.monthly_cost.clear();
        module.monthly_cost.insert(config.default_currency.clone(), cost);
    }

    if let Some(identifier) = &data.identifier {
        let identifier = identifier.to_lowercase();
        // identifiers are globally unique; a rename must not collide with
        // another catalog record
        if identifier != module.identifier {
            if let Some(existing) = store.module_by_identifier(&identifier)? {
                if existing.id != module.id {
                    return Err(crate::error::WorkfoldError::Validation(format!(
                        "module identifier '{identifier}' already taken"
                    )));
                }
            }
        }
        module.identifier = identifier;
    }
    if let Some(micro) = data.micro {
        module.micro = micro;
    }
    if let Some(maintenance) = data.maintenance {
        module.maintenance = maintenance;
    }
    if data.hourly_cost_factor_percent.is_some() {
        module.hourly_cost_factor_percent = data.hourly_cost_factor_percent;
    }
    if data.trimesterly_discount.is_some() {
        module.trimesterly_discount = data.trimesterly_discount;
    }
    if data.semiannually_discount.is_some() {
        module.semiannually_discount = data.semiannually_discount;
    }
    if data.annually_discount.is_some() {
        module.annually_discount = data.annually_discount;
    }
    if let Some(dependencies) = &data.dependencies {
        module.dependencies = dependencies.iter().map(|d| d.to_lowercase()).collect();
    }
    if let Some(categories) = &data.categories {
        module.categories = categories.clone();
    }
    if let Some(pins) = &data.default_pins {
        module.default_pins = pins.clone();
    }
    if data.default_home_path.is_some() {
        module.default_home_path = data.default_home_path.clone();
    }
    module.updated_at = Utc::now();

    let payload = serde_json::json!({
        "module": module.identifier,
        "data": serde_json::to_value(&module)?,
    });

    if let Some(inject) = inject {
        inject("preSave", payload.clone()).await?;
    }

    store.save_module(&module)?;
    log::info!("module '{}' saved to catalog", module.identifier);

    if let Some(inject) = inject {
        inject("postSave", payload).await?;
    }

    Ok(module)
}

/// A feature module registered with the running application.
#[async_trait]
pub trait AppModule: Send + Sync {
    /// Module name; matched case-insensitively wherever it is used as a
    /// dispatch key.
    fn name(&self) -> &str;

    /// Schema fragments this module contributes.
    fn schemas(&self) -> SchemaContribution {
        SchemaContribution::new()
    }

    /// Hook contributions, keyed by target module and hook name.
    fn contributed_hooks(&self) -> HookMap {
        HookMap::new()
    }

    /// Lifecycle callback invoked when a workspace is granted this module.
    async fn on_subscribe(&self, _event: &SubscribeEvent) -> WorkfoldResult<()> {
        Ok(())
    }
}

/// Application context: the installed module set, always-on defaults, the
/// catalog store, and the per-workspace connection registry.
pub struct AppContext {
    config: WorkfoldConfig,
    store: CoreStore,
    modules: Vec<Arc<dyn AppModule>>,
    by_name: HashMap<String, Arc<dyn AppModule>>,
    connections: ConnectionRegistry,
}

impl AppContext {
    pub fn new(config: WorkfoldConfig, store: CoreStore) -> Self {
        Self {
            config,
            store,
            modules: Vec::new(),
            by_name: HashMap::new(),
            connections: ConnectionRegistry::new(),
        }
    }

    /// Register an installed module. Registration order is the resolution
    /// order used for schema merging and hook dispatch.
    pub fn register_module(&mut self, module: Arc<dyn AppModule>) {
        self.by_name
            .insert(module.name().to_lowercase(), Arc::clone(&module));
        self.modules.push(module);
    }

    pub fn installed_modules(&self) -> &[Arc<dyn AppModule>] {
        &self.modules
    }

    /// Identifiers of modules active for every workspace.
    pub fn default_modules(&self) -> &[String] {
        &self.config.default_modules
    }

    /// Case-insensitive installed-module lookup.
    pub fn module_by_name(&self, name: &str) -> Option<Arc<dyn AppModule>> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }

    pub fn store(&self) -> &CoreStore {
        &self.store
    }

    pub fn config(&self) -> &WorkfoldConfig {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Installed modules active for the workspace: the intersection of the
    /// installed catalog with the union of the workspace's current modules
    /// and the application's always-on defaults. Order follows module
    /// registration order and is deterministic.
    pub async fn resolve_modules_hereditary(
        &self,
        workspace: &crate::workspace::WorkspaceRecord,
    ) -> WorkfoldResult<Vec<Arc<dyn AppModule>>> {
        let current = crate::subscriptions::current_modules(&self.store, workspace)?;

        let mut wanted: Vec<String> = current
            .iter()
            .map(|m| m.identifier.to_lowercase())
            .collect();
        for identifier in self.default_modules() {
            wanted.push(identifier.to_lowercase());
        }

        Ok(self
            .modules
            .iter()
            .filter(|m| wanted.contains(&m.name().to_lowercase()))
            .cloned()
            .collect())
    }

    /// The workspace's composed connection, created on first use.
    pub async fn workspace_connection(
        &self,
        workspace: &crate::workspace::WorkspaceRecord,
    ) -> WorkfoldResult<Option<std::sync::Arc<crate::connection::WorkspaceConnection>>> {
        self.connections.get_or_create(self, workspace).await
    }
}
