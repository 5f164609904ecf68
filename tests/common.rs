//! Common test utilities and fixtures
//!
//! Provides a ready application context with a temporary catalog store,
//! plus a configurable in-test feature module implementation shared by
//! the integration suites.

// not every suite uses every helper
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use workfold::config::WorkfoldConfig;
use workfold::error::{WorkfoldError, WorkfoldResult};
use workfold::hooks::HookMap;
use workfold::registry::{AppContext, AppModule, ModuleRecord};
use workfold::schema::SchemaContribution;
use workfold::store::CoreStore;
use workfold::subscriptions::SubscribeEvent;
use workfold::workspace::{create_new, NewWorkspace, WorkspaceRecord};

use async_trait::async_trait;
use tempfile::TempDir;

/// Application fixture: context, temp storage, and a shared subscription
/// log written by every [`TestModule`]'s `on_subscribe`.
pub struct TestApp {
    pub app: AppContext,
    pub subscribe_log: Arc<Mutex<Vec<String>>>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    /// Build an app with the given always-on default modules.
    pub fn new(default_modules: &[&str]) -> WorkfoldResult<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config = WorkfoldConfig {
            storage_root: temp_dir.path().to_path_buf(),
            default_modules: default_modules.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        };
        let store = CoreStore::temporary()?;
        Ok(Self {
            app: AppContext::new(config, store),
            subscribe_log: Arc::new(Mutex::new(Vec::new())),
            _temp_dir: temp_dir,
        })
    }

    /// Seed a catalog module with dependencies.
    pub fn seed_module(&self, identifier: &str, dependencies: &[&str]) -> ModuleRecord {
        let module = ModuleRecord::new(identifier).with_dependencies(dependencies);
        self.app.store().save_module(&module).expect("seed module");
        module
    }

    /// Register a plain installed module with no contributions.
    pub fn install(&mut self, name: &str) {
        let module = TestModule::new(name, Arc::clone(&self.subscribe_log));
        self.app.register_module(Arc::new(module));
    }

    /// Register a fully configured installed module.
    pub fn install_module(&mut self, module: TestModule) {
        self.app.register_module(Arc::new(module));
    }

    /// Create a workspace with an auto-generated identifier.
    pub fn workspace(&self) -> WorkspaceRecord {
        create_new(self.app.store(), self.app.config(), NewWorkspace::default())
            .expect("create workspace")
    }
}

/// Configurable feature module for tests.
pub struct TestModule {
    name: String,
    hooks: HookMap,
    schemas: SchemaContribution,
    fail_on_subscribe: bool,
    subscribe_log: Arc<Mutex<Vec<String>>>,
}

impl TestModule {
    pub fn new(name: &str, subscribe_log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            hooks: HookMap::new(),
            schemas: SchemaContribution::new(),
            fail_on_subscribe: false,
            subscribe_log,
        }
    }

    pub fn with_hooks(mut self, hooks: HookMap) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_schemas(mut self, schemas: SchemaContribution) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn failing_on_subscribe(mut self) -> Self {
        self.fail_on_subscribe = true;
        self
    }
}

#[async_trait]
impl AppModule for TestModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn schemas(&self) -> SchemaContribution {
        self.schemas.clone()
    }

    fn contributed_hooks(&self) -> HookMap {
        self.hooks.clone()
    }

    async fn on_subscribe(&self, event: &SubscribeEvent) -> WorkfoldResult<()> {
        if self.fail_on_subscribe {
            return Err(WorkfoldError::Validation(format!(
                "{} refuses subscriptions",
                self.name
            )));
        }
        self.subscribe_log
            .lock()
            .expect("subscribe log lock")
            .push(format!("{}:{}", event.workspace.identifier, self.name));
        Ok(())
    }
}
