//! # Workfold
//!
//! Core library of a multi-tenant workspace platform. Workspaces
//! (tenants) subscribe to feature modules, users hold memberships with
//! roles inside a workspace, and a hook/injection mechanism lets modules
//! extend each other's named extension points without direct coupling.
//!
//! ## Core Components
//!
//! * `registry` - Installed-module catalog, persisted module records, and
//!   the application context
//! * `resolver` - Transitive dependency closure with cycle detection
//! * `subscriptions` - Time-bounded module/storage-plan grants per
//!   workspace
//! * `hooks` - Extension-point registry and ordered concurrent dispatch
//! * `connection` - Per-workspace composed data contexts with merged
//!   module schemas
//! * `workspace` / `membership` - Tenant and member records
//! * `store` - Sled-backed catalog store
//! * `schema` - Schema fragments and additive merging
//! * `lang` / `capacity` - Localized text resolution and storage
//!   measurement collaborators
//!
//! ## Architecture
//!
//! A request enters an external controller, which resolves the acting
//! workspace and consults this crate: the subscription ledger and
//! dependency resolver compute the workspace's active module set, the
//! connection registry lazily composes the workspace-scoped data context,
//! and the injection engine fans named hooks out to every active module
//! before and after the controller's primary logic.

pub mod capacity;
pub mod config;
pub mod connection;
pub mod error;
pub mod hooks;
pub mod lang;
pub mod membership;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod subscriptions;
pub mod workspace;

// Re-export main types for convenience
pub use capacity::{CapacityOracle, FsCapacityOracle};
pub use config::{load_config, WorkfoldConfig};
pub use connection::{ConnectionRegistry, WorkspaceConnection};
pub use error::{WorkfoldError, WorkfoldResult};
pub use hooks::{contributor, HookMap, InjectionEngine};
pub use membership::{add_member, AddMember, MembershipRecord};
pub use registry::{create_or_update, AppContext, AppModule, ModuleRecord, ModuleUpsert};
pub use resolver::hereditary_closure;
pub use schema::{merge_fragment, FieldSpec, FieldType, SchemaContribution, SchemaFragment};
pub use store::CoreStore;
pub use subscriptions::{
    current_modules, has_current_module, subscribe, subscribe_many, GrantOutcome, Period,
    SubscribableKind, SubscriptionOutcome, SubscriptionRecord, SubscriptionStatus,
};
pub use workspace::{create_new, NewWorkspace, WorkspaceRecord};
