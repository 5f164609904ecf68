//! Module dependency resolution
//!
//! Computes the hereditary closure of a module: the module itself plus
//! every module reachable by following declared dependency edges,
//! deduplicated by identifier. A cycle anywhere on the walk is a hard
//! error, never an endless traversal.

use crate::error::{WorkfoldError, WorkfoldResult};
use crate::registry::ModuleRecord;
use crate::store::CoreStore;

/// Return `module` plus the transitive closure of its dependencies.
///
/// The returned order is depth-first discovery order, which keeps the
/// result deterministic, but no ordering is guaranteed to callers; they
/// must dedup and match by identifier.
pub fn hereditary_closure(
    store: &CoreStore,
    module: &ModuleRecord,
) -> WorkfoldResult<Vec<ModuleRecord>> {
    let mut collected: Vec<ModuleRecord> = Vec::new();
    let mut visiting: Vec<String> = Vec::new();
    walk(store, module, &mut visiting, &mut collected)?;
    Ok(collected)
}

fn walk(
    store: &CoreStore,
    module: &ModuleRecord,
    visiting: &mut Vec<String>,
    collected: &mut Vec<ModuleRecord>,
) -> WorkfoldResult<()> {
    if visiting.contains(&module.identifier) {
        let mut path = visiting.clone();
        path.push(module.identifier.clone());
        return Err(WorkfoldError::CyclicDependency { path });
    }

    if collected.iter().any(|m| m.identifier == module.identifier) {
        // already expanded through another branch of the walk
        return Ok(());
    }

    visiting.push(module.identifier.clone());
    collected.push(module.clone());

    for reference in &module.dependencies {
        let dependency = store.resolve_module(reference)?;
        walk(store, &dependency, visiting, collected)?;
    }

    visiting.pop();
    Ok(())
}
