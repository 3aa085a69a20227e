//! Process-wide controller registry.
//!
//! Populated by registrars (assumed to run during single-threaded startup),
//! consumed when an API mounts controllers. Append-only; a duplicate
//! registration of the same controller type is rejected.

use std::any::TypeId;
use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::ApiError;
use crate::registrar::ControllerDescriptor;

fn registry() -> &'static DashMap<TypeId, Arc<ControllerDescriptor>> {
    static REGISTRY: OnceLock<DashMap<TypeId, Arc<ControllerDescriptor>>> = OnceLock::new();
    REGISTRY.get_or_init(DashMap::new)
}

pub(crate) fn insert<C: 'static>(descriptor: Arc<ControllerDescriptor>) -> Result<(), ApiError> {
    match registry().entry(TypeId::of::<C>()) {
        Entry::Occupied(_) => Err(ApiError::configuration(format!(
            "controller `{}` is already registered",
            descriptor.name()
        ))),
        Entry::Vacant(slot) => {
            slot.insert(descriptor);
            Ok(())
        }
    }
}

pub(crate) fn lookup<C: 'static>() -> Option<Arc<ControllerDescriptor>> {
    registry().get(&TypeId::of::<C>()).map(|d| d.value().clone())
}

/// Descriptors flagged for auto-import, in registration-independent order.
pub(crate) fn auto_import_descriptors() -> Vec<Arc<ControllerDescriptor>> {
    let mut found: Vec<Arc<ControllerDescriptor>> = registry()
        .iter()
        .filter(|entry| entry.value().auto_import())
        .map(|entry| entry.value().clone())
        .collect();
    found.sort_by_key(|d| d.name());
    found
}
