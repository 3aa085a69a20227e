//! Small response payload shapes shared across controllers.

use serde::{Deserialize, Serialize};

/// `{"detail": <payload>}` wrapper.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Detail<T> {
    pub detail: T,
}

impl<T> Detail<T> {
    pub fn new(detail: T) -> Self {
        Self { detail }
    }
}

/// `{"id": <value>}` wrapper, the usual create-endpoint answer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Id<T> {
    pub id: T,
}

impl<T> Id<T> {
    pub fn new(id: T) -> Self {
        Self { id }
    }
}

/// Fixed success acknowledgement.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Ok {
    pub detail: String,
}

impl Default for Ok {
    fn default() -> Self {
        Self {
            detail: "Action was successful".to_string(),
        }
    }
}
