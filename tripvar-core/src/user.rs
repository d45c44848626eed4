use serde::{Deserialize, Serialize};

use crate::TripvarError;

/// The caller's identity as resolved by the surrounding web layer.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserContext {
    pub id: String,
    pub is_active: bool,
    pub is_verified: bool,
}

impl UserContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_active: true,
            is_verified: false,
        }
    }

    pub fn ensure_active(&self) -> Result<(), TripvarError> {
        if self.is_active {
            Ok(())
        } else {
            Err(TripvarError::InvalidRequest(format!(
                "user '{}' is inactive",
                self.id
            )))
        }
    }
}
