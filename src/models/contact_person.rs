//! Contact person entity belonging to a provider.

use serde::{Deserialize, Serialize};

use crate::models::record::Fields;

/// A persisted contact person with mapped attribute fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactPerson {
    pub id: i64,
    pub provider_id: i64,
    pub published: bool,
    pub fields: Fields,
}

/// Data for creating a contact person.
#[derive(Debug, Clone, Serialize)]
pub struct NewContactPerson {
    pub provider_id: i64,
    pub published: bool,
    pub fields: Fields,
}
