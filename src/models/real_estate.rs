//! Real estate listing entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::record::Fields;

/// A persisted listing with mapped attribute fields.
///
/// `contact_person_id` is optional: assign-mode imports without a matching
/// marketing-kind assignment leave the listing without a contact person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealEstate {
    pub id: i64,
    pub provider_id: i64,
    pub contact_person_id: Option<i64>,
    pub published: bool,
    /// Reference-listing flag set by the `REFERENZ` action code.
    pub referenz: bool,
    pub date_added: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub fields: Fields,
}

/// Data for creating a listing.
#[derive(Debug, Clone, Serialize)]
pub struct NewRealEstate {
    pub provider_id: i64,
    pub contact_person_id: Option<i64>,
    pub published: bool,
    pub referenz: bool,
    pub date_added: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub fields: Fields,
}
