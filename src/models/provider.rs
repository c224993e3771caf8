//! Provider entity: the estate agency supplying records in a feed.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A persisted provider, keyed by its OpenImmo provider number.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Provider {
    pub id: i64,
    /// OpenImmo provider number (`anbieternr`).
    pub anbieternr: String,
    pub name: String,
}
