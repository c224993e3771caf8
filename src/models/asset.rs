//! Media asset entity keyed by logical path.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored media file with a stable identifier and content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub uuid: Uuid,
    /// Logical path below the media root, e.g. `estates/AB123/ob-1/front.jpg`.
    pub path: String,
    /// Hex-encoded content hash.
    pub hash: String,
    pub title: Option<String>,
    pub alt: Option<String>,
}

/// Data for registering an asset.
#[derive(Debug, Clone, Serialize)]
pub struct NewAsset {
    pub path: String,
    pub hash: String,
    pub title: Option<String>,
    pub alt: Option<String>,
}
