//! Sync-file discovery and feed document loading.
//!
//! Candidate files are listed newest first and annotated with their prior
//! sync outcome. Archives are extracted into a per-run scratch directory
//! and must contain exactly one XML member.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::errors::ImportError;
use crate::files;
use crate::models::sync_history::SyncStatus;
use crate::parsers::XmlElement;
use crate::store::RecordStore;

/// Extensions considered syncable in the import directory.
pub const SYNCABLE_EXTENSIONS: &[&str] = &["zip", "xml", "data"];

/// A candidate sync file with prior-sync annotations.
#[derive(Debug, Clone)]
pub struct SyncFileInfo {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub size: u64,
    pub synced_by: Option<String>,
    pub status: Option<SyncStatus>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Scratch directory used for archive extraction, below the import dir.
pub fn scratch_dir(import_dir: &Path) -> PathBuf {
    import_dir.join("tmp")
}

/// List syncable files in the import directory, newest first, annotated
/// with history entries from earlier runs.
pub async fn list_sync_files(
    import_dir: &Path,
    store: &dyn RecordStore,
    archives: bool,
) -> Result<Vec<SyncFileInfo>, ImportError> {
    let extensions: &[&str] = if archives {
        SYNCABLE_EXTENSIONS
    } else {
        &["xml"]
    };
    let paths = files::scan_dir_by_ext(import_dir, extensions)?;

    let sources: Vec<String> = paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let history = store.find_history_for_sources(&sources).await?;

    let mut infos = Vec::with_capacity(paths.len());
    for path in paths {
        let meta = files::file_meta(&path)?;
        let source = path.to_string_lossy().into_owned();
        // Entries are ordered by timestamp; the latest one wins.
        let last = history.iter().filter(|h| h.source == source).next_back();
        infos.push(SyncFileInfo {
            path,
            modified: meta.modified,
            size: meta.size,
            synced_by: last.map(|h| h.username.clone()),
            status: last.map(|h| h.status),
            synced_at: last.map(|h| h.tstamp),
        });
    }

    infos.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(infos)
}

/// Resolve the selected file to a concrete XML path, extracting archives
/// into the scratch directory.
///
/// An archive must contain exactly one XML member; zero or more than one is
/// a feed error.
pub fn resolve_sync_file(import_dir: &Path, path: &Path) -> Result<PathBuf, ImportError> {
    let is_archive = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
    if !is_archive {
        return Ok(path.to_path_buf());
    }

    let scratch = scratch_dir(import_dir);
    files::purge_dir(&scratch)?;
    files::extract_archive(path, &scratch)?;

    let mut members = files::scan_dir_by_ext(&scratch, &["xml"])?;
    if members.len() > 1 {
        return Err(ImportError::Feed(
            "more than one XML file was found in the archive; only one is allowed per transfer"
                .to_string(),
        ));
    }
    members
        .pop()
        .ok_or_else(|| ImportError::Feed("no XML file was found in the archive".to_string()))
}

/// Load and decode the feed document; the root element must be `openimmo`.
pub fn load_document(path: &Path) -> Result<XmlElement, ImportError> {
    let data = std::fs::read(path)?;
    let root = XmlElement::parse(&data)?;
    if root.name() != "openimmo" {
        return Err(ImportError::Feed(format!(
            "unexpected document root '{}'",
            root.name()
        )));
    }
    Ok(root)
}
