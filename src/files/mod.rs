//! Staging-area filesystem helper: directory scans, file metadata, content
//! hashing, copies, and archive extraction.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::errors::ImportError;

/// Size and modification time of a staged file.
#[derive(Debug, Clone, Copy)]
pub struct FileMeta {
    pub modified: DateTime<Utc>,
    pub size: u64,
}

/// List files in a directory (non-recursive) whose extension matches one of
/// the given extensions, case-insensitively.
pub fn scan_dir_by_ext(dir: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)));
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn file_meta(path: &Path) -> io::Result<FileMeta> {
    let meta = fs::metadata(path)?;
    let modified = meta.modified().map(DateTime::<Utc>::from)?;
    Ok(FileMeta {
        modified,
        size: meta.len(),
    })
}

pub fn file_size(path: &Path) -> io::Result<u64> {
    Ok(fs::metadata(path)?.len())
}

/// Hex-encoded SHA-256 digest of a file's content, computed streaming.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Check that a feed-supplied checksum looks like a hex content digest
/// (MD5 or SHA-256 length).
pub fn is_valid_checksum(value: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new("^(?:[0-9a-fA-F]{32}|[0-9a-fA-F]{64})$").expect("checksum pattern")
    });
    pattern.is_match(value)
}

/// Copy a file, creating the destination's parent directories.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    Ok(())
}

/// Remove a directory's contents, creating the directory if missing.
pub fn purge_dir(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Extract a zip archive into a destination directory, returning the
/// extracted file paths.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| ImportError::Feed(format!("cannot read archive: {e}")))?;

    let mut extracted = Vec::new();
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| ImportError::Feed(format!("cannot read archive member: {e}")))?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        extracted.push(out_path);
    }
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn scan_filters_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("feed.XML"), b"<a/>").unwrap();
        fs::write(dir.path().join("feed.zip"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("tmp")).unwrap();

        let files = scan_dir_by_ext(dir.path(), &["xml", "zip"]).unwrap();
        assert_eq!(files.len(), 2);

        let xml_only = scan_dir_by_ext(dir.path(), &["xml"]).unwrap();
        assert_eq!(xml_only.len(), 1);
    }

    #[test]
    fn hash_is_hex_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.jpg");
        fs::write(&path, b"content").unwrap();
        let hash = hash_file(&path).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_file(&path).unwrap());
    }

    #[test]
    fn checksum_format_validation() {
        assert!(is_valid_checksum(&"a".repeat(32)));
        assert!(is_valid_checksum(&"0".repeat(64)));
        assert!(!is_valid_checksum("xyz"));
        assert!(!is_valid_checksum(&"g".repeat(32)));
        assert!(!is_valid_checksum(""));
    }

    #[test]
    fn copy_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.jpg");
        fs::write(&src, b"bytes").unwrap();
        let dst = dir.path().join("AB123/ob-1/src.jpg");
        copy_file(&src, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"bytes");
    }

    #[test]
    fn purge_clears_contents_but_keeps_dir() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("tmp");
        fs::create_dir(&scratch).unwrap();
        fs::write(scratch.join("a.xml"), b"x").unwrap();
        fs::create_dir(scratch.join("nested")).unwrap();

        purge_dir(&scratch).unwrap();
        assert!(scratch.exists());
        assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);

        // Missing directory is created
        let fresh = dir.path().join("fresh");
        purge_dir(&fresh).unwrap();
        assert!(fresh.exists());
    }

    #[test]
    fn extracts_zip_members() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("export.zip");
        let file = fs::File::create(&archive).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("feed.xml", options).unwrap();
        writer.write_all(b"<openimmo/>").unwrap();
        writer.start_file("front.jpg", options).unwrap();
        writer.write_all(b"jpegbytes").unwrap();
        writer.finish().unwrap();

        let dest = dir.path().join("tmp");
        fs::create_dir(&dest).unwrap();
        let extracted = extract_archive(&archive, &dest).unwrap();
        assert_eq!(extracted.len(), 2);
        assert_eq!(fs::read(dest.join("feed.xml")).unwrap(), b"<openimmo/>");
    }

    #[test]
    fn invalid_archive_is_a_feed_error() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"not a zip").unwrap();
        let err = extract_archive(&archive, dir.path()).unwrap_err();
        assert!(err.is_feed());
    }
}
