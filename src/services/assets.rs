//! Media asset resolution with hash-based deduplication.
//!
//! Referenced files are staged in the import scratch directory by the feed
//! provider. Resolution verifies the staged file, copies it below the media
//! root, registers it with the store, and returns the asset's stable
//! identifier in place of the raw file name. An asset already present with
//! an unchanged content hash is reused without copying.

use std::path::PathBuf;

use crate::errors::ImportError;
use crate::files;
use crate::hooks::{HookSet, SaveAssetArgs};
use crate::mapping::{InterfaceConfig, MappingRule};
use crate::models::asset::NewAsset;
use crate::models::record::RecordKind;
use crate::parsers::XmlElement;
use crate::services::run_log::RunLog;
use crate::store::RecordStore;

/// Maximum accepted staged file size in bytes.
pub const MAX_ASSET_SIZE: u64 = 3_000_000;

pub struct AssetManager<'a> {
    store: &'a dyn RecordStore,
    config: &'a InterfaceConfig,
    hooks: &'a HookSet,
    log: &'a RunLog,
}

impl<'a> AssetManager<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        config: &'a InterfaceConfig,
        hooks: &'a HookSet,
        log: &'a RunLog,
    ) -> Self {
        Self {
            store,
            config,
            hooks,
            log,
        }
    }

    /// Resolve a staged media file to a stable asset identifier.
    ///
    /// Returns `None` when the value must be skipped (hook skip, missing or
    /// out-of-bounds file, checksum mismatch); the listing still proceeds.
    pub async fn resolve(
        &self,
        rule: &MappingRule,
        group: &XmlElement,
        file_name: &str,
        provider_key: &str,
        listing_key: Option<&str>,
        values: &mut Vec<String>,
    ) -> Result<Option<String>, ImportError> {
        let checksum = group
            .child_text("check")
            .filter(|c| files::is_valid_checksum(c))
            .map(str::to_string);

        let mut args = SaveAssetArgs {
            kind: rule.kind,
            group,
            file_name: file_name.to_string(),
            values,
            skip: false,
        };
        self.hooks.run_save_asset(&mut args);
        if args.skip {
            return Ok(None);
        }
        let file_name = args.file_name;

        let staged = feed_scratch(self.config).join(&file_name);
        let size = match files::file_size(&staged) {
            Ok(size) => size,
            Err(_) => {
                self.log.info(format!(
                    "Skipping media file '{file_name}': not found in the staging area."
                ));
                return Ok(None);
            }
        };
        if size == 0 || size > MAX_ASSET_SIZE {
            self.log.info(format!(
                "Skipping media file '{file_name}': invalid size ({size} bytes)."
            ));
            return Ok(None);
        }

        let Some(destination) = self.destination_path(rule.kind, provider_key, listing_key, &file_name)
        else {
            self.log.info(format!(
                "Skipping media file '{file_name}': no media folder configured for contact persons."
            ));
            return Ok(None);
        };
        let logical_path = destination.to_string_lossy().into_owned();

        let staged_hash = files::hash_file(&staged)?;
        if let Some(existing) = self.store.find_asset_by_path(&logical_path).await? {
            if existing.hash == staged_hash {
                tracing::debug!(path = %logical_path, "asset unchanged, reusing");
                return Ok(Some(existing.uuid.to_string()));
            }
            // Content changed: the new asset replaces the old one.
            self.store.delete_asset(existing.uuid).await?;
        }

        files::copy_file(&staged, &destination)?;
        let copied_hash = files::hash_file(&destination)?;

        let title = group
            .child_text("anhangtitel")
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let asset = self
            .store
            .register_asset(NewAsset {
                path: logical_path,
                hash: copied_hash.clone(),
                title: title.clone(),
                alt: title.clone(),
            })
            .await?;

        if let Some(check) = checksum {
            if copied_hash != check {
                self.store.delete_asset(asset.uuid).await?;
                if let Err(error) = std::fs::remove_file(&destination) {
                    tracing::debug!(%error, "could not remove mismatched asset file");
                }
                self.log.info(format!(
                    "Skipping media file '{file_name}': checksum mismatch."
                ));
                return Ok(None);
            }
        }

        if let Some(title) = &title {
            self.log
                .info(format!("Media file '{file_name}' added ('{title}')."));
        }

        Ok(Some(asset.uuid.to_string()))
    }

    /// `<media root>/<provider>/[<listing>/]<file>`; the listing segment
    /// applies only to listing-kind assets.
    fn destination_path(
        &self,
        kind: RecordKind,
        provider_key: &str,
        listing_key: Option<&str>,
        file_name: &str,
    ) -> Option<PathBuf> {
        match kind {
            RecordKind::RealEstate => {
                let mut path = self.config.media_dir.join(provider_key);
                if let Some(listing) = listing_key {
                    path = path.join(listing);
                }
                Some(path.join(file_name))
            }
            RecordKind::ContactPerson => self
                .config
                .contact_media_dir
                .as_ref()
                .map(|dir| dir.join(provider_key).join(file_name)),
        }
    }
}

fn feed_scratch(config: &InterfaceConfig) -> PathBuf {
    crate::feed::scratch_dir(&config.import_dir)
}
