//! Sync orchestration: the entry points exposed to the surrounding backend.
//!
//! A run is loader → builder → reconciliation → history, with the scratch
//! directory purged unconditionally at the end. Feed and configuration
//! errors are hard failures; they still append a history entry so the file
//! list reflects the attempt.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::errors::ImportError;
use crate::feed::{self, SyncFileInfo};
use crate::files;
use crate::hooks::{HookSet, LoadArgs, SyncArgs};
use crate::mapping::InterfaceDefinition;
use crate::models::sync_history::{NewSyncHistoryEntry, SyncStatus};
use crate::services::builder::RecordBuilder;
use crate::services::catalog::CatalogWriter;
use crate::services::run_log::{LogMessage, RunLog};
use crate::services::telemetry::TelemetryClient;
use crate::store::RecordStore;

/// Outcome of one sync run.
#[derive(Debug)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub message: String,
    pub source: PathBuf,
    pub listings: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub messages: Vec<LogMessage>,
}

/// Status view: candidate files plus the messages of the last run.
#[derive(Debug)]
pub struct SyncOverview {
    pub files: Vec<SyncFileInfo>,
    pub messages: Vec<LogMessage>,
}

/// The import engine for one configured interface.
pub struct Importer {
    store: Arc<dyn RecordStore>,
    definition: InterfaceDefinition,
    hooks: HookSet,
    telemetry: Option<TelemetryClient>,
    operator: String,
    /// Stamp the interface's `lastSync` at run end (extensions may clear
    /// this per run).
    pub update_sync_time: bool,
    last_messages: Vec<LogMessage>,
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("operator", &self.operator)
            .field("update_sync_time", &self.update_sync_time)
            .finish_non_exhaustive()
    }
}

impl Importer {
    /// Validate the interface configuration and build the engine.
    ///
    /// Fails when the import or media directory is missing or the mapping
    /// set is empty; nothing else may be called on a failed initialization.
    pub fn new(
        store: Arc<dyn RecordStore>,
        definition: InterfaceDefinition,
        hooks: HookSet,
        operator: impl Into<String>,
    ) -> Result<Self, ImportError> {
        let config = &definition.config;
        if !config.import_dir.is_dir() {
            return Err(ImportError::Configuration(format!(
                "import folder '{}' does not exist",
                config.import_dir.display()
            )));
        }
        if !config.media_dir.is_dir() {
            return Err(ImportError::Configuration(format!(
                "media folder '{}' does not exist",
                config.media_dir.display()
            )));
        }
        if definition.mappings.is_empty() {
            return Err(ImportError::Configuration(
                "interface has no mapping rules".to_string(),
            ));
        }

        Ok(Self {
            store,
            definition,
            hooks,
            telemetry: None,
            operator: operator.into(),
            update_sync_time: true,
            last_messages: Vec::new(),
        })
    }

    pub fn with_telemetry(mut self, client: TelemetryClient) -> Self {
        self.telemetry = Some(client);
        self
    }

    /// The status view: syncable files with prior-sync annotations, newest
    /// first, plus the accumulated messages of the most recent run.
    pub async fn overview(&self) -> Result<SyncOverview, ImportError> {
        let files = feed::list_sync_files(
            &self.definition.config.import_dir,
            self.store.as_ref(),
            true,
        )
        .await?;
        Ok(SyncOverview {
            files,
            messages: self.last_messages.clone(),
        })
    }

    /// Run a full sync for the selected file.
    pub async fn sync_file(&mut self, path: &Path) -> Result<SyncReport, ImportError> {
        let log = RunLog::new();
        let result = self.run(path, &log).await;

        // The scratch area is purged regardless of the outcome so stale
        // members never leak into the next run.
        let scratch = feed::scratch_dir(&self.definition.config.import_dir);
        if let Err(error) = files::purge_dir(&scratch) {
            tracing::debug!(%error, "could not purge scratch directory");
        }

        match result {
            Ok(report) => {
                self.last_messages = report.messages.clone();
                Ok(report)
            }
            Err(error) => {
                log.error(error.to_string());
                let entry = NewSyncHistoryEntry {
                    interface_id: self.definition.config.id,
                    source: path.to_string_lossy().into_owned(),
                    username: self.operator.clone(),
                    text: error.to_string(),
                    status: SyncStatus::Failed,
                };
                if let Err(history_error) = self.store.append_history(entry).await {
                    tracing::error!(%history_error, "could not append history entry");
                }
                self.last_messages = log.messages();
                Err(error)
            }
        }
    }

    async fn run(&self, path: &Path, log: &RunLog) -> Result<SyncReport, ImportError> {
        let config = &self.definition.config;
        let store = self.store.as_ref();

        let mut sync_args = SyncArgs {
            config,
            sync_file: path,
            update_sync_time: self.update_sync_time,
        };
        self.hooks.run_before_sync(&mut sync_args);
        let update_sync_time = sync_args.update_sync_time;

        let xml_path = feed::resolve_sync_file(&config.import_dir, path)?;

        let mut load_args = LoadArgs {
            config,
            sync_file: &xml_path,
            skip: false,
        };
        self.hooks.run_before_load(&mut load_args);
        if load_args.skip {
            return Err(ImportError::Feed(
                "data load aborted by an extension".to_string(),
            ));
        }

        let document = feed::load_document(&xml_path)?;
        log.info("Feed file loaded successfully; the import is started.");

        let builder = RecordBuilder::new(store, &self.definition, &self.hooks, log);
        let outcome = builder.build(&document).await?;
        let listings = outcome.real_estates.len();
        let telemetry_batch = outcome.real_estates.clone();

        let writer = CatalogWriter::new(store, config, &self.hooks, log);
        let summary = writer
            .apply(outcome.contact_persons, outcome.real_estates)
            .await?;

        let partial = outcome.partial || summary.partial;
        let (status, message) = if partial {
            (SyncStatus::Partial, "File partially imported.")
        } else {
            (SyncStatus::Success, "File imported.")
        };

        if update_sync_time {
            store.update_last_sync(config.id, Utc::now()).await?;
        }

        store
            .append_history(NewSyncHistoryEntry {
                interface_id: config.id,
                source: path.to_string_lossy().into_owned(),
                username: self.operator.clone(),
                text: message.to_string(),
                status,
            })
            .await?;

        if let Some(telemetry) = &self.telemetry {
            telemetry.publish(&telemetry_batch).await;
        }

        log.info("Import and synchronization finished.");

        Ok(SyncReport {
            status,
            message: message.to_string(),
            source: path.to_path_buf(),
            listings,
            created: summary.created,
            updated: summary.updated,
            deleted: summary.deleted,
            skipped: summary.skipped,
            messages: log.messages(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use std::fs;

    fn definition(import_dir: &Path, media_dir: &Path) -> InterfaceDefinition {
        let toml = format!(
            r#"
            [interface]
            id = 1
            provider_number = "AB123"
            provider_id = 1
            unique_field = "objektnrIntern"
            contact_actions = ["create", "update"]
            import_dir = "{}"
            media_dir = "{}"

            [schema.real_estate]
            objektnrIntern = {{}}
            plz = {{}}

            [schema.contact_person]
            name = {{}}
            vorname = {{}}

            [[mapping]]
            group = "verwaltung_techn"
            field = "objektnr_intern"
            kind = "real_estate"
            attribute = "objektnrIntern"

            [[mapping]]
            group = "geo"
            field = "plz"
            kind = "real_estate"
            attribute = "plz"

            [[mapping]]
            group = "kontaktperson"
            field = "name"
            kind = "contact_person"
            attribute = "name"

            [[mapping]]
            group = "kontaktperson"
            field = "vorname"
            kind = "contact_person"
            attribute = "vorname"
            "#,
            import_dir.display(),
            media_dir.display(),
        );
        InterfaceDefinition::from_toml_str(&toml).unwrap()
    }

    const FEED: &[u8] = br#"<openimmo>
        <anbieter>
            <anbieternr>AB123</anbieternr>
            <immobilie>
                <geo><plz>50667</plz></geo>
                <kontaktperson><name>Muster</name><vorname>Max</vorname></kontaktperson>
                <verwaltung_techn>
                    <objektnr_intern>ob-1</objektnr_intern>
                    <aktion aktionart="CHANGE"/>
                </verwaltung_techn>
            </immobilie>
        </anbieter>
    </openimmo>"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        import_dir: PathBuf,
        store: Arc<InMemoryStore>,
        importer: Importer,
    }

    fn fixture(hooks: HookSet) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let import_dir = dir.path().join("import");
        let media_dir = dir.path().join("media");
        fs::create_dir_all(&import_dir).unwrap();
        fs::create_dir_all(&media_dir).unwrap();

        let store = Arc::new(InMemoryStore::new());
        store.add_provider(1, "AB123", "Alpha");

        let definition = definition(&import_dir, &media_dir);
        let importer =
            Importer::new(store.clone(), definition, hooks, "admin").unwrap();
        Fixture {
            _dir: dir,
            import_dir,
            store,
            importer,
        }
    }

    #[test]
    fn missing_import_folder_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let media_dir = dir.path().join("media");
        fs::create_dir_all(&media_dir).unwrap();
        let definition = definition(&dir.path().join("missing"), &media_dir);

        let err = Importer::new(
            Arc::new(InMemoryStore::new()),
            definition,
            HookSet::new(),
            "admin",
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn successful_run_imports_and_appends_history() {
        let mut fx = fixture(HookSet::new());
        let feed_path = fx.import_dir.join("export.xml");
        fs::write(&feed_path, FEED).unwrap();

        let report = fx.importer.sync_file(&feed_path).await.unwrap();
        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.listings, 1);
        assert_eq!(report.created, 1);

        assert_eq!(fx.store.real_estates().len(), 1);
        let history = fx.store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, SyncStatus::Success);
        assert_eq!(history[0].username, "admin");
        assert!(fx.store.last_sync(1).is_some());
    }

    #[tokio::test]
    async fn skipping_timestamp_update_leaves_last_sync_untouched() {
        let mut fx = fixture(HookSet::new());
        fx.importer.update_sync_time = false;
        let feed_path = fx.import_dir.join("export.xml");
        fs::write(&feed_path, FEED).unwrap();

        fx.importer.sync_file(&feed_path).await.unwrap();
        assert!(fx.store.last_sync(1).is_none());
    }

    #[tokio::test]
    async fn malformed_feed_fails_and_appends_failure_history() {
        let mut fx = fixture(HookSet::new());
        let feed_path = fx.import_dir.join("broken.xml");
        fs::write(&feed_path, b"<openimmo><anbieter>").unwrap();

        let err = fx.importer.sync_file(&feed_path).await.unwrap_err();
        assert!(err.is_feed());

        assert!(fx.store.real_estates().is_empty());
        let history = fx.store.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, SyncStatus::Failed);
        // No catalog writes, no timestamp update.
        assert!(fx.store.last_sync(1).is_none());
    }

    #[tokio::test]
    async fn scratch_directory_is_purged_after_the_run() {
        let mut fx = fixture(HookSet::new());
        let scratch = feed::scratch_dir(&fx.import_dir);
        fs::create_dir_all(&scratch).unwrap();
        fs::write(scratch.join("stale.xml"), b"x").unwrap();

        let feed_path = fx.import_dir.join("export.xml");
        fs::write(&feed_path, FEED).unwrap();
        fx.importer.sync_file(&feed_path).await.unwrap();

        assert!(scratch.exists());
        assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn overview_lists_candidates_with_run_messages() {
        let mut fx = fixture(HookSet::new());
        let feed_path = fx.import_dir.join("export.xml");
        fs::write(&feed_path, FEED).unwrap();

        let before = fx.importer.overview().await.unwrap();
        assert_eq!(before.files.len(), 1);
        assert!(before.files[0].status.is_none());
        assert!(before.messages.is_empty());

        fx.importer.sync_file(&feed_path).await.unwrap();

        let after = fx.importer.overview().await.unwrap();
        assert_eq!(after.files[0].status, Some(SyncStatus::Success));
        assert_eq!(after.files[0].synced_by.as_deref(), Some("admin"));
        assert!(!after.messages.is_empty());
    }
}
