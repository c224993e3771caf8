//! Reconciliation of built record batches against the persisted catalog.
//!
//! Per index the contact person is resolved or reconciled first, then the
//! listing is created, updated, or deleted according to its action code.

use chrono::Utc;

use crate::errors::ImportError;
use crate::hooks::{AssignContactArgs, DeleteArgs, HookSet, ImportArgs};
use crate::mapping::{ContactUniqueness, InterfaceConfig, ThirdPartyPolicy};
use crate::models::contact_person::{ContactPerson, NewContactPerson};
use crate::models::provider::Provider;
use crate::models::real_estate::{NewRealEstate, RealEstate};
use crate::models::record::{ActionCode, RecordDraft};
use crate::services::run_log::RunLog;
use crate::store::RecordStore;

/// Counters for one reconciliation pass.
#[derive(Debug, Default)]
pub struct CatalogSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    /// The run must be reported as partially imported.
    pub partial: bool,
}

pub struct CatalogWriter<'a> {
    store: &'a dyn RecordStore,
    config: &'a InterfaceConfig,
    hooks: &'a HookSet,
    log: &'a RunLog,
}

impl<'a> CatalogWriter<'a> {
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

    /// Apply the index-aligned batches to the store.
    pub async fn apply(
        &self,
        contact_persons: Vec<RecordDraft>,
        real_estates: Vec<RecordDraft>,
    ) -> Result<CatalogSummary, ImportError> {
        let own_provider = self.store.find_provider(self.config.provider_id).await?;
        let mut summary = CatalogSummary::default();

        for (contact, estate) in contact_persons.into_iter().zip(real_estates) {
            self.apply_record(contact, estate, own_provider.as_ref(), &mut summary)
                .await?;
        }

        Ok(summary)
    }

    async fn apply_record(
        &self,
        contact: RecordDraft,
        mut estate: RecordDraft,
        own_provider: Option<&Provider>,
        summary: &mut CatalogSummary,
    ) -> Result<(), ImportError> {
        let action = estate.action();
        let is_foreign = estate.provider_value() != Some(self.config.provider_number.as_str());

        let mut provider = own_provider.cloned();
        let mut contact_person: Option<ContactPerson> = None;

        if self.config.third_party == ThirdPartyPolicy::Assign && is_foreign {
            contact_person = self.assigned_contact(&estate).await?;
        } else {
            if self.config.third_party == ThirdPartyPolicy::Import {
                provider = self
                    .store
                    .find_provider_by_number(estate.provider_value().unwrap_or_default())
                    .await?;
            }

            if action != ActionCode::Delete {
                let mut args = AssignContactArgs {
                    provider: provider.as_ref(),
                    contact: &contact,
                    estate: &estate,
                    allow_create: self.config.allow_contact_create,
                    allow_update: self.config.allow_contact_update,
                    skip_record: false,
                    skip_contact_person: false,
                };
                let hook_contact = self.hooks.run_assign_contact(&mut args);

                if args.skip_record {
                    self.log
                        .info("Listing skipped by an assign-contact extension.");
                    summary.skipped += 1;
                    summary.partial = true;
                    return Ok(());
                }

                if args.skip_contact_person {
                    contact_person = hook_contact;
                } else {
                    match self.reconcile_contact(&contact, provider.as_ref()).await? {
                        Some(person) => contact_person = Some(person),
                        None => {
                            self.log.info(format!(
                                "Skipping listing '{}': no contact person was assigned or created.",
                                estate.get(&self.config.unique_field).unwrap_or("?")
                            ));
                            summary.skipped += 1;
                            summary.partial = true;
                            return Ok(());
                        }
                    }
                }
            }
        }

        let Some(unique_value) = estate.get(&self.config.unique_field).map(str::to_string)
        else {
            self.log
                .info("Skipping listing without a unique record value.");
            summary.skipped += 1;
            summary.partial = true;
            return Ok(());
        };

        let existing = self
            .store
            .find_real_estate(&self.config.unique_field, &unique_value)
            .await?;

        if action == ActionCode::Delete {
            let Some(found) = existing else {
                // Nothing to delete.
                return Ok(());
            };
            let mut args = DeleteArgs {
                estate: &found,
                provider: provider.as_ref(),
                prevent_delete: false,
            };
            self.hooks.run_before_delete(&mut args);
            if args.prevent_delete {
                self.log.info(format!(
                    "Deletion of listing '{unique_value}' prevented by an extension."
                ));
                return Ok(());
            }

            self.delete_listing_assets(&estate, provider.as_ref(), &unique_value)
                .await?;
            self.store.delete_real_estate(found.id).await?;
            self.log.info(format!("Listing '{unique_value}' deleted."));
            summary.deleted += 1;
            return Ok(());
        }

        estate.strip_control_keys();
        let now = Utc::now();

        let (mut record, is_new) = match existing {
            Some(found) => {
                self.log.info(format!("Listing '{unique_value}' updated."));
                (found, false)
            }
            None => {
                self.log.info(format!("Listing '{unique_value}' added."));
                let record = RealEstate {
                    id: 0,
                    provider_id: self.config.provider_id,
                    contact_person_id: None,
                    published: !self.config.dont_publish,
                    referenz: false,
                    date_added: now,
                    modified_at: now,
                    fields: Default::default(),
                };
                (record, true)
            }
        };

        if action == ActionCode::Reference {
            record.referenz = true;
        }
        for (key, value) in estate.iter() {
            record.fields.insert(key.clone(), value.clone());
        }
        if let Some(provider) = &provider {
            record.provider_id = provider.id;
        }
        record.contact_person_id = contact_person.map(|c| c.id);
        record.modified_at = now;

        let mut args = ImportArgs {
            estate: &mut record,
            is_new,
        };
        self.hooks.run_before_import(&mut args);

        if is_new {
            self.store
                .create_real_estate(NewRealEstate {
                    provider_id: record.provider_id,
                    contact_person_id: record.contact_person_id,
                    published: record.published,
                    referenz: record.referenz,
                    date_added: record.date_added,
                    modified_at: record.modified_at,
                    fields: record.fields,
                })
                .await?;
            summary.created += 1;
        } else {
            self.store.update_real_estate(&record).await?;
            summary.updated += 1;
        }

        Ok(())
    }

    /// Reconcile the contact draft against the store, honoring the allowed
    /// actions. `None` means the listing must be skipped.
    async fn reconcile_contact(
        &self,
        contact: &RecordDraft,
        provider: Option<&Provider>,
    ) -> Result<Option<ContactPerson>, ImportError> {
        let Some(provider) = provider else {
            return Ok(None);
        };

        let predicate = contact_predicate(contact, &self.config.contact_unique);
        let exists = self
            .store
            .count_contact_persons(provider.id, &predicate)
            .await?
            > 0;

        if !exists && !self.config.allow_contact_create {
            return Ok(None);
        }

        let mut person = if exists {
            match self
                .store
                .find_contact_person(provider.id, &predicate)
                .await?
            {
                Some(person) => person,
                None => return Ok(None),
            }
        } else {
            let created = self
                .store
                .create_contact_person(NewContactPerson {
                    provider_id: provider.id,
                    published: true,
                    fields: contact.clone().into_fields(),
                })
                .await?;
            self.log.info(format!(
                "New contact person '{} {}' added.",
                created.fields.get("vorname").map(String::as_str).unwrap_or(""),
                created.fields.get("name").map(String::as_str).unwrap_or("")
            ));
            created
        };

        if self.config.allow_contact_update {
            for (key, value) in contact.iter() {
                person.fields.insert(key.clone(), value.clone());
            }
            self.store.update_contact_person(&person).await?;
        }

        Ok(Some(person))
    }

    /// Look up the predefined contact person for the first truthy
    /// marketing-kind flag.
    async fn assigned_contact(
        &self,
        estate: &RecordDraft,
    ) -> Result<Option<ContactPerson>, ImportError> {
        let assignments = [
            ("vermarktungsartKauf", self.config.assign_contacts.sale),
            ("vermarktungsartMietePacht", self.config.assign_contacts.rent),
            (
                "vermarktungsartErbpacht",
                self.config.assign_contacts.heritable_lease,
            ),
            ("vermarktungsartLeasing", self.config.assign_contacts.leasing),
        ];
        for (flag, assigned) in assignments {
            if estate.is_truthy(flag) {
                let person = match assigned {
                    Some(id) => self.store.find_contact_person_by_id(id).await?,
                    None => None,
                };
                return Ok(person);
            }
        }
        Ok(None)
    }

    /// Remove the deleted listing's asset directory from store and disk.
    async fn delete_listing_assets(
        &self,
        estate: &RecordDraft,
        provider: Option<&Provider>,
        unique_value: &str,
    ) -> Result<(), ImportError> {
        let provider_number = provider
            .map(|p| p.anbieternr.as_str())
            .or_else(|| estate.provider_value())
            .unwrap_or(&self.config.provider_number);

        let dir = self.config.media_dir.join(provider_number).join(unique_value);
        let prefix = format!("{}/", dir.to_string_lossy());
        self.store.delete_assets_below(&prefix).await?;

        if dir.exists() {
            if let Err(error) = std::fs::remove_dir_all(&dir) {
                tracing::debug!(%error, "could not remove asset directory");
            }
        }
        Ok(())
    }
}

fn contact_predicate(
    contact: &RecordDraft,
    uniqueness: &ContactUniqueness,
) -> Vec<(String, String)> {
    match uniqueness {
        ContactUniqueness::NameFirstname => vec![
            (
                "name".to_string(),
                contact.get("name").unwrap_or_default().to_string(),
            ),
            (
                "vorname".to_string(),
                contact.get("vorname").unwrap_or_default().to_string(),
            ),
        ],
        ContactUniqueness::Field(field) => vec![(
            field.clone(),
            contact.get(field).unwrap_or_default().to_string(),
        )],
    }
}
