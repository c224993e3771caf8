//! Typed extension points fired at fixed pipeline stages.
//!
//! Callbacks are injected at construction instead of being discovered in a
//! global registry. Multiple callbacks for the same point run in
//! registration order, each seeing the mutations of the previous one.

use std::path::Path;

use crate::mapping::InterfaceConfig;
use crate::models::contact_person::ContactPerson;
use crate::models::provider::Provider;
use crate::models::real_estate::RealEstate;
use crate::models::record::{RecordDraft, RecordKind};
use crate::parsers::XmlElement;

/// Run-level context before a sync starts.
pub struct SyncArgs<'a> {
    pub config: &'a InterfaceConfig,
    pub sync_file: &'a Path,
    /// Clear to keep the interface's `lastSync` untouched for this run.
    pub update_sync_time: bool,
}

/// Context before the feed document is loaded.
pub struct LoadArgs<'a> {
    pub config: &'a InterfaceConfig,
    pub sync_file: &'a Path,
    /// Set to abort the whole load.
    pub skip: bool,
}

/// Per-listing context before mapping rules are applied.
pub struct PrepareRecordArgs<'a> {
    pub listing: &'a XmlElement,
    pub estate: &'a mut RecordDraft,
    pub contact: &'a mut RecordDraft,
    /// Set to skip this listing.
    pub skip: bool,
}

/// Per-asset context before a staged media file is saved.
pub struct SaveAssetArgs<'a> {
    pub kind: RecordKind,
    pub group: &'a XmlElement,
    /// Staged file name; may be rewritten.
    pub file_name: String,
    /// Values accumulated so far for the current rule.
    pub values: &'a mut Vec<String>,
    /// Set to skip this asset.
    pub skip: bool,
}

/// Per-record context when a contact person is assigned.
pub struct AssignContactArgs<'a> {
    pub provider: Option<&'a Provider>,
    pub contact: &'a RecordDraft,
    pub estate: &'a RecordDraft,
    pub allow_create: bool,
    pub allow_update: bool,
    /// Set to abandon the whole listing.
    pub skip_record: bool,
    /// Set to proceed without touching contact-person data.
    pub skip_contact_person: bool,
}

/// Context before an existing listing is deleted.
pub struct DeleteArgs<'a> {
    pub estate: &'a RealEstate,
    pub provider: Option<&'a Provider>,
    /// Set to keep the listing.
    pub prevent_delete: bool,
}

/// Context just before a listing is persisted.
pub struct ImportArgs<'a> {
    pub estate: &'a mut RealEstate,
    pub is_new: bool,
}

pub trait BeforeSyncHook: Send + Sync {
    fn before_sync(&self, args: &mut SyncArgs<'_>);
}

pub trait BeforeLoadHook: Send + Sync {
    fn before_load(&self, args: &mut LoadArgs<'_>);
}

pub trait PrepareRecordHook: Send + Sync {
    fn prepare_record(&self, args: &mut PrepareRecordArgs<'_>);
}

pub trait SaveAssetHook: Send + Sync {
    fn save_asset(&self, args: &mut SaveAssetArgs<'_>);
}

pub trait AssignContactHook: Send + Sync {
    /// Return the contact person to use, or `None` for "no contact person".
    fn assign_contact(&self, args: &mut AssignContactArgs<'_>) -> Option<ContactPerson>;
}

pub trait BeforeDeleteHook: Send + Sync {
    fn before_delete(&self, args: &mut DeleteArgs<'_>);
}

pub trait BeforeImportHook: Send + Sync {
    fn before_import(&self, args: &mut ImportArgs<'_>);
}

/// Ordered callback lists for all seven extension points.
#[derive(Default)]
pub struct HookSet {
    before_sync: Vec<Box<dyn BeforeSyncHook>>,
    before_load: Vec<Box<dyn BeforeLoadHook>>,
    prepare_record: Vec<Box<dyn PrepareRecordHook>>,
    save_asset: Vec<Box<dyn SaveAssetHook>>,
    assign_contact: Vec<Box<dyn AssignContactHook>>,
    before_delete: Vec<Box<dyn BeforeDeleteHook>>,
    before_import: Vec<Box<dyn BeforeImportHook>>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before_sync(mut self, hook: impl BeforeSyncHook + 'static) -> Self {
        self.before_sync.push(Box::new(hook));
        self
    }

    pub fn on_before_load(mut self, hook: impl BeforeLoadHook + 'static) -> Self {
        self.before_load.push(Box::new(hook));
        self
    }

    pub fn on_prepare_record(mut self, hook: impl PrepareRecordHook + 'static) -> Self {
        self.prepare_record.push(Box::new(hook));
        self
    }

    pub fn on_save_asset(mut self, hook: impl SaveAssetHook + 'static) -> Self {
        self.save_asset.push(Box::new(hook));
        self
    }

    pub fn on_assign_contact(mut self, hook: impl AssignContactHook + 'static) -> Self {
        self.assign_contact.push(Box::new(hook));
        self
    }

    pub fn on_before_delete(mut self, hook: impl BeforeDeleteHook + 'static) -> Self {
        self.before_delete.push(Box::new(hook));
        self
    }

    pub fn on_before_import(mut self, hook: impl BeforeImportHook + 'static) -> Self {
        self.before_import.push(Box::new(hook));
        self
    }

    pub(crate) fn run_before_sync(&self, args: &mut SyncArgs<'_>) {
        for hook in &self.before_sync {
            hook.before_sync(args);
        }
    }

    pub(crate) fn run_before_load(&self, args: &mut LoadArgs<'_>) {
        for hook in &self.before_load {
            hook.before_load(args);
        }
    }

    pub(crate) fn run_prepare_record(&self, args: &mut PrepareRecordArgs<'_>) {
        for hook in &self.prepare_record {
            hook.prepare_record(args);
        }
    }

    pub(crate) fn run_save_asset(&self, args: &mut SaveAssetArgs<'_>) {
        for hook in &self.save_asset {
            hook.save_asset(args);
        }
    }

    /// The last registered callback's result wins; with no callbacks the
    /// well-defined "no contact person" sentinel is returned.
    pub(crate) fn run_assign_contact(
        &self,
        args: &mut AssignContactArgs<'_>,
    ) -> Option<ContactPerson> {
        let mut result = None;
        for hook in &self.assign_contact {
            result = hook.assign_contact(args);
        }
        result
    }

    pub(crate) fn run_before_delete(&self, args: &mut DeleteArgs<'_>) {
        for hook in &self.before_delete {
            hook.before_delete(args);
        }
    }

    pub(crate) fn run_before_import(&self, args: &mut ImportArgs<'_>) {
        for hook in &self.before_import {
            hook.before_import(args);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::RecordDraft;

    struct TagHook(&'static str);

    impl PrepareRecordHook for TagHook {
        fn prepare_record(&self, args: &mut PrepareRecordArgs<'_>) {
            let previous = args.estate.get("tags").unwrap_or_default().to_string();
            args.estate.set("tags", format!("{previous}{}", self.0));
        }
    }

    struct SkipHook;

    impl PrepareRecordHook for SkipHook {
        fn prepare_record(&self, args: &mut PrepareRecordArgs<'_>) {
            args.skip = true;
        }
    }

    #[test]
    fn hooks_run_in_registration_order_and_see_mutations() {
        let hooks = HookSet::new()
            .on_prepare_record(TagHook("a"))
            .on_prepare_record(TagHook("b"));

        let listing = XmlElement::parse(b"<immobilie/>").unwrap();
        let mut estate = RecordDraft::new();
        let mut contact = RecordDraft::new();
        let mut args = PrepareRecordArgs {
            listing: &listing,
            estate: &mut estate,
            contact: &mut contact,
            skip: false,
        };
        hooks.run_prepare_record(&mut args);
        assert!(!args.skip);
        assert_eq!(estate.get("tags"), Some("ab"));
    }

    #[test]
    fn skip_flag_is_visible_after_dispatch() {
        let hooks = HookSet::new().on_prepare_record(SkipHook);
        let listing = XmlElement::parse(b"<immobilie/>").unwrap();
        let mut estate = RecordDraft::new();
        let mut contact = RecordDraft::new();
        let mut args = PrepareRecordArgs {
            listing: &listing,
            estate: &mut estate,
            contact: &mut contact,
            skip: false,
        };
        hooks.run_prepare_record(&mut args);
        assert!(args.skip);
    }

    struct FixedContact(i64);

    impl AssignContactHook for FixedContact {
        fn assign_contact(&self, _args: &mut AssignContactArgs<'_>) -> Option<ContactPerson> {
            Some(ContactPerson {
                id: self.0,
                provider_id: 1,
                published: true,
                fields: Default::default(),
            })
        }
    }

    #[test]
    fn assign_contact_defaults_to_no_contact() {
        let hooks = HookSet::new();
        let contact = RecordDraft::new();
        let estate = RecordDraft::new();
        let mut args = AssignContactArgs {
            provider: None,
            contact: &contact,
            estate: &estate,
            allow_create: true,
            allow_update: true,
            skip_record: false,
            skip_contact_person: false,
        };
        assert!(hooks.run_assign_contact(&mut args).is_none());
    }

    #[test]
    fn assign_contact_last_callback_wins() {
        let hooks = HookSet::new()
            .on_assign_contact(FixedContact(1))
            .on_assign_contact(FixedContact(2));
        let contact = RecordDraft::new();
        let estate = RecordDraft::new();
        let mut args = AssignContactArgs {
            provider: None,
            contact: &contact,
            estate: &estate,
            allow_create: true,
            allow_update: true,
            skip_record: false,
            skip_contact_person: false,
        };
        let assigned = hooks.run_assign_contact(&mut args).unwrap();
        assert_eq!(assigned.id, 2);
    }
}
