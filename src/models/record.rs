//! Transient per-listing record accumulator and destination schemas.
//!
//! During a run, each source listing produces one listing draft and one
//! contact-person draft. Drafts carry OpenImmo control keys (`ANBIETER`,
//! `AKTIONART`, `AUFTRAGSART`) which are stripped before persistence.
//! Destination attributes are validated against a declared [`AttributeSchema`]
//! when the mapping configuration is loaded, so unknown attributes never
//! reach a draft.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Dynamic attribute map persisted with listings and contact persons.
pub type Fields = BTreeMap<String, String>;

/// Transient control key: provider number of the record.
pub const PROVIDER_KEY: &str = "ANBIETER";
/// Transient control key: OpenImmo action code.
pub const ACTION_KEY: &str = "AKTIONART";
/// Transient control key: OpenImmo order kind.
pub const ORDER_KEY: &str = "AUFTRAGSART";

/// Destination record kind of a mapping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    RealEstate,
    ContactPerson,
}

/// Per-record action requested by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCode {
    /// Create or update (OpenImmo `CHANGE` or anything unrecognized).
    Change,
    Delete,
    /// Import as a reference listing.
    Reference,
}

impl ActionCode {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("DELETE") => Self::Delete,
            Some("REFERENZ") => Self::Reference,
            _ => Self::Change,
        }
    }
}

/// Key→value accumulator for one record of one source listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordDraft {
    values: Fields,
}

impl RecordDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, attribute: &str, value: impl Into<String>) {
        self.values.insert(attribute.to_string(), value.into());
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.values.get(attribute).map(String::as_str)
    }

    pub fn remove(&mut self, attribute: &str) -> Option<String> {
        self.values.remove(attribute)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Truthiness of a stored flag: present, non-empty, and not `"0"`.
    pub fn is_truthy(&self, attribute: &str) -> bool {
        matches!(self.get(attribute), Some(v) if !v.is_empty() && v != "0")
    }

    pub fn action(&self) -> ActionCode {
        ActionCode::parse(self.get(ACTION_KEY))
    }

    pub fn provider_value(&self) -> Option<&str> {
        self.get(PROVIDER_KEY)
    }

    /// Strip control keys, rewriting the provider number under its
    /// persisted field name.
    pub fn strip_control_keys(&mut self) {
        if let Some(provider) = self.values.remove(PROVIDER_KEY) {
            self.values.insert("anbieternr".to_string(), provider);
        }
        self.values.remove(ACTION_KEY);
        self.values.remove(ORDER_KEY);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    pub fn into_fields(self) -> Fields {
        self.values
    }

    pub fn fields(&self) -> &Fields {
        &self.values
    }
}

/// Declared destination attributes for one record kind, with optional
/// defaults applied when a mapping rule accumulates no values.
#[derive(Debug, Clone, Default)]
pub struct AttributeSchema {
    attributes: BTreeMap<String, Option<String>>,
}

impl AttributeSchema {
    pub fn new(attributes: BTreeMap<String, Option<String>>) -> Self {
        Self { attributes }
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    pub fn default_for(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute)?.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Attribute schemas for both destination kinds.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    pub real_estate: AttributeSchema,
    pub contact_person: AttributeSchema,
}

impl SchemaSet {
    pub fn for_kind(&self, kind: RecordKind) -> &AttributeSchema {
        match kind {
            RecordKind::RealEstate => &self.real_estate,
            RecordKind::ContactPerson => &self.contact_person,
        }
    }
}
