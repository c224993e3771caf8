//! Operator-authored interface configuration and mapping rules.
//!
//! An interface describes one feed source; its mapping table drives the
//! record builder. The TOML form is validated into typed structures at load
//! time: selectors are parsed into an AST, destination attributes are
//! checked against the declared schemas, and the rule list is ordered so
//! that asset-saving rules run first.

pub mod selector;
pub mod transform;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::ImportError;
use crate::models::record::{AttributeSchema, RecordKind, SchemaSet};
use selector::FieldSelector;
use transform::{TextTransform, Transform};

/// How records of foreign providers are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThirdPartyPolicy {
    /// Only records of the interface's own provider are imported.
    #[default]
    Own,
    /// Third-party records are imported when their provider is known.
    Import,
    /// Third-party records are assigned to predefined contact persons.
    Assign,
}

/// Contact-person reconciliation actions the interface allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactAction {
    Create,
    Update,
}

/// Contact-person uniqueness strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactUniqueness {
    /// Compound match on the `name` and `vorname` fields.
    NameFirstname,
    /// Match on a single configured field.
    Field(String),
}

/// Predefined contact persons for assign-mode imports, by marketing kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignedContacts {
    pub sale: Option<i64>,
    pub rent: Option<i64>,
    pub heritable_lease: Option<i64>,
    pub leasing: Option<i64>,
}

/// Validated configuration of one feed source.
#[derive(Debug, Clone)]
pub struct InterfaceConfig {
    pub id: i64,
    /// Own OpenImmo provider number.
    pub provider_number: String,
    /// Store id of the own provider.
    pub provider_id: i64,
    /// Listing attribute used as the unique record key.
    pub unique_field: String,
    /// Element name under the provider node carrying the provider number.
    pub unique_provider_field: String,
    pub third_party: ThirdPartyPolicy,
    pub allow_contact_create: bool,
    pub allow_contact_update: bool,
    pub contact_unique: ContactUniqueness,
    pub assign_contacts: AssignedContacts,
    pub dont_publish: bool,
    /// Destination attributes whose empty accumulation skips the listing.
    pub skip_fields: Vec<String>,
    pub import_dir: PathBuf,
    pub media_dir: PathBuf,
    pub contact_media_dir: Option<PathBuf>,
}

/// Condition guarding a mapping rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: FieldSelector,
    /// Expected value; `|` separates accepted alternatives.
    pub expected: String,
}

impl Condition {
    /// A missing resolved value never matches.
    pub fn matches(&self, resolved: Option<&str>) -> bool {
        match resolved {
            Some(value) => self.expected.split('|').any(|alt| alt == value),
            None => false,
        }
    }
}

/// One validated mapping rule.
#[derive(Debug, Clone)]
pub struct MappingRule {
    /// Group selector relative to the listing node, `/`-separated.
    pub group: String,
    pub field: FieldSelector,
    pub kind: RecordKind,
    pub attribute: String,
    pub condition: Option<Condition>,
    /// Value forced onto the attribute when the condition fails.
    pub force_value: Option<String>,
    pub transform: Transform,
    /// The resolved value names a staged media file.
    pub save_asset: bool,
    /// Serialize multi-valued accumulation as a JSON list.
    pub serialize: bool,
}

/// A fully loaded and validated interface definition.
#[derive(Debug, Clone)]
pub struct InterfaceDefinition {
    pub config: InterfaceConfig,
    pub mappings: Vec<MappingRule>,
    pub schemas: SchemaSet,
}

// -- Raw TOML form --

#[derive(Debug, Deserialize)]
struct RawDefinition {
    interface: RawInterface,
    #[serde(default)]
    schema: RawSchemas,
    #[serde(default, rename = "mapping")]
    mappings: Vec<RawMapping>,
}

#[derive(Debug, Deserialize)]
struct RawInterface {
    id: i64,
    provider_number: String,
    provider_id: i64,
    unique_field: String,
    #[serde(default = "default_provider_field")]
    unique_provider_field: String,
    #[serde(default)]
    third_party: ThirdPartyPolicy,
    #[serde(default)]
    contact_actions: Vec<ContactAction>,
    #[serde(default = "default_contact_unique_field")]
    contact_unique_field: String,
    #[serde(default)]
    assign_contacts: AssignedContacts,
    #[serde(default)]
    dont_publish: bool,
    #[serde(default)]
    skip_fields: Vec<String>,
    import_dir: PathBuf,
    media_dir: PathBuf,
    #[serde(default)]
    contact_media_dir: Option<PathBuf>,
}

fn default_provider_field() -> String {
    "anbieternr".to_string()
}

fn default_contact_unique_field() -> String {
    "name_vorname".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct RawSchemas {
    #[serde(default)]
    real_estate: BTreeMap<String, RawSchemaAttribute>,
    #[serde(default)]
    contact_person: BTreeMap<String, RawSchemaAttribute>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSchemaAttribute {
    #[serde(default)]
    default: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawTransformKind {
    #[default]
    None,
    Number,
    Date,
    Text,
    Boolean,
}

#[derive(Debug, Deserialize)]
struct RawMapping {
    group: String,
    field: String,
    kind: RecordKind,
    attribute: String,
    #[serde(default)]
    condition_field: Option<String>,
    #[serde(default)]
    condition_value: Option<String>,
    #[serde(default)]
    force_value: Option<String>,
    #[serde(default)]
    transform: RawTransformKind,
    #[serde(default)]
    decimals: u8,
    #[serde(default)]
    text_transform: Option<TextTransform>,
    #[serde(default)]
    trim: bool,
    #[serde(default)]
    boolean_compare: Option<String>,
    #[serde(default)]
    save_asset: bool,
    #[serde(default)]
    serialize: bool,
}

impl InterfaceDefinition {
    /// Load and validate an interface definition from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ImportError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate the TOML form.
    pub fn from_toml_str(raw: &str) -> Result<Self, ImportError> {
        let raw: RawDefinition = toml::from_str(raw)
            .map_err(|e| ImportError::Configuration(format!("invalid interface TOML: {e}")))?;
        build_definition(raw)
    }
}

fn build_definition(raw: RawDefinition) -> Result<InterfaceDefinition, ImportError> {
    let schemas = SchemaSet {
        real_estate: build_schema(raw.schema.real_estate),
        contact_person: build_schema(raw.schema.contact_person),
    };

    if raw.mappings.is_empty() {
        return Err(ImportError::Configuration(
            "interface has no mapping rules".to_string(),
        ));
    }

    let mut mappings = Vec::with_capacity(raw.mappings.len());
    for raw_rule in raw.mappings {
        mappings.push(build_rule(raw_rule, &schemas)?);
    }

    // Asset-saving rules run first so later rules can rely on the
    // accumulated asset references.
    mappings.sort_by_key(|rule| !rule.save_asset);

    let config = build_config(raw.interface)?;

    let has_unique_mapping = mappings
        .iter()
        .any(|m| m.kind == RecordKind::RealEstate && m.attribute == config.unique_field);
    if !has_unique_mapping {
        return Err(ImportError::Configuration(format!(
            "no mapping rule targets the unique field '{}'",
            config.unique_field
        )));
    }

    Ok(InterfaceDefinition {
        config,
        mappings,
        schemas,
    })
}

fn build_schema(raw: BTreeMap<String, RawSchemaAttribute>) -> AttributeSchema {
    AttributeSchema::new(
        raw.into_iter()
            .map(|(name, attr)| (name, attr.default))
            .collect(),
    )
}

fn build_config(raw: RawInterface) -> Result<InterfaceConfig, ImportError> {
    let contact_unique = if raw.contact_unique_field == "name_vorname" {
        ContactUniqueness::NameFirstname
    } else {
        ContactUniqueness::Field(raw.contact_unique_field)
    };

    Ok(InterfaceConfig {
        id: raw.id,
        provider_number: raw.provider_number,
        provider_id: raw.provider_id,
        unique_field: raw.unique_field,
        unique_provider_field: raw.unique_provider_field,
        third_party: raw.third_party,
        allow_contact_create: raw.contact_actions.contains(&ContactAction::Create),
        allow_contact_update: raw.contact_actions.contains(&ContactAction::Update),
        contact_unique,
        assign_contacts: raw.assign_contacts,
        dont_publish: raw.dont_publish,
        skip_fields: raw.skip_fields,
        import_dir: raw.import_dir,
        media_dir: raw.media_dir,
        contact_media_dir: raw.contact_media_dir,
    })
}

fn build_rule(raw: RawMapping, schemas: &SchemaSet) -> Result<MappingRule, ImportError> {
    let schema = schemas.for_kind(raw.kind);
    if !schema.is_empty() && !schema.contains(&raw.attribute) {
        return Err(ImportError::Configuration(format!(
            "mapping rule targets unknown attribute '{}'",
            raw.attribute
        )));
    }

    let field = FieldSelector::parse(&raw.field)?;

    let condition = match (raw.condition_field, raw.condition_value) {
        (Some(field), Some(expected)) => Some(Condition {
            field: FieldSelector::parse(&field)?,
            expected,
        }),
        (None, None) => None,
        _ => {
            return Err(ImportError::Configuration(format!(
                "mapping rule for '{}' has an incomplete condition",
                raw.attribute
            )))
        }
    };

    if raw.force_value.is_some() && condition.is_none() {
        return Err(ImportError::Configuration(format!(
            "mapping rule for '{}' has a force value but no condition",
            raw.attribute
        )));
    }

    let transform = match raw.transform {
        RawTransformKind::None => Transform::None,
        RawTransformKind::Number => Transform::Number {
            decimals: raw.decimals,
        },
        RawTransformKind::Date => Transform::Date,
        RawTransformKind::Text => Transform::Text {
            transform: raw.text_transform,
            trim: raw.trim,
        },
        RawTransformKind::Boolean => Transform::Boolean {
            compare: raw.boolean_compare,
        },
    };

    Ok(MappingRule {
        group: raw.group,
        field,
        kind: raw.kind,
        attribute: raw.attribute,
        condition,
        force_value: raw.force_value,
        transform,
        save_asset: raw.save_asset,
        serialize: raw.serialize,
    })
}
