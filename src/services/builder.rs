//! Record assembly: walk providers and listings, apply mapping rules, and
//! produce the index-aligned contact-person and listing draft batches.

use crate::errors::ImportError;
use crate::hooks::{HookSet, PrepareRecordArgs};
use crate::mapping::{InterfaceDefinition, MappingRule, ThirdPartyPolicy};
use crate::models::record::{ActionCode, RecordDraft, RecordKind, ACTION_KEY, PROVIDER_KEY};
use crate::parsers::resolver;
use crate::parsers::XmlElement;
use crate::services::assets::AssetManager;
use crate::services::run_log::RunLog;
use crate::store::RecordStore;

/// Draft batches produced from one feed document.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub contact_persons: Vec<RecordDraft>,
    pub real_estates: Vec<RecordDraft>,
    /// The run must be reported as partially imported.
    pub partial: bool,
}

enum ListingResult {
    Built(RecordDraft, RecordDraft),
    Skipped,
}

pub struct RecordBuilder<'a> {
    store: &'a dyn RecordStore,
    definition: &'a InterfaceDefinition,
    hooks: &'a HookSet,
    assets: AssetManager<'a>,
    log: &'a RunLog,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        definition: &'a InterfaceDefinition,
        hooks: &'a HookSet,
        log: &'a RunLog,
    ) -> Self {
        Self {
            store,
            definition,
            hooks,
            assets: AssetManager::new(store, &definition.config, hooks, log),
            log,
        }
    }

    /// Walk the document and build the record batches.
    pub async fn build(&self, document: &XmlElement) -> Result<BuildOutcome, ImportError> {
        let config = &self.definition.config;
        let providers = document.find_all("anbieter");
        if providers.is_empty() {
            return Err(ImportError::Feed("no provider data available".to_string()));
        }

        let mut outcome = BuildOutcome::default();

        for provider in providers {
            let provider_value = provider
                .child_text(&config.unique_provider_field)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| config.provider_number.clone());

            match config.third_party {
                ThirdPartyPolicy::Own if provider_value != config.provider_number => {
                    self.log.info("Skipping listings of a foreign provider.");
                    continue;
                }
                ThirdPartyPolicy::Import => {
                    if self
                        .store
                        .find_provider_by_number(&provider_value)
                        .await?
                        .is_none()
                    {
                        self.log.info(format!(
                            "Provider '{provider_value}' is unknown; its listings were not imported."
                        ));
                        outcome.partial = true;
                        continue;
                    }
                }
                _ => {}
            }

            for listing in provider.find_all("immobilie") {
                match self.build_listing(listing, &provider_value).await? {
                    ListingResult::Built(contact, estate) => {
                        outcome.contact_persons.push(contact);
                        outcome.real_estates.push(estate);
                    }
                    ListingResult::Skipped => outcome.partial = true,
                }
            }
        }

        Ok(outcome)
    }

    async fn build_listing(
        &self,
        listing: &XmlElement,
        provider_value: &str,
    ) -> Result<ListingResult, ImportError> {
        let config = &self.definition.config;

        let mut estate = RecordDraft::new();
        let mut contact = RecordDraft::new();
        estate.set(PROVIDER_KEY, provider_value);
        if let Some(action) = listing
            .first("verwaltung_techn/aktion")
            .and_then(|node| node.attr("aktionart"))
        {
            estate.set(ACTION_KEY, action);
        }

        let mut args = PrepareRecordArgs {
            listing,
            estate: &mut estate,
            contact: &mut contact,
            skip: false,
        };
        self.hooks.run_prepare_record(&mut args);
        if args.skip {
            self.log.info("Listing skipped by a prepare-record extension.");
            return Ok(ListingResult::Skipped);
        }

        let unique_value = self.unique_value(listing);
        self.log.info(format!(
            "Importing listing '{}'.",
            unique_value.as_deref().unwrap_or("?")
        ));

        for rule in &self.definition.mappings {
            let applied = self
                .apply_rule(
                    rule,
                    listing,
                    &mut contact,
                    &mut estate,
                    provider_value,
                    unique_value.as_deref(),
                )
                .await?;
            if !applied {
                self.log.info(format!(
                    "Skipping listing '{}': required field '{}' is empty.",
                    unique_value.as_deref().unwrap_or("?"),
                    rule.attribute
                ));
                return Ok(ListingResult::Skipped);
            }
        }

        Ok(ListingResult::Built(contact, estate))
    }

    /// Apply one rule to one listing. Returns `false` when a configured
    /// skip-field stayed empty, which aborts the whole listing.
    async fn apply_rule(
        &self,
        rule: &MappingRule,
        listing: &XmlElement,
        contact: &mut RecordDraft,
        estate: &mut RecordDraft,
        provider_value: &str,
        unique_value: Option<&str>,
    ) -> Result<bool, ImportError> {
        let config = &self.definition.config;
        let action = estate.action();
        let mut values: Vec<String> = Vec::new();

        for group in listing.find_all(&rule.group) {
            if let Some(condition) = &rule.condition {
                let condition_value = resolver::resolve(group, &condition.field);
                if !condition.matches(condition_value.as_deref()) {
                    if let Some(force) = &rule.force_value {
                        let draft = target(rule.kind, contact, estate);
                        draft.set(&rule.attribute, force.clone());
                    }
                    continue;
                }
            }

            let Some(mut value) = resolver::resolve(group, &rule.field) else {
                continue;
            };

            if rule.save_asset && action != ActionCode::Delete {
                let listing_key = match rule.kind {
                    RecordKind::RealEstate => unique_value,
                    RecordKind::ContactPerson => None,
                };
                match self
                    .assets
                    .resolve(rule, group, &value, provider_value, listing_key, &mut values)
                    .await?
                {
                    Some(asset_ref) => value = asset_ref,
                    None => continue,
                }
            }

            values.push(rule.transform.apply(&value));
        }

        if config.skip_fields.contains(&rule.attribute) {
            let missing = values
                .first()
                .map(|v| v.is_empty() || v == "0")
                .unwrap_or(true);
            if missing {
                return Ok(false);
            }
        }

        if values.is_empty() {
            let schema = self.definition.schemas.for_kind(rule.kind);
            if let Some(default) = schema.default_for(&rule.attribute) {
                let draft = target(rule.kind, contact, estate);
                draft.set(&rule.attribute, default);
            }
            return Ok(true);
        }

        let value = if rule.serialize {
            serde_json::to_string(&values).unwrap_or_default()
        } else {
            values.swap_remove(0)
        };
        let draft = target(rule.kind, contact, estate);
        draft.set(&rule.attribute, value);
        Ok(true)
    }

    /// Resolve the listing's unique value for asset paths and log output.
    fn unique_value(&self, listing: &XmlElement) -> Option<String> {
        let config = &self.definition.config;
        let rule = self
            .definition
            .mappings
            .iter()
            .find(|m| m.kind == RecordKind::RealEstate && m.attribute == config.unique_field)?;
        let group = listing.find_all(&rule.group).into_iter().next()?;
        resolver::resolve(group, &rule.field)
    }
}

fn target<'d>(
    kind: RecordKind,
    contact: &'d mut RecordDraft,
    estate: &'d mut RecordDraft,
) -> &'d mut RecordDraft {
    match kind {
        RecordKind::RealEstate => estate,
        RecordKind::ContactPerson => contact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::PrepareRecordHook;
    use crate::mapping::InterfaceDefinition;
    use crate::store::memory::InMemoryStore;

    const FEED: &[u8] = br#"<openimmo>
        <anbieter>
            <anbieternr>AB123</anbieternr>
            <immobilie>
                <objektkategorie>
                    <nutzungsart WOHNEN="true" GEWERBE="false"/>
                </objektkategorie>
                <geo><plz>50667</plz></geo>
                <preise><kaufpreis>250000.5</kaufpreis></preise>
                <kontaktperson><name>Muster</name><vorname>Max</vorname></kontaktperson>
                <verwaltung_techn>
                    <objektnr_intern>ob-1</objektnr_intern>
                    <aktion aktionart="CHANGE"/>
                </verwaltung_techn>
            </immobilie>
        </anbieter>
        <anbieter>
            <anbieternr>XY999</anbieternr>
            <immobilie>
                <geo><plz>10115</plz></geo>
                <verwaltung_techn>
                    <objektnr_intern>ob-2</objektnr_intern>
                    <aktion aktionart="CHANGE"/>
                </verwaltung_techn>
            </immobilie>
        </anbieter>
    </openimmo>"#;

    fn definition(extra_mapping: &str, third_party: &str) -> InterfaceDefinition {
        let toml = format!(
            r#"
            [interface]
            id = 1
            provider_number = "AB123"
            provider_id = 1
            unique_field = "objektnrIntern"
            third_party = "{third_party}"
            import_dir = "/tmp/feeds"
            media_dir = "/tmp/media"

            [schema.real_estate]
            objektnrIntern = {{}}
            plz = {{}}
            kaufpreis = {{}}
            wohnung = {{}}
            land = {{ default = "DE" }}

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

            [[mapping]]
            group = "geo"
            field = "land"
            kind = "real_estate"
            attribute = "land"
            {extra_mapping}
            "#,
        );
        InterfaceDefinition::from_toml_str(&toml).unwrap()
    }

    async fn build(definition: &InterfaceDefinition, hooks: &HookSet) -> BuildOutcome {
        let store = InMemoryStore::new();
        store.add_provider(1, "AB123", "Alpha");
        let log = RunLog::new();
        let builder = RecordBuilder::new(&store, definition, hooks, &log);
        let document = XmlElement::parse(FEED).unwrap();
        builder.build(&document).await.unwrap()
    }

    #[tokio::test]
    async fn builds_aligned_record_batches() {
        let definition = definition("", "own");
        let hooks = HookSet::new();
        let outcome = build(&definition, &hooks).await;

        assert_eq!(outcome.real_estates.len(), 1);
        assert_eq!(outcome.contact_persons.len(), 1);

        let estate = &outcome.real_estates[0];
        assert_eq!(estate.get("objektnrIntern"), Some("ob-1"));
        assert_eq!(estate.get("plz"), Some("50667"));
        assert_eq!(estate.get(PROVIDER_KEY), Some("AB123"));
        assert_eq!(estate.get(ACTION_KEY), Some("CHANGE"));

        let contact = &outcome.contact_persons[0];
        assert_eq!(contact.get("name"), Some("Muster"));
        assert_eq!(contact.get("vorname"), Some("Max"));
    }

    #[tokio::test]
    async fn foreign_providers_are_skipped_in_own_mode() {
        let definition = definition("", "own");
        let hooks = HookSet::new();
        let outcome = build(&definition, &hooks).await;

        // Only the own provider's listing survives; the skip is silent.
        assert_eq!(outcome.real_estates.len(), 1);
        assert!(!outcome.partial);
    }

    #[tokio::test]
    async fn unknown_provider_in_import_mode_marks_run_partial() {
        let definition = definition("", "import");
        let hooks = HookSet::new();
        let outcome = build(&definition, &hooks).await;

        assert_eq!(outcome.real_estates.len(), 1);
        assert!(outcome.partial);
    }

    #[tokio::test]
    async fn schema_default_applies_when_nothing_accumulates() {
        let definition = definition("", "own");
        let hooks = HookSet::new();
        let outcome = build(&definition, &hooks).await;

        // The feed has no <geo><land> node; the declared default applies.
        assert_eq!(outcome.real_estates[0].get("land"), Some("DE"));
    }

    #[tokio::test]
    async fn failed_condition_without_force_leaves_attribute_untouched() {
        let extra = r#"
            [[mapping]]
            group = "preise"
            field = "kaufpreis"
            kind = "real_estate"
            attribute = "kaufpreis"
            condition_field = "objektkategorie/nutzungsart@GEWERBE"
            condition_value = "true"
        "#;
        let definition = definition(extra, "own");
        let hooks = HookSet::new();
        let outcome = build(&definition, &hooks).await;

        assert_eq!(outcome.real_estates[0].get("kaufpreis"), None);
    }

    #[tokio::test]
    async fn failed_condition_with_force_applies_forced_value() {
        let extra = r#"
            [[mapping]]
            group = "objektkategorie"
            field = "nutzungsart@WOHNEN"
            kind = "real_estate"
            attribute = "wohnung"
            transform = "boolean"
            condition_field = "nutzungsart@GEWERBE"
            condition_value = "true"
            force_value = "0"
        "#;
        let definition = definition(extra, "own");
        let hooks = HookSet::new();
        let outcome = build(&definition, &hooks).await;

        assert_eq!(outcome.real_estates[0].get("wohnung"), Some("0"));
    }

    #[tokio::test]
    async fn passing_condition_applies_resolved_value() {
        let extra = r#"
            [[mapping]]
            group = "objektkategorie"
            field = "nutzungsart@WOHNEN"
            kind = "real_estate"
            attribute = "wohnung"
            transform = "boolean"
            condition_field = "nutzungsart@+"
            condition_value = "WOHNEN|GEWERBE"
        "#;
        let definition = definition(extra, "own");
        let hooks = HookSet::new();
        let outcome = build(&definition, &hooks).await;

        assert_eq!(outcome.real_estates[0].get("wohnung"), Some("1"));
    }

    #[tokio::test]
    async fn number_transform_formats_decimals() {
        let extra = r#"
            [[mapping]]
            group = "preise"
            field = "kaufpreis"
            kind = "real_estate"
            attribute = "kaufpreis"
            transform = "number"
            decimals = 2
        "#;
        let definition = definition(extra, "own");
        let hooks = HookSet::new();
        let outcome = build(&definition, &hooks).await;

        assert_eq!(outcome.real_estates[0].get("kaufpreis"), Some("250000.50"));
    }

    #[tokio::test]
    async fn empty_skip_field_aborts_the_listing() {
        // mietpreis never resolves in the fixture, so the rule accumulates
        // nothing and the configured skip-field aborts the listing.
        let extra = r#"
            [[mapping]]
            group = "preise"
            field = "mietpreis"
            kind = "real_estate"
            attribute = "kaufpreis"
        "#;
        let mut definition = definition(extra, "own");
        definition.config.skip_fields.push("kaufpreis".to_string());

        let hooks = HookSet::new();
        let outcome = build(&definition, &hooks).await;
        assert!(outcome.real_estates.is_empty());
        assert!(outcome.partial);
    }

    struct SkipListings;

    impl PrepareRecordHook for SkipListings {
        fn prepare_record(&self, args: &mut PrepareRecordArgs<'_>) {
            args.skip = true;
        }
    }

    #[tokio::test]
    async fn prepare_record_hook_skips_listing() {
        let definition = definition("", "own");
        let hooks = HookSet::new().on_prepare_record(SkipListings);
        let outcome = build(&definition, &hooks).await;

        assert!(outcome.real_estates.is_empty());
        assert!(outcome.partial);
    }

    #[tokio::test]
    async fn document_without_providers_is_a_feed_error() {
        let definition = definition("", "own");
        let hooks = HookSet::new();
        let store = InMemoryStore::new();
        let log = RunLog::new();
        let builder = RecordBuilder::new(&store, &definition, &hooks, &log);
        let document = XmlElement::parse(b"<openimmo></openimmo>").unwrap();
        let err = builder.build(&document).await.unwrap_err();
        assert!(err.is_feed());
    }
}
