//! Field resolution: evaluate a parsed selector against a matched group.
//!
//! Pure and side-effect-free; invoked once per mapping rule per matched
//! group per listing.

use crate::mapping::selector::{FieldSelector, SelectorMode};
use crate::parsers::XmlElement;

/// Resolve a selector relative to a group node.
///
/// Zero matches yield `None`; exactly one yields the trimmed scalar; more
/// than one yields a JSON array string. Multi-segment paths navigate to the
/// first match of the parent path, then select the final segment beneath it.
pub fn resolve(group: &XmlElement, selector: &FieldSelector) -> Option<String> {
    let nodes: Vec<&XmlElement> = match selector.path.len() {
        0 => vec![group],
        1 => group.find_all(&selector.path[0]),
        _ => {
            let parent_path = selector.path[..selector.path.len() - 1].join("/");
            let parent = group.first(&parent_path)?;
            parent.find_all(&selector.path[selector.path.len() - 1])
        }
    };

    let mut results: Vec<String> = Vec::new();
    for node in nodes {
        if let Some(value) = extract(node, &selector.mode) {
            results.push(value);
        }
    }

    match results.len() {
        0 => None,
        1 => Some(results.remove(0).trim().to_string()),
        _ => {
            let trimmed: Vec<&str> = results.iter().map(|v| v.trim()).collect();
            serde_json::to_string(&trimmed).ok()
        }
    }
}

fn extract(node: &XmlElement, mode: &SelectorMode) -> Option<String> {
    match mode {
        SelectorMode::Text => Some(node.text().to_string()),
        SelectorMode::Attribute(name) => node.attr(name).map(str::to_string),
        SelectorMode::SerializeAttributes => {
            if node.attributes().is_empty() {
                return None;
            }
            let map: serde_json::Map<String, serde_json::Value> = node
                .attributes()
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            serde_json::to_string(&map).ok()
        }
        SelectorMode::TruthyAttributeName => {
            let mut found = None;
            for (name, value) in node.attributes() {
                if is_truthy(value) {
                    found = Some(name.clone());
                }
            }
            found
        }
        SelectorMode::TruthyAttributeList => {
            let names: Vec<&str> = node
                .attributes()
                .iter()
                .filter(|(_, value)| is_truthy(value))
                .map(|(name, _)| name.as_str())
                .collect();
            if names.is_empty() {
                return None;
            }
            serde_json::to_string(&names).ok()
        }
        SelectorMode::NthChildName(index) => node
            .children()
            .get(*index)
            .map(|child| child.name().to_string()),
    }
}

fn is_truthy(value: &str) -> bool {
    value == "true" || value == "1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::XmlElement;

    fn sample_group() -> XmlElement {
        XmlElement::parse(
            br#"<immobilie>
                <geo>
                    <plz> 50667 </plz>
                    <ort>Koeln</ort>
                </geo>
                <flaechen>
                    <zimmer>3</zimmer>
                    <zimmer>4</zimmer>
                    <zimmer>5</zimmer>
                </flaechen>
                <objektkategorie>
                    <nutzungsart WOHNEN="true" GEWERBE="false"/>
                    <vermarktungsart KAUF="1" MIETE_PACHT="true" LEASING="0"/>
                    <objektart><wohnung/><haus/></objektart>
                </objektkategorie>
                <ausstattung>
                    <stellplatzart CARPORT="true"/>
                </ausstattung>
            </immobilie>"#,
        )
        .unwrap()
    }

    fn sel(raw: &str) -> FieldSelector {
        FieldSelector::parse(raw).unwrap()
    }

    #[test]
    fn zero_nodes_is_none() {
        let group = sample_group();
        assert_eq!(resolve(&group, &sel("baujahr")), None);
    }

    #[test]
    fn single_node_is_trimmed_scalar() {
        let group = sample_group();
        assert_eq!(resolve(&group, &sel("geo/plz")), Some("50667".to_string()));
    }

    #[test]
    fn multiple_nodes_serialize_as_list() {
        let group = sample_group();
        let value = resolve(&group, &sel("flaechen/zimmer")).unwrap();
        assert_eq!(value, r#"["3","4","5"]"#);
    }

    #[test]
    fn attribute_literal_value() {
        let group = sample_group();
        let nutzungsart = group.first("objektkategorie/nutzungsart").unwrap();
        assert_eq!(
            resolve(nutzungsart, &sel("@WOHNEN")),
            Some("true".to_string())
        );
        assert_eq!(resolve(nutzungsart, &sel("@FEHLT")), None);
    }

    #[test]
    fn truthy_attribute_name_picks_last_truthy() {
        let group = sample_group();
        assert_eq!(
            resolve(&group, &sel("objektkategorie/nutzungsart@+")),
            Some("WOHNEN".to_string())
        );
        assert_eq!(
            resolve(&group, &sel("objektkategorie/vermarktungsart@+")),
            Some("MIETE_PACHT".to_string())
        );
    }

    #[test]
    fn truthy_attribute_list_serializes_names() {
        let group = sample_group();
        assert_eq!(
            resolve(&group, &sel("objektkategorie/vermarktungsart@#")),
            Some(r#"["KAUF","MIETE_PACHT"]"#.to_string())
        );
    }

    #[test]
    fn serialize_all_attributes_as_json_object() {
        let group = sample_group();
        let value = resolve(&group, &sel("ausstattung/stellplatzart@*")).unwrap();
        assert_eq!(value, r#"{"CARPORT":"true"}"#);
    }

    #[test]
    fn nth_child_name() {
        let group = sample_group();
        assert_eq!(
            resolve(&group, &sel("objektkategorie/objektart@[1]")),
            Some("wohnung".to_string())
        );
        assert_eq!(
            resolve(&group, &sel("objektkategorie/objektart@[2]")),
            Some("haus".to_string())
        );
        assert_eq!(resolve(&group, &sel("objektkategorie/objektart@[3]")), None);
    }

    #[test]
    fn nested_path_resolves_under_first_parent_match() {
        let root = XmlElement::parse(
            b"<immobilie><preise><kaufpreis>250000</kaufpreis></preise><preise><kaufpreis>9</kaufpreis></preise></immobilie>",
        )
        .unwrap();
        assert_eq!(
            resolve(&root, &sel("preise/kaufpreis")),
            Some("250000".to_string())
        );
    }
}
