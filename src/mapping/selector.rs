//! Typed field selector AST, parsed once at configuration load.
//!
//! The textual form is the path of element names relative to the matched
//! group, optionally followed by `@` and an attribute mode:
//!
//! - `@name`  - literal value of the attribute `name`
//! - `@*`     - all attributes of the element, serialized as one JSON object
//! - `@+`     - the name of the single attribute whose value is truthy
//! - `@#`     - JSON list of attribute names with truthy values
//! - `@[N]`   - the name of the N-th child element (1-based)
//!
//! Without `@`, the element's text content is selected. An empty path
//! selects the matched group itself.

/// Extraction mode applied to each matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorMode {
    /// Element text content.
    Text,
    /// Literal value of a named attribute.
    Attribute(String),
    /// All attributes serialized as a JSON object.
    SerializeAttributes,
    /// Name of the single attribute whose value is `"true"` or `"1"`.
    TruthyAttributeName,
    /// JSON list of attribute names whose values are truthy.
    TruthyAttributeList,
    /// Name of the n-th child element (zero-based after parsing).
    NthChildName(usize),
}

/// A parsed field selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector {
    /// Element path segments relative to the group; may be empty.
    pub path: Vec<String>,
    pub mode: SelectorMode,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("selector '{0}' has an empty attribute suffix")]
    EmptyAttribute(String),

    #[error("selector '{0}' has an invalid child index (must be >= 1)")]
    InvalidChildIndex(String),

    #[error("selector '{0}' contains an empty path segment")]
    EmptyPathSegment(String),

    #[error("selector is empty")]
    Empty,
}

impl FieldSelector {
    /// Parse the textual selector form, rejecting malformed input.
    pub fn parse(raw: &str) -> Result<Self, SelectorError> {
        let (path_part, mode) = match raw.rfind('@') {
            Some(pos) => {
                let attr = &raw[pos + 1..];
                let mode = match attr {
                    "" => return Err(SelectorError::EmptyAttribute(raw.to_string())),
                    "*" => SelectorMode::SerializeAttributes,
                    "+" => SelectorMode::TruthyAttributeName,
                    "#" => SelectorMode::TruthyAttributeList,
                    _ if attr.starts_with('[') && attr.ends_with(']') => {
                        let n: usize = attr[1..attr.len() - 1]
                            .parse()
                            .map_err(|_| SelectorError::InvalidChildIndex(raw.to_string()))?;
                        if n == 0 {
                            return Err(SelectorError::InvalidChildIndex(raw.to_string()));
                        }
                        SelectorMode::NthChildName(n - 1)
                    }
                    name => SelectorMode::Attribute(name.to_string()),
                };
                (&raw[..pos], mode)
            }
            None => (raw, SelectorMode::Text),
        };

        if path_part.is_empty() {
            if mode == SelectorMode::Text {
                return Err(SelectorError::Empty);
            }
            return Ok(Self { path: Vec::new(), mode });
        }

        let path: Vec<String> = path_part.split('/').map(str::to_string).collect();
        if path.iter().any(String::is_empty) {
            return Err(SelectorError::EmptyPathSegment(raw.to_string()));
        }

        Ok(Self { path, mode })
    }
}
