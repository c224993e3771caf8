//! Per-field value transforms applied after resolution.

use serde::Deserialize;

/// Text transform variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextTransform {
    Lowercase,
    Uppercase,
    Capitalize,
    /// Map typographic quotes, dashes and ellipsis to ASCII equivalents.
    NormalizeSpecialChars,
}

/// Transform applied to a resolved field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    None,
    Number {
        decimals: u8,
    },
    /// Parse into a Unix timestamp; unparsable input becomes empty.
    Date,
    Text {
        transform: Option<TextTransform>,
        trim: bool,
    },
    Boolean {
        /// When set, equality against this value decides `"1"`/`"0"`.
        compare: Option<String>,
    },
}

impl Transform {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Self::None => value.to_string(),
            Self::Number { decimals } => format_number(value, *decimals),
            Self::Date => parse_date(value),
            Self::Text { transform, trim } => {
                let mut out = match transform {
                    Some(TextTransform::Lowercase) => value.to_lowercase(),
                    Some(TextTransform::Uppercase) => value.to_uppercase(),
                    Some(TextTransform::Capitalize) => capitalize(value),
                    Some(TextTransform::NormalizeSpecialChars) => normalize_special(value),
                    None => value.to_string(),
                };
                if *trim {
                    out = out.trim().to_string();
                }
                out
            }
            Self::Boolean { compare } => match compare {
                Some(expected) => {
                    if expected == value {
                        "1".to_string()
                    } else {
                        "0".to_string()
                    }
                }
                None => {
                    if value == "1" || value == "true" {
                        "1".to_string()
                    } else {
                        "0".to_string()
                    }
                }
            },
        }
    }
}

/// Parse as float (invalid input counts as zero) and format with a fixed
/// number of decimals; zero decimals truncates to an integer.
fn format_number(value: &str, decimals: u8) -> String {
    let parsed: f64 = value.trim().parse().unwrap_or(0.0);
    if decimals == 0 {
        (parsed.trunc() as i64).to_string()
    } else {
        format!("{:.*}", decimals as usize, parsed)
    }
}

/// Parse a feed date into a Unix timestamp string.
///
/// Accepts RFC 3339, ISO date-time, plain dates, and the German `d.m.Y`
/// form. Unparsable input yields the empty string.
fn parse_date(value: &str) -> String {
    let trimmed = value.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return dt.timestamp().to_string();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, fmt) {
            return dt.and_utc().timestamp().to_string();
        }
    }
    for fmt in ["%Y-%m-%d", "%d.%m.%Y"] {
        if let Ok(d) = chrono::NaiveDate::parse_from_str(trimmed, fmt) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return dt.and_utc().timestamp().to_string();
            }
        }
    }
    String::new()
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Replace typographic punctuation with ASCII equivalents.
fn normalize_special(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            _ => out.push(c),
        }
    }
    out
}
