//! Data models for the guide pipeline

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Login result, alive for a single run
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    /// Headend the provider associates with the account (may be empty)
    pub region_hint: String,
}

/// Half-open `[start, end)` slice of the guide, in Unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

/// Lineup selection sent with every grid request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineupConfig {
    pub lineup_id: String,
    pub headend_id: String,
    pub country: String,
    pub zip_code: String,
    pub device: String,
    pub language: String,
}

/// Text with an optional language tag (title, sub-title, desc, category)
#[derive(Debug, Clone, PartialEq)]
pub struct LangText {
    pub lang: String,
    pub text: String,
}

impl LangText {
    pub fn new(lang: &str, text: &str) -> Self {
        Self {
            lang: lang.to_string(),
            text: text.to_string(),
        }
    }
}

/// XMLTV channel
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: String,
    pub display_names: Vec<String>,
    pub icon: Option<String>,
}

/// XMLTV programme
#[derive(Debug, Clone, PartialEq)]
pub struct Programme {
    /// XMLTV time, e.g. "20240601100000 +0000"
    pub start: String,
    pub stop: String,
    pub channel_id: String,
    pub titles: Vec<LangText>,
    pub subtitle: Option<LangText>,
    pub description: LangText,
    pub categories: Vec<LangText>,
}

/// Provider row from the postal-code lookup
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub headend_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub lineup_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub device: String,
}

/// Accepts strings, numbers and null; the lookup endpoint is not consistent
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
