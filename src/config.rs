//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::GuideError;
use crate::models::LineupConfig;

pub const DEFAULT_LANGUAGE: &str = "en-us";
pub const DEFAULT_HISTORY_DAYS: u32 = 14;

/// Settings handed to the pipeline. Stored as JSON with camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideConfig {
    // Credentials
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    // Preferences
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_history_days")]
    pub historical_guide_days: u32,
    // Lineup selection (see --find-id)
    #[serde(default)]
    pub lineup_id: String,
    #[serde(default)]
    pub headend_id: String,
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_language() -> String { DEFAULT_LANGUAGE.to_string() }
fn default_device() -> String { "-".to_string() }
fn default_history_days() -> u32 { DEFAULT_HISTORY_DAYS }

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            country: String::new(),
            zip_code: String::new(),
            language: default_language(),
            historical_guide_days: DEFAULT_HISTORY_DAYS,
            lineup_id: String::new(),
            headend_id: String::new(),
            device: default_device(),
        }
    }
}

impl GuideConfig {
    /// `<config dir>/zap2xmltv/config.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("zap2xmltv");
        path.push("config.json");
        path
    }

    pub fn load(path: &Path) -> Result<Self, GuideError> {
        let content = fs::read_to_string(path).map_err(|e| {
            GuideError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
            .map_err(|e| GuideError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Everything a full guide run needs before the first request
    pub fn validate_for_guide(&self) -> Result<(), GuideError> {
        require(&[
            ("username", &self.username),
            ("password", &self.password),
            ("country", &self.country),
            ("zipCode", &self.zip_code),
        ])
    }

    pub fn validate_for_lookup(&self) -> Result<(), GuideError> {
        require(&[("country", &self.country), ("zipCode", &self.zip_code)])
    }

    pub fn lineup(&self) -> LineupConfig {
        LineupConfig {
            lineup_id: self.lineup_id.clone(),
            headend_id: self.headend_id.clone(),
            country: self.country.clone(),
            zip_code: self.zip_code.clone(),
            device: self.device.clone(),
            language: self.language.clone(),
        }
    }
}

fn require(fields: &[(&str, &String)]) -> Result<(), GuideError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(GuideError::Config(format!("missing setting(s): {}", missing.join(", "))))
    }
}
