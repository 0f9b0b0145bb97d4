//! Grid page normalizer
//! Maps loosely typed listings JSON onto XMLTV channels and programmes.
//! A malformed channel or event is skipped with a warning; only a page with
//! no `channels` array is rejected.

use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::warn;

use super::format_xmltv_time;
use crate::models::{Channel, LangText, Programme};

/// Description used when the listing carries none
pub const MISSING_DESCRIPTION: &str = "Unavailable";

/// A single record that could not be converted
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeWarning {
    #[error("channel entry is not an object")]
    ChannelNotObject,
    #[error("channel {channel} is missing `{field}`")]
    ChannelField { channel: String, field: &'static str },
    #[error("event on channel {channel} is not an object")]
    EventNotObject { channel: String },
    #[error("event on channel {channel} is missing `{field}`")]
    EventField { channel: String, field: &'static str },
}

/// Stateless converter; the language tags every text it produces.
#[derive(Debug, Clone)]
pub struct GuideNormalizer {
    language: String,
}

impl GuideNormalizer {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
        }
    }

    /// Channels in page order, first occurrence of an id wins.
    /// `None` when the page has no `channels` array.
    pub fn channels(&self, page: &Value) -> Option<Vec<Channel>> {
        let entries = channel_entries(page)?;
        let mut seen = HashSet::new();
        let mut channels = Vec::with_capacity(entries.len());

        for entry in entries {
            match build_channel(entry) {
                Ok(channel) => {
                    if seen.insert(channel.id.clone()) {
                        channels.push(channel);
                    }
                }
                Err(w) => warn!("skipping channel: {}", w),
            }
        }
        Some(channels)
    }

    /// Programmes in page order (channel by channel, event by event).
    /// `None` when the page has no `channels` array.
    pub fn programmes(&self, page: &Value) -> Option<Vec<Programme>> {
        let entries = channel_entries(page)?;
        let mut programmes = Vec::new();

        for entry in entries {
            let Some(channel) = entry.as_object() else { continue };
            let Some(channel_id) = str_field(channel, "channelId") else { continue };
            let Some(events) = channel.get("events").and_then(Value::as_array) else { continue };

            for event in events {
                match self.build_programme(event, channel_id) {
                    Ok(programme) => programmes.push(programme),
                    Err(w) => warn!("skipping programme: {}", w),
                }
            }
        }
        Some(programmes)
    }

    fn build_programme(&self, event: &Value, channel_id: &str) -> Result<Programme, NormalizeWarning> {
        let missing = |field| NormalizeWarning::EventField {
            channel: channel_id.to_string(),
            field,
        };

        let event = event.as_object().ok_or_else(|| NormalizeWarning::EventNotObject {
            channel: channel_id.to_string(),
        })?;
        let start = str_field(event, "startTime").ok_or_else(|| missing("startTime"))?;
        let stop = str_field(event, "endTime").ok_or_else(|| missing("endTime"))?;
        let program = event
            .get("program")
            .and_then(Value::as_object)
            .ok_or_else(|| missing("program"))?;
        let title = str_field(program, "title").ok_or_else(|| missing("program.title"))?;

        let lang = self.language.as_str();
        let subtitle = non_empty(program, "episodeTitle").map(|t| LangText::new(lang, t));
        let description = non_empty(program, "shortDesc").unwrap_or(MISSING_DESCRIPTION);

        let categories = event
            .get("filter")
            .and_then(Value::as_array)
            .map(|filters| {
                filters
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(category_name)
                    .map(|c| LangText { lang: lang.to_string(), text: c })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Programme {
            start: format_xmltv_time(start),
            stop: format_xmltv_time(stop),
            channel_id: channel_id.to_string(),
            titles: vec![LangText::new(lang, title)],
            subtitle,
            description: LangText::new(lang, description),
            categories,
        })
    }
}

fn channel_entries(page: &Value) -> Option<&Vec<Value>> {
    page.get("channels").and_then(Value::as_array)
}

fn build_channel(entry: &Value) -> Result<Channel, NormalizeWarning> {
    let entry = entry.as_object().ok_or(NormalizeWarning::ChannelNotObject)?;

    let id = str_field(entry, "channelId").ok_or_else(|| NormalizeWarning::ChannelField {
        channel: "<unknown>".to_string(),
        field: "channelId",
    })?;
    let missing = |field| NormalizeWarning::ChannelField {
        channel: id.to_string(),
        field,
    };
    let number = str_field(entry, "channelNo").ok_or_else(|| missing("channelNo"))?;
    let call_sign = str_field(entry, "callSign").ok_or_else(|| missing("callSign"))?;

    let mut display_names = vec![
        format!("{} {}", number, call_sign),
        number.to_string(),
        call_sign.to_string(),
    ];
    if let Some(affiliate) = non_empty(entry, "affiliateName") {
        display_names.push(affiliate.to_string());
    }

    Ok(Channel {
        id: id.to_string(),
        display_names,
        icon: str_field(entry, "thumbnail").map(icon_url),
    })
}

/// `//zap2it.tmsimg.com/assets/s10098_ll_h15_ab.png?w=55&h=55`
/// becomes `http://zap2it.tmsimg.com/assets/s10098_ll_h15_ab.png`
fn icon_url(thumbnail: &str) -> String {
    let path = thumbnail.split('?').next().unwrap_or_default();
    format!("http://{}", path.trim_start_matches('/'))
}

/// `filter-sports` -> `Sports`
fn category_name(filter: &str) -> Option<String> {
    let name = filter.strip_prefix("filter-").unwrap_or(filter).trim();
    let mut chars = name.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

fn non_empty<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    str_field(object, key).filter(|s| !s.is_empty())
}
