//! XMLTV guide document
//! Accumulates channels and programmes for one run and writes them out.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::HashSet;
use std::io::Write;
use tracing::debug;

use crate::models::{Channel, LangText, Programme};

/// Attributes of the `<tv>` root
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub url: String,
    pub name: String,
    pub generator_name: String,
    pub generator_url: String,
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self {
            url: "http://tvlistings.zap2it.com/".to_string(),
            name: "zap2it".to_string(),
            generator_name: env!("CARGO_PKG_NAME").to_string(),
            generator_url: env!("CARGO_PKG_REPOSITORY").to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GuideDocument {
    source: SourceInfo,
    channels: Vec<Channel>,
    channel_ids: HashSet<String>,
    programmes: Vec<Programme>,
    /// (channel, start) pairs already appended
    slots: HashSet<(String, String)>,
    duplicates: usize,
    orphans: usize,
}

impl GuideDocument {
    pub fn new(source: SourceInfo) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Take the channel list from the first page that has one.
    /// Returns false (and ignores `channels`) once the list is populated.
    pub fn add_channels_once(&mut self, channels: Vec<Channel>) -> bool {
        if !self.channels.is_empty() {
            return false;
        }
        for channel in channels {
            if self.channel_ids.insert(channel.id.clone()) {
                self.channels.push(channel);
            }
        }
        true
    }

    /// Append in the given order. Programmes for unknown channels are dropped;
    /// repeats of an already seen channel/start pair are kept but counted.
    pub fn append_programmes(&mut self, programmes: Vec<Programme>) -> usize {
        let before = self.programmes.len();
        for programme in programmes {
            if !self.channel_ids.contains(&programme.channel_id) {
                debug!(channel = %programme.channel_id, "dropping programme for unknown channel");
                self.orphans += 1;
                continue;
            }
            if !self
                .slots
                .insert((programme.channel_id.clone(), programme.start.clone()))
            {
                self.duplicates += 1;
            }
            self.programmes.push(programme);
        }
        self.programmes.len() - before
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn programmes(&self) -> &[Programme] {
        &self.programmes
    }

    /// Programmes sharing channel and start time with an earlier one
    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans
    }

    pub fn serialize(&self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(256 * (self.channels.len() + self.programmes.len()));
        self.write_to(&mut out)?;
        Ok(out)
    }

    pub fn write_to<W: Write>(&self, out: W) -> std::io::Result<()> {
        let mut writer = Writer::new_with_indent(out, b' ', 2);

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new("tv").with_attributes([
            ("source-info-url", self.source.url.as_str()),
            ("source-info-name", self.source.name.as_str()),
            ("generator-info-name", self.source.generator_name.as_str()),
            ("generator-info-url", self.source.generator_url.as_str()),
        ])))?;

        for channel in &self.channels {
            write_channel(&mut writer, channel)?;
        }
        for programme in &self.programmes {
            write_programme(&mut writer, programme)?;
        }

        writer.write_event(Event::End(BytesEnd::new("tv")))?;
        writer.get_mut().write_all(b"\n")
    }
}

fn write_channel<W: Write>(writer: &mut Writer<W>, channel: &Channel) -> std::io::Result<()> {
    writer.write_event(Event::Start(
        BytesStart::new("channel").with_attributes([("id", channel.id.as_str())]),
    ))?;
    for name in &channel.display_names {
        write_text(writer, "display-name", None, name)?;
    }
    if let Some(icon) = &channel.icon {
        writer.write_event(Event::Empty(
            BytesStart::new("icon").with_attributes([("src", icon.as_str())]),
        ))?;
    }
    writer.write_event(Event::End(BytesEnd::new("channel")))
}

fn write_programme<W: Write>(writer: &mut Writer<W>, programme: &Programme) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("programme").with_attributes([
        ("start", programme.start.as_str()),
        ("stop", programme.stop.as_str()),
        ("channel", programme.channel_id.as_str()),
    ])))?;
    for title in &programme.titles {
        write_lang_text(writer, "title", title)?;
    }
    if let Some(subtitle) = &programme.subtitle {
        write_lang_text(writer, "sub-title", subtitle)?;
    }
    write_lang_text(writer, "desc", &programme.description)?;
    for category in &programme.categories {
        write_lang_text(writer, "category", category)?;
    }
    writer.write_event(Event::End(BytesEnd::new("programme")))
}

fn write_lang_text<W: Write>(writer: &mut Writer<W>, tag: &str, value: &LangText) -> std::io::Result<()> {
    write_text(writer, tag, Some(&value.lang), &value.text)
}

fn write_text<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    lang: Option<&str>,
    text: &str,
) -> std::io::Result<()> {
    let mut start = BytesStart::new(tag);
    if let Some(lang) = lang.filter(|l| !l.is_empty()) {
        start.push_attribute(("lang", lang));
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))
}
