//! EPG (Electronic Program Guide) module
//!
//! Turns raw grid pages into XMLTV channels and programmes, writes the
//! guide document and rotates its historical snapshots.

mod document;
mod history;
mod normalize;

// Re-export public types
pub use document::{GuideDocument, SourceInfo};
pub use history::{rotate, RotationReport};
pub use normalize::GuideNormalizer;

/// Convert a listings timestamp to XMLTV form.
///
/// `2024-01-02T15:04:05Z` becomes `20240102150405 +0000`. Only the separators
/// are stripped and a trailing `Z` replaced; no zone conversion happens.
pub fn format_xmltv_time(iso: &str) -> String {
    let compact: String = iso
        .chars()
        .filter(|c| !matches!(c, '-' | ':' | 'T'))
        .collect();

    match compact.strip_suffix('Z') {
        Some(rest) => format!("{} +0000", rest),
        None => compact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_xmltv_time() {
        assert_eq!(format_xmltv_time("2024-01-02T15:04:05Z"), "20240102150405 +0000");
        assert_eq!(format_xmltv_time("2024-06-01T10:30:00Z"), "20240601103000 +0000");
    }

    #[test]
    fn test_format_xmltv_time_without_zulu() {
        assert_eq!(format_xmltv_time("2024-06-01T10:30:00"), "20240601103000");
    }
}
