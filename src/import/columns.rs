//! Spreadsheet header → canonical field mapping.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    ClientName,
    Frequency,
    WpTheme,
    PhpVersion,
    Ga4Status,
    AnalyticsCheck,
    LastUpdate,
    NextUpdateDue,
    Comments,
    UpdateStatus,
}

impl CanonicalField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::ClientName => "client_name",
            CanonicalField::Frequency => "frequency",
            CanonicalField::WpTheme => "wp_theme",
            CanonicalField::PhpVersion => "php_version",
            CanonicalField::Ga4Status => "ga4_status",
            CanonicalField::AnalyticsCheck => "analytics_check",
            CanonicalField::LastUpdate => "last_update",
            CanonicalField::NextUpdateDue => "next_update_due",
            CanonicalField::Comments => "comments",
            CanonicalField::UpdateStatus => "update_status",
        }
    }
}

/// Accepted header spellings per field, Dutch and English. Checked in
/// order; the first field with a matching alias wins.
pub const COLUMN_ALIASES: &[(CanonicalField, &[&str])] = &[
    (CanonicalField::ClientName, &["client_name", "klantnaam", "klant", "name", "naam"]),
    (CanonicalField::Frequency, &["frequency", "frequentie", "type", "abonnement"]),
    (CanonicalField::WpTheme, &["wp_theme", "wordpress_theme", "theme", "thema"]),
    (CanonicalField::PhpVersion, &["php_version", "php", "version", "versie"]),
    (CanonicalField::Ga4Status, &["ga4_status", "ga4", "google_analytics", "analytics_status"]),
    (CanonicalField::AnalyticsCheck, &["analytics_check", "analytics", "check"]),
    (CanonicalField::LastUpdate, &["last_update", "laatste_update", "update_date", "datum"]),
    (CanonicalField::NextUpdateDue, &["next_update_due", "volgende_update", "next_date"]),
    (CanonicalField::Comments, &["comments", "opmerkingen", "notes", "notities"]),
    (CanonicalField::UpdateStatus, &["update_status", "status"]),
];

/// Lowercase, trim, and join words with `_` so "Laatste update" and
/// "laatste_update" compare equal.
pub fn fold_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn canonical_field(header: &str) -> Option<CanonicalField> {
    let folded = fold_header(header);
    COLUMN_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&folded.as_str()))
        .map(|(field, _)| *field)
}

/// Result of mapping one sheet's header row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnMapping {
    /// Raw header → canonical field, in header order.
    pub mapped: Vec<(String, CanonicalField)>,
    /// Headers with no alias match; their cells are ignored.
    pub skipped: Vec<String>,
}

impl ColumnMapping {
    /// `{"Klant": "client_name", ...}` as reported to the caller.
    pub fn report(&self) -> BTreeMap<String, &'static str> {
        self.mapped
            .iter()
            .map(|(raw, field)| (raw.clone(), field.as_str()))
            .collect()
    }
}

/// Maps raw headers to canonical fields. Never fails; unknown headers are
/// collected as skipped columns.
pub fn map_headers<S: AsRef<str>>(headers: &[S]) -> ColumnMapping {
    let mut mapping = ColumnMapping::default();
    for header in headers {
        let raw = header.as_ref();
        match canonical_field(raw) {
            Some(field) => mapping.mapped.push((raw.to_string(), field)),
            None => mapping.skipped.push(raw.to_string()),
        }
    }
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn klant_maps_and_foobar_is_skipped() {
        let mapping = map_headers(&["Klant", "Foobar"]);
        assert_eq!(mapping.mapped, vec![("Klant".to_string(), CanonicalField::ClientName)]);
        assert_eq!(mapping.skipped, vec!["Foobar".to_string()]);
        assert_eq!(mapping.report().get("Klant"), Some(&"client_name"));
    }

    #[test]
    fn headers_match_case_and_whitespace_insensitively() {
        assert_eq!(canonical_field("  KLANTNAAM "), Some(CanonicalField::ClientName));
        assert_eq!(canonical_field("Laatste update"), Some(CanonicalField::LastUpdate));
        assert_eq!(canonical_field("GA4"), Some(CanonicalField::Ga4Status));
        assert_eq!(canonical_field("Opmerkingen"), Some(CanonicalField::Comments));
        assert_eq!(canonical_field("PHP"), Some(CanonicalField::PhpVersion));
    }

    #[test]
    fn every_canonical_name_is_its_own_alias() {
        for (field, _) in COLUMN_ALIASES {
            assert_eq!(canonical_field(field.as_str()), Some(*field));
        }
    }

    #[test]
    fn alias_table_has_no_cross_field_collisions() {
        let mut seen = HashSet::new();
        for (_, aliases) in COLUMN_ALIASES {
            for alias in *aliases {
                assert!(seen.insert(*alias), "alias {alias} listed twice");
            }
        }
    }
}
