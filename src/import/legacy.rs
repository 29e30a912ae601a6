//! Older sheets without a header row: fixed column positions.

use std::collections::HashMap;

use super::cell::CellValue;
use super::source::RawSheet;

/// name, frequency, theme, php, ga4, analytics, one checkmark column per
/// month, notes.
pub const LEGACY_HEADERS: [&str; 19] = [
    "client_name",
    "frequency",
    "wp_theme",
    "php_version",
    "ga4_status",
    "analytics_check",
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
    "notes",
];

/// Names positional rows; short rows are padded with empty cells and
/// anything past the last known column is dropped.
pub fn from_positional(rows: Vec<Vec<CellValue>>) -> RawSheet {
    let rows = rows
        .into_iter()
        .map(|row| {
            let mut cells = row.into_iter();
            LEGACY_HEADERS
                .iter()
                .map(|header| (header.to_string(), cells.next().unwrap_or_default()))
                .collect::<HashMap<_, _>>()
        })
        .filter(|row| row.values().any(|cell| cell.as_text().is_some()))
        .collect();

    RawSheet {
        headers: LEGACY_HEADERS.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}
