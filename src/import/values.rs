//! Cell → typed value conversion. Nothing in here fails: unknown input
//! falls back to the field's default so one messy sheet never aborts an
//! import.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime};

use super::cell::CellValue;
use super::columns::{CanonicalField, ColumnMapping};
use crate::subscriptions::cycle::{derive_status, next_due};
use crate::subscriptions::model::{Frequency, Ga4Status, NewSubscription, UpdateStatus};

pub const UNKNOWN_CLIENT: &str = "Unknown Client";

const TRUTHY: &[&str] = &["true", "yes", "ja", "1", "x", "✓", "✔"];

/// Substring match, month words first; anything unrecognised is monthly.
pub fn normalize_frequency(cell: &CellValue) -> Frequency {
    let value = cell.folded();
    if value.contains("maand") || value.contains("month") {
        Frequency::Monthly
    } else if value.contains("kwart") || value.contains("quart") {
        Frequency::Quarterly
    } else {
        Frequency::Monthly
    }
}

pub fn normalize_ga4(cell: &CellValue) -> Ga4Status {
    let value = cell.folded();
    if matches!(value.as_str(), "yes - basic" | "ja - basic") {
        Ga4Status::YesBasic
    } else if value.contains("ja") || value.contains("yes") {
        Ga4Status::Yes
    } else if value.contains("nee") || value.contains("no") {
        Ga4Status::No
    } else {
        Ga4Status::Pending
    }
}

pub fn normalize_bool(cell: &CellValue) -> bool {
    match cell {
        CellValue::Bool(b) => *b,
        other => TRUTHY.contains(&other.folded().as_str()),
    }
}

pub fn normalize_text(cell: &CellValue) -> Option<String> {
    cell.as_text()
}

/// English or Dutch status label; `None` leaves the status to be derived.
pub fn normalize_update_status(cell: &CellValue) -> Option<UpdateStatus> {
    match cell.folded().as_str() {
        "completed" | "voltooid" | "bijgewerkt" => Some(UpdateStatus::Completed),
        "pending" | "in behandeling" | "open" => Some(UpdateStatus::Pending),
        "overdue" | "te laat" | "verlopen" => Some(UpdateStatus::Overdue),
        _ => None,
    }
}

lazy_static! {
    static ref DUTCH_DATE_RE: Regex = Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})$").unwrap();
}

/// Day 0 of the spreadsheet serial calendar.
fn excel_epoch() -> Option<OffsetDateTime> {
    Date::from_calendar_date(1899, Month::December, 30)
        .ok()
        .map(|d| d.midnight().assume_utc())
}

fn from_excel_serial(serial: f64) -> Option<OffsetDateTime> {
    // 2958465 is 9999-12-31
    if !(1.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let offset = Duration::seconds((serial * 86_400.0).round() as i64);
    excel_epoch()?.checked_add(offset)
}

fn parse_date_text(text: &str) -> Option<OffsetDateTime> {
    if let Ok(at) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(at);
    }
    if let Ok(at) = PrimitiveDateTime::parse(
        text,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(at.assume_utc());
    }
    if let Ok(date) = Date::parse(text, format_description!("[year]-[month]-[day]")) {
        return Some(date.midnight().assume_utc());
    }
    if let Some(caps) = DUTCH_DATE_RE.captures(text) {
        let day: u8 = caps[1].parse().ok()?;
        let month: u8 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        let date = Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()?;
        return Some(date.midnight().assume_utc());
    }
    text.parse::<f64>().ok().and_then(from_excel_serial)
}

/// Excel serial numbers, ISO-8601, `dd-mm-yyyy` or `dd/mm/yyyy`.
pub fn normalize_timestamp(cell: &CellValue) -> Option<OffsetDateTime> {
    match cell {
        CellValue::Number(serial) => from_excel_serial(*serial),
        CellValue::Text(text) => parse_date_text(text.trim()),
        _ => None,
    }
}

/// One spreadsheet row with every canonical field converted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedRow {
    pub client_name: Option<String>,
    pub frequency: Frequency,
    pub wp_theme: Option<String>,
    pub php_version: Option<String>,
    pub ga4_status: Ga4Status,
    pub analytics_check: bool,
    pub last_update: Option<OffsetDateTime>,
    pub next_update_due: Option<OffsetDateTime>,
    pub update_status: Option<UpdateStatus>,
    pub comments: Option<String>,
}

/// Converts a named row using the sheet's header mapping. When two headers
/// map to the same field the first non-blank one is used.
pub fn normalize_row(row: &HashMap<String, CellValue>, mapping: &ColumnMapping) -> NormalizedRow {
    let mut cells: HashMap<CanonicalField, &CellValue> = HashMap::new();
    for (raw, field) in &mapping.mapped {
        if let Some(cell) = row.get(raw).filter(|c| c.as_text().is_some()) {
            cells.entry(*field).or_insert(cell);
        }
    }
    let empty = CellValue::Empty;
    let get = |field: CanonicalField| cells.get(&field).copied().unwrap_or(&empty);

    NormalizedRow {
        client_name: normalize_text(get(CanonicalField::ClientName)),
        frequency: normalize_frequency(get(CanonicalField::Frequency)),
        wp_theme: normalize_text(get(CanonicalField::WpTheme)),
        php_version: normalize_text(get(CanonicalField::PhpVersion)),
        ga4_status: normalize_ga4(get(CanonicalField::Ga4Status)),
        analytics_check: normalize_bool(get(CanonicalField::AnalyticsCheck)),
        last_update: normalize_timestamp(get(CanonicalField::LastUpdate)),
        next_update_due: normalize_timestamp(get(CanonicalField::NextUpdateDue)),
        update_status: normalize_update_status(get(CanonicalField::UpdateStatus)),
        comments: normalize_text(get(CanonicalField::Comments)),
    }
}

impl NormalizedRow {
    /// Insert payload. The due date follows from `last_update` whenever one
    /// is known; the status cell wins over derivation when it was readable.
    pub fn into_new(self, now: OffsetDateTime) -> NewSubscription {
        let next_update_due = match self.last_update {
            Some(last) => Some(next_due(self.frequency, Some(last), now)),
            None => self.next_update_due,
        };
        let update_status = self
            .update_status
            .unwrap_or_else(|| derive_status(self.last_update, next_update_due, now));

        NewSubscription {
            client_name: self.client_name.unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
            frequency: self.frequency,
            wp_theme: self.wp_theme,
            php_version: self.php_version,
            ga4_status: self.ga4_status,
            analytics_check: self.analytics_check,
            last_update: self.last_update,
            next_update_due,
            update_status,
            comments: self.comments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::columns::map_headers;
    use time::macros::datetime;

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    #[test]
    fn frequency_aliases() {
        for v in ["maandelijks", "Maand", " MONTHLY ", "per month"] {
            assert_eq!(normalize_frequency(&text(v)), Frequency::Monthly, "{v}");
        }
        for v in ["kwartaal", "Per kwartaal", "Quarterly", "QUARTER"] {
            assert_eq!(normalize_frequency(&text(v)), Frequency::Quarterly, "{v}");
        }
        for v in ["weekly", "", "jaarlijks"] {
            assert_eq!(normalize_frequency(&text(v)), Frequency::Monthly, "{v}");
        }
        assert_eq!(normalize_frequency(&CellValue::Number(3.0)), Frequency::Monthly);
    }

    #[test]
    fn month_words_win_over_quarter_words() {
        for v in ["kwartaal (3 maanden)", "Quarterly, billed monthly", "maand/kwartaal"] {
            assert_eq!(normalize_frequency(&text(v)), Frequency::Monthly, "{v}");
        }
    }

    #[test]
    fn ga4_values() {
        assert_eq!(normalize_ga4(&text("Yes - Basic")), Ga4Status::YesBasic);
        assert_eq!(normalize_ga4(&text("ja - basic")), Ga4Status::YesBasic);
        assert_eq!(normalize_ga4(&text("Ja")), Ga4Status::Yes);
        assert_eq!(normalize_ga4(&text("yes, GA4")), Ga4Status::Yes);
        assert_eq!(normalize_ga4(&text("Nee")), Ga4Status::No);
        assert_eq!(normalize_ga4(&text("no")), Ga4Status::No);
        assert_eq!(normalize_ga4(&text("")), Ga4Status::Pending);
        assert_eq!(normalize_ga4(&CellValue::Empty), Ga4Status::Pending);
    }

    #[test]
    fn truthy_set_in_any_case() {
        for v in ["true", "YES", " ja ", "1", "X", "✓", "✔"] {
            assert!(normalize_bool(&text(v)), "{v}");
        }
        for v in ["false", "nee", "0", "", "xx", "y"] {
            assert!(!normalize_bool(&text(v)), "{v}");
        }
        assert!(normalize_bool(&CellValue::Bool(true)));
        assert!(!normalize_bool(&CellValue::Bool(false)));
        assert!(normalize_bool(&CellValue::Number(1.0)));
        assert!(!normalize_bool(&CellValue::Number(2.0)));
        assert!(!normalize_bool(&CellValue::Empty));
    }

    #[test]
    fn dates_in_supported_shapes() {
        let expected = datetime!(2024-01-01 0:00 UTC);
        assert_eq!(normalize_timestamp(&CellValue::Number(45292.0)), Some(expected));
        assert_eq!(normalize_timestamp(&text("2024-01-01")), Some(expected));
        assert_eq!(normalize_timestamp(&text("01-01-2024")), Some(expected));
        assert_eq!(normalize_timestamp(&text("1/1/2024")), Some(expected));
        assert_eq!(
            normalize_timestamp(&text("2024-01-01T10:30:00Z")),
            Some(datetime!(2024-01-01 10:30 UTC))
        );
        assert_eq!(normalize_timestamp(&text("31-02-2024")), None);
        assert_eq!(normalize_timestamp(&text("soon")), None);
        assert_eq!(normalize_timestamp(&CellValue::Empty), None);
    }

    #[test]
    fn status_labels() {
        assert_eq!(normalize_update_status(&text("Voltooid")), Some(UpdateStatus::Completed));
        assert_eq!(normalize_update_status(&text("te laat")), Some(UpdateStatus::Overdue));
        assert_eq!(normalize_update_status(&text("pending")), Some(UpdateStatus::Pending));
        assert_eq!(normalize_update_status(&text("??")), None);
    }

    #[test]
    fn named_row_to_insert_payload() {
        let mapping = map_headers(&["Klant", "Frequentie", "GA4", "Laatste update", "Foobar"]);
        let row: HashMap<String, CellValue> = [
            ("Klant", text("  Acme BV ")),
            ("Frequentie", text("kwartaal")),
            ("GA4", text("ja")),
            ("Laatste update", text("15-01-2024")),
            ("Foobar", text("ignored")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let now = datetime!(2024-02-01 0:00 UTC);
        let new = normalize_row(&row, &mapping).into_new(now);
        assert_eq!(new.client_name, "Acme BV");
        assert_eq!(new.frequency, Frequency::Quarterly);
        assert_eq!(new.ga4_status, Ga4Status::Yes);
        assert_eq!(new.last_update, Some(datetime!(2024-01-15 0:00 UTC)));
        assert_eq!(new.next_update_due, Some(datetime!(2024-04-15 0:00 UTC)));
        assert_eq!(new.update_status, UpdateStatus::Completed);
        assert_eq!(new.comments, None);
    }

    #[test]
    fn missing_name_and_dates_fall_back() {
        let mapping = map_headers(&["Naam"]);
        let row = HashMap::from([("Naam".to_string(), CellValue::Empty)]);
        let new = normalize_row(&row, &mapping).into_new(datetime!(2024-02-01 0:00 UTC));
        assert_eq!(new.client_name, UNKNOWN_CLIENT);
        assert_eq!(new.next_update_due, None);
        assert_eq!(new.update_status, UpdateStatus::Pending);
    }
}
