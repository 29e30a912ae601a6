//! Update-cycle arithmetic: when the next maintenance round is due and
//! where a subscription currently stands.

use time::{Date, OffsetDateTime};

use super::model::{Frequency, NewSubscription, Subscription, UpdateStatus};

/// Adds calendar months, clamping the day to the end of the target month
/// (Jan 31 + 1 month = Feb 29 in a leap year, Feb 28 otherwise).
pub fn add_months(at: OffsetDateTime, months: u8) -> OffsetDateTime {
    let date = at.date();
    let month0 = date.month() as i32 - 1 + months as i32;
    let year = date.year() + month0.div_euclid(12);
    let month = date.month().nth_next(months);
    let day = date.day().min(month.length(year));

    match Date::from_calendar_date(year, month, day) {
        Ok(target) => at.replace_date(target),
        // outside the supported calendar range
        Err(_) => at,
    }
}

/// Next due date: one cycle after the last completed update, or after
/// `now` when no update was ever recorded.
pub fn next_due(
    frequency: Frequency,
    last_update: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> OffsetDateTime {
    add_months(last_update.unwrap_or(now), frequency.months())
}

/// `overdue` once the due date has passed, `completed` while the last
/// update still covers the current cycle, `pending` otherwise.
pub fn derive_status(
    last_update: Option<OffsetDateTime>,
    next_update_due: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> UpdateStatus {
    let Some(due) = next_update_due else {
        return UpdateStatus::Pending;
    };
    if due < now {
        return UpdateStatus::Overdue;
    }
    match last_update {
        Some(last) if last <= due => UpdateStatus::Completed,
        _ => UpdateStatus::Pending,
    }
}

impl Subscription {
    /// Re-derives `update_status` against the current clock.
    pub fn refresh_status(&mut self, now: OffsetDateTime) {
        self.update_status = derive_status(self.last_update, self.next_update_due, now);
    }

    /// Marks the current cycle as done at `now`.
    pub fn complete_cycle(&mut self, now: OffsetDateTime) {
        self.last_update = Some(now);
        self.next_update_due = Some(next_due(self.frequency, Some(now), now));
        self.update_status = UpdateStatus::Completed;
    }
}

impl NewSubscription {
    /// Lays an imported row over what is already stored for the client.
    ///
    /// Blank text cells keep the stored value. Once a last update is known
    /// from either side, the due date is recomputed from it and the imported
    /// frequency. A row without any dates keeps the stored schedule, and its
    /// status is derived from that schedule.
    pub fn merged_over(self, stored: &NewSubscription, now: OffsetDateTime) -> NewSubscription {
        let row_has_dates = self.last_update.is_some() || self.next_update_due.is_some();
        let last_update = self.last_update.or(stored.last_update);
        let next_update_due = match last_update {
            Some(last) => Some(next_due(self.frequency, Some(last), now)),
            None => self.next_update_due.or(stored.next_update_due),
        };
        let update_status = if row_has_dates || next_update_due.is_none() {
            self.update_status
        } else {
            derive_status(last_update, next_update_due, now)
        };

        NewSubscription {
            wp_theme: self.wp_theme.or_else(|| stored.wp_theme.clone()),
            php_version: self.php_version.or_else(|| stored.php_version.clone()),
            comments: self.comments.or_else(|| stored.comments.clone()),
            last_update,
            next_update_due,
            update_status,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn month_end_clamps_into_leap_february() {
        let due = next_due(
            Frequency::Monthly,
            Some(datetime!(2024-01-31 10:00 UTC)),
            datetime!(2024-02-01 0:00 UTC),
        );
        assert_eq!(due, datetime!(2024-02-29 10:00 UTC));
    }

    #[test]
    fn month_end_clamps_into_common_february() {
        assert_eq!(
            add_months(datetime!(2023-01-31 0:00 UTC), 1),
            datetime!(2023-02-28 0:00 UTC)
        );
    }

    #[test]
    fn quarterly_crosses_year_boundary() {
        let due = next_due(
            Frequency::Quarterly,
            Some(datetime!(2024-11-30 8:30 UTC)),
            datetime!(2024-12-01 0:00 UTC),
        );
        assert_eq!(due, datetime!(2025-02-28 8:30 UTC));
    }

    #[test]
    fn yearly_keeps_leap_day_clamped() {
        assert_eq!(
            add_months(datetime!(2024-02-29 0:00 UTC), 12),
            datetime!(2025-02-28 0:00 UTC)
        );
    }

    #[test]
    fn missing_last_update_counts_from_now() {
        let now = datetime!(2024-05-15 12:00 UTC);
        assert_eq!(
            next_due(Frequency::Monthly, None, now),
            datetime!(2024-06-15 12:00 UTC)
        );
    }

    #[test]
    fn status_without_dates_is_pending() {
        let now = datetime!(2024-05-15 12:00 UTC);
        assert_eq!(derive_status(None, None, now), UpdateStatus::Pending);
    }

    #[test]
    fn status_with_past_due_date_is_overdue() {
        let now = datetime!(2024-05-15 12:00 UTC);
        let last = datetime!(2024-03-01 0:00 UTC);
        let due = datetime!(2024-04-01 0:00 UTC);
        assert_eq!(derive_status(Some(last), Some(due), now), UpdateStatus::Overdue);
        assert_eq!(derive_status(None, Some(due), now), UpdateStatus::Overdue);
    }

    #[test]
    fn status_within_cycle_is_completed() {
        let now = datetime!(2024-05-15 12:00 UTC);
        let last = datetime!(2024-05-10 0:00 UTC);
        let due = next_due(Frequency::Monthly, Some(last), now);
        assert_eq!(derive_status(Some(last), Some(due), now), UpdateStatus::Completed);
    }

    fn stored_monthly() -> NewSubscription {
        NewSubscription {
            client_name: "Acme BV".into(),
            frequency: Frequency::Monthly,
            wp_theme: Some("astra".into()),
            last_update: Some(datetime!(2024-01-01 0:00 UTC)),
            next_update_due: Some(datetime!(2024-02-01 0:00 UTC)),
            update_status: UpdateStatus::Completed,
            ..Default::default()
        }
    }

    #[test]
    fn frequency_change_without_dates_reschedules_from_stored_update() {
        let now = datetime!(2024-03-15 0:00 UTC);
        let imported = NewSubscription {
            client_name: "acme bv".into(),
            frequency: Frequency::Quarterly,
            update_status: UpdateStatus::Pending,
            ..Default::default()
        };

        let merged = imported.merged_over(&stored_monthly(), now);
        assert_eq!(merged.client_name, "acme bv");
        assert_eq!(merged.frequency, Frequency::Quarterly);
        assert_eq!(merged.last_update, Some(datetime!(2024-01-01 0:00 UTC)));
        assert_eq!(merged.next_update_due, Some(datetime!(2024-04-01 0:00 UTC)));
        assert_eq!(merged.update_status, UpdateStatus::Completed);
        assert_eq!(merged.wp_theme.as_deref(), Some("astra"));
    }

    #[test]
    fn imported_dates_replace_the_stored_schedule() {
        let now = datetime!(2024-03-15 0:00 UTC);
        let imported = NewSubscription {
            client_name: "Acme BV".into(),
            frequency: Frequency::Monthly,
            wp_theme: Some("divi".into()),
            last_update: Some(datetime!(2024-03-10 0:00 UTC)),
            next_update_due: Some(datetime!(2024-04-10 0:00 UTC)),
            update_status: UpdateStatus::Completed,
            ..Default::default()
        };

        let merged = imported.merged_over(&stored_monthly(), now);
        assert_eq!(merged.last_update, Some(datetime!(2024-03-10 0:00 UTC)));
        assert_eq!(merged.next_update_due, Some(datetime!(2024-04-10 0:00 UTC)));
        assert_eq!(merged.wp_theme.as_deref(), Some("divi"));
    }

    #[test]
    fn undated_row_over_undated_client_keeps_its_status() {
        let stored = NewSubscription {
            client_name: "Bakker".into(),
            ..Default::default()
        };
        let imported = NewSubscription {
            client_name: "Bakker".into(),
            update_status: UpdateStatus::Completed,
            ..Default::default()
        };
        let merged = imported.merged_over(&stored, datetime!(2024-03-15 0:00 UTC));
        assert_eq!(merged.next_update_due, None);
        assert_eq!(merged.update_status, UpdateStatus::Completed);
    }

    #[test]
    fn status_with_future_due_but_no_update_is_pending() {
        let now = datetime!(2024-05-15 12:00 UTC);
        let due = datetime!(2024-06-01 0:00 UTC);
        assert_eq!(derive_status(None, Some(due), now), UpdateStatus::Pending);
    }
}
