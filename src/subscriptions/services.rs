use std::cmp::Ordering;

use time::OffsetDateTime;
use uuid::Uuid;

use super::cycle::{derive_status, next_due};
use super::dto::{CreateSubscriptionRequest, ListQuery, SaveSubscriptionRequest, SortDirection, SortField};
use super::model::{NewSubscription, Subscription};

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Builds the insert payload for a manually created record.
pub fn new_from_request(req: CreateSubscriptionRequest, now: OffsetDateTime) -> NewSubscription {
    let next_update_due = req
        .last_update
        .map(|last| next_due(req.frequency, Some(last), now));
    NewSubscription {
        client_name: req.client_name.trim().to_string(),
        frequency: req.frequency,
        wp_theme: clean(req.wp_theme),
        php_version: clean(req.php_version),
        ga4_status: req.ga4_status,
        analytics_check: req.analytics_check,
        last_update: req.last_update,
        next_update_due,
        update_status: derive_status(req.last_update, next_update_due, now),
        comments: clean(req.comments),
    }
}

/// Applies an edit-form save to the stored record.
///
/// Saving completes the current cycle (`last_update = now`, due date
/// recomputed, status `completed`) unless the only change was to the
/// hosting or database credentials. Comment audit fields move only when
/// the comment text changed.
pub fn apply_edit(
    existing: &Subscription,
    edit: SaveSubscriptionRequest,
    actor: Uuid,
    now: OffsetDateTime,
) -> Subscription {
    let comments = clean(edit.comments);
    let wp_theme = clean(edit.wp_theme);
    let php_version = clean(edit.php_version);
    let client_name = edit.client_name.trim().to_string();

    let comments_changed = comments != existing.comments;
    let general_changed = comments_changed
        || client_name != existing.client_name
        || edit.frequency != existing.frequency
        || wp_theme != existing.wp_theme
        || php_version != existing.php_version
        || edit.ga4_status != existing.ga4_status
        || edit.analytics_check != existing.analytics_check;
    let credentials_changed = edit.hosting_details != existing.hosting_details
        || edit.database_details != existing.database_details;

    let mut next = existing.clone();
    next.client_name = client_name;
    next.frequency = edit.frequency;
    next.wp_theme = wp_theme;
    next.php_version = php_version;
    next.ga4_status = edit.ga4_status;
    next.analytics_check = edit.analytics_check;
    next.comments = comments;
    next.hosting_details = edit.hosting_details;
    next.database_details = edit.database_details;

    if comments_changed {
        next.comment_updated_at = Some(now);
        next.comment_updated_by = Some(actor);
    }

    if credentials_changed && !general_changed {
        return next;
    }

    next.complete_cycle(now);
    next.updated_by = Some(actor);
    next
}

fn matches_search(sub: &Subscription, needle: &str) -> bool {
    let contains = |s: &str| s.to_lowercase().contains(needle);
    contains(&sub.client_name)
        || contains(sub.frequency.as_str())
        || sub.wp_theme.as_deref().is_some_and(contains)
        || sub.php_version.as_deref().is_some_and(contains)
        || contains(sub.ga4_status.as_str())
}

fn compare_text(a: Option<&str>, b: Option<&str>) -> Ordering {
    a.unwrap_or("").to_lowercase().cmp(&b.unwrap_or("").to_lowercase())
}

fn compare(a: &Subscription, b: &Subscription, field: SortField) -> Ordering {
    match field {
        SortField::ClientName => compare_text(Some(&a.client_name), Some(&b.client_name)),
        SortField::Frequency => a.frequency.as_str().cmp(b.frequency.as_str()),
        SortField::WpTheme => compare_text(a.wp_theme.as_deref(), b.wp_theme.as_deref()),
        SortField::PhpVersion => compare_text(a.php_version.as_deref(), b.php_version.as_deref()),
        SortField::Ga4Status => a.ga4_status.as_str().cmp(b.ga4_status.as_str()),
        SortField::LastUpdate => a.last_update.cmp(&b.last_update),
        SortField::NextUpdateDue => a.next_update_due.cmp(&b.next_update_due),
        SortField::UpdateStatus => a.update_status.as_str().cmp(b.update_status.as_str()),
    }
}

/// Search, filter and sort for the client table. Statuses are re-derived
/// against `now` before filtering so stale rows show up as overdue.
pub fn query_subscriptions(
    mut subs: Vec<Subscription>,
    query: &ListQuery,
    now: OffsetDateTime,
) -> Vec<Subscription> {
    for sub in subs.iter_mut() {
        sub.refresh_status(now);
    }

    let needle = query
        .q
        .as_deref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    subs.retain(|sub| {
        needle.as_deref().map_or(true, |n| matches_search(sub, n))
            && query.frequency.map_or(true, |f| sub.frequency == f)
            && query.status.map_or(true, |s| sub.update_status == s)
    });

    subs.sort_by(|a, b| {
        let ord = compare(a, b, query.sort);
        match query.dir {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    subs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::model::{
        DatabaseDetails, Frequency, Ga4Status, HostingDetails, UpdateStatus,
    };
    use time::macros::datetime;

    fn sub(name: &str) -> Subscription {
        let created = datetime!(2024-01-01 0:00 UTC);
        Subscription {
            id: Uuid::new_v4(),
            client_name: name.into(),
            frequency: Frequency::Monthly,
            wp_theme: Some("Divi".into()),
            php_version: Some("8.1".into()),
            ga4_status: Ga4Status::Yes,
            analytics_check: true,
            last_update: Some(datetime!(2024-03-01 0:00 UTC)),
            next_update_due: Some(datetime!(2024-04-01 0:00 UTC)),
            update_status: UpdateStatus::Completed,
            updated_by: None,
            comments: Some("ok".into()),
            comment_updated_at: None,
            comment_updated_by: None,
            hosting_details: None,
            database_details: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn form_from(s: &Subscription) -> SaveSubscriptionRequest {
        SaveSubscriptionRequest {
            client_name: s.client_name.clone(),
            frequency: s.frequency,
            wp_theme: s.wp_theme.clone(),
            php_version: s.php_version.clone(),
            ga4_status: s.ga4_status,
            analytics_check: s.analytics_check,
            comments: s.comments.clone(),
            hosting_details: s.hosting_details.clone(),
            database_details: s.database_details.clone(),
            expected_updated_at: None,
        }
    }

    #[test]
    fn plain_save_completes_the_cycle() {
        let now = datetime!(2024-05-20 9:00 UTC);
        let actor = Uuid::new_v4();
        let existing = sub("Acme BV");
        let mut form = form_from(&existing);
        form.frequency = Frequency::Quarterly;

        let saved = apply_edit(&existing, form, actor, now);
        assert_eq!(saved.last_update, Some(now));
        assert_eq!(saved.next_update_due, Some(datetime!(2024-08-20 9:00 UTC)));
        assert_eq!(saved.update_status, UpdateStatus::Completed);
        assert_eq!(saved.updated_by, Some(actor));
        assert_eq!(saved.comment_updated_at, None);
    }

    #[test]
    fn unchanged_save_still_counts_as_completion() {
        let now = datetime!(2024-05-20 9:00 UTC);
        let existing = sub("Acme BV");
        let saved = apply_edit(&existing, form_from(&existing), Uuid::new_v4(), now);
        assert_eq!(saved.last_update, Some(now));
    }

    #[test]
    fn credential_only_save_keeps_the_cycle() {
        let now = datetime!(2024-05-20 9:00 UTC);
        let existing = sub("Acme BV");
        let mut form = form_from(&existing);
        form.hosting_details = Some(HostingDetails {
            host: "ftp.acme.nl".into(),
            username: "acme".into(),
            password: "secret".into(),
            port: "21".into(),
        });
        form.database_details = Some(DatabaseDetails {
            host: "db.acme.nl".into(),
            database_name: "wp".into(),
            database_user: "wp".into(),
            password: "secret".into(),
        });

        let saved = apply_edit(&existing, form, Uuid::new_v4(), now);
        assert_eq!(saved.last_update, existing.last_update);
        assert_eq!(saved.next_update_due, existing.next_update_due);
        assert_eq!(saved.updated_by, None);
        assert!(saved.hosting_details.is_some());
        assert!(saved.database_details.is_some());
    }

    #[test]
    fn comment_change_stamps_audit_pair() {
        let now = datetime!(2024-05-20 9:00 UTC);
        let actor = Uuid::new_v4();
        let existing = sub("Acme BV");
        let mut form = form_from(&existing);
        form.comments = Some("  plugin conflict  ".into());

        let saved = apply_edit(&existing, form, actor, now);
        assert_eq!(saved.comments.as_deref(), Some("plugin conflict"));
        assert_eq!(saved.comment_updated_at, Some(now));
        assert_eq!(saved.comment_updated_by, Some(actor));
    }

    #[test]
    fn create_derives_due_date_and_status() {
        let now = datetime!(2024-05-20 9:00 UTC);
        let req = CreateSubscriptionRequest {
            client_name: "  Bakkerij Jansen ".into(),
            frequency: Frequency::Monthly,
            wp_theme: Some("".into()),
            php_version: None,
            ga4_status: Ga4Status::No,
            analytics_check: false,
            last_update: Some(datetime!(2024-05-10 0:00 UTC)),
            comments: None,
        };
        let new = new_from_request(req, now);
        assert_eq!(new.client_name, "Bakkerij Jansen");
        assert_eq!(new.wp_theme, None);
        assert_eq!(new.next_update_due, Some(datetime!(2024-06-10 0:00 UTC)));
        assert_eq!(new.update_status, UpdateStatus::Completed);
    }

    #[test]
    fn search_filter_and_sort() {
        let now = datetime!(2024-03-15 0:00 UTC);
        let mut a = sub("acme");
        a.wp_theme = Some("Astra".into());
        let mut b = sub("Zeeland Bouw");
        b.frequency = Frequency::Quarterly;
        let mut c = sub("Bakker");
        c.next_update_due = Some(datetime!(2024-02-01 0:00 UTC));

        let all = vec![a.clone(), b.clone(), c.clone()];

        let sorted = query_subscriptions(all.clone(), &ListQuery::default(), now);
        let names: Vec<_> = sorted.iter().map(|s| s.client_name.as_str()).collect();
        assert_eq!(names, ["acme", "Bakker", "Zeeland Bouw"]);

        let query = ListQuery {
            dir: SortDirection::Desc,
            ..Default::default()
        };
        let names: Vec<_> = query_subscriptions(all.clone(), &query, now)
            .into_iter()
            .map(|s| s.client_name)
            .collect();
        assert_eq!(names, ["Zeeland Bouw", "Bakker", "acme"]);

        let query = ListQuery {
            q: Some("ASTRA".into()),
            ..Default::default()
        };
        assert_eq!(query_subscriptions(all.clone(), &query, now).len(), 1);

        let query = ListQuery {
            frequency: Some(Frequency::Quarterly),
            ..Default::default()
        };
        assert_eq!(query_subscriptions(all.clone(), &query, now)[0].client_name, "Zeeland Bouw");

        let query = ListQuery {
            status: Some(UpdateStatus::Overdue),
            ..Default::default()
        };
        let overdue = query_subscriptions(all, &query, now);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].client_name, "Bakker");
    }
}
