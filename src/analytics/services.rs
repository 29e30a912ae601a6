use std::collections::HashMap;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::dto::{
    AnalyticsSummary, FrequencyCounts, RecentUpdate, StatusCounts, Timeframe, UserUpdates,
};
use crate::subscriptions::model::{Frequency, Subscription, UpdateStatus};

pub const UNKNOWN_USER: &str = "Onbekende gebruiker";
pub const RECENT_LIMIT: usize = 10;

impl Timeframe {
    pub fn window(&self) -> Duration {
        match self {
            Timeframe::Week => Duration::days(7),
            Timeframe::Month => Duration::days(30),
            Timeframe::Year => Duration::days(365),
        }
    }
}

/// Users that appear as `updated_by`, for the display-name lookup.
pub fn updater_ids(subs: &[Subscription]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = subs.iter().filter_map(|s| s.updated_by).collect();
    ids.sort();
    ids.dedup();
    ids
}

fn label(names: &HashMap<Uuid, String>, user_id: Uuid) -> String {
    names
        .get(&user_id)
        .filter(|n| !n.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| UNKNOWN_USER.to_string())
}

pub fn summarize(
    mut subs: Vec<Subscription>,
    names: &HashMap<Uuid, String>,
    timeframe: Timeframe,
    now: OffsetDateTime,
) -> AnalyticsSummary {
    for sub in subs.iter_mut() {
        sub.refresh_status(now);
    }

    let mut status = StatusCounts::default();
    let mut frequency = FrequencyCounts::default();
    let mut per_user: HashMap<Uuid, usize> = HashMap::new();
    let since = now - timeframe.window();
    let mut updates_in_timeframe = 0;

    for sub in &subs {
        match sub.update_status {
            UpdateStatus::Completed => status.completed += 1,
            UpdateStatus::Pending => status.pending += 1,
            UpdateStatus::Overdue => status.overdue += 1,
        }
        match sub.frequency {
            Frequency::Monthly => frequency.monthly += 1,
            Frequency::Quarterly => frequency.quarterly += 1,
            Frequency::Yearly => frequency.yearly += 1,
        }
        if sub.last_update.is_some_and(|at| at >= since && at <= now) {
            updates_in_timeframe += 1;
        }
        if let Some(user) = sub.updated_by {
            *per_user.entry(user).or_default() += 1;
        }
    }

    let mut updates_by_user: Vec<UserUpdates> = per_user
        .into_iter()
        .map(|(user_id, updates)| UserUpdates {
            user_id,
            display_name: label(names, user_id),
            updates,
        })
        .collect();
    updates_by_user.sort_by(|a, b| {
        b.updates
            .cmp(&a.updates)
            .then_with(|| a.display_name.cmp(&b.display_name))
    });

    let mut updated: Vec<&Subscription> = subs.iter().filter(|s| s.last_update.is_some()).collect();
    updated.sort_by(|a, b| b.last_update.cmp(&a.last_update));
    let recent_updates = updated
        .iter()
        .take(RECENT_LIMIT)
        .filter_map(|s| {
            Some(RecentUpdate {
                id: s.id,
                client_name: s.client_name.clone(),
                last_update: s.last_update?,
                updated_by: s.updated_by.map(|u| label(names, u)),
            })
        })
        .collect();

    AnalyticsSummary {
        timeframe,
        total_clients: subs.len(),
        clients_with_update: updated.len(),
        status,
        frequency,
        updates_in_timeframe,
        updates_by_user,
        recent_updates,
    }
}
