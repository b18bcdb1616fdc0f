use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Per-organization daily task counter, reset on UTC-day rollover
#[derive(Debug, Default)]
pub struct DailyQuota {
    counts: Mutex<HashMap<String, (NaiveDate, u32)>>,
}

impl DailyQuota {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks already counted for `org_id` on the UTC day of `now`
    pub fn used(&self, org_id: &str, now: DateTime<Utc>) -> u32 {
        let today = now.date_naive();
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        match counts.get(org_id) {
            Some((day, count)) if *day == today => *count,
            _ => 0,
        }
    }

    /// Tasks still allowed today under `cap`
    pub fn remaining(&self, org_id: &str, cap: u32, now: DateTime<Utc>) -> u32 {
        cap.saturating_sub(self.used(org_id, now))
    }

    /// Returns true if the org has used its whole cap for today
    pub fn is_exhausted(&self, org_id: &str, cap: u32, now: DateTime<Utc>) -> bool {
        self.remaining(org_id, cap, now) == 0
    }

    /// Adds `n` to today's count, starting a fresh count on a new UTC day
    pub fn record(&self, org_id: &str, n: u32, now: DateTime<Utc>) {
        let today = now.date_naive();
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = counts.entry(org_id.to_string()).or_insert((today, 0));
        if entry.0 != today {
            *entry = (today, 0);
        }
        entry.1 = entry.1.saturating_add(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_counts_accumulate_within_day() {
        let quota = DailyQuota::new();
        quota.record("org-1", 3, at(10, 1));
        quota.record("org-1", 2, at(10, 23));

        assert_eq!(quota.used("org-1", at(10, 23)), 5);
        assert_eq!(quota.remaining("org-1", 8, at(10, 23)), 3);
        assert_eq!(quota.used("org-2", at(10, 23)), 0);
    }

    #[test]
    fn test_resets_on_utc_rollover() {
        let quota = DailyQuota::new();
        quota.record("org-1", 10, at(10, 23));
        assert!(quota.is_exhausted("org-1", 10, at(10, 23)));

        assert_eq!(quota.used("org-1", at(11, 0)), 0);
        assert!(!quota.is_exhausted("org-1", 10, at(11, 0)));

        quota.record("org-1", 1, at(11, 0));
        assert_eq!(quota.used("org-1", at(11, 5)), 1);
    }
}
