use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;

use relay_core::UsageRecord;

/// Retention window for per-day fingerprint sets.
pub const RETENTION_DAYS: i64 = 30;

/// In-memory form of the dedup index: one hash set per UTC day, giving O(1)
/// membership and insert. The serialized form in the scan state is a day →
/// fingerprint-list map; insertion order does not survive a reload.
#[derive(Debug, Default)]
pub struct DedupIndex {
    days: HashMap<String, HashSet<String>>,
}

impl DedupIndex {
    pub fn from_serialized(serialized: &BTreeMap<String, Vec<String>>) -> Self {
        let days = serialized
            .iter()
            .map(|(day, hashes)| (day.clone(), hashes.iter().cloned().collect()))
            .collect();
        Self { days }
    }

    pub fn contains(&self, day_key: &str, fingerprint: &str) -> bool {
        self.days
            .get(day_key)
            .is_some_and(|hashes| hashes.contains(fingerprint))
    }

    pub fn insert(&mut self, record: &UsageRecord) {
        self.days
            .entry(record.day_key())
            .or_default()
            .insert(record.fingerprint.clone());
    }

    /// Drop every day strictly older than the retention window, counted back
    /// from `today`. Unparseable day keys are dropped with them.
    pub fn prune(&mut self, today: NaiveDate) {
        let cutoff = today - chrono::Duration::days(RETENTION_DAYS);
        self.days.retain(|day, _| {
            NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map(|date| date >= cutoff)
                .unwrap_or(false)
        });
    }

    pub fn to_serialized(&self) -> BTreeMap<String, Vec<String>> {
        self.days
            .iter()
            .map(|(day, hashes)| {
                let mut list: Vec<String> = hashes.iter().cloned().collect();
                list.sort();
                (day.clone(), list)
            })
            .collect()
    }

    pub fn fingerprint_count(&self) -> usize {
        self.days.values().map(HashSet::len).sum()
    }
}
