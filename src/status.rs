//! Run status publishing: one named-counter record per run, keyed by nid.

use crate::store::CatalogStore;
use chrono::{NaiveDate, Utc};

/// Night identifier: whole days since 2017-01-01.
pub fn nid_now() -> i64 {
    nid_for(Utc::now().date_naive())
}

pub fn nid_for(date: NaiveDate) -> i64 {
    let base = NaiveDate::from_ymd_opt(2017, 1, 1).expect("valid base date");
    (date - base).num_days()
}

pub struct StatusPublisher<'a> {
    store: &'a CatalogStore,
}

impl<'a> StatusPublisher<'a> {
    pub fn new(store: &'a CatalogStore) -> Self {
        Self { store }
    }

    /// Accumulate counters onto whatever this nid already holds.
    pub fn add(&self, counters: &[(&str, i64)], nid: i64) -> rusqlite::Result<()> {
        self.store.add_run_counters(counters, nid)
    }

    /// Overwrite a single counter for this nid.
    pub fn set(&self, name: &str, value: i64, nid: i64) -> rusqlite::Result<()> {
        self.store.set_run_counter(name, value, nid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nid_epoch() {
        let base = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();
        assert_eq!(nid_for(base), 0);
        assert_eq!(nid_for(NaiveDate::from_ymd_opt(2017, 1, 31).unwrap()), 30);
    }
}
