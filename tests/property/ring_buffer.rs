//! Ring-buffer retention properties of the record store.

use logrelay::record::{LogRecord, Severity};
use logrelay::store::{LogFilter, LogStore};
use proptest::prelude::*;

fn severity() -> impl Strategy<Value = Severity> {
    prop::sample::select(Severity::ALL.to_vec())
}

proptest! {
    /// Any append sequence leaves exactly the last `capacity` records, in order.
    #[test]
    fn retains_last_capacity_in_order(capacity in 1usize..40, count in 0usize..150) {
        let store = LogStore::new(capacity);
        for i in 0..count {
            store.append(LogRecord::new("pkg", "T", i.to_string(), Severity::Info, i as u64, 64));
        }

        let kept: Vec<String> = store.snapshot().iter().map(|r| r.message().to_string()).collect();
        let expected: Vec<String> = (count.saturating_sub(capacity)..count).map(|i| i.to_string()).collect();
        prop_assert_eq!(kept, expected);
        prop_assert!(store.len() <= capacity);
        prop_assert_eq!(store.total_appended(), count as u64);
    }

    /// A severity query is the ordered subsequence of the snapshot at or above the floor.
    #[test]
    fn severity_query_is_an_ordered_subsequence(
        severities in prop::collection::vec(severity(), 0..80),
        floor in severity(),
    ) {
        let store = LogStore::new(50);
        for (i, sev) in severities.iter().enumerate() {
            store.append(LogRecord::new("pkg", "T", i.to_string(), *sev, i as u64, 64));
        }

        let queried: Vec<String> = store
            .query(&LogFilter::new().min_severity(floor))
            .iter()
            .map(|r| r.message().to_string())
            .collect();
        let expected: Vec<String> = store
            .snapshot()
            .iter()
            .filter(|r| r.severity() >= floor)
            .map(|r| r.message().to_string())
            .collect();
        prop_assert_eq!(queried, expected);
    }
}
