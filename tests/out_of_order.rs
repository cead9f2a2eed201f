mod common;

use common::{bulky_event_at, test_hour};
use rand::seq::SliceRandom;
use spectre_store::{Config, Filter, StopSignal, TimeRange};
use test_log::test;

#[test]
fn out_of_order_events_query_in_order() -> spectre_store::Result<()> {
    let folder = tempfile::tempdir()?;
    let hour = test_hour();

    let mut offsets: Vec<i64> = (0..400).collect();
    offsets.shuffle(&mut rand::rng());

    let mut store = Config::new(folder.path()).block_size(32 * 1_024).open()?;

    // Producers deliver out of order, so adjacent blocks overlap
    // in time
    for offset in &offsets {
        store.append(&bulky_event_at(hour, *offset, "Pod", "default"))?;
    }

    store.close()?;

    let store = Config::new(folder.path()).open()?;
    let signal = StopSignal::default();

    let range = TimeRange::new(hour.start_ns(), hour.end_ns() - 1)?;
    let result = store.query(range, &Filter::new(), &signal)?;

    assert_eq!(400, result.stats.count);

    let timestamps: Vec<i64> = result.events.iter().map(|e| e.timestamp).collect();
    assert!(timestamps.is_sorted());

    // A narrow sub-range crossing block boundaries must not lose
    // events to the sparse index
    let range = TimeRange::new(
        hour.start_ns() + 100 * 1_000_000,
        hour.start_ns() + 199 * 1_000_000,
    )?;
    let result = store.query(range, &Filter::new(), &signal)?;

    assert_eq!(100, result.stats.count);
    for (i, event) in result.events.iter().enumerate() {
        assert_eq!(hour.start_ns() + (100 + i as i64) * 1_000_000, event.timestamp);
    }

    Ok(())
}
