mod common;

use common::{bulky_event_at, test_hour};
use spectre_store::{Config, Encoding, Filter, Reader, StopSignal, TimeRange};
use test_log::test;

#[test]
fn block_rotation_fills_multiple_blocks() -> spectre_store::Result<()> {
    let folder = tempfile::tempdir()?;
    let hour = test_hour();

    let mut store = Config::new(folder.path()).block_size(32 * 1_024).open()?;

    let kinds = ["Pod", "Deployment", "Service", "ConfigMap"];

    for i in 0..1_000 {
        let kind = kinds[(i / 250) as usize];
        store.append(&bulky_event_at(hour, i, kind, "default"))?;
    }

    store.close()?;

    let reader = Reader::open(hour.path_in(folder.path()))?;

    assert!(reader.block_count() >= 4, "expected at least 4 blocks");
    assert_eq!(1_000, reader.metadata().total_events);
    assert_eq!(Encoding::Json, reader.header().encoding);

    let total: u64 = reader.blocks().iter().map(|b| u64::from(b.event_count)).sum();
    assert_eq!(1_000, total);

    for block in reader.blocks() {
        assert!(block.ts_min <= block.ts_max);
        assert!(block.event_count >= 1);
        assert!(!block.kinds.is_empty());

        // Every kind a block advertises must be reachable through
        // its bloom filter, and must actually occur in its events
        let range = TimeRange::new(block.ts_min - 1, block.ts_max)?;

        for kind in &block.kinds {
            assert!(block.bloom_may_contain_any(std::slice::from_ref(kind)));
            assert!(kinds.contains(&kind.as_str()));
        }

        let in_block = reader.query(
            range,
            &Filter::new().kinds(block.kinds.clone()),
            &StopSignal::default(),
        )?;
        assert!(in_block.events.iter().all(|e| block.kinds.contains(&e.resource.kind)));
    }

    // The inverted index knows all four kinds
    let mut kinds_present = reader.kinds();
    kinds_present.sort_unstable();
    assert_eq!(vec!["ConfigMap", "Deployment", "Pod", "Service"], kinds_present);

    Ok(())
}
