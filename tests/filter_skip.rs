mod common;

use common::{bulky_event_at, test_hour};
use spectre_store::{Config, Filter, Reader, StopSignal, TimeRange};
use test_log::test;

#[test]
fn selective_filter_skips_blocks() -> spectre_store::Result<()> {
    let folder = tempfile::tempdir()?;
    let hour = test_hour();

    let mut store = Config::new(folder.path()).block_size(32 * 1_024).open()?;

    let kinds = ["Pod", "Deployment", "Service"];
    let namespaces = ["default", "kube-system"];

    // 50 events per (kind, namespace) combination, written grouped,
    // so most blocks are homogeneous
    let mut offset = 0;
    for kind in kinds {
        for namespace in namespaces {
            for _ in 0..50 {
                store.append(&bulky_event_at(hour, offset, kind, namespace))?;
                offset += 1;
            }
        }
    }

    store.close()?;

    let reader = Reader::open(hour.path_in(folder.path()))?;
    assert!(reader.block_count() >= 12, "expected many small blocks");

    let store = Config::new(folder.path()).open()?;
    let range = TimeRange::new(hour.start_ns(), hour.end_ns() - 1)?;
    let filter = Filter::new().kind("Deployment").namespace("default");

    let result = store.query(range, &filter, &StopSignal::default())?;

    assert_eq!(50, result.stats.count);
    assert!(result
        .events
        .iter()
        .all(|e| e.resource.kind == "Deployment" && e.resource.namespace == "default"));

    assert!(result.stats.blocks_skipped > 0);

    // A selective query over a file with several kinds and namespaces
    // has to rule out at least half of the blocks
    let total = result.stats.blocks_scanned + result.stats.blocks_skipped;
    assert!(
        result.stats.blocks_skipped * 2 >= total,
        "skipped {} of {total}",
        result.stats.blocks_skipped
    );

    Ok(())
}

#[test]
fn unknown_token_yields_empty_result() -> spectre_store::Result<()> {
    let folder = tempfile::tempdir()?;
    let hour = test_hour();

    let mut store = Config::new(folder.path()).open()?;

    for i in 0..100 {
        store.append(&bulky_event_at(hour, i, "Pod", "default"))?;
    }

    store.close()?;

    let store = Config::new(folder.path()).open()?;
    let range = TimeRange::new(hour.start_ns(), hour.end_ns() - 1)?;

    let result = store.query(
        range,
        &Filter::new().kind("DoesNotExist"),
        &StopSignal::default(),
    )?;

    assert_eq!(0, result.stats.count);
    assert_eq!(0, result.stats.blocks_scanned);

    Ok(())
}

#[test]
fn skipping_is_sound() -> spectre_store::Result<()> {
    let folder = tempfile::tempdir()?;
    let hour = test_hour();

    let mut store = Config::new(folder.path()).block_size(32 * 1_024).open()?;

    let kinds = ["Pod", "Deployment", "Service", "ConfigMap"];
    let namespaces = ["default", "kube-system", "monitoring"];

    for i in 0..600 {
        let kind = kinds[(i % 4) as usize];
        let namespace = namespaces[(i % 3) as usize];
        store.append(&bulky_event_at(hour, i, kind, namespace))?;
    }

    store.close()?;

    let store = Config::new(folder.path()).open()?;
    let range = TimeRange::new(hour.start_ns(), hour.end_ns() - 1)?;
    let signal = StopSignal::default();

    let everything = store.query(range, &Filter::new(), &signal)?;
    assert_eq!(600, everything.stats.count);

    // The filtered query must return exactly the unfiltered result
    // run through the same predicate - skipped blocks may not hide
    // any matches
    for filter in [
        Filter::new().kind("Pod"),
        Filter::new().namespace("monitoring"),
        Filter::new().kinds(["Deployment", "Service"]).namespace("default"),
        Filter::new().kind("ConfigMap").namespace("kube-system"),
    ] {
        let filtered = store.query(range, &filter, &signal)?;

        let expected: Vec<_> = everything
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .map(|e| e.id.clone())
            .collect();

        let got: Vec<_> = filtered.events.iter().map(|e| e.id.clone()).collect();

        assert_eq!(expected, got);
    }

    Ok(())
}
