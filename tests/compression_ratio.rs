mod common;

use common::{bulky_event_at, test_hour};
use spectre_store::{Config, Reader};
use test_log::test;

#[test]
fn repetitive_payloads_compress_well() -> spectre_store::Result<()> {
    let folder = tempfile::tempdir()?;
    let hour = test_hour();

    let mut store = Config::new(folder.path()).open()?;

    for i in 0..250 {
        store.append(&bulky_event_at(hour, i, "Pod", "default"))?;
    }

    store.close()?;

    let reader = Reader::open(hour.path_in(folder.path()))?;
    let metadata = reader.metadata();

    assert_eq!(250, metadata.total_events);
    assert!(metadata.total_compressed_bytes > 0);

    // Repetitive K8s-style payloads should shrink to well under
    // a third of their size
    let ratio = metadata.compression_ratio();
    assert!(ratio <= 0.3, "compression ratio was {ratio}");
    assert!(ratio > 0.0);

    Ok(())
}
