mod common;

use common::{bulky_event_at, test_hour};
use spectre_store::{Config, Filter, Reader, StopSignal, TimeRange, WarningCode};
use std::io::{Seek, SeekFrom, Write};
use test_log::test;

#[test]
fn corrupt_block_is_skipped_with_warning() -> spectre_store::Result<()> {
    let folder = tempfile::tempdir()?;
    let hour = test_hour();

    let mut store = Config::new(folder.path()).block_size(32 * 1_024).open()?;

    for i in 0..100 {
        store.append(&bulky_event_at(hour, i, "Pod", "default"))?;
    }

    store.close()?;

    let path = hour.path_in(folder.path());

    let reader = Reader::open(&path)?;
    let block_count = reader.block_count();
    assert!(block_count >= 6, "expected several blocks");

    let victim = reader.blocks().get(4).expect("block 4 should exist");
    let victim_events = u64::from(victim.event_count);
    let total_events = reader.metadata().total_events;

    // Flip one byte in the middle of block 4's compressed payload
    {
        let mut file = std::fs::OpenOptions::new().read(true).write(true).open(&path)?;
        let header_size = spectre_store::format::BLOCK_HEADER_SIZE as u64;
        file.seek(SeekFrom::Start(
            victim.file_offset + header_size + u64::from(victim.compressed_length) / 2,
        ))?;

        let mut byte = [0u8];
        std::io::Read::read_exact(&mut file, &mut byte)?;
        byte[0] ^= 0xFF;

        file.seek(SeekFrom::Current(-1))?;
        file.write_all(&byte)?;
        file.sync_all()?;
    }

    let reader = Reader::open(&path)?;
    assert_eq!(1, reader.verify()?);

    let range = TimeRange::new(hour.start_ns(), hour.end_ns() - 1)?;
    let result = reader.query(range, &Filter::new(), &StopSignal::default())?;

    // Every block except the mangled one contributes its events
    assert_eq!(total_events - victim_events, result.events.len() as u64);

    let warning = result
        .warnings
        .iter()
        .find(|w| w.code == WarningCode::BlockCorrupt)
        .expect("should report the corrupt block");
    assert_eq!(Some(4), warning.block);

    Ok(())
}
