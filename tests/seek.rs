//! Seeking and last-event positioning.

mod common;

use tempfile::TempDir;

use ctftrace::{open_trace, ReadStatus, ReaderOptions};

use common::{standard_metadata, write_trace, EventSpec, PacketSpec};

/// A three-packet stream with events every 100 cycles from 0 to 2900.
fn build_trace(dir: &TempDir) {
    let mut packets = Vec::new();
    for p in 0..3u64 {
        let base = p * 1000;
        let mut packet = PacketSpec::new(0, 0, base, base + 900);
        packet.events = (0..10)
            .map(|i| EventSpec::Alpha {
                ts: base + i * 100,
                value: (p * 10 + i) as u32,
            })
            .collect();
        packets.push(packet);
    }
    write_trace(
        dir.path(),
        &standard_metadata("le"),
        &[("stream_0", packets)],
        true,
    );
}

#[test]
fn test_seek_lands_at_or_past_target() {
    let dir = TempDir::new().unwrap();
    build_trace(&dir);
    let trace = ctftrace::load_metadata(dir.path()).unwrap();
    let mut reader = open_trace(&trace, dir.path(), ReaderOptions::default()).unwrap();

    for target in [0, 1, 99, 100, 1050, 1500, 2899, 2900] {
        reader.seek(target).unwrap();
        let event = reader.current_event().unwrap_or_else(|| {
            panic!("no event at or past {target}")
        });
        assert!(
            event.timestamp >= target,
            "seek({target}) landed at {}",
            event.timestamp
        );
        // And it is the first such event: a 100-cycle grid.
        assert_eq!(event.timestamp, target.div_ceil(100) * 100);
    }
}

#[test]
fn test_seek_into_later_packet_counts_skipped() {
    let dir = TempDir::new().unwrap();
    build_trace(&dir);
    let trace = ctftrace::load_metadata(dir.path()).unwrap();
    let mut reader = open_trace(&trace, dir.path(), ReaderOptions::default()).unwrap();

    // 2050 lives in the third packet; the packet index search means only
    // that packet's leading events are scanned, not the 20 before it.
    let skipped = reader.seek(2050).unwrap();
    assert_eq!(reader.current_event().unwrap().timestamp, 2100);
    assert!(skipped <= 1, "scanned {skipped} events, index search failed");
}

#[test]
fn test_seek_past_end_reports_finish() {
    let dir = TempDir::new().unwrap();
    build_trace(&dir);
    let trace = ctftrace::load_metadata(dir.path()).unwrap();
    let mut reader = open_trace(&trace, dir.path(), ReaderOptions::default()).unwrap();

    reader.seek(1_000_000).unwrap();
    assert!(reader.current_event().is_none());
    assert_eq!(reader.advance().unwrap(), ReadStatus::Finish);
}

#[test]
fn test_go_to_last_event_matches_exhaustive_advance() {
    let dir = TempDir::new().unwrap();
    build_trace(&dir);
    let trace = ctftrace::load_metadata(dir.path()).unwrap();

    // Exhaustively advance one reader to find the true last event.
    let mut walker = open_trace(&trace, dir.path(), ReaderOptions::default()).unwrap();
    let mut last_seen = None;
    while let Some(event) = walker.current_event() {
        last_seen = Some((event.name().to_string(), event.timestamp));
        if walker.advance().unwrap() != ReadStatus::EventRead {
            break;
        }
    }

    // seek(0) then go_to_last_event must land on the same event.
    let mut jumper = open_trace(&trace, dir.path(), ReaderOptions::default()).unwrap();
    jumper.seek(0).unwrap();
    jumper.go_to_last_event().unwrap();
    let event = jumper.current_event().unwrap();
    assert_eq!(
        Some((event.name().to_string(), event.timestamp)),
        last_seen
    );
    assert_eq!(event.timestamp, 2900);
}

#[test]
fn test_seek_then_advance_resumes_in_order() {
    let dir = TempDir::new().unwrap();
    build_trace(&dir);
    let trace = ctftrace::load_metadata(dir.path()).unwrap();
    let mut reader = open_trace(&trace, dir.path(), ReaderOptions::default()).unwrap();

    reader.seek(1450).unwrap();
    let mut timestamps = Vec::new();
    while let Some(event) = reader.current_event() {
        timestamps.push(event.timestamp);
        if reader.advance().unwrap() != ReadStatus::EventRead {
            break;
        }
    }
    let expected: Vec<u64> = (15..30).map(|i| i * 100).collect();
    assert_eq!(timestamps, expected);
}

#[test]
fn test_multi_stream_seek() {
    let dir = TempDir::new().unwrap();
    let mut a = PacketSpec::new(0, 0, 0, 900);
    a.events = (0..10)
        .map(|i| EventSpec::Alpha {
            ts: i * 100,
            value: i as u32,
        })
        .collect();
    let mut b = PacketSpec::new(0, 1, 50, 950);
    b.events = (0..10)
        .map(|i| EventSpec::Alpha {
            ts: 50 + i * 100,
            value: 100 + i as u32,
        })
        .collect();
    write_trace(
        dir.path(),
        &standard_metadata("le"),
        &[("cpu_a", vec![a]), ("cpu_b", vec![b])],
        true,
    );

    let trace = ctftrace::load_metadata(dir.path()).unwrap();
    let mut reader = open_trace(&trace, dir.path(), ReaderOptions::default()).unwrap();

    reader.seek(420).unwrap();
    let mut timestamps = Vec::new();
    while let Some(event) = reader.current_event() {
        timestamps.push(event.timestamp);
        if reader.advance().unwrap() != ReadStatus::EventRead {
            break;
        }
    }
    // Both streams resume at their first event >= 420, merged in order.
    assert_eq!(timestamps, vec![450, 500, 550, 600, 650, 700, 750, 800, 850, 900, 950]);
}
