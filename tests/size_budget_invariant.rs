//! Property-style coverage for spec.md §8's size-budget invariant: after a
//! series of writes where each write is `w <= maxBytes`, every closed file's
//! size falls in `[maxBytes, 2*maxBytes)` except possibly the last one.

use std::fs;
use std::thread;
use std::time::Duration;

use rand::Rng;
use rollsink::RollingFileSinkBuilder;
use tempfile::TempDir;

#[test]
fn closed_files_stay_within_the_size_budget() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("log").to_string_lossy().into_owned();
    let max_bytes: u64 = 200;

    let (sink, guard, _events) = RollingFileSinkBuilder::new(&base)
        .size(format!("{max_bytes}b"))
        .build()
        .unwrap();

    let mut rng = rand::rng();
    for _ in 0..200 {
        let len = rng.random_range(1..=max_bytes as usize);
        let record: Vec<u8> = (0..len).map(|_| b'x').collect();
        sink.write(record).unwrap();
    }
    thread::sleep(Duration::from_millis(50));
    drop(guard);

    let mut rotated: Vec<(u32, u64)> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let number: u32 = name
                .strip_prefix("log.")?
                .strip_suffix(".log")?
                .parse()
                .ok()?;
            let size = e.metadata().ok()?.len();
            Some((number, size))
        })
        .collect();
    rotated.sort_by_key(|(n, _)| *n);

    assert!(rotated.len() > 1, "expected at least one rotation to occur");

    let (last_number, _) = *rotated.last().unwrap();
    for (number, size) in &rotated {
        if *number == last_number {
            assert!(*size <= 2 * max_bytes, "active file grew unexpectedly: {size}");
        } else {
            assert!(
                (max_bytes..2 * max_bytes).contains(size),
                "closed file {number} had size {size}, outside [{max_bytes}, {})",
                2 * max_bytes
            );
        }
    }
}
