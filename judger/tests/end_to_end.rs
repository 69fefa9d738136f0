//! Full-process integration test: run the real `judger` binary, which forks
//! the real `game-server` and the `naive-player` fixture against a
//! synthesized all-zero board, and check the score the judger reports.

use std::path::PathBuf;
use std::process::Command;

use minesweeper_map::{write_map_file, BitBoard};

/// Binaries from other workspace members land in the same `target/<profile>`
/// directory as this crate's own binary; `CARGO_BIN_EXE_*` is only defined
/// for binaries belonging to this package, so sibling binaries are located
/// relative to it instead.
fn sibling_bin(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_judger")).with_file_name(name)
}

#[test]
fn all_zero_eight_by_eight_opens_every_safe_cell() {
    let dir = tempfile::tempdir().expect("tempdir");
    let map_path = dir.path().join("map.bin");
    let file = std::fs::File::create(&map_path).expect("create map file");
    write_map_file(file, 8, 0, &BitBoard::zeroed(64)).expect("write map file");

    let output = Command::new(env!("CARGO_BIN_EXE_judger"))
        .arg(sibling_bin("naive-player"))
        .arg(&map_path)
        .arg("10") // time_limit_seconds; the fixture player finishes in well under a second
        .arg(sibling_bin("game-server"))
        .output()
        .expect("run judger");

    assert!(
        output.status.success(),
        "judger exited with {:?}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Safe cells opened: 64/64"),
        "unexpected judger summary:\n{stderr}"
    );
    assert!(stderr.contains("Mines hit: 0/0"), "unexpected judger summary:\n{stderr}");
}

#[test]
fn a_single_mine_is_scored_and_never_crashes_the_harness() {
    let dir = tempfile::tempdir().expect("tempdir");
    let map_path = dir.path().join("map.bin");
    let board = BitBoard::zeroed(64);
    board.set(0); // mine at (0, 0)
    let file = std::fs::File::create(&map_path).expect("create map file");
    write_map_file(file, 8, 1, &board).expect("write map file");

    let output = Command::new(env!("CARGO_BIN_EXE_judger"))
        .arg(sibling_bin("naive-player"))
        .arg(&map_path)
        .arg("10")
        .arg(sibling_bin("game-server"))
        .output()
        .expect("run judger");

    assert!(
        output.status.success(),
        "judger exited with {:?}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Safe cells opened: 63/63"), "unexpected judger summary:\n{stderr}");
    assert!(stderr.contains("Mines hit: 1/1"), "unexpected judger summary:\n{stderr}");
}
