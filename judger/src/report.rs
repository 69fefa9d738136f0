//! The finalize handshake with the game server: send `'F'`, block for the
//! reply, parse it, and print the score the way the original did.

use std::os::fd::RawFd;

use anyhow::{ensure, Context, Result};
use nix::unistd::{read, write};

use minesweeper_proto::commands;

/// The parsed `"status N K cnt_safe_open cnt_mine_open"` summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub status: i64,
    pub n: u64,
    pub k: u64,
    pub cnt_safe_open: u64,
    pub cnt_mine_open: u64,
}

impl Summary {
    fn parse(line: &str) -> Result<Summary> {
        let mut parts = line.split_whitespace();
        let mut next = |what: &'static str| -> Result<&str> {
            parts
                .next()
                .with_context(|| format!("summary line is missing its {what} field: {line:?}"))
        };

        let status = next("status")?.parse().context("parsing status")?;
        let n = next("N")?.parse().context("parsing N")?;
        let k = next("K")?.parse().context("parsing K")?;
        let cnt_safe_open = next("cnt_safe_open")?.parse().context("parsing cnt_safe_open")?;
        let cnt_mine_open = next("cnt_mine_open")?.parse().context("parsing cnt_mine_open")?;

        Ok(Summary { status, n, k, cnt_safe_open, cnt_mine_open })
    }

    /// Print the human-readable score to stderr, the same two percentages
    /// the original printed. The judger's own exit code never carries the
    /// game's outcome, only whether the harness itself hit a bug.
    pub fn report(&self) {
        let safe_total = self.n * self.n - self.k;
        let safe_pct = if safe_total == 0 {
            100.0
        } else {
            self.cnt_safe_open as f64 / safe_total as f64 * 100.0
        };
        let mine_pct = if self.k == 0 {
            0.0
        } else {
            self.cnt_mine_open as f64 / self.k as f64 * 100.0
        };
        eprintln!("Safe cells opened: {}/{} ({:.4}%)", self.cnt_safe_open, safe_total, safe_pct);
        eprintln!("Mines hit: {}/{} ({:.4}%)", self.cnt_mine_open, self.k, mine_pct);
    }
}

/// Send `'F'` to the game server and block until it answers. Called exactly
/// once per run, from whichever event first decides the game is over: the
/// player exiting, the time limit firing, or the server having already
/// reported a protocol violation on this same pipe.
pub fn request_summary(fd_to_gs: RawFd, fd_from_gs: RawFd) -> Result<Summary> {
    write(fd_to_gs, &[commands::FINALIZE]).context("writing 'F' to the game server")?;

    let mut buf = [0u8; 256];
    let n = read(fd_from_gs, &mut buf).context("reading the summary line from the game server")?;
    ensure!(
        n > 0,
        "game server closed its pipe without sending a summary; {}",
        minesweeper_proto::THIS_IS_A_BUG
    );

    let line = String::from_utf8_lossy(&buf[..n]).into_owned();
    Summary::parse(line.trim())
        .with_context(|| format!("parsing summary line {line:?}; {}", minesweeper_proto::THIS_IS_A_BUG))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_summary_line() {
        let summary = Summary::parse("0 8 3 61 1").expect("parse");
        assert_eq!(summary, Summary { status: 0, n: 8, k: 3, cnt_safe_open: 61, cnt_mine_open: 1 });
    }

    #[test]
    fn rejects_a_truncated_summary_line() {
        let err = Summary::parse("0 8 3").unwrap_err();
        assert!(format!("{err:#}").contains("cnt_safe_open"));
    }

    #[test]
    fn rejects_a_non_numeric_field() {
        let err = Summary::parse("0 8 3 sixty one 1").unwrap_err();
        assert!(format!("{err:#}").contains("parsing cnt_safe_open"));
    }
}
