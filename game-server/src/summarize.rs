//! Post-game parallel popcount producing the player's score: how many safe
//! cells were opened, and how many mines were opened.

use minesweeper_map::Board;

/// Number of summarizer threads. The board's byte length must split evenly
/// into this many contiguous ranges — guaranteed for any power-of-two side
/// length `>= 8`, which the map format already requires.
pub const NUM_SUMMARIZE: usize = 8;

pub struct Summary {
    pub cnt_safe_open: u64,
    pub cnt_mine_open: u64,
}

/// Count, over byte-aligned pairwise `is_mine`/`is_open`:
/// - `cnt_safe_open = popcount(not is_mine and is_open)`
/// - `cnt_mine_open = popcount(is_mine and is_open)`
///
/// Partitions the byte range across [`NUM_SUMMARIZE`] threads via
/// `std::thread::scope`, each handling one contiguous slice.
pub fn summarize(board: &Board) -> Summary {
    let is_mine = board.is_mine_board();
    let is_open = board.is_open_board();
    let total_bytes = is_mine.byte_len();
    assert_eq!(
        total_bytes % NUM_SUMMARIZE,
        0,
        "board byte length must split evenly across summarizer partitions"
    );
    let chunk = total_bytes / NUM_SUMMARIZE;

    let partials: Vec<(u64, u64)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..NUM_SUMMARIZE)
            .map(|i| {
                let start = i * chunk;
                let end = start + chunk;
                scope.spawn(move || {
                    let mut safe_open = 0u64;
                    let mut mine_open = 0u64;
                    for byte_index in start..end {
                        let mine_byte = is_mine.load_byte(byte_index);
                        let open_byte = is_open.load_byte(byte_index);
                        safe_open += (!mine_byte & open_byte).count_ones() as u64;
                        mine_open += (mine_byte & open_byte).count_ones() as u64;
                    }
                    (safe_open, mine_open)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("summarizer thread panicked")).collect()
    });

    let (cnt_safe_open, cnt_mine_open) = partials
        .into_iter()
        .fold((0u64, 0u64), |(sa, ma), (s, m)| (sa + s, ma + m));

    Summary { cnt_safe_open, cnt_mine_open }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minesweeper_map::BitBoard;

    #[test]
    fn counts_split_correctly_between_safe_and_mine_opens() {
        let n = 8;
        let is_mine = BitBoard::zeroed((n * n) as usize);
        is_mine.set(0);
        is_mine.set(5);
        let board = Board::new(n, is_mine);

        board.set_open(0, 0); // mine, open
        board.set_open(0, 1); // safe, open
        board.set_open(1, 0); // safe, open
        // (0,5) mine stays closed

        let summary = summarize(&board);
        assert_eq!(summary.cnt_mine_open, 1);
        assert_eq!(summary.cnt_safe_open, 2);
    }

    #[test]
    fn all_closed_board_summarizes_to_zero() {
        let n = 8;
        let board = Board::new(n, BitBoard::zeroed((n * n) as usize));
        let summary = summarize(&board);
        assert_eq!(summary.cnt_safe_open, 0);
        assert_eq!(summary.cnt_mine_open, 0);
    }
}
