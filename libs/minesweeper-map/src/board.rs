//! The process-global ground-truth and opened-cell maps, plus the neighbour
//! counting used both by the expand engine and by the result returned to the
//! player.

use crate::bitboard::BitBoard;

/// `is_mine` and `is_open` for an `n x n` board, sharing one coordinate
/// system. Built once by the game server at startup and referenced by every
/// worker thread for the lifetime of the process.
pub struct Board {
    n: u32,
    is_mine: BitBoard,
    is_open: BitBoard,
}

impl Board {
    pub fn new(n: u32, is_mine: BitBoard) -> Self {
        assert_eq!(is_mine.len_bits(), (n as usize) * (n as usize));
        let is_open = BitBoard::zeroed(is_mine.len_bits());
        Board { n, is_mine, is_open }
    }

    pub fn side_len(&self) -> u32 {
        self.n
    }

    #[inline]
    pub fn index(&self, r: u32, c: u32) -> usize {
        (r as usize) * (self.n as usize) + (c as usize)
    }

    #[inline]
    pub fn in_bounds(&self, r: i64, c: i64) -> bool {
        r >= 0 && c >= 0 && r < self.n as i64 && c < self.n as i64
    }

    #[inline]
    pub fn is_mine(&self, r: u32, c: u32) -> bool {
        self.is_mine.get(self.index(r, c))
    }

    #[inline]
    pub fn is_open(&self, r: u32, c: u32) -> bool {
        self.is_open.get(self.index(r, c))
    }

    /// Atomically mark `(r, c)` revealed. Safe to call concurrently from any
    /// number of workers, including on the same cell.
    #[inline]
    pub fn set_open(&self, r: u32, c: u32) {
        self.is_open.set(self.index(r, c));
    }

    pub fn is_mine_board(&self) -> &BitBoard {
        &self.is_mine
    }

    pub fn is_open_board(&self) -> &BitBoard {
        &self.is_open
    }

    /// Number of mines adjacent to `(r, c)` among the 8 neighbours, treating
    /// out-of-range neighbours as absent (0 contribution).
    pub fn adj_mine(&self, r: u32, c: u32) -> u16 {
        let mut count = 0u16;
        let (r, c) = (r as i64, c as i64);
        for dr in -1i64..=1 {
            for dc in -1i64..=1 {
                if dr == 0 && dc == 0 {
                    continue;
                }
                let (nr, nc) = (r + dr, c + dc);
                if self.in_bounds(nr, nc) && self.is_mine(nr as u32, nc as u32) {
                    count += 1;
                }
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with_mine_at(n: u32, mine_r: u32, mine_c: u32) -> Board {
        let is_mine = BitBoard::zeroed((n * n) as usize);
        is_mine.set((mine_r * n + mine_c) as usize);
        Board::new(n, is_mine)
    }

    #[test]
    fn corner_cell_has_fewer_than_eight_neighbours() {
        let board = board_with_mine_at(4, 0, 1);
        // (0,0) has 3 in-bounds neighbours: (0,1) [mine], (1,0), (1,1)
        assert_eq!(board.adj_mine(0, 0), 1);
    }

    #[test]
    fn adj_mine_counts_all_eight_neighbours_in_interior() {
        let n = 8;
        let is_mine = BitBoard::zeroed((n * n) as usize);
        for (r, c) in [(0, 0), (0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1), (2, 2)] {
            is_mine.set((r * n + c) as usize);
        }
        let board = Board::new(n, is_mine);
        assert_eq!(board.adj_mine(1, 1), 8);
    }

    #[test]
    fn set_open_is_monotonic_and_idempotent() {
        let board = board_with_mine_at(4, 3, 3);
        assert!(!board.is_open(0, 0));
        board.set_open(0, 0);
        board.set_open(0, 0);
        assert!(board.is_open(0, 0));
        assert!(!board.is_open(1, 1));
    }
}
