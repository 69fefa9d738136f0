//! The expand engine: decides the outcome of a single click against the
//! ground-truth map, running a bounded flood fill for zero-valued cells.

use minesweeper_map::Board;
use minesweeper_proto::OpenCell;

use crate::scratch::{ScratchPool, MAX_QUEUE};

/// Outcome of [`expand`], decoupled from the control-block wire encoding so
/// this module has no IPC concerns at all.
pub enum ExpandResult {
    Mine,
    SkippedSafe,
    SkippedMine,
    Revealed(Vec<OpenCell>),
}

/// The flood-filled component would exceed the harness's hard cap on emitted
/// cells ([`minesweeper_proto::MAX_OPEN_GRID`]). A protocol error, not a
/// silent truncation.
#[derive(Debug, thiserror::Error)]
#[error("expand(r={r}, c={c}) would reveal more than {cap} cells", cap = minesweeper_proto::MAX_OPEN_GRID)]
pub struct ComponentTooLarge {
    pub r: u32,
    pub c: u32,
}

/// Run the decision table in section 4.2 for one `(r, c)` click.
pub fn expand(
    board: &Board,
    pool: &ScratchPool,
    r: u32,
    c: u32,
    skip_when_reopen: bool,
    do_not_expand: bool,
) -> Result<ExpandResult, ComponentTooLarge> {
    if skip_when_reopen && board.is_open(r, c) {
        return Ok(if board.is_mine(r, c) {
            ExpandResult::SkippedMine
        } else {
            ExpandResult::SkippedSafe
        });
    }

    if board.is_mine(r, c) {
        board.set_open(r, c);
        return Ok(ExpandResult::Mine);
    }

    let number = board.adj_mine(r, c);
    if do_not_expand || number > 0 {
        board.set_open(r, c);
        return Ok(ExpandResult::Revealed(vec![OpenCell {
            r: r as u16,
            c: c as u16,
            number,
        }]));
    }

    flood_fill(board, pool, r, c)
}

/// BFS from a zero-valued seed cell, bounded by `MAX_QUEUE` emitted cells.
fn flood_fill(
    board: &Board,
    pool: &ScratchPool,
    r: u32,
    c: u32,
) -> Result<ExpandResult, ComponentTooLarge> {
    let guard = pool.claim();
    let mut emitted: Vec<OpenCell> = Vec::new();

    let seed_index = board.index(r, c);
    guard.mark_visited(seed_index);
    emitted.push(OpenCell {
        r: r as u16,
        c: c as u16,
        number: 0,
    });
    // seed is guaranteed zero-valued by the caller's dispatch, so it always
    // goes back on the queue.
    guard.push((r as u16, c as u16));

    let result = (|| {
        while let Some((cr, cc)) = guard.pop() {
            let (cr, cc) = (cr as i64, cc as i64);
            for dr in -1i64..=1 {
                for dc in -1i64..=1 {
                    if dr == 0 && dc == 0 {
                        continue;
                    }
                    let (nr, nc) = (cr + dr, cc + dc);
                    if !board.in_bounds(nr, nc) {
                        continue;
                    }
                    let (nr, nc) = (nr as u32, nc as u32);
                    let index = board.index(nr, nc);
                    if guard.visited(index) || board.is_mine(nr, nc) {
                        continue;
                    }
                    guard.mark_visited(index);

                    if emitted.len() >= MAX_QUEUE {
                        return Err(ComponentTooLarge { r, c });
                    }
                    let number = board.adj_mine(nr, nc);
                    emitted.push(OpenCell {
                        r: nr as u16,
                        c: nc as u16,
                        number,
                    });

                    if number == 0 && !guard.push((nr as u16, nc as u16)) {
                        return Err(ComponentTooLarge { r, c });
                    }
                }
            }
        }
        Ok(())
    })();

    // Publish `is_open` bits before releasing the scratch slot either way:
    // a too-large component still needs its touched cells un-marked so the
    // slot is clean for its next claimant, even though the request itself
    // fails.
    for cell in &emitted {
        guard.clear_visited(board.index(cell.r as u32, cell.c as u32));
    }
    drop(guard);

    result?;

    for cell in &emitted {
        board.set_open(cell.r as u32, cell.c as u32);
    }

    Ok(ExpandResult::Revealed(emitted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minesweeper_map::BitBoard;

    fn board(n: u32, mines: &[(u32, u32)]) -> Board {
        let is_mine = BitBoard::zeroed((n * n) as usize);
        for &(r, c) in mines {
            is_mine.set((r * n + c) as usize);
        }
        Board::new(n, is_mine)
    }

    #[test]
    fn all_zero_four_by_four_reveals_every_cell_with_number_zero() {
        let board = board(4, &[]);
        let pool = ScratchPool::new(4);
        match expand(&board, &pool, 0, 0, false, false).unwrap() {
            ExpandResult::Revealed(cells) => {
                assert_eq!(cells.len(), 16);
                assert!(cells.iter().all(|c| c.number == 0));
                let mut seen = std::collections::HashSet::new();
                for cell in &cells {
                    assert!(seen.insert((cell.r, cell.c)), "cell emitted twice");
                }
            }
            _ => panic!("expected a full reveal"),
        }
        for r in 0..4 {
            for c in 0..4 {
                assert!(board.is_open(r, c));
            }
        }
    }

    #[test]
    fn clicking_a_mine_only_opens_that_cell() {
        let board = board(4, &[(0, 0)]);
        let pool = ScratchPool::new(4);
        match expand(&board, &pool, 0, 0, false, false).unwrap() {
            ExpandResult::Mine => {}
            _ => panic!("expected Mine"),
        }
        assert!(board.is_open(0, 0));
        assert!(!board.is_open(1, 1));
    }

    #[test]
    fn reclicking_a_safe_open_cell_with_skip_when_reopen_reports_skipped_safe() {
        let board = board(4, &[]);
        let pool = ScratchPool::new(4);
        expand(&board, &pool, 0, 0, false, false).unwrap();
        match expand(&board, &pool, 0, 0, true, false).unwrap() {
            ExpandResult::SkippedSafe => {}
            _ => panic!("expected SkippedSafe"),
        }
    }

    #[test]
    fn reclicking_a_mine_is_idempotent_on_is_open() {
        let board = board(4, &[(2, 2)]);
        let pool = ScratchPool::new(4);
        expand(&board, &pool, 2, 2, false, false).unwrap();
        match expand(&board, &pool, 2, 2, true, false).unwrap() {
            ExpandResult::SkippedMine => {}
            _ => panic!("expected SkippedMine"),
        }
        assert!(board.is_open(2, 2));
    }

    #[test]
    fn non_zero_cell_emits_only_itself_even_without_do_not_expand() {
        let board = board(4, &[(0, 1)]);
        let pool = ScratchPool::new(4);
        // (0,0) is adjacent to the mine at (0,1): adj_mine = 1, so it stops
        // expansion regardless of `do_not_expand`.
        match expand(&board, &pool, 0, 0, false, false).unwrap() {
            ExpandResult::Revealed(cells) => {
                assert_eq!(cells.len(), 1);
                assert_eq!(cells[0].number, 1);
            }
            _ => panic!("expected a single-cell reveal"),
        }
    }

    #[test]
    fn flood_fill_boundary_numbering_with_a_single_mine() {
        // N=4, one mine at (0,0), click the far corner (3,3). The 15 safe
        // cells all belong to one component: (0,1), (1,0) and (1,1) sit on
        // its numbered boundary (each touches the mine, adj_mine = 1) and
        // the remaining 12 are zero-valued interior.
        let board = board(4, &[(0, 0)]);
        let pool = ScratchPool::new(4);
        match expand(&board, &pool, 3, 3, false, false).unwrap() {
            ExpandResult::Revealed(cells) => {
                assert_eq!(cells.len(), 15);
                let mut seen = std::collections::HashMap::new();
                for cell in &cells {
                    seen.insert((cell.r, cell.c), cell.number);
                }
                assert_eq!(seen.len(), 15);
                assert_eq!(seen[&(0, 1)], 1);
                assert_eq!(seen[&(1, 0)], 1);
                assert_eq!(seen[&(1, 1)], 1);
                for (&(r, c), &number) in &seen {
                    if (r, c) != (0, 1) && (r, c) != (1, 0) && (r, c) != (1, 1) {
                        assert_eq!(number, 0, "cell ({r}, {c}) should be zero-valued");
                    }
                }
            }
            _ => panic!("expected a full reveal"),
        }
        assert!(!board.is_open(0, 0));
        for r in 0..4 {
            for c in 0..4 {
                if (r, c) != (0, 0) {
                    assert!(board.is_open(r, c));
                }
            }
        }
    }

    #[test]
    fn flood_fill_stops_at_a_diagonal_minefield() {
        // N=8, mines on the full main diagonal, click the top-right corner
        // (0,7). (0,7) is not adjacent to any diagonal mine, so it seeds a
        // flood fill, but the diagonal splits the board into two triangular
        // halves that only touch through non-zero boundary cells, which
        // don't propagate the fill further. Only the upper-right triangle
        // (26 cells) opens; the lower-left triangle stays untouched.
        let mines: Vec<(u32, u32)> = (0..8).map(|i| (i, i)).collect();
        let board = board(8, &mines);
        let pool = ScratchPool::new(8);
        match expand(&board, &pool, 0, 7, false, false).unwrap() {
            ExpandResult::Revealed(cells) => {
                assert_eq!(cells.len(), 26);
                let mut seen = std::collections::HashSet::new();
                for cell in &cells {
                    assert!(seen.insert((cell.r, cell.c)), "cell emitted twice");
                    assert!(cell.r < cell.c, "expected only the upper-right triangle");
                }
            }
            _ => panic!("expected a partial reveal"),
        }
        assert!(board.is_open(0, 7));
        assert!(!board.is_open(7, 0), "the other triangle must stay closed");
        for i in 0..8 {
            assert!(!board.is_open(i, i), "mines are never opened by expansion");
        }
    }

    #[test]
    fn do_not_expand_stops_a_zero_cell_from_flooding() {
        let board = board(4, &[]);
        let pool = ScratchPool::new(4);
        match expand(&board, &pool, 0, 0, false, true).unwrap() {
            ExpandResult::Revealed(cells) => {
                assert_eq!(cells.len(), 1);
                assert_eq!(cells[0].number, 0);
            }
            _ => panic!("expected a single-cell reveal"),
        }
        assert!(board.is_open(0, 0));
        assert!(!board.is_open(1, 1));
    }
}
