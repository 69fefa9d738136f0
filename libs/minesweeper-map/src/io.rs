//! On-disk map file format: a text header `"N K\n"` followed by exactly
//! `N*N/8` raw, packed mine bits. No length prefix, no versioning — this is
//! the one place in the harness where the wire format is deliberately as
//! simple as possible, since it's produced offline by the map generator.

use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::bitboard::{byte_len, BitBoard};
use crate::MapError;

/// A parsed map file: board side length, mine count, and the packed
/// ground-truth mine bitmap.
pub struct MapFile {
    pub n: u32,
    pub k: u64,
    pub is_mine: BitBoard,
}

/// Read and validate a map file from `path`.
///
/// Validates that `N` is a power of two `>= 8`, that `K <= N*N`, that the
/// body is exactly `N*N/8` bytes, and that the body contains exactly `K` set
/// bits — a corrupt or hand-edited map file is a fatal, descriptive error
/// rather than a silently wrong board.
pub fn read_map_file(path: &Path) -> Result<MapFile, MapError> {
    let file = std::fs::File::open(path).map_err(MapError::Io)?;
    read_map(BufReader::new(file))
}

fn read_map<R: BufRead + Read>(mut reader: R) -> Result<MapFile, MapError> {
    let mut header = String::new();
    reader.read_line(&mut header).map_err(MapError::Io)?;
    let mut parts = header.split_whitespace();
    let n: u32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| MapError::BadHeader(header.clone()))?;
    let k: u64 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| MapError::BadHeader(header.clone()))?;

    if n < 8 || !n.is_power_of_two() {
        return Err(MapError::BadSideLength(n));
    }
    let len_bits = (n as usize) * (n as usize);
    if k > len_bits as u64 {
        return Err(MapError::TooManyMines { k, n });
    }

    let expected_bytes = byte_len(len_bits);
    let mut body = vec![0u8; expected_bytes];
    reader.read_exact(&mut body).map_err(MapError::Io)?;

    let is_mine = BitBoard::from_packed_bytes(body, len_bits);
    let actual_k = is_mine.popcount();
    if actual_k != k {
        return Err(MapError::MineCountMismatch {
            declared: k,
            actual: actual_k,
        });
    }

    Ok(MapFile { n, k, is_mine })
}

/// Write a map file in the same format `read_map_file` reads. Used by tests
/// and by offline map-authoring tooling, not by the game server or judger at
/// runtime.
pub fn write_map_file<W: io::Write>(mut out: W, n: u32, k: u64, is_mine: &BitBoard) -> io::Result<()> {
    writeln!(out, "{n} {k}")?;
    for i in 0..is_mine.byte_len() {
        out.write_all(&[is_mine.load_byte(i)])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn all_zero_map(n: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(format!("{n} 0\n").as_bytes());
        buf.extend(std::iter::repeat(0u8).take(byte_len((n * n) as usize)));
        buf
    }

    #[test]
    fn parses_a_well_formed_all_zero_map() {
        let buf = all_zero_map(4);
        let map = read_map(Cursor::new(buf)).expect("parse");
        assert_eq!(map.n, 4);
        assert_eq!(map.k, 0);
        assert_eq!(map.is_mine.popcount(), 0);
    }

    #[test]
    fn rejects_non_power_of_two_side_length() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"9 0\n");
        buf.extend(std::iter::repeat(0u8).take(byte_len(81)));
        let err = read_map(Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, MapError::BadSideLength(9)));
    }

    #[test]
    fn rejects_mine_count_mismatch() {
        let mut buf = Vec::new();
        // declares 1 mine but the body has none set
        buf.extend_from_slice(b"8 1\n");
        buf.extend(std::iter::repeat(0u8).take(byte_len(64)));
        let err = read_map(Cursor::new(buf)).unwrap_err();
        assert!(matches!(
            err,
            MapError::MineCountMismatch { declared: 1, actual: 0 }
        ));
    }

    #[test]
    fn write_then_read_round_trips() {
        let board = BitBoard::zeroed(64);
        board.set(0);
        board.set(63);
        let mut buf = Vec::new();
        write_map_file(&mut buf, 8, 2, &board).unwrap();
        let map = read_map(Cursor::new(buf)).unwrap();
        assert_eq!(map.n, 8);
        assert_eq!(map.k, 2);
        assert!(map.is_mine.get(0));
        assert!(map.is_mine.get(63));
    }
}
