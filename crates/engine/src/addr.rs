//! Cell addressing: A1-style tokens and zero-based coordinates.
//!
//! `Coord` is the graph-node identity for every other module. Ordering is
//! row-major (row first, then column) so deterministic tie-breaks in the
//! scheduler fall out of `Ord`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EngineError;

/// Zero-based cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    /// Column index (0-based; A = 0)
    pub col: usize,
    /// Row index (0-based; spreadsheet row 1 = 0)
    pub row: usize,
}

impl Coord {
    #[inline]
    pub fn new(col: usize, row: usize) -> Self {
        Self { col, row }
    }

    /// Parse an A1-style address token: one or more letters (base-26,
    /// case-insensitive) followed by one or more digits (1-based row).
    ///
    /// Shape-only: bound checks against a particular sheet are the caller's
    /// job (see [`Bounds::contains`]).
    pub fn parse(token: &str) -> Result<Self, EngineError> {
        let malformed = || EngineError::MalformedReference {
            token: token.to_string(),
        };

        let letters: String = token
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        let digits = &token[letters.len()..];

        if letters.is_empty() || digits.is_empty() {
            return Err(malformed());
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }

        // Column letters: A=0 .. Z=25, AA=26, ... A run long enough to
        // overflow is just another malformed token.
        let mut acc = 0usize;
        for c in letters.chars() {
            let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
            acc = acc
                .checked_mul(26)
                .and_then(|n| n.checked_add(digit))
                .ok_or_else(malformed)?;
        }
        let col = acc.checked_sub(1).ok_or_else(malformed)?;

        let row_1based: usize = digits.parse().map_err(|_| malformed())?;
        if row_1based == 0 {
            return Err(malformed());
        }

        Ok(Coord::new(col, row_1based - 1))
    }

    /// Format back to an A1-style address ("A1", "AA10").
    pub fn to_a1(self) -> String {
        format!("{}{}", col_to_letters(self.col), self.row + 1)
    }
}

// Row-major ordering: all of row 0 before any of row 1.
impl Ord for Coord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.row.cmp(&other.row).then(self.col.cmp(&other.col))
    }
}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_a1())
    }
}

// Serialize as the A1 token so value maps are JSON-object friendly.
impl Serialize for Coord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_a1())
    }
}

impl<'de> Deserialize<'de> for Coord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CoordVisitor;

        impl Visitor<'_> for CoordVisitor {
            type Value = Coord;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("an A1-style cell address")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Coord, E> {
                Coord::parse(v).map_err(|_| E::custom(format!("invalid address: {v}")))
            }
        }

        deserializer.deserialize_str(CoordVisitor)
    }
}

/// Convert 0-based column index to letter(s): 0=A, 25=Z, 26=AA, ...
pub(crate) fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col + 1; // 1-indexed for the calculation
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

/// Fixed sheet dimensions. Coordinates outside are invalid inputs, not cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub cols: usize,
    pub rows: usize,
}

impl Bounds {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }

    #[inline]
    pub fn contains(&self, coord: Coord) -> bool {
        coord.col < self.cols && coord.row < self.rows
    }
}

impl Default for Bounds {
    /// 26 columns x 100 rows, the source system's fixed grid.
    fn default() -> Self {
        Self::new(26, 100)
    }
}

/// A normalized rectangular range: `start` is the top-left corner, `end` the
/// bottom-right, regardless of how the endpoints were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeRef {
    pub start: Coord,
    pub end: Coord,
}

impl RangeRef {
    /// Build a normalized range from two corners in any order.
    pub fn normalized(a: Coord, b: Coord) -> Self {
        Self {
            start: Coord::new(a.col.min(b.col), a.row.min(b.row)),
            end: Coord::new(a.col.max(b.col), a.row.max(b.row)),
        }
    }

    /// Parse a "A1:B5" range token. Either endpoint failing fails the range.
    pub fn parse(token: &str) -> Result<Self, EngineError> {
        let malformed = || EngineError::MalformedReference {
            token: token.to_string(),
        };
        let (lhs, rhs) = token.split_once(':').ok_or_else(malformed)?;
        if rhs.contains(':') {
            return Err(malformed());
        }
        Ok(Self::normalized(Coord::parse(lhs)?, Coord::parse(rhs)?))
    }

    /// Iterate the range row-major, top-left to bottom-right.
    pub fn cells(&self) -> impl Iterator<Item = Coord> + '_ {
        let (start, end) = (self.start, self.end);
        (start.row..=end.row)
            .flat_map(move |row| (start.col..=end.col).map(move |col| Coord::new(col, row)))
    }

    /// Number of cells covered. Always at least 1.
    pub fn len(&self) -> usize {
        (self.end.row - self.start.row + 1) * (self.end.col - self.start.col + 1)
    }
}

impl std::fmt::Display for RangeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}
