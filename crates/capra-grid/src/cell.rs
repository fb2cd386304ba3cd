//! Grid cell semantics (v1).

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire tag for the v1 grid encoding.
pub const GRID_ENCODING_V1: &str = "grid_v1";

/// One cell of a `grid_v1` payload.
///
/// The integer codes are stable wire values; never renumber them.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[repr(u8)]
pub enum Cell {
    #[default]
    Unknown = 0,
    Traversable = 1,
    Hazard = 2,
    Goal = 3,
    Blocked = 4,
}

impl Cell {
    /// Stable wire code.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a wire code; `None` for anything outside the v1 set.
    pub fn from_code(code: i64) -> Option<Cell> {
        match code {
            0 => Some(Cell::Unknown),
            1 => Some(Cell::Traversable),
            2 => Some(Cell::Hazard),
            3 => Some(Cell::Goal),
            4 => Some(Cell::Blocked),
            _ => None,
        }
    }

    /// Overlay priority — higher wins in overlaps.  Safety stance: blocked
    /// and hazard beat goal.
    #[inline]
    pub fn overlay_priority(self) -> u8 {
        match self {
            Cell::Unknown => 0,
            Cell::Traversable => 1,
            Cell::Goal => 2,
            Cell::Hazard => 3,
            Cell::Blocked => 4,
        }
    }

    /// Overlay rule for a single cell: keep the higher-priority code.
    #[inline]
    pub fn overlay(old: Cell, new: Cell) -> Cell {
        if new.overlay_priority() > old.overlay_priority() {
            new
        } else {
            old
        }
    }

    /// ASCII renderer glyph (v1) — simple and stable.
    pub fn glyph(self) -> char {
        match self {
            Cell::Unknown => ' ',
            Cell::Traversable => '.',
            Cell::Hazard => '^',
            Cell::Goal => 'G',
            Cell::Blocked => '#',
        }
    }

    /// `true` for codes the near-hazard slot family reacts to.
    #[inline]
    pub fn is_hazardous(self) -> bool {
        matches!(self, Cell::Hazard | Cell::Blocked)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Cell::from_code(code).ok_or_else(|| D::Error::custom(format!("invalid cell code {code}")))
    }
}
