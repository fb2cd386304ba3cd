//! SurfaceGrid — the per-tick composed topological grid.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cell::{Cell, GRID_ENCODING_V1};
use crate::patch::NavPatch;
use crate::sig::{navpatch_sig_v1, sha1_hex};

/// A single composed topological grid for the current tick (v1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceGrid {
    pub grid_encoding_v: String,
    pub grid_w: usize,
    pub grid_h: usize,
    /// Row-major cells, `grid_w * grid_h` long.
    pub grid_cells: Vec<Cell>,
}

impl SurfaceGrid {
    /// An all-unknown grid of the given shape.
    pub fn unknown(grid_w: usize, grid_h: usize) -> Self {
        SurfaceGrid {
            grid_encoding_v: GRID_ENCODING_V1.to_owned(),
            grid_w,
            grid_h,
            grid_cells: vec![Cell::Unknown; grid_w * grid_h],
        }
    }

    /// Cell at `(x, y)`; `None` out of bounds.
    #[inline]
    pub fn cell_at(&self, x: usize, y: usize) -> Option<Cell> {
        if x >= self.grid_w || y >= self.grid_h {
            return None;
        }
        self.grid_cells.get(y * self.grid_w + x).copied()
    }

    /// Deterministic signature over the composed grid core.
    pub fn sig_v1(&self) -> String {
        let mut core = Map::new();
        core.insert("grid_encoding_v".to_owned(), Value::String(self.grid_encoding_v.clone()));
        core.insert("grid_w".to_owned(), Value::from(self.grid_w as i64));
        core.insert("grid_h".to_owned(), Value::from(self.grid_h as i64));
        core.insert(
            "grid_cells".to_owned(),
            Value::Array(self.grid_cells.iter().map(|c| Value::from(c.code() as i64)).collect()),
        );
        sha1_hex(&Value::Object(core))
    }

    pub fn sig16_v1(&self) -> String {
        let mut s = self.sig_v1();
        s.truncate(16);
        s
    }

    /// ASCII render: one line per row, stable glyph per cell code.
    pub fn ascii(&self) -> String {
        if self.grid_w == 0 || self.grid_h == 0 || self.grid_cells.len() != self.grid_w * self.grid_h {
            return String::new();
        }
        let mut lines = Vec::with_capacity(self.grid_h);
        for y in 0..self.grid_h {
            let base = y * self.grid_w;
            lines.push(
                self.grid_cells[base..base + self.grid_w]
                    .iter()
                    .map(|c| c.glyph())
                    .collect::<String>(),
            );
        }
        lines.join("\n")
    }
}

/// Compose a SurfaceGrid from the active NavPatch instances (v1).
///
/// Patches whose encoding or shape differ from the target are skipped.
/// Patches are applied in ascending v1-signature order, so the result is
/// independent of input order; per-cell conflicts resolve by overlay
/// priority.  Cells with codes outside the v1 set are ignored.
pub fn compose_surfacegrid_v1(patches: &[NavPatch], grid_w: usize, grid_h: usize) -> SurfaceGrid {
    let mut out = SurfaceGrid::unknown(grid_w, grid_h);
    if patches.is_empty() {
        return out;
    }

    let mut ordered: Vec<&NavPatch> = patches.iter().collect();
    ordered.sort_by_key(|p| navpatch_sig_v1(p));

    for p in ordered {
        if p.grid_encoding_v != GRID_ENCODING_V1 {
            continue;
        }
        if p.grid_w != grid_w as i64 || p.grid_h != grid_h as i64 {
            continue;
        }
        if p.grid_cells.len() != grid_w * grid_h {
            continue;
        }
        for (i, cell) in p.cells().enumerate() {
            let Some(c) = cell else { continue };
            out.grid_cells[i] = Cell::overlay(out.grid_cells[i], c);
        }
    }

    out
}
