//! NavPatch wire schema and validator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cell::{Cell, GRID_ENCODING_V1};

/// Cells scanned for bad codes before the validator gives up.
const VALIDATE_CELL_CAP: usize = 10_000;
/// Bad-cell reports kept (the rest of the grid is assumed equally broken).
const BAD_CELL_REPORT_CAP: usize = 3;

/// A SELF-local topological grid observation.
///
/// The *core* fields participate in the v1 signature; `tags` and scalar
/// `extent` do too, after normalization.  Everything else — `layers`,
/// `obs`, `local_id`, `match`, and any unrecognized key — lands in `extra`
/// and is volatile: two patches differing only there are the same patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavPatch {
    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default)]
    pub entity_id: Option<String>,

    /// Observation role, e.g. `"obstacle"` or `"terrain"`.
    #[serde(default)]
    pub role: Option<String>,

    /// Reference frame; v1 patches are `"self_local"`.
    #[serde(default)]
    pub frame: Option<String>,

    #[serde(default)]
    pub grid_encoding_v: String,

    #[serde(default)]
    pub grid_w: i64,

    #[serde(default)]
    pub grid_h: i64,

    /// Row-major cell codes; length must equal `grid_w * grid_h`.
    #[serde(default)]
    pub grid_cells: Vec<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Axis-aligned extent dict (`{type:"aabb", x0,y0,x1,y1}`); signature
    /// participation requires every value to be a scalar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<Map<String, Value>>,

    /// Volatile remainder of the wire dict.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_schema() -> String {
    "navpatch_v1".to_owned()
}

impl Default for NavPatch {
    fn default() -> Self {
        NavPatch {
            schema: default_schema(),
            entity_id: None,
            role: None,
            frame: None,
            grid_encoding_v: GRID_ENCODING_V1.to_owned(),
            grid_w: 0,
            grid_h: 0,
            grid_cells: Vec::new(),
            tags: None,
            extent: None,
            extra: Map::new(),
        }
    }
}

impl NavPatch {
    /// Build a minimal valid patch for an entity.
    pub fn new(entity_id: &str, role: &str, grid_w: usize, grid_h: usize, cells: Vec<Cell>) -> Self {
        NavPatch {
            entity_id: Some(entity_id.to_owned()),
            role: Some(role.to_owned()),
            frame: Some("self_local".to_owned()),
            grid_w: grid_w as i64,
            grid_h: grid_h as i64,
            grid_cells: cells.into_iter().map(|c| c.code() as i64).collect(),
            ..Default::default()
        }
    }

    /// `true` when [`grid_errors_v1`] finds nothing to complain about.
    pub fn is_valid(&self) -> bool {
        grid_errors_v1(self).is_empty()
    }

    /// Result-typed validation for callers that want one error value
    /// instead of the report list.
    pub fn validate(&self) -> crate::error::GridResult<()> {
        let errors = grid_errors_v1(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(crate::error::GridError::InvalidPayload(errors.join("; ")))
        }
    }

    /// Decoded cells; invalid codes come back as `None` entries.
    pub fn cells(&self) -> impl Iterator<Item = Option<Cell>> + '_ {
        self.grid_cells.iter().map(|&c| Cell::from_code(c))
    }
}

/// Schema errors for a `grid_v1` payload, human-readable, worst first.
///
/// An empty vec means the patch is structurally sound.  Bad-cell reports
/// stop after the first few offenders.
pub fn grid_errors_v1(patch: &NavPatch) -> Vec<String> {
    let mut errs: Vec<String> = Vec::new();

    if patch.grid_encoding_v != GRID_ENCODING_V1 {
        errs.push(format!("grid_encoding_v must be {GRID_ENCODING_V1:?}"));
    }
    if patch.grid_w <= 0 {
        errs.push("grid_w must be int > 0".to_owned());
    }
    if patch.grid_h <= 0 {
        errs.push("grid_h must be int > 0".to_owned());
    }

    if patch.grid_w > 0 && patch.grid_h > 0 {
        let want = (patch.grid_w * patch.grid_h) as usize;
        if patch.grid_cells.len() != want {
            errs.push(format!("grid_cells length must be grid_w*grid_h ({want})"));
        }
    }

    let mut bad = 0usize;
    for (i, &c) in patch.grid_cells.iter().take(VALIDATE_CELL_CAP).enumerate() {
        if Cell::from_code(c).is_none() {
            errs.push(format!("cell[{i}] invalid code {c}"));
            bad += 1;
            if bad >= BAD_CELL_REPORT_CAP {
                break;
            }
        }
    }

    errs
}
