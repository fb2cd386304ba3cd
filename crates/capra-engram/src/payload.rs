//! Engram payload helpers.
//!
//! Payloads stay small: a dense float vector with a logical shape, or a
//! JSON-safe dict (NavPatch grids, MapSurface snapshots) stored directly as
//! `serde_json::Value`.  Validate shapes at the boundary; keep the hot path
//! allocation-light.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{EngramError, EngramResult};

// ── TensorPayload ─────────────────────────────────────────────────────────────

/// Binary codec magic for [`TensorPayload`].
const MAGIC: &[u8; 5] = b"TPAY\x00";
/// Binary codec version.
const VERSION: u32 = 1;

/// Dense numeric feature container (float32 semantics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorPayload {
    /// Flat row-major data.
    pub data: Vec<f32>,
    /// Logical tensor shape.
    pub shape: Vec<u32>,
    /// Descriptor for downstream tools, e.g. `"scene"` or `"embedding"`.
    pub kind: String,
    /// Wire-format descriptor, e.g. `"tensor/list-f32"`.
    pub fmt: String,
}

impl TensorPayload {
    /// A scene/embedding vector with implicit 1-D shape.
    pub fn vector(data: Vec<f32>, kind: &str) -> Self {
        let shape = vec![data.len() as u32];
        TensorPayload {
            data,
            shape,
            kind: kind.to_owned(),
            fmt: "tensor/list-f32".to_owned(),
        }
    }

    /// Encode as `TPAY\0` + little-endian header (version, ndims, dims) +
    /// little-endian f32 body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + 8 + self.shape.len() * 4 + self.data.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&(self.shape.len() as u32).to_le_bytes());
        for d in &self.shape {
            out.extend_from_slice(&d.to_le_bytes());
        }
        for x in &self.data {
            out.extend_from_slice(&x.to_le_bytes());
        }
        out
    }

    /// Decode a buffer produced by [`to_bytes`](Self::to_bytes).
    ///
    /// `kind`/`fmt` are not part of the binary form and come back as the
    /// defaults (`"embedding"`, `"tensor/list-f32"`).
    pub fn from_bytes(bytes: &[u8]) -> EngramResult<Self> {
        if bytes.len() < 5 || &bytes[..5] != MAGIC {
            return Err(EngramError::BadMagic);
        }
        let mut off = 5usize;
        let version = read_u32(bytes, &mut off)?;
        if version != VERSION {
            return Err(EngramError::BadVersion(version));
        }
        let ndims = read_u32(bytes, &mut off)? as usize;
        let mut shape = Vec::with_capacity(ndims);
        for _ in 0..ndims {
            shape.push(read_u32(bytes, &mut off)?);
        }
        let body = &bytes[off..];
        if body.len() % 4 != 0 {
            return Err(EngramError::Truncated {
                needed: body.len().next_multiple_of(4),
                have: body.len(),
            });
        }
        let data = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(TensorPayload {
            data,
            shape,
            kind: "embedding".to_owned(),
            fmt: "tensor/list-f32".to_owned(),
        })
    }

    /// JSON projection used when storing the tensor as an engram payload.
    pub fn to_value(&self) -> Value {
        json!({
            "kind": self.kind,
            "fmt": self.fmt,
            "shape": self.shape,
            "data": self.data,
        })
    }
}

fn read_u32(bytes: &[u8], off: &mut usize) -> EngramResult<u32> {
    let end = *off + 4;
    if bytes.len() < end {
        return Err(EngramError::Truncated { needed: end, have: bytes.len() });
    }
    let v = u32::from_le_bytes([bytes[*off], bytes[*off + 1], bytes[*off + 2], bytes[*off + 3]]);
    *off = end;
    Ok(v)
}

// ── FactMeta ──────────────────────────────────────────────────────────────────

/// Compact, human-readable summary that travels with an engram.
///
/// The heavy payload stays inside the column; graph tooling only ever needs
/// this summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactMeta {
    pub name: String,
    /// References to world-graph tokens (e.g. `cue:vision:silhouette:mom`).
    #[serde(default)]
    pub links: Vec<String>,
    /// Extra descriptors; the store stamps `column` and temporal attrs here.
    #[serde(default)]
    pub attrs: serde_json::Map<String, Value>,
}

impl FactMeta {
    pub fn named(name: &str) -> Self {
        FactMeta { name: name.to_owned(), ..Default::default() }
    }

    /// Builder-style attr insertion.
    pub fn with_attr(mut self, key: &str, value: Value) -> Self {
        self.attrs.insert(key.to_owned(), value);
        self
    }
}
