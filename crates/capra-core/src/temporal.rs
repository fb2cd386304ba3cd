//! Temporal context — a unit-norm "soft clock" vector.
//!
//! # Design
//!
//! Wall-clock timestamps are fine for provenance but poor for episode
//! segmentation and "near in time" retrieval.  The temporal context is a
//! unit-norm vector that drifts a little every tick ([`step`]) and jumps at
//! event boundaries ([`boundary`]).  Because the vector is renormalized
//! after every update, cosine similarity reduces to a dot product:
//!
//!   cos(v_now, v_then) ≈ 1.0   → close in time
//!   cos falling below τ        → likely an episode boundary
//!
//! Two compact fingerprints travel with long-term writes: [`tvec64`] (a
//! sign-bit hash of the first 64 dims) and the epoch fingerprint taken at
//! the last boundary.  The vector is procedural, not learned — the same
//! seed replays the same trajectory.
//!
//! [`step`]: TemporalContext::step
//! [`boundary`]: TemporalContext::boundary
//! [`tvec64`]: TemporalContext::tvec64

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Unit-norm temporal vector with drift and boundary-jump operators.
#[derive(Debug, Clone)]
pub struct TemporalContext {
    /// Vector dimension (default 128).
    pub dim: usize,
    /// Per-tick drift noise scale.
    pub sigma: f64,
    /// Event-boundary jump noise scale.
    pub jump: f64,
    /// Boundary counter — incremented on every [`boundary`](Self::boundary).
    pub boundary_no: u32,
    v: Vec<f64>,
    noise: SmallRng,
}

impl TemporalContext {
    /// Sample an initial unit vector from a standard normal, seeded by `seed`.
    pub fn new(dim: usize, sigma: f64, jump: f64, seed: u64) -> Self {
        let mut noise = SmallRng::seed_from_u64(seed);
        let std_normal = Normal::new(0.0, 1.0).expect("unit normal");
        let vals: Vec<f64> = (0..dim).map(|_| std_normal.sample(&mut noise)).collect();
        TemporalContext {
            dim,
            sigma,
            jump,
            boundary_no: 0,
            v: normalize(vals),
            noise,
        }
    }

    /// Defaults from the runtime context: 128 dims, σ = 0.015, jump = 0.20.
    pub fn with_defaults(seed: u64) -> Self {
        Self::new(128, 0.015, 0.20, seed)
    }

    /// A defensive copy of the current vector.
    pub fn vector(&self) -> Vec<f64> {
        self.v.clone()
    }

    /// Drift: add Gaussian noise at scale `sigma`, renormalize, return a copy.
    pub fn step(&mut self) -> Vec<f64> {
        self.perturb(self.sigma);
        self.vector()
    }

    /// Event boundary: add Gaussian noise at scale `jump`, renormalize,
    /// bump `boundary_no`, return a copy.
    pub fn boundary(&mut self) -> Vec<f64> {
        self.perturb(self.jump);
        self.boundary_no = self.boundary_no.saturating_add(1);
        self.vector()
    }

    fn perturb(&mut self, scale: f64) {
        let normal = Normal::new(0.0, scale).expect("noise scale must be finite");
        let vals: Vec<f64> = self
            .v
            .iter()
            .map(|a| a + normal.sample(&mut self.noise))
            .collect();
        self.v = normalize(vals);
    }

    /// Cosine against another vector (dot product for unit vectors).
    pub fn cosine_to(&self, other: &[f64]) -> f64 {
        cosine(&self.v, other)
    }

    /// 64-bit sign-bit fingerprint of the current vector, as 16 hex chars.
    ///
    /// Bit `i` is set when component `i` is non-negative; only the first 64
    /// dims participate.
    pub fn tvec64(&self) -> String {
        sign_hash64(&self.v)
    }
}

/// Sign-bit fingerprint of an arbitrary vector (see [`TemporalContext::tvec64`]).
pub fn sign_hash64(v: &[f64]) -> String {
    let mut x: u64 = 0;
    for (i, &a) in v.iter().take(64).enumerate() {
        if a >= 0.0 {
            x |= 1 << i;
        }
    }
    format!("{x:016x}")
}

fn normalize(vals: Vec<f64>) -> Vec<f64> {
    let s = vals.iter().map(|a| a * a).sum::<f64>().sqrt();
    let s = if s == 0.0 { 1.0 } else { s };
    vals.into_iter().map(|a| a / s).collect()
}

// ── Vector utilities ──────────────────────────────────────────────────────────

/// Dot product (equals cosine for unit vectors).
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity, robust to non-unit inputs.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let na = dot(a, a).sqrt();
    let nb = dot(b, b).sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot(a, b) / (na * nb)
}
