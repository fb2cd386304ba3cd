//! Session snapshot persistence.
//!
//! Snapshots are JSON files written with the temp-file + atomic-rename
//! pattern, so a crash mid-write never corrupts the previous save.
//! Autosave failures are surfaced to the caller and never poison
//! in-memory state.

use std::fs;
use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};

use capra_core::Drives;
use capra_graph::{GraphSnapshot, WorldGraph};
use capra_policy::SkillLedger;

use crate::error::{SimError, SimResult};
use crate::runtime::Runtime;

/// Top-level on-disk session format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// ISO-8601 local time, second precision.
    pub saved_at: String,
    pub app_version: String,
    pub platform: String,
    pub world: GraphSnapshot,
    pub drives: Drives,
    pub skills: SkillLedger,
}

impl Runtime {
    /// Capture the persistent slice of runtime state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            saved_at: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_owned(),
            platform: std::env::consts::OS.to_owned(),
            world: self.world.to_snapshot(),
            drives: self.drives.clone(),
            skills: self.skills.clone(),
        }
    }

    /// Write a snapshot atomically: serialize to `<path>.tmp`, then rename
    /// over `path`.
    pub fn save_snapshot(&self, path: &Path) -> SimResult<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| SimError::Snapshot(format!("serialize: {e}")))?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Restore world, drives, and skills from a snapshot file.
    ///
    /// Parse and shape errors surface as [`SimError::Snapshot`]; on error
    /// the runtime is left untouched.
    pub fn load_snapshot(&mut self, path: &Path) -> SimResult<()> {
        let json = fs::read_to_string(path)?;
        let snapshot: SessionSnapshot = serde_json::from_str(&json)
            .map_err(|e| SimError::Snapshot(format!("parse {}: {e}", path.display())))?;

        let world = WorldGraph::from_snapshot(snapshot.world)
            .map_err(|e| SimError::Snapshot(format!("world restore: {e}")))?;

        self.world = world;
        self.drives = snapshot.drives;
        self.skills = snapshot.skills;
        Ok(())
    }
}
