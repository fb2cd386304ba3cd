//! Typed tags.
//!
//! The wire form is `family:local` (`pred:posture:standing`,
//! `cue:scent:milk`, `anchor:NOW`, `action:push_up`).  Internally a tag is
//! a sum type, so family dispatch is a `match` rather than string-prefix
//! sniffing, and a cue can never be mistaken for a planner goal.
//!
//! Ordering compares `(family, local)` lexicographically, which coincides
//! with plain string order of the wire form — serialized tag lists come out
//! sorted the same way external tooling sorts them.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── TagFamily ─────────────────────────────────────────────────────────────────

/// The four tag namespaces.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum TagFamily {
    Pred,
    Cue,
    Anchor,
    Action,
}

impl TagFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            TagFamily::Pred => "pred",
            TagFamily::Cue => "cue",
            TagFamily::Anchor => "anchor",
            TagFamily::Action => "action",
        }
    }
}

impl fmt::Display for TagFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Tag ───────────────────────────────────────────────────────────────────────

/// One tag on a binding: a family plus a family-local token.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Tag {
    /// A plannable symbolic fact, e.g. `pred:posture:standing`.
    Pred(String),
    /// Current evidence, e.g. `cue:scent:milk`.  Never a planner goal.
    Cue(String),
    /// Orientation node name, e.g. `anchor:NOW`.
    Anchor(String),
    /// Action-family token, e.g. `action:push_up`.
    Action(String),
}

impl Tag {
    pub fn pred(local: &str) -> Tag {
        Tag::Pred(local.to_owned())
    }

    pub fn cue(local: &str) -> Tag {
        Tag::Cue(local.to_owned())
    }

    pub fn anchor(local: &str) -> Tag {
        Tag::Anchor(local.to_owned())
    }

    pub fn action(local: &str) -> Tag {
        Tag::Action(local.to_owned())
    }

    pub fn family(&self) -> TagFamily {
        match self {
            Tag::Pred(_) => TagFamily::Pred,
            Tag::Cue(_) => TagFamily::Cue,
            Tag::Anchor(_) => TagFamily::Anchor,
            Tag::Action(_) => TagFamily::Action,
        }
    }

    /// The family-local token (wire form minus the family prefix).
    pub fn local(&self) -> &str {
        match self {
            Tag::Pred(s) | Tag::Cue(s) | Tag::Anchor(s) | Tag::Action(s) => s,
        }
    }

    pub fn is_pred(&self) -> bool {
        matches!(self, Tag::Pred(_))
    }

    pub fn is_cue(&self) -> bool {
        matches!(self, Tag::Cue(_))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family(), self.local())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (family, local) = s
            .split_once(':')
            .ok_or_else(|| format!("tag {s:?} has no family prefix"))?;
        match family {
            "pred" => Ok(Tag::Pred(local.to_owned())),
            "cue" => Ok(Tag::Cue(local.to_owned())),
            "anchor" => Ok(Tag::Anchor(local.to_owned())),
            "action" => Ok(Tag::Action(local.to_owned())),
            _ => Err(format!("tag {s:?} has unknown family {family:?}")),
        }
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        // (family, local) order equals wire-string order: no family name is
        // a prefix of another.
        (self.family().as_str(), self.local()).cmp(&(other.family().as_str(), other.local()))
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
