//! Per-session preferences, supplied by the caller.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::geometry::{ScalePolicy, Spacing, StackAxis};
use crate::source::DecodeBudget;

/// Everything the caller decides before a session starts.
///
/// The engine never reads preferences from storage; callers build this once
/// from whatever store they use and hand it to
/// [`AffixSession::start`](crate::AffixSession::start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AffixConfig {
    pub axis: StackAxis,
    pub spacing: Spacing,
    pub policy: ScalePolicy,
    /// Canvas fill; `None` (or a transparent color) leaves it transparent.
    pub background: Option<Color>,
    pub decode_budget: DecodeBudget,
}

impl AffixConfig {
    /// Background color that should actually be painted.
    pub fn fill(&self) -> Option<Color> {
        self.background.filter(|c| !c.is_transparent())
    }
}
