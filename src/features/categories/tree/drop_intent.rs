use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::constants::DEFAULT_DROP_EDGE_ZONE;

/// What a drop onto a target row means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DropIntent {
    /// Previous sibling of the target, same parent
    Above,
    /// Next sibling of the target, same parent
    Below,
    /// Last child of the target
    Inside,
}

impl std::fmt::Display for DropIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropIntent::Above => write!(f, "above"),
            DropIntent::Below => write!(f, "below"),
            DropIntent::Inside => write!(f, "inside"),
        }
    }
}

/// Partition of a row into ABOVE / INSIDE / BELOW bands.
///
/// The top `edge` fraction of the row is ABOVE, the bottom `edge` fraction is
/// BELOW, the middle is INSIDE.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropZones {
    edge: f64,
}

impl Default for DropZones {
    fn default() -> Self {
        Self {
            edge: DEFAULT_DROP_EDGE_ZONE,
        }
    }
}

impl DropZones {
    /// `edge` must lie in `(0, 0.5)` so all three bands are non-empty
    pub fn symmetric(edge: f64) -> Result<Self, String> {
        if edge > 0.0 && edge < 0.5 {
            Ok(Self { edge })
        } else {
            Err(format!("Drop edge zone must be in (0, 0.5), got {}", edge))
        }
    }

    pub fn above_threshold(&self) -> f64 {
        self.edge
    }

    pub fn below_threshold(&self) -> f64 {
        1.0 - self.edge
    }

    /// `offset_within_row` runs from 0 (top of the row) to 1 (bottom).
    /// Out-of-range offsets are clamped; NaN lands in the middle band.
    pub fn classify(&self, offset_within_row: f64) -> DropIntent {
        let offset = offset_within_row.clamp(0.0, 1.0);
        if offset < self.above_threshold() {
            DropIntent::Above
        } else if offset > self.below_threshold() {
            DropIntent::Below
        } else {
            DropIntent::Inside
        }
    }
}
