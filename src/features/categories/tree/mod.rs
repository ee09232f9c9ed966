//! In-memory category tree and the drag-and-drop reordering built on it.

mod builder;
mod controller;
mod cycle_guard;
mod drop_intent;
mod order_key;

pub use builder::CategoryForest;
pub use controller::{ReorderController, ReorderError, ReorderOutcome};
pub use drop_intent::{DropIntent, DropZones};
pub use order_key::OrderKeyPolicy;
