/// Spacing between consecutive sibling ordering keys; also the key of the
/// first category in an empty sibling group
pub const DEFAULT_ORDER_KEY_STEP: f64 = 10.0;

/// Adjacent sibling keys closer than this trigger a rebalance of the group
pub const DEFAULT_ORDER_KEY_MIN_GAP: f64 = 1e-9;

/// Fraction of a row's height at its top (and bottom) that means
/// "insert above" (and "insert below"); the middle nests inside
pub const DEFAULT_DROP_EDGE_ZONE: f64 = 0.25;

/// Maximum length of a category name or slug
pub const MAX_CATEGORY_NAME_LENGTH: u64 = 255;
