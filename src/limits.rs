use crate::model::{DAY_MS, Ms};

/// 1970-01-01.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2200-01-01.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 7_258_118_400_000;

/// Default widest window a single query may scan.
pub const DEFAULT_MAX_QUERY_WINDOW_MS: Ms = 366 * DAY_MS;

/// Default cap on resource ids in one batch or group request.
pub const DEFAULT_MAX_RESOURCE_IDS: usize = 1_000;

/// Hard cap on time grid cells (one year of hourly cells).
pub const MAX_GRID_CELLS: usize = 366 * 24;
