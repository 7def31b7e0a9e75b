//! Local storage for scored telemetry ticks.

mod history;

pub use history::{HistoryRow, HistoryStore};
