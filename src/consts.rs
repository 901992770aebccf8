//! Project-wide constants.

use std::path::PathBuf;

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
pub const HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");
pub const REPO: &str = env!("CARGO_PKG_REPOSITORY");

/// Events kept in the bus history ring buffer.
pub const DEFAULT_BUS_HISTORY_SIZE: usize = 100;

/// Entries kept in the selection manager's diagnostic trace.
pub const DEFAULT_SELECTION_TRACE_SIZE: usize = 20;

/// Actions kept on the undo stack.
pub const DEFAULT_UNDO_LIMIT: usize = 50;

/// Default config path: `~/.graphbus/config.json`.
/// `None` when the home directory cannot be determined.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".graphbus").join("config.json"))
}
