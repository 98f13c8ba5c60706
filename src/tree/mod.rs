//! Durable state of a commitment tree: its frontier, root history and lock marker.

mod empty_roots;
mod history;
mod state;

pub use empty_roots::EmptySubtreeRoots;
pub use history::RootHistory;
pub use state::{LockMarker, TreeParams, TreeState};


// CONSTANTS
// ================================================================================================

/// Maximum height of a commitment tree.
pub const MAX_TREE_HEIGHT: u8 = 32;

/// Height used when [TreeParams] is not customized.
pub const DEFAULT_TREE_HEIGHT: u8 = 22;

/// Number of historical roots kept when [TreeParams] is not customized.
pub const DEFAULT_ROOT_HISTORY_SIZE: usize = 256;
