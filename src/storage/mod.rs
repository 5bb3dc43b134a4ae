//! Configuration file storage.
//!
//! Handles locating, reading and validating the JSON configuration.

pub mod loader;
pub mod types;

// Re-export commonly used items
pub use loader::{config_search_paths, find_config, get_config_dir, load_config, locate_and_load};
pub use types::*;
