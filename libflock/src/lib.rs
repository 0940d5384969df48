//! Flock - rate-aware bulk social actions
//!
//! This library paginates through a remote user graph (followers, following,
//! stargazers, subscribers), keeps a local estimate of the API request
//! budget, and performs follow/unfollow/block/unblock actions at a throttled
//! cadence to stay clear of secondary rate limiting.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod lookup;
pub mod options;
pub mod paginate;
pub mod pause;
pub mod rate;
pub mod recipe;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{FlockError, Result};
pub use lookup::{Assertion, LookupSet, LookupSetBuilder};
pub use options::{RecipeOptions, ResolvedOptions};
pub use recipe::{Recipe, RecipeReport};
pub use types::{ActionKind, RateSnapshot, TargetAccount, TargetSelector};
