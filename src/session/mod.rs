//! Session and presence lifecycle.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent construction of a [`SessionController`] |
//! | `config` | [`SessionConfig`] tunables |
//! | `controller` | Host-facing enable/disable handle |
//! | `core` | Synchronous [`Session`] state |
//! | `runtime` | Event loop task and publisher |

// ============================================================================
// Submodules
// ============================================================================

/// Controller builder.
pub mod builder;

/// Session configuration.
pub mod config;

/// Host-facing controller.
pub mod controller;

/// Synchronous session state.
pub mod core;

mod runtime;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use config::{DEFAULT_SPACE, SessionConfig};
pub use controller::SessionController;
pub use self::core::Session;
