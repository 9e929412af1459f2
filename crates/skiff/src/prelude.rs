//! Convenient re-exports for common skiff usage.
//!
//! ```ignore
//! use skiff::prelude::*;
//! ```

// Configuration
pub use crate::auth::{AuthMethod, HostKeyVerification};
pub use crate::config::ClientConfig;

// Error handling
pub use crate::error::{Error, Result};

// Connection and traits
pub use crate::connect::connect;
pub use crate::transport::{Connection, RemoteMetadata};

// Operations
pub use crate::exec::run_command;
pub use crate::shell::{ShellOptions, run_interactive_command, run_interactive_shell};
pub use crate::sync::SyncClient;
pub use crate::transfer::{copy_file, move_file, pull_file, read_file, remove_file, write_file};
