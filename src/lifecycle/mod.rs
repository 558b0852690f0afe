//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load snapshot → build hub, handlers → start gRPC + gateway listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → close propagation hub → drain servers → save snapshot
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{Application, StartupError};
