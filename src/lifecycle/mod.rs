//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → store → transport → client → breaker → live service → state
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → HTTP server stops accepting → in-flight requests drain
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_listener, wait_for_shutdown_signal};
pub use startup::{assemble_state, build_state, build_store, build_upstream, StartupError};
