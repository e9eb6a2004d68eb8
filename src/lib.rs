//! # libuds
//!
//! `libuds` is the server side of UDS (Unified Diagnostic Services,
//! ISO 14229-1) for automotive ECUs, organized along the OSI layer model
//! for clear separation of concerns. The crate implements the diagnostic
//! application layer (service dispatch, session and security state, the
//! firmware-download state machine, and the protocol timers) and consumes
//! the layers beneath it through narrow traits the host implements.
//!
//! ## Architecture
//!
//! - Physical layer: [`physical::CanInterface`], the raw CAN receive/
//!   transmit pair the host wires to its controller.
//! - Transport layer: [`transport::TransportLink`], a segmentation channel
//!   (ISO-TP in practice) delivering whole request messages and accepting
//!   whole response messages. One link per addressing scheme.
//! - Application layer: [`server::Server`], the ISO 14229 engine, driven by
//!   repeated calls to [`server::Server::poll`].
//!
//! The deployment's diagnostic capabilities (which identifiers can be
//! read, how a security seed is produced, where downloaded data goes) are
//! supplied as one implementation of
//! [`server::services::DiagnosticServices`].
//!
//! ## Example
//!
//! ```text
//! # Conceptual flow, not actual code
//! let mut server = Server::new(
//!     ServerConfig { phys_recv_id: 0x7E0, func_recv_id: 0x7DF, ..Default::default() },
//!     phys_link,        # ISO-TP link bound to 0x7E0/0x7E8
//!     func_link,        # ISO-TP link bound to 0x7DF
//!     can,              # bus driver
//!     StdClock::new(),
//!     MyEcuServices::new(),
//! )?;
//!
//! loop {
//!     server.poll();    # pump bus, run timers, handle one request
//!     if server.ecu_reset_scheduled() {
//!         reboot();
//!     }
//! }
//! ```

// OSI Layer modules
/// Application layer: the UDS server engine
pub mod server;
/// Physical layer interface for the CAN bus
pub mod physical;
/// Transport layer interface for segmentation links
pub mod transport;

// Common types and traits
/// Common error types and error handling functionality
pub mod error;
/// Common types used across the library
pub mod types;

// Re-exports for convenience
pub use server::services::{DiagnosticServices, Nrc, TransferHandler};
pub use server::{Server, ServerConfig};

// Version information
/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
