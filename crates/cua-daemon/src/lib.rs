//! cua-daemon library target.
//!
//! The director (message router, reconciliation cycle, handshake driver),
//! shared state, the HTTP control surface and store/transport selection.
//! The binary `main.rs` wires these to configuration.

pub mod api_types;
pub mod director;
pub mod routes;
pub mod state;
pub mod transport;
