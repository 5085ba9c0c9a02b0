//! Network layer
//!
//! Requests go through the [`RemoteTransport`] trait so the session can be
//! driven by the HTTP [`TransportClient`] or by a scripted stand-in.

mod registry;
mod traits;
mod transport;


pub use registry::{InFlightGuard, InFlightRegistry};
pub use traits::RemoteTransport;
pub use transport::TransportClient;
