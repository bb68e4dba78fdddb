//! The high-level API client.
//!
//! [`NightfallClient`] wires a [`ClientConfig`](crate::ClientConfig) and a
//! [`Transport`](crate::transport::Transport) together and exposes the scan
//! operations. Configuration errors surface from
//! [`NightfallClientBuilder::build`], before any request is made.

mod nightfall_client;

pub use nightfall_client::{NightfallClient, NightfallClientBuilder};
