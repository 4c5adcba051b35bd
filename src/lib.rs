//! httpsink - request-capturing mock HTTP endpoint
//!
//! Captures every inbound request into a bounded, TTL-evicting store and
//! serves it back through a small introspection API, optionally mirroring
//! each capture to a downstream service.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod mirror;
pub mod network;
pub mod recipients;
pub mod store;

pub use error::{Result, SinkError};
