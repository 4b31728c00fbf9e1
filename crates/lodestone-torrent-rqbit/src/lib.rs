#![forbid(unsafe_code)]

//! librqbit-backed implementation of the torrent engine interfaces.
//!
//! The adapter only compiles behind the `rqbit` feature; the default build
//! produces an empty library so downstream crates can link unconditionally.

#[cfg(feature = "rqbit")]
mod engine;

#[cfg(feature = "rqbit")]
pub use engine::RqbitEngine;
