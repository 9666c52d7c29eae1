//! Foundation crate for spdif-out
//!
//! Error taxonomy and TOML configuration shared by the codec, the
//! streaming controller and the demo binary.

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{Result, SpdifError, StreamError};
