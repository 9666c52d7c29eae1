//! Transfer backends

pub mod cpal_backend;
pub mod null;

pub use cpal_backend::CpalTransfer;
pub use null::NullTransfer;
