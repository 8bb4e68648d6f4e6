//! Tone responder: tone classification and automatic canned replies for inbound email.

pub mod channels;
pub mod classifier;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod templates;

pub use error::{Error, Result};
