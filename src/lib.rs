//! Places local images onto Google Slides pages.
//!
//! Each run uploads an image to a storage bucket, signs a one-minute download
//! URL for it, replaces (or creates) the slide element carrying the image's
//! name, then deletes the temporary object again.

pub mod app;
pub mod auth;
pub mod error;
pub mod mime;
pub mod models;
pub mod placement;
pub mod slides;
pub mod storage;

pub use error::{Error, Result};
