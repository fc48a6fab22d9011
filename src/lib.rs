//! AI Image Editing Service Library

pub mod config;
pub mod error;
pub mod engine;
pub mod generative;
pub mod service;
pub mod storage;
pub mod api;
pub mod utils;

pub use config::Config;
pub use error::{EditorError, EditorResult};
