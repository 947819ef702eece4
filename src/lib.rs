//! Storyvault - media backend for a bedtime story player
//!
//! Storyvault accepts story uploads (text and audio) and serves them back:
//! - Local test mode keeps files in a flat samples directory and streams
//!   them with HTTP byte range support
//! - Cloud mode stores files in S3 under date-partitioned keys
//! - The mode is resolved per request from environment and credentials
//! - Simple HTTP API

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod keys;
pub mod media;
pub mod mode;
pub mod origin;
pub mod setup;
pub mod storage;
pub mod streaming;
pub mod types;
pub mod upload;

pub use error::{Error, Result};
