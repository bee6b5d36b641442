//! Vidsift - Viral Short-Video Collector
//!
//! Collects short-video metadata from a scraping provider and keeps only the
//! records that are recent, viral, non-corporate, authentically regional and
//! free of spam. Accepted records carry diagnostic scores and are written to a
//! tabular sink and timestamped snapshots.

pub mod cli;
pub mod collector;
pub mod config;
pub mod error;
pub mod export;
pub mod filtering;
pub mod patterns;
pub mod record;
pub mod sink;

pub use error::{Result, VidsiftError};
