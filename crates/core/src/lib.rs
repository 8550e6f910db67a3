//! Core types and shared functionality for readgate.
//!
//! This crate provides:
//! - The error taxonomy every pipeline step maps into
//! - Configuration structures with layered loading
//! - The bounded TTL/LRU result cache
//! - The generic per-key rate limiter

pub mod cache;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod types;

pub use cache::ExtractCache;
pub use config::AppConfig;
pub use error::Error;
pub use ratelimit::RateLimiter;
pub use types::{CacheStats, Engine, ExtractionResult};
