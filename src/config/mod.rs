//! Configuration for heapscope
//!
//! This module handles:
//! - User-level configuration (~/.config/heapscope/config.toml)
//! - Environment overrides
//! - The pruning rule built from configured type names

mod user_config;

pub use user_config::{AnalysisConfig, LoadConfig, UserConfig};
