//! Floor-sweep strategy.
//!
//! This module handles:
//! - Sweep policy and gate math
//! - The gate-ordered sweep engine
//! - The open-position ledger

pub mod engine;
pub mod gates;
pub mod position;
pub mod types;

pub use engine::FloorSweeper;
pub use position::{Position, PositionBook};
pub use types::{SweepConfig, SweepResult, SweepStats};
