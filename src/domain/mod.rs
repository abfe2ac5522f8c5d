//! Core domain types and logic.

pub mod acceptance;
pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod exposure;
pub mod market_frame;
pub mod observation;
pub mod performance;
pub mod signal;
pub mod universe;
pub mod weights;
