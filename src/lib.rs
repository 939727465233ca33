//! Core library for the dual-deposit project.
//!
//! Binds a two-token liquidity deposit to the pool's current exchange ratio,
//! prices the vault shares it earns and hands accepted deposits to a
//! settlement gateway. The binary (`main.rs`) wires these pieces together
//! with simulated collaborators.

pub mod binding;
pub mod config;
pub mod deposit;
pub mod errors;
pub mod models;
pub mod ratio;
pub mod settlement;
pub mod shares;
pub mod utils;
pub mod wallet;
