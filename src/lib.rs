//! scdloop - loop point editor for SCD game-audio files
//!
//! This library crate exposes the binary's configuration and output
//! rendering for integration testing.

pub mod config;
pub mod output;
