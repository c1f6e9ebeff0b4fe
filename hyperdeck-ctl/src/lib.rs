//! # hyperdeck-ctl
//!
//! Command-line controller for a HyperDeck. Loads a TOML config, drives
//! a [`hyperdeck_core::Deck`] and prints what comes back.

pub mod config;
pub mod render;
