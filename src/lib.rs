//! gdmods - Grim Dawn mod content reconciliation
//!
//! This crate provides:
//! - Classification and normalization of mod directory layouts
//! - Parallel database extraction through the game's archive tool, merged
//!   into one destination with step-based progress events
//! - Checksum records that skip extraction when nothing changed

pub const APP_VERSION: &str = "0.1.0";

pub mod app;
pub mod checker;
pub mod config;
pub mod extract;
pub mod game;
pub mod hash;
pub mod lifecycle;
pub mod progress;
pub mod tree;

pub use app::App;
pub use config::Config;
