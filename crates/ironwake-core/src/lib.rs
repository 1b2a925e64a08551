//! Ironwake Core — shared domain abstractions.
//!
//! This crate defines the fundamental traits and types that every layer of
//! the session engine depends on: the domain error, the time and randomness
//! seams, the command-history entry types, the persistence port and the rules
//! configuration. It contains no infrastructure code.

pub mod command;
pub mod config;
pub mod error;
pub mod history;
pub mod repository;
pub mod rng;
pub mod time;
