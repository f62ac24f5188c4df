//! signalsmith — compiles visual strategy documents into freqtrade strategy classes.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;

pub use domain::generator::{
    generate_code, generate_code_from_str, generate_code_with, GenerationResult,
};
