//! Core domain types and logic.

pub mod document;
pub mod emitter;
pub mod error;
pub mod expr;
pub mod generator;
pub mod generator_config;
pub mod indicator;
pub mod leverage;
pub mod limits;
pub mod mirror;
pub mod normalizer;
