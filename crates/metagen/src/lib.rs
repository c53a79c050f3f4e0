//! metagen - AI annotation engine for catalog metadata.
//!
//! Core library exposing the domain modules shared by the annotation and CLI crates:
//! model routing, provider adapters, health tracking, validation and catalog storage.

// Model types use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod config;
pub mod llm;
pub mod models;
pub mod registry;
pub mod repository;
pub mod utils;
pub mod validation;
