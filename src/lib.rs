//! # SQL Guard Library
//!
//! Runtime SQL safety validation and dialect-aware row-limit rewriting.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod dedup;
pub mod dialect;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod rewriter;
pub mod rules;
pub mod strategy;
pub mod validator;
