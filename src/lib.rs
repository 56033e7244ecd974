//! Filter service: moderation pipeline for markdown chat messages.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod oracle;
pub mod probe;
pub mod reconciler;
pub mod scanner;
pub mod store;
