//! Integration suite: commands end to end through the executor.

#[path = "../common/mod.rs"]
mod common;

mod collections;
mod concurrency;
mod config;
mod documents;
mod recovery;
mod search;
