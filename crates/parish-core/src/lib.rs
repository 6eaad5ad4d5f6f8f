//! Core types and trait definitions for the parish intake and review system.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! approval engine and relationship helpers run against the [`store::GraphTx`]
//! seam, which storage backends implement over one open transaction.

// Native `async fn` in traits; the `Send` bounds are spelled out on the
// trait's return types.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod graph;
pub mod link;
pub mod parishioner;
pub mod review;
pub mod store;
pub mod submission;

#[cfg(test)]
mod testing;

pub use error::{AsDomainError, Error, Result};
