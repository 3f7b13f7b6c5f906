//! Core types and trait definitions for the Zeitgeist event log.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::EventLog`]; everything they share
//! (the event model, the template language, the taxonomy and the extension
//! interface) lives here.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod blacklist;
pub mod datasource;
pub mod error;
pub mod event;
pub mod extension;
pub mod monitor;
pub mod query;
pub mod store;
pub mod taxonomy;
pub mod template;
pub mod wire;

pub use error::{Error, Result};
pub use event::{Event, EventId, MOVE_EVENT, Subject};
