//! engine-sidecar - runs search engine scrapers behind a stateless JSON API.
//!
//! Core library exposing the adapter modules to the `sidecar` binary and to
//! integration tests.

pub mod cli;
pub mod config;
pub mod continuation;
pub mod dispatcher;
pub mod manifest;
pub mod proxy;
pub mod routines;
pub mod server;
pub mod shim;
