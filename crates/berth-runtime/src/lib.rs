//! Container lifecycle coordination for Berth.
//!
//! The [`coordinator::Coordinator`] serializes mutating operations per
//! container identifier and drives a [`backend::RuntimeBackend`]; the
//! [`registry::Registry`] mirrors runtime state into atomically published
//! snapshots that readers never block on.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod command;
pub mod coordinator;
pub mod lock;
pub mod proxy;
pub mod refresh;
pub mod registry;
pub mod translate;
