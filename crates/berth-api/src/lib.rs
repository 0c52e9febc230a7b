//! HTTP/JSON gateway for Berth.
//!
//! Handlers receive an [`AppState`] and translate between JSON bodies and
//! coordinator calls. Every failure leaves as `{"error": kind, "message"}`
//! with a status derived from the error kind.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod handlers;
pub mod router;
pub mod view;

pub use router::{AppState, create_router, serve};
