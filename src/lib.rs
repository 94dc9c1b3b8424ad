//! Tollgate - Fixed-Window Rate Limiting Service
//!
//! This crate implements a fixed-window rate limiter whose counters live in a shared
//! external store, so every instance of the service enforces the same quota. The store
//! must offer an atomic increment that sets the expiry only when it creates a counter;
//! Redis provides this through a server-side script.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod ratelimit;
