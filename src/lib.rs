//! blogpulse - blog reader and dashboard backend
//!
//! Posts with an append-only comment ledger, per-session visit counting and
//! the analytics derived from them, served over an axum HTTP API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
