//! Chapter performance API: an axum HTTP surface over Postgres, with a
//! Redis-backed read-through response cache and per-IP admission control.

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod kv;
pub mod logging;
pub mod state;
pub mod web;
