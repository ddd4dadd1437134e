//! Database models and query functions.

pub mod chapters;
pub mod models;
