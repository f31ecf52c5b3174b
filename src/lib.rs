//! Foodgram - recipe sharing backend
//!
//! Users publish recipes built from a shared ingredient catalog, tag them,
//! favorite them, follow authors and collect recipes into a shopping cart
//! that renders as one aggregated shopping list.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
