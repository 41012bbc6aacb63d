//! Core of the property listing platform: the table-oriented record store, the per-client
//! rate limiter, the relevance search engine and the listing moderation workflow.

pub mod access;
pub mod clock;
pub mod config;
pub mod error;
pub mod listings;
pub mod moderation;
pub mod ops;
pub mod ratelimit;
pub mod search;
pub mod store;
pub mod telemetry;
pub mod users;
