//! Kitchen display kernel.
//!
//! Merges wall clock, shared calendar and weather forecast into one
//! [`models::DisplayState`], renders and encodes it to PNG only when it has
//! actually changed, and serves the result to a low-power polling client.
//!
//! Data flow: pollers -> [`tracker`] (compare-before-write, version bump) ->
//! [`pipeline`] (render, then encode off-thread) -> [`artifact::ArtifactStore`]
//! -> [`http`].

pub mod artifact;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod encode;
pub mod http;
pub mod models;
pub mod pipeline;
pub mod poller;
pub mod render;
pub mod schedule;
pub mod scheduler;
pub mod service;
pub mod status;
pub mod tracker;
pub mod weather;

pub use service::Service;
