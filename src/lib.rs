//! Staffing conflict detection and timeline layout.
//!
//! The [`engine::Engine`] reads booking snapshots from a
//! [`engine::BookingStore`] and answers four kinds of questions: does a
//! proposed assignment collide with existing ones, where are a resource's
//! free gaps, when are several resources free together, and how should a
//! resource's bookings be stacked into rows on a timeline.

pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;

pub use config::EngineConfig;
pub use engine::{BookingStore, Engine, EngineError, InMemoryStore};
