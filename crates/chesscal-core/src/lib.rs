//! Core types: calendar events and tracing setup

pub mod event;
pub mod tracing;

pub use event::{CalendarEvent, EventDateTime};
pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
