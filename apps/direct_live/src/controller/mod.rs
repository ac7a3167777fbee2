//! Controller layer: panel events, presentation, and command orchestration.

pub mod events;
pub mod orchestration;
pub mod presenter;
