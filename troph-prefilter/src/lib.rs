//! troph-prefilter library interface
//!
//! Frame scoring and the resumable camera-day sweep, exposed for the binary
//! and for integration tests.

pub mod frame_processor;
pub mod sweep;

pub use frame_processor::{FrameProcessor, FrameResult};
pub use sweep::{SweepRequest, SweepScheduler};
