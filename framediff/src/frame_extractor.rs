pub mod frame_extractor;
pub mod frame_rate;

pub use frame_extractor::FrameExtractor;
pub use frame_extractor::Result;
pub use frame_rate::{frame_step, FrameRateError, FrameStep};
