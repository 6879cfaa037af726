pub mod batch;
pub mod diff;
pub mod extract;
pub mod frame_extractor;
pub mod sampling;
