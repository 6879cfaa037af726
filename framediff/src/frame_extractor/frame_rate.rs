use std::num::NonZeroU64;

/// How many decoded frames make up one sampled second.
pub type FrameStep = NonZeroU64;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FrameRateError {
    #[error("the video does not report a frame rate")]
    Unavailable,
    #[error("the reported frame rate {0} is not a positive number")]
    Invalid(f64),
}

/// Rounds the nominal frame rate to the number of frames between two samples. Rates below
/// half a frame per second still sample every frame.
pub fn frame_step(frame_rate: Option<f64>) -> Result<FrameStep, FrameRateError> {
    let fps = frame_rate.ok_or(FrameRateError::Unavailable)?;
    if !fps.is_finite() || fps <= 0.0 {
        return Err(FrameRateError::Invalid(fps));
    }

    // NOTE: `as` saturates, absurdly large rates end up as u64::MAX
    let step = fps.round() as u64;
    Ok(NonZeroU64::new(step).unwrap_or(NonZeroU64::MIN))
}
