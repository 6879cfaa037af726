use std::fmt;

use color_eyre::eyre;
use image::RgbImage;

use crate::diff::{mean_abs_diff, DiffError, Threshold};
use crate::frame_extractor::FrameStep;

/// A frame moved past by a [`FrameSource`].
#[derive(Debug)]
pub enum Decoded {
    Frame(RgbImage),
    /// Decoded but never converted to an image, it was not going to be sampled.
    Skipped,
}

/// Frames in stream order. Only frames asked for with `convert` have to be turned into
/// images, the others may be returned as [`Decoded::Skipped`].
pub trait FrameSource {
    fn next_frame(&mut self, convert: bool) -> eyre::Result<Option<Decoded>>;
}

/// Already converted frames.
pub struct Images<I>(pub I);

impl<I> FrameSource for Images<I>
where
    I: Iterator<Item = eyre::Result<RgbImage>>,
{
    fn next_frame(&mut self, _convert: bool) -> eyre::Result<Option<Decoded>> {
        self.0.next().transpose().map(|frame| frame.map(Decoded::Frame))
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SampleError {
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error("frame {0} should have been sampled but was never converted")]
    NotConverted(u64),
}

/// The number of samples taken before this one. It is what the artifacts are named
/// after, so it only equals the elapsed time when the frame rate is exact and no frames
/// were dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SecondIndex(pub u64);

impl SecondIndex {
    pub fn hms(self) -> (u64, u64, u64) {
        let total = self.0;
        (total / 3600, (total % 3600) / 60, total % 60)
    }

    pub fn artifact_name(self) -> String {
        format!("frame_{self}.jpg")
    }
}

/// `HH_MM_SS`, the hours are never truncated.
impl fmt::Display for SecondIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hours, minutes, seconds) = self.hms();
        write!(f, "{hours:02}_{minutes:02}_{seconds:02}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Verdict {
    /// The very first sample, there is nothing to compare it with.
    First,
    /// At most the threshold away from the previous sample.
    Unchanged { score: f64 },
    /// Strictly more than the threshold away from the previous sample.
    Changed { score: f64 },
}

impl Verdict {
    pub fn score(self) -> Option<f64> {
        match self {
            Verdict::First => None,
            Verdict::Unchanged { score } | Verdict::Changed { score } => Some(score),
        }
    }

    pub fn is_changed(self) -> bool {
        matches!(self, Verdict::Changed { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub second: SecondIndex,
    pub verdict: Verdict,
}

/// Everything that has to survive from one frame to the next.
#[derive(Debug, Default)]
pub struct Carry {
    frames_seen: u64,
    samples_taken: u64,
    previous: Option<RgbImage>,
}

impl Carry {
    /// Moves past one frame. Returns the sample if the frame was on a sampling boundary,
    /// in which case it also becomes [`Carry::latest`].
    pub fn advance(
        mut self,
        frame: Decoded,
        step: FrameStep,
        threshold: Threshold,
    ) -> Result<(Self, Option<Sample>), SampleError> {
        let ordinal = self.frames_seen;
        self.frames_seen += 1;
        if ordinal % step.get() != 0 {
            return Ok((self, None));
        }
        let Decoded::Frame(frame) = frame else {
            return Err(SampleError::NotConverted(ordinal));
        };

        let second = SecondIndex(self.samples_taken);
        self.samples_taken += 1;

        let verdict = match &self.previous {
            None => Verdict::First,
            Some(previous) => {
                let score = mean_abs_diff(previous, &frame)?;
                if threshold.exceeded_by(score) {
                    Verdict::Changed { score }
                } else {
                    Verdict::Unchanged { score }
                }
            }
        };
        self.previous = Some(frame);

        Ok((self, Some(Sample { second, verdict })))
    }

    /// Whether the next frame given to [`Carry::advance`] will be sampled.
    pub fn samples_next(&self, step: FrameStep) -> bool {
        self.frames_seen % step.get() == 0
    }

    /// The most recently sampled frame.
    pub fn latest(&self) -> Option<&RgbImage> {
        self.previous.as_ref()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn samples_taken(&self) -> u64 {
        self.samples_taken
    }
}

/// Picks one frame per (rounded) second out of `frames` and compares each pick with the
/// one before it, calling `on_sample` with every sample and its image. Stops at the first
/// error, from either the frames, the comparison or `on_sample`.
pub fn sample_frames<I, F>(
    frames: I,
    step: FrameStep,
    threshold: Threshold,
    on_sample: F,
) -> eyre::Result<Carry>
where
    I: IntoIterator<Item = eyre::Result<RgbImage>>,
    F: FnMut(Sample, &RgbImage) -> eyre::Result<()>,
{
    sample_source(&mut Images(frames.into_iter()), step, threshold, on_sample)
}

/// Like [`sample_frames`], but only asks `source` to convert the frames that are sampled.
pub fn sample_source<S, F>(
    source: &mut S,
    step: FrameStep,
    threshold: Threshold,
    mut on_sample: F,
) -> eyre::Result<Carry>
where
    S: FrameSource + ?Sized,
    F: FnMut(Sample, &RgbImage) -> eyre::Result<()>,
{
    let mut carry = Carry::default();
    while let Some(frame) = source.next_frame(carry.samples_next(step))? {
        let (next, sample) = carry.advance(frame, step, threshold)?;
        carry = next;
        if let Some(sample) = sample {
            let image = carry
                .latest()
                .ok_or_else(|| eyre::eyre!("a sample was taken without keeping its frame"))?;
            on_sample(sample, image)?;
        }
    }
    Ok(carry)
}
