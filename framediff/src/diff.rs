use std::{fmt, str::FromStr};

use image::RgbImage;

/// Cutoff for the difference score. A sampled frame is kept when its score is strictly
/// greater than this.
#[derive(Clone, Copy, Debug, PartialOrd, PartialEq)]
pub struct Threshold(f64);

#[derive(thiserror::Error, Debug)]
#[error("not a valid threshold, expected a non-negative number")]
pub struct ThresholdError;

impl Threshold {
    /// Used by both the library and the command line.
    pub const DEFAULT: Self = Threshold(10.0);
    pub const ZERO: Self = Threshold(0.0);

    pub fn new(float: f64) -> Result<Self, ThresholdError> {
        if float.is_finite() && float >= 0.0 {
            Ok(Threshold(float))
        } else {
            Err(ThresholdError)
        }
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }

    pub fn exceeded_by(self, score: f64) -> bool {
        score > self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f64> for Threshold {
    type Error = ThresholdError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for Threshold {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let num: f64 = s.trim().parse().map_err(|_| ThresholdError)?;
        Self::new(num)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DiffError {
    #[error("can't compare a {0}x{1} frame with a {2}x{3} frame")]
    SizeMismatch(u32, u32, u32, u32),
}

/// The mean over every pixel channel of the absolute intensity difference between two
/// frames of the same size. Empty frames score 0.
pub fn mean_abs_diff(a: &RgbImage, b: &RgbImage) -> Result<f64, DiffError> {
    if a.dimensions() != b.dimensions() {
        return Err(DiffError::SizeMismatch(
            a.width(),
            a.height(),
            b.width(),
            b.height(),
        ));
    }

    let a = a.as_raw();
    let b = b.as_raw();
    if a.is_empty() {
        return Ok(0.0);
    }

    let sum: u64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| u64::from(x.abs_diff(*y)))
        .sum();
    Ok(sum as f64 / a.len() as f64)
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Rgb;

    fn filled(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value; 3]))
    }

    #[test]
    fn identical_frames() {
        let a = filled(4, 3, 77);
        assert_eq!(Ok(0.0), mean_abs_diff(&a, &a.clone()));
    }

    #[test]
    fn difference_is_symmetric() {
        let a = filled(4, 3, 10);
        let b = filled(4, 3, 20);
        assert_eq!(Ok(10.0), mean_abs_diff(&a, &b));
        assert_eq!(Ok(10.0), mean_abs_diff(&b, &a));
    }

    #[test]
    fn mean_over_channels() {
        let a = RgbImage::from_raw(2, 1, vec![0, 0, 0, 0, 0, 0]).unwrap();
        let b = RgbImage::from_raw(2, 1, vec![255, 0, 0, 0, 0, 51]).unwrap();
        assert_eq!(Ok(51.0), mean_abs_diff(&a, &b));
    }

    #[test]
    fn size_mismatch() {
        assert_eq!(
            Err(DiffError::SizeMismatch(2, 2, 3, 2)),
            mean_abs_diff(&filled(2, 2, 0), &filled(3, 2, 0))
        );
    }

    #[test]
    fn empty_frames() {
        assert_eq!(Ok(0.0), mean_abs_diff(&filled(0, 0, 0), &filled(0, 0, 0)));
    }

    #[test]
    fn threshold_is_strict() {
        let t = Threshold::new(10.0).unwrap();
        assert!(!t.exceeded_by(10.0));
        assert!(t.exceeded_by(10.0 + 1e-9));
        assert!(!Threshold::ZERO.exceeded_by(0.0));
    }

    #[test]
    fn threshold_parsing() {
        assert_eq!(0.5, "0.5".parse::<Threshold>().unwrap().as_f64());
        assert_eq!(Threshold::DEFAULT, "10".parse::<Threshold>().unwrap());
        assert!("-1".parse::<Threshold>().is_err());
        assert!("nan".parse::<Threshold>().is_err());
        assert!("inf".parse::<Threshold>().is_err());
        assert!("ten".parse::<Threshold>().is_err());
    }

    #[test]
    fn threshold_display_parses_back() {
        let t = Threshold::new(2.25).unwrap();
        assert_eq!(t, t.to_string().parse::<Threshold>().unwrap());
    }
}
