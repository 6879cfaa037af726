use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use color_eyre::eyre::{self, Context};
use framediff_common::utils::{
    fsutils,
    math::{Average, Peak},
};
use image::{codecs::jpeg::JpegEncoder, ColorType, RgbImage};

use crate::{
    diff::Threshold,
    frame_extractor::{frame_step, FrameExtractor},
    sampling::{sample_source, FrameSource, Images, Verdict},
};

pub const OUTPUT_DIR_PREFIX: &str = "output_";
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub threshold: Threshold,
    pub jpeg_quality: u8,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            threshold: Threshold::DEFAULT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

pub enum Opened {
    Opened(FrameExtractor),
    Unopenable(eyre::Report),
}

pub fn open_video(video: &Path) -> Opened {
    match FrameExtractor::new(video) {
        Ok(extractor) => Opened::Opened(extractor),
        Err(e) => Opened::Unopenable(e),
    }
}

#[derive(Debug)]
pub enum VideoOutcome {
    Processed(Summary),
    /// The file could not be opened as a video, nothing was written.
    Unopenable(eyre::Report),
    /// Something went wrong after the video was opened, the artifacts written before the
    /// error are left in place.
    Failed(eyre::Report),
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub frames: u64,
    pub samples: u64,
    pub saved: u64,
    pub average_score: f64,
    pub peak_score: Option<f64>,
    pub elapsed: Duration,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = Duration::from_millis(
            self.elapsed.as_millis().try_into().unwrap_or(u64::MAX),
        );
        write!(
            f,
            "saved {} of {} samples ({} frames) in {}, average difference {:.3}",
            self.saved,
            self.samples,
            self.frames,
            humantime::format_duration(elapsed),
            self.average_score,
        )?;
        if let Some(peak) = self.peak_score {
            write!(f, ", peak {peak:.3}")?;
        }
        Ok(())
    }
}

/// `<output_root>/output_<video stem>`
pub fn output_dir_for(video: &Path, output_root: &Path) -> eyre::Result<PathBuf> {
    let stem = video
        .file_stem()
        .ok_or_else(|| eyre::eyre!("{} has no file name", video.display()))?;
    let mut name = std::ffi::OsString::from(OUTPUT_DIR_PREFIX);
    name.push(stem);
    Ok(output_root.join(name))
}

/// Samples a video once per second and saves the frames that differ enough from the
/// previous sample into `<output_root>/output_<stem>`. Every failure is logged and
/// reported in the outcome, never propagated.
pub fn extract_frames(
    video: &Path,
    output_root: &Path,
    options: &ExtractOptions,
) -> VideoOutcome {
    let mut extractor = match open_video(video) {
        Opened::Opened(extractor) => extractor,
        Opened::Unopenable(e) => {
            log::error!("Could not open video {}: {e:#}", video.display());
            return VideoOutcome::Unopenable(e);
        }
    };
    log::debug!("Opened {}: {extractor:?}", video.display());

    let frame_rate = extractor.frame_rate();
    let res = output_dir_for(video, output_root).and_then(|outdir| {
        extract_from_source(frame_rate, &mut extractor, &outdir, options)
    });

    match res {
        Ok(summary) => {
            log::info!("Finished {}: {summary}", video.display());
            VideoOutcome::Processed(summary)
        }
        Err(e) => {
            log::error!("Failed to process {}: {e:?}", video.display());
            VideoOutcome::Failed(e)
        }
    }
}

/// The routine without the decoding: `frames` are the decoded frames in stream order and
/// `frame_rate` their nominal rate. Artifacts are written directly into `outdir`, which
/// is created once the frame rate has been found usable.
pub fn extract_from_frames<I>(
    frame_rate: Option<f64>,
    frames: I,
    outdir: &Path,
    options: &ExtractOptions,
) -> eyre::Result<Summary>
where
    I: IntoIterator<Item = eyre::Result<RgbImage>>,
{
    extract_from_source(
        frame_rate,
        &mut Images(frames.into_iter()),
        outdir,
        options,
    )
}

/// Like [`extract_from_frames`], but only the sampled frames are converted to images.
pub fn extract_from_source<S>(
    frame_rate: Option<f64>,
    source: &mut S,
    outdir: &Path,
    options: &ExtractOptions,
) -> eyre::Result<Summary>
where
    S: FrameSource + ?Sized,
{
    let start = Instant::now();

    let step = frame_step(frame_rate).wrap_err("No usable frame rate")?;
    log::info!(
        "Frame rate: {} fps, sampling every {step} frames",
        frame_rate.unwrap_or_default()
    );

    if fsutils::ensure_dir(outdir).wrap_err_with(|| {
        format!("Failed to create the output folder at {}", outdir.display())
    })? {
        log::info!("Created folder: {}", outdir.display());
    }

    let mut saved = 0;
    let mut average = Average::new();
    let mut peak = Peak::default();

    let carry = sample_source(source, step, options.threshold, |sample, image| {
        if let Some(score) = sample.verdict.score() {
            average.add(score);
            peak.add(score);
        }

        let path = outdir.join(sample.second.artifact_name());
        if sample.verdict.is_changed() {
            write_jpeg(image, &path, options.jpeg_quality)?;
            saved += 1;
            log::info!("{}", decision_line(sample.verdict, &path));
        } else {
            log::debug!("{}", decision_line(sample.verdict, &path));
        }
        Ok(())
    })?;

    Ok(Summary {
        frames: carry.frames_seen(),
        samples: carry.samples_taken(),
        saved,
        average_score: average.average(),
        peak_score: peak.peak(),
        elapsed: start.elapsed(),
    })
}

/// What happened to a sample, `path` is where it is, or would have been, saved.
fn decision_line(verdict: Verdict, path: &Path) -> String {
    match verdict {
        Verdict::First => format!("Skipped first frame: {}", path.display()),
        Verdict::Unchanged { score } => {
            format!("Skipped frame with difference {score:.3}: {}", path.display())
        }
        Verdict::Changed { score } => {
            format!("Saved frame with difference {score:.3}: {}", path.display())
        }
    }
}

/// Overwrites `path` if it already exists.
pub fn write_jpeg(image: &RgbImage, path: &Path, quality: u8) -> eyre::Result<()> {
    let file = File::create(path)
        .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality)
        .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .wrap_err_with(|| format!("Failed to encode {}", path.display()))?;
    writer
        .flush()
        .wrap_err_with(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Rgb;

    fn filled(value: u8) -> RgbImage {
        RgbImage::from_pixel(8, 8, Rgb([value; 3]))
    }

    fn second(values: &[u8], per_second: usize) -> Vec<eyre::Result<RgbImage>> {
        values
            .iter()
            .flat_map(|v| std::iter::repeat(*v).take(per_second))
            .map(|v| Ok(filled(v)))
            .collect()
    }

    fn saved_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn output_dir_name() {
        assert_eq!(
            Path::new("out/output_clip"),
            output_dir_for(Path::new("videos/sub/clip.mp4"), Path::new("out")).unwrap()
        );
        assert_eq!(
            Path::new("out/output_a.b"),
            output_dir_for(Path::new("a.b.mkv"), Path::new("out")).unwrap()
        );
        assert!(output_dir_for(Path::new("/"), Path::new("out")).is_err());
    }

    #[test]
    fn saves_changed_seconds() {
        let tmp = tempfile::tempdir().unwrap();
        let outdir = tmp.path().join("output_synthetic");
        let options = ExtractOptions {
            threshold: Threshold::new(5.0).unwrap(),
            ..Default::default()
        };

        let summary = extract_from_frames(
            Some(4.0),
            second(&[0, 0, 100, 100, 103, 200], 4),
            &outdir,
            &options,
        )
        .unwrap();

        assert_eq!(24, summary.frames);
        assert_eq!(6, summary.samples);
        assert_eq!(2, summary.saved);
        assert_eq!(Some(100.0), summary.peak_score);
        assert_eq!(
            vec!["frame_00_00_02.jpg", "frame_00_00_05.jpg"],
            saved_files(&outdir)
        );
    }

    #[test]
    fn zero_threshold_never_saves_the_first_sample() {
        let tmp = tempfile::tempdir().unwrap();
        let outdir = tmp.path().join("out");
        let options = ExtractOptions {
            threshold: Threshold::ZERO,
            ..Default::default()
        };

        let summary =
            extract_from_frames(Some(1.0), second(&[50], 1), &outdir, &options).unwrap();

        assert_eq!(1, summary.samples);
        assert_eq!(0, summary.saved);
        assert!(saved_files(&outdir).is_empty());
    }

    #[test]
    fn no_frame_rate_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let outdir = tmp.path().join("out");

        let res = extract_from_frames(
            None,
            second(&[0, 50], 1),
            &outdir,
            &ExtractOptions::default(),
        );

        assert!(res.is_err());
        assert!(!outdir.exists());
    }

    #[test]
    fn unwritable_output_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let outdir = tmp.path().join("taken");
        std::fs::write(&outdir, "a file").unwrap();

        let res = extract_from_frames(
            Some(1.0),
            second(&[0, 50], 1),
            &outdir,
            &ExtractOptions::default(),
        );
        assert!(res.is_err());
    }

    #[test]
    fn decisions_name_the_artifact() {
        let path = Path::new("out/output_clip/frame_00_01_05.jpg");
        assert_eq!(
            "Skipped first frame: out/output_clip/frame_00_01_05.jpg",
            decision_line(Verdict::First, path)
        );
        assert_eq!(
            "Skipped frame with difference 1.500: out/output_clip/frame_00_01_05.jpg",
            decision_line(Verdict::Unchanged { score: 1.5 }, path)
        );
        assert_eq!(
            "Saved frame with difference 42.000: out/output_clip/frame_00_01_05.jpg",
            decision_line(Verdict::Changed { score: 42.0 }, path)
        );
    }

    #[test]
    fn jpeg_is_readable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("frame.jpg");
        write_jpeg(&filled(128), &path, DEFAULT_JPEG_QUALITY).unwrap();

        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!((8, 8), back.dimensions());
        assert!(back.get_pixel(3, 3)[0].abs_diff(128) <= 2);
    }
}
