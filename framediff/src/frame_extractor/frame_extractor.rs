extern crate ffmpeg_next as ffmpeg;

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use color_eyre::eyre::{self, Context};
use ffmpeg::codec::Context as CodecContext;
use ffmpeg::decoder::Video as DecoderVideo;
use ffmpeg::format::context::Input as FormatContext;
use ffmpeg::format::{input, Pixel};
use ffmpeg::frame::Video as FrameVideo;
use ffmpeg::media::Type;
use ffmpeg::software::scaling::context::Context as ScalingContext;
use ffmpeg::util::log as ffmpeglog;
use ffmpeg::{Packet as CodecPacket, Rational};
use image::RgbImage;

use crate::sampling::{Decoded, FrameSource};

pub type Result<T> = eyre::Result<T>;

static FFMPEG_INITIALIZED: OnceLock<std::result::Result<(), ffmpeg::Error>> =
    OnceLock::new();

/// Decodes every frame of the best video stream of a file, in order, as RGB images.
///
/// All ffmpeg contexts are owned, so dropping this releases the file and the decoder.
pub struct FrameExtractor {
    // ffmpeg contexts
    ictx: FormatContext,
    decoder: DecoderVideo,
    converter: ScalingContext,

    // constants/metadata
    video_stream_index: usize,
    frame_rate: Option<f64>,
    orientation: Orientation,
    width: u32,
    height: u32,
}

impl FrameExtractor {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        if let Err(e) = FFMPEG_INITIALIZED.get_or_init(|| {
            ffmpeg::init()?;
            ffmpeglog::set_level(ffmpeglog::Level::Error);
            Ok(())
        }) {
            return Err(*e).wrap_err("Failed to initialize ffmpeg");
        }

        let mut ictx = input(&path).wrap_err("Failed to open the file")?;

        let video = ictx
            .streams()
            .best(Type::Video)
            .ok_or(eyre::eyre!("No video stream"))?;

        let video_stream_index = video.index();
        let frame_rate = stream_frame_rate(&video);

        let orientation = match get_orientation(&video) {
            Some(x) => x,
            None => {
                log::warn!(
                    "Got a weird orientation angle, ignoring ({})",
                    path.as_ref().display()
                );
                Orientation::Normal
            }
        };

        let decoder = CodecContext::from_parameters(video.parameters())
            .wrap_err("No codec found")?
            .decoder()
            .video()
            .wrap_err("No codec found, of type video (?)")?;

        let converter = pixel_converter(&decoder)?;
        let (width, height) = (decoder.width(), decoder.height());

        ictx.streams_mut()
            .filter(|stream| stream.index() != video_stream_index)
            .for_each(|mut stream| stream_set_discard_all(&mut stream));

        Ok(Self {
            ictx,
            decoder,
            converter,
            video_stream_index,
            frame_rate,
            orientation,
            width,
            height,
        })
    }

    /// The nominal frame rate of the video stream, if it reports a usable one.
    pub fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    /// Returns the next frame in decode order, or `None` once the stream is exhausted.
    pub fn next(&mut self) -> Result<Option<RgbImage>> {
        match self.receive()? {
            Some(frame) => self.convert(&frame).map(Some),
            None => Ok(None),
        }
    }

    fn receive(&mut self) -> Result<Option<FrameVideo>> {
        loop {
            let mut frame = FrameVideo::empty();
            // avcodec_receive_frame
            // https://ffmpeg.org/doxygen/trunk/group__lavc__decoding.html#ga11e6542c4e66d3028668788a1a74217c
            match self.decoder.receive_frame(&mut frame) {
                Ok(()) => return Ok(Some(frame)),
                Err(ffmpeg::Error::Other {
                    errno: libc::EAGAIN,
                }) => self.feed_decoder()?,
                // End of stream situations.
                // https://ffmpeg.org/doxygen/trunk/avcodec_8h_source.html
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(e) => {
                    return Err(e).wrap_err("Decoder error when receiving a frame from it");
                }
            }
        }
    }

    fn convert(&mut self, frame: &FrameVideo) -> Result<RgbImage> {
        let mut converted = FrameVideo::empty();
        self.converter
            .run(frame, &mut converted)
            .wrap_err("Failed to convert the decoded frame")?;
        let img = create_rust_image(converted)?;
        Ok(undo_rotation(img, self.orientation))
    }

    /// Sends the next packet of the video stream to the decoder, or EOF if there are no
    /// more packets.
    fn feed_decoder(&mut self) -> Result<()> {
        loop {
            // http://ffmpeg.org/doxygen/trunk/group__lavf__decoding.html#ga4fdb3084415a82e3810de6ee60e46a61
            let mut packet = CodecPacket::empty();
            match packet.read(&mut self.ictx) {
                Ok(()) if packet.stream() == self.video_stream_index => {
                    match self.decoder.send_packet(&packet) {
                        Ok(()) => return Ok(()),
                        Err(e) => {
                            log::error!("Failed to decode a packet: {e}");
                            continue;
                        }
                    }
                }
                Ok(()) => continue,
                Err(ffmpeg::Error::Eof) => {
                    return self
                        .decoder
                        .send_eof()
                        .wrap_err("Failed to send EOF to the decoder");
                }
                Err(e) => {
                    eyre::bail!("Failed to read a packet from the stream: {e}");
                }
            }
        }
    }

    pub fn iter(&mut self) -> FrameExtractorIter<'_> {
        FrameExtractorIter { extractor: self }
    }
}

/// Frames that are not converted are still fully decoded, only the pixel conversion is
/// skipped.
impl FrameSource for FrameExtractor {
    fn next_frame(&mut self, convert: bool) -> Result<Option<Decoded>> {
        match self.receive()? {
            Some(frame) if convert => self.convert(&frame).map(|img| Some(Decoded::Frame(img))),
            Some(_) => Ok(Some(Decoded::Skipped)),
            None => Ok(None),
        }
    }
}

pub struct FrameExtractorIter<'a> {
    extractor: &'a mut FrameExtractor,
}

impl Iterator for FrameExtractorIter<'_> {
    type Item = Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.extractor.next().transpose()
    }
}

fn pixel_converter(decoder: &DecoderVideo) -> Result<ScalingContext> {
    eyre::ensure!(decoder.format() != Pixel::None, "No pixel format");
    ScalingContext::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        // http://git.videolan.org/?p=ffmpeg.git;a=blob;f=libavutil/pixfmt.h;hb=HEAD
        Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg::software::scaling::Flags::FAST_BILINEAR,
    )
    .wrap_err("Failed to create the pixel converter")
}

/// The average frame rate, or the guessed base rate if the container doesn't know the
/// average.
fn stream_frame_rate(video: &ffmpeg::Stream) -> Option<f64> {
    [video.avg_frame_rate(), video.rate()]
        .into_iter()
        .filter(|rate: &Rational| rate.denominator() != 0)
        .map(f64::from)
        .find(|fps| fps.is_finite() && *fps > 0.0)
}

#[derive(Clone, Copy, Debug)]
enum Orientation {
    Normal,
    Left,
    Right,
    Upside,
}

fn get_orientation(video: &ffmpeg::Stream) -> Option<Orientation> {
    for data in video.side_data() {
        if data.kind() != ffmpeg::packet::side_data::Type::DisplayMatrix {
            continue;
        }
        let rot = unsafe {
            ffmpeg_sys_next::av_display_rotation_get(data.data().as_ptr() as *const i32)
        };

        if rot.is_finite() {
            return match rot.round() as i32 {
                -90 => Some(Orientation::Right),
                90 => Some(Orientation::Left),
                0 => Some(Orientation::Normal),
                180 | -180 => Some(Orientation::Upside),
                _ => None,
            };
        }
    }

    Some(Orientation::Normal)
}

fn undo_rotation(img: RgbImage, ori: Orientation) -> RgbImage {
    match ori {
        Orientation::Normal => img,
        Orientation::Right => image::imageops::rotate90(&img),
        Orientation::Left => image::imageops::rotate270(&img),
        Orientation::Upside => image::imageops::rotate180(&img),
    }
}

/// Copies the RGB24 plane into an image, dropping any row padding ffmpeg added.
fn create_rust_image(converted: FrameVideo) -> Result<RgbImage> {
    eyre::ensure!(
        converted.format() == Pixel::RGB24 && converted.planes() == 1,
        "The converted frame is not packed RGB24"
    );

    let src_linesize = converted.stride(0);
    let width = converted.width();
    let height = converted.height();
    let trg_linesize = 3 * width as usize;
    let data = converted.data(0);

    // https://stackoverflow.com/a/57666844
    let data = if src_linesize == trg_linesize {
        data.to_vec()
    } else {
        eyre::ensure!(
            src_linesize >= trg_linesize,
            "The frame rows are shorter than the width"
        );
        data.chunks(src_linesize)
            .take(height as usize)
            .flat_map(|row| &row[..trg_linesize])
            .copied()
            .collect()
    };

    RgbImage::from_vec(width, height, data)
        .ok_or_else(|| eyre::eyre!("The frame buffer is smaller than {width}x{height}"))
}

fn stream_set_discard_all(stream: &mut ffmpeg::StreamMut<'_>) {
    unsafe {
        let ptr = stream.as_mut_ptr();
        if !ptr.is_null() {
            (*ptr).discard = ffmpeg_sys_next::AVDiscard::AVDISCARD_ALL;
        }
    }
}

impl fmt::Debug for FrameExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            video_stream_index,
            frame_rate,
            orientation,
            width,
            height,
            ..
        } = self;

        f.debug_struct("FrameExtractor")
            .field("stream", video_stream_index)
            .field("fps", frame_rate)
            .field("size", &format_args!("{width}x{height}"))
            .field("orientation", orientation)
            .finish()
    }
}
