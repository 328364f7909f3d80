#![cfg(feature = "media-ffmpeg")]

//! FFmpeg-backed video file decode and encode.
//!
//! Frames are decoded (or encoded) fully in-memory; the pipeline only ever
//! sees RGB buffers. Codec internals stay inside ffmpeg.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;

/// Decoding source for a local video file.
pub(crate) struct VideoFileSource {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    fps: u32,
    finished: bool,
}

impl VideoFileSource {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("could not read video {}", path.display()))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("{} has no video track", path.display()))?;
        let stream_index = stream.index();

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() > 0 {
            (rate.numerator() as f64 / rate.denominator() as f64).round() as u32
        } else {
            30
        };

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;
        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            fps: fps.max(1),
            finished: false,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }

        let mut decoded = ffmpeg::frame::Video::empty();
        let mut rgb_frame = ffmpeg::frame::Video::empty();

        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                self.scaler
                    .run(&decoded, &mut rgb_frame)
                    .context("scale frame to RGB")?;
                return Ok(Some(frame_to_image(&rgb_frame)?));
            }

            let mut sent = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                sent = true;
                break;
            }
            if !sent {
                self.decoder.send_eof().ok();
                if self.decoder.receive_frame(&mut decoded).is_ok() {
                    self.scaler
                        .run(&decoded, &mut rgb_frame)
                        .context("scale frame to RGB")?;
                    return Ok(Some(frame_to_image(&rgb_frame)?));
                }
                self.finished = true;
                return Ok(None);
            }
        }
    }

    pub(crate) fn frame_rate(&self) -> u32 {
        self.fps
    }
}

fn frame_to_image(frame: &ffmpeg::frame::Video) -> Result<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }
    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("decoded frame did not form a {}x{} image", width, height))
}

/// Encoding sink writing an mp4 at a fixed size and frame rate.
pub(crate) struct VideoFileSink {
    octx: ffmpeg::format::context::Output,
    encoder: ffmpeg::codec::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    path: PathBuf,
    width: u32,
    height: u32,
    frame_index: i64,
}

impl VideoFileSink {
    pub(crate) fn open(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let fps = fps.max(1);
        let mut octx = ffmpeg::format::output(&path)
            .with_context(|| format!("could not create video output {}", path.display()))?;

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or_else(|| anyhow!("mpeg4 encoder unavailable"))?;
        let mut stream = octx.add_stream(codec).context("add video stream")?;

        let mut enc = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("open ffmpeg video encoder context")?;
        enc.set_width(width);
        enc.set_height(height);
        enc.set_format(ffmpeg::util::format::pixel::Pixel::YUV420P);
        enc.set_time_base(ffmpeg::Rational::new(1, fps as i32));
        enc.set_frame_rate(Some(ffmpeg::Rational::new(fps as i32, 1)));

        let encoder = enc.open_as(codec).context("open mpeg4 encoder")?;
        stream.set_parameters(&encoder);
        stream.set_time_base(ffmpeg::Rational::new(1, fps as i32));

        octx.write_header().context("write video header")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            ffmpeg::util::format::pixel::Pixel::RGB24,
            width,
            height,
            ffmpeg::util::format::pixel::Pixel::YUV420P,
            width,
            height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create encoder scaler")?;

        Ok(Self {
            octx,
            encoder,
            scaler,
            path: path.to_path_buf(),
            width,
            height,
            frame_index: 0,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(anyhow!(
                "frame {}x{} does not match video output {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            ));
        }

        let mut rgb = ffmpeg::frame::Video::new(
            ffmpeg::util::format::pixel::Pixel::RGB24,
            self.width,
            self.height,
        );
        let stride = rgb.stride(0);
        let row_bytes = (self.width as usize) * 3;
        let raw = frame.as_raw();
        let data = rgb.data_mut(0);
        for row in 0..self.height as usize {
            let src = &raw[row * row_bytes..(row + 1) * row_bytes];
            data[row * stride..row * stride + row_bytes].copy_from_slice(src);
        }

        let mut yuv =
            ffmpeg::frame::Video::new(ffmpeg::util::format::pixel::Pixel::YUV420P, self.width, self.height);
        self.scaler
            .run(&rgb, &mut yuv)
            .context("scale frame to YUV420P")?;
        yuv.set_pts(Some(self.frame_index));
        self.frame_index += 1;

        self.encoder
            .send_frame(&yuv)
            .context("send frame to encoder")?;
        self.drain_packets()
    }

    pub(crate) fn finish(&mut self) -> Result<()> {
        self.encoder.send_eof().context("flush encoder")?;
        self.drain_packets()?;
        self.octx.write_trailer().context("write video trailer")?;
        Ok(())
    }

    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet
                .write_interleaved(&mut self.octx)
                .context("write video packet")?;
        }
        Ok(())
    }
}
