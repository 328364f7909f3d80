#![cfg(feature = "camera-v4l2")]

//! V4L2 camera capture.
//!
//! Frames are captured through a memory-mapped buffer stream and converted
//! to RGB in-memory. The mmap stream borrows the device, hence the
//! self-referencing state struct.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use ouroboros::self_referencing;

use super::camera::CameraConfig;

pub(crate) struct V4l2Camera {
    state: V4l2State,
    width: u32,
    height: u32,
    fourcc: [u8; 4],
    target_fps: u32,
    last_error: Option<String>,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    pub(crate) fn open(config: &CameraConfig) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = open_device(&config.device)?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("failed to set format on {}: {}", config.device, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("failed to set fps on {}: {}", config.device, err);
            }
        }

        let width = format.width;
        let height = format.height;
        let fourcc = format.fourcc.repr;

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "camera: connected to {} ({}x{}, {})",
            config.device,
            width,
            height,
            String::from_utf8_lossy(&fourcc)
        );

        Ok(Self {
            state,
            width,
            height,
            fourcc,
            target_fps: config.target_fps,
            last_error: None,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        use v4l::io::traits::CaptureStream;

        let buf = match self.state.with_stream_mut(|stream| {
            stream.next().map(|(buf, _meta)| buf.to_vec())
        }) {
            Ok(buf) => buf,
            Err(err) => {
                self.last_error = Some(err.to_string());
                return Err(anyhow::Error::new(err).context("capture v4l2 frame"));
            }
        };

        let rgb = match &self.fourcc {
            b"RGB3" => rgb_from_packed(&buf, self.width, self.height)?,
            b"YUYV" => rgb_from_yuyv(&buf, self.width, self.height)?,
            other => {
                return Err(anyhow!(
                    "unsupported v4l2 pixel format {}",
                    String::from_utf8_lossy(other)
                ))
            }
        };

        self.last_error = None;
        Ok(Some(rgb))
    }

    pub(crate) fn frame_rate(&self) -> u32 {
        self.target_fps.max(1)
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }
}

fn open_device(device: &str) -> Result<v4l::Device> {
    // Accept a bare index ("1") as well as a device path.
    if let Ok(index) = device.parse::<usize>() {
        return v4l::Device::new(index)
            .with_context(|| format!("unable to access camera at index {}", index));
    }
    v4l::Device::with_path(device)
        .with_context(|| format!("unable to access camera at {}", device))
}

fn rgb_from_packed(buf: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    let expected = (width * height * 3) as usize;
    let data = buf
        .get(..expected)
        .ok_or_else(|| anyhow!("short v4l2 RGB3 buffer: {} < {}", buf.len(), expected))?;
    RgbImage::from_raw(width, height, data.to_vec())
        .ok_or_else(|| anyhow!("v4l2 RGB3 buffer did not form a {}x{} image", width, height))
}

fn rgb_from_yuyv(buf: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    let expected = (width * height * 2) as usize;
    if buf.len() < expected {
        return Err(anyhow!("short v4l2 YUYV buffer: {} < {}", buf.len(), expected));
    }
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in buf[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        push_yuv(&mut rgb, y0, u, v);
        push_yuv(&mut rgb, y1, u, v);
    }
    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| anyhow!("v4l2 YUYV buffer did not form a {}x{} image", width, height))
}

fn push_yuv(out: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    let r = y + 1.402 * v;
    let g = y - 0.344 * u - 0.714 * v;
    let b = y + 1.772 * u;
    out.push(r.clamp(0.0, 255.0) as u8);
    out.push(g.clamp(0.0, 255.0) as u8);
    out.push(b.clamp(0.0, 255.0) as u8);
}
