//! Local media file source.
//!
//! Dispatches on the path: supported video extensions go to the ffmpeg
//! backend (feature `media-ffmpeg`; `stub://` paths get a synthetic clip),
//! everything else is decoded as a still image that yields one frame and
//! then ends. An unreadable input is fatal with the underlying cause
//! attached.

use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;

use super::synthetic::SyntheticSource;
#[cfg(feature = "media-ffmpeg")]
use super::video_ffmpeg::VideoFileSource;
use super::{is_stub_path, is_video_path, FrameSource};

const STUB_CLIP_FRAMES: u64 = 30;

#[derive(Debug)]
pub struct FileSource {
    backend: FileBackend,
}

#[derive(Debug)]
enum FileBackend {
    Image(Option<RgbImage>),
    Synthetic(SyntheticSource),
    #[cfg(feature = "media-ffmpeg")]
    Video(VideoFileSource),
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(s) = path.to_str() {
            if is_stub_path(s) {
                log::info!("file source: synthetic clip for {}", s);
                return Ok(Self {
                    backend: FileBackend::Synthetic(SyntheticSource::clip(
                        640,
                        480,
                        STUB_CLIP_FRAMES,
                    )),
                });
            }
        }

        if is_video_path(path) {
            #[cfg(feature = "media-ffmpeg")]
            {
                return Ok(Self {
                    backend: FileBackend::Video(VideoFileSource::open(path)?),
                });
            }
            #[cfg(not(feature = "media-ffmpeg"))]
            {
                return Err(anyhow::anyhow!(
                    "could not read video {}: video ingestion requires the media-ffmpeg feature",
                    path.display()
                ));
            }
        }

        // Still image; RGBA inputs are converted down to RGB.
        let frame = image::open(path)
            .with_context(|| format!("could not read image {}", path.display()))?
            .to_rgb8();
        Ok(Self {
            backend: FileBackend::Image(Some(frame)),
        })
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match &mut self.backend {
            FileBackend::Image(slot) => Ok(slot.take()),
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "media-ffmpeg")]
            FileBackend::Video(source) => source.next_frame(),
        }
    }

    fn frame_rate(&self) -> u32 {
        match &self.backend {
            FileBackend::Image(_) => 1,
            FileBackend::Synthetic(source) => source.frame_rate(),
            #[cfg(feature = "media-ffmpeg")]
            FileBackend::Video(source) => source.frame_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::path::PathBuf;

    #[test]
    fn missing_image_is_fatal_with_cause() {
        let err = FileSource::open(&PathBuf::from("/nonexistent/road.png")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/road.png"));
    }

    #[test]
    fn image_yields_one_frame_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbImage::from_pixel(8, 6, Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let mut source = FileSource::open(&path).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn stub_video_path_opens_synthetic_clip() {
        let mut source = FileSource::open(&PathBuf::from("stub://clip.mp4")).unwrap();
        let mut frames = 0;
        while source.next_frame().unwrap().is_some() {
            frames += 1;
        }
        assert_eq!(frames, STUB_CLIP_FRAMES);
    }
}
