// src/video.rs - Frame sources feeding the pose worker
use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub type Frame = DynamicImage;

/// Anything that hands out camera-like frames in order.
///
/// `Ok(None)` means the source is exhausted.
pub trait FrameSource: Send {
    fn read(&mut self) -> Result<Option<Frame>>;

    fn dimensions(&self) -> (u32, u32);
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn read(&mut self) -> Result<Option<Frame>> {
        (**self).read()
    }

    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }
}

/// Solid black frames, for running without a camera.
pub struct BlankFrameSource {
    width: u32,
    height: u32,
    remaining: Option<usize>,
}

impl BlankFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            remaining: None,
        }
    }

    pub fn limited(width: u32, height: u32, frames: usize) -> Self {
        Self {
            width,
            height,
            remaining: Some(frames),
        }
    }
}

impl FrameSource for BlankFrameSource {
    fn read(&mut self) -> Result<Option<Frame>> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }
        Ok(Some(DynamicImage::ImageRgb8(RgbImage::new(
            self.width,
            self.height,
        ))))
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A directory of numbered PNG frames, such as `frame_0001.png` onwards.
///
/// Frames are decoded lazily and optionally mirrored so the image reads
/// like a mirror to the people in front of the camera.
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    current: usize,
    mirror: bool,
    dimensions: (u32, u32),
}

impl ImageSequence {
    pub fn open(dir: impl AsRef<Path>, mirror: bool) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Cannot read frame directory {}", dir.display()))?
        {
            let path = entry?.path();
            let is_png = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext.eq_ignore_ascii_case("png"));
            if is_png {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(anyhow::anyhow!("No PNG frames in {}", dir.display()));
        }
        paths.sort();

        let first = image::open(&paths[0])
            .with_context(|| format!("Failed to decode {}", paths[0].display()))?;
        debug!(frames = paths.len(), dir = %dir.display(), "Opened image sequence");

        Ok(Self {
            dimensions: (first.width(), first.height()),
            paths,
            current: 0,
            mirror,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn read(&mut self) -> Result<Option<Frame>> {
        while let Some(path) = self.paths.get(self.current) {
            self.current += 1;
            match image::open(path) {
                Ok(frame) if self.mirror => return Ok(Some(frame.fliph())),
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable frame"),
            }
        }
        Ok(None)
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }
}
