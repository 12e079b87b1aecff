//! Cover image providers.
//!
//! The pipeline only needs "some image of sufficient pixel capacity". How
//! that image is obtained is pluggable: generated offline, read from a file,
//! downloaded, or any of these chained with a fallback.

use image::{Rgb, RgbImage};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::carrier::CarrierImage;
use aethervault_common::{Error, Result};

/// Default cover width (4K UHD).
pub const DEFAULT_WIDTH: u32 = 3840;

/// Default cover height (4K UHD).
pub const DEFAULT_HEIGHT: u32 = 2160;

/// Default remote image source; `{seed}`, `{width}` and `{height}` are
/// substituted per request.
pub const DEFAULT_REMOTE_URL: &str = "https://picsum.photos/seed/{seed}/{width}/{height}";

/// Default timeout for remote cover downloads.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of carrier images.
pub trait CoverProvider: Send + Sync {
    /// Provider name for logging (e.g., "gradient", "remote").
    fn name(&self) -> &str;

    /// Produce a fresh cover image.
    ///
    /// # Errors
    /// - `Cover` if no image could be obtained
    /// - `SourceNotFound` / `Carrier` for file-backed providers
    fn provide_cover_image(&self) -> Result<CarrierImage>;
}

/// Dark two-color schemes for generated covers.
const GRADIENT_SCHEMES: [([u8; 3], [u8; 3]); 5] = [
    ([0x0a, 0x0a, 0x0a], [0x1a, 0x4d, 0x2e]),
    ([0x0f, 0x0f, 0x23], [0x1e, 0x3a, 0x8a]),
    ([0x1a, 0x1a, 0x2e], [0x16, 0x21, 0x3e]),
    ([0x0d, 0x11, 0x17], [0x1f, 0x29, 0x37]),
    ([0x00, 0x00, 0x00], [0x2d, 0x37, 0x48]),
];

/// Maximum noise amplitude added to each generated pixel.
const NOISE_AMPLITUDE: i16 = 5;

/// Offline generator: vertical gradient with per-pixel noise.
#[derive(Debug, Clone)]
pub struct GradientCover {
    width: u32,
    height: u32,
}

impl GradientCover {
    /// Create a generator for the given resolution.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn lerp(start: u8, end: u8, y: u32, height: u32) -> i16 {
        let (start, end) = (i32::from(start), i32::from(end));
        (start + (end - start) * y as i32 / height.max(1) as i32) as i16
    }

    fn noisy(channel: i16, noise: i16) -> u8 {
        (channel + noise).clamp(0, 255) as u8
    }
}

impl Default for GradientCover {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl CoverProvider for GradientCover {
    fn name(&self) -> &str {
        "gradient"
    }

    fn provide_cover_image(&self) -> Result<CarrierImage> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Cover("Cover resolution must be non-zero".to_string()));
        }

        let (start, end) = GRADIENT_SCHEMES[rand::random::<u32>() as usize % GRADIENT_SCHEMES.len()];
        debug!(width = self.width, height = self.height, "Generating gradient cover");

        let mut img = RgbImage::new(self.width, self.height);
        for y in 0..self.height {
            let r = Self::lerp(start[0], end[0], y, self.height);
            let g = Self::lerp(start[1], end[1], y, self.height);
            let b = Self::lerp(start[2], end[2], y, self.height);
            for x in 0..self.width {
                let noise = (rand::random::<u8>() % (2 * NOISE_AMPLITUDE as u8 + 1)) as i16
                    - NOISE_AMPLITUDE;
                img.put_pixel(
                    x,
                    y,
                    Rgb([
                        Self::noisy(r, noise),
                        Self::noisy(g, noise),
                        Self::noisy(b, noise),
                    ]),
                );
            }
        }

        Ok(CarrierImage::from_rgb(img))
    }
}

/// User-supplied cover image read from disk.
#[derive(Debug, Clone)]
pub struct FileCover {
    path: PathBuf,
}

impl FileCover {
    /// Use the image at `path` as cover for every request.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CoverProvider for FileCover {
    fn name(&self) -> &str {
        "file"
    }

    fn provide_cover_image(&self) -> Result<CarrierImage> {
        debug!(path = %self.path.display(), "Loading cover image");
        CarrierImage::load(&self.path)
    }
}

/// Downloads a cover image over HTTP(S).
#[derive(Debug, Clone)]
pub struct RemoteCover {
    url_template: String,
    width: u32,
    height: u32,
    timeout: Duration,
}

impl RemoteCover {
    /// Create a remote provider.
    ///
    /// `url_template` may contain `{seed}`, `{width}` and `{height}`.
    pub fn new(url_template: impl Into<String>, width: u32, height: u32, timeout: Duration) -> Self {
        Self {
            url_template: url_template.into(),
            width,
            height,
            timeout,
        }
    }

    /// Build the request URL for a given seed.
    pub fn url_for_seed(&self, seed: u32) -> String {
        self.url_template
            .replace("{seed}", &seed.to_string())
            .replace("{width}", &self.width.to_string())
            .replace("{height}", &self.height.to_string())
    }

    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let response = client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

impl Default for RemoteCover {
    fn default() -> Self {
        Self::new(
            DEFAULT_REMOTE_URL,
            DEFAULT_WIDTH,
            DEFAULT_HEIGHT,
            DEFAULT_REMOTE_TIMEOUT,
        )
    }
}

impl CoverProvider for RemoteCover {
    fn name(&self) -> &str {
        "remote"
    }

    fn provide_cover_image(&self) -> Result<CarrierImage> {
        let seed = rand::random::<u32>() % 999_999 + 1;
        let url = self.url_for_seed(seed);
        info!(seed, "Downloading cover image");

        let bytes = self
            .fetch(&url)
            .map_err(|e| Error::Cover(format!("Download failed: {}", e)))?;
        CarrierImage::decode(&bytes)
    }
}

/// Tries `primary` first and falls back to `fallback` on any error.
pub struct FallbackCover {
    primary: Box<dyn CoverProvider>,
    fallback: Box<dyn CoverProvider>,
}

impl FallbackCover {
    /// Chain two providers.
    pub fn new(primary: Box<dyn CoverProvider>, fallback: Box<dyn CoverProvider>) -> Self {
        Self { primary, fallback }
    }
}

impl CoverProvider for FallbackCover {
    fn name(&self) -> &str {
        "fallback"
    }

    fn provide_cover_image(&self) -> Result<CarrierImage> {
        match self.primary.provide_cover_image() {
            Ok(image) => Ok(image),
            Err(e) => {
                warn!(
                    provider = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %e,
                    "Cover provider failed, using fallback"
                );
                self.fallback.provide_cover_image()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingCover;

    impl CoverProvider for FailingCover {
        fn name(&self) -> &str {
            "failing"
        }

        fn provide_cover_image(&self) -> Result<CarrierImage> {
            Err(Error::Cover("offline".to_string()))
        }
    }

    #[test]
    fn test_gradient_dimensions() {
        let cover = GradientCover::new(120, 80).provide_cover_image().unwrap();
        assert_eq!((cover.width(), cover.height()), (120, 80));
        assert!(!cover.has_alpha());
    }

    #[test]
    fn test_gradient_stays_dark() {
        let cover = GradientCover::new(50, 50).provide_cover_image().unwrap();
        let (samples, _) = cover.samples();
        // Brightest scheme endpoint is 0x8a, plus at most 5 noise.
        assert!(samples.iter().all(|&s| s <= 0x8a + 5));
    }

    #[test]
    fn test_gradient_zero_size_rejected() {
        let err = GradientCover::new(0, 10).provide_cover_image().unwrap_err();
        assert!(matches!(err, Error::Cover(_)));
    }

    #[test]
    fn test_default_gradient_is_4k() {
        let cover = GradientCover::default();
        assert_eq!((cover.width, cover.height), (3840, 2160));
    }

    #[test]
    fn test_file_cover_missing() {
        let err = FileCover::new("/nonexistent/cover.png")
            .provide_cover_image()
            .unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
    }

    #[test]
    fn test_file_cover_loads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.png");
        let original = GradientCover::new(20, 10).provide_cover_image().unwrap();
        std::fs::write(&path, original.to_png_bytes().unwrap()).unwrap();

        let loaded = FileCover::new(&path).provide_cover_image().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_remote_url_template() {
        let remote = RemoteCover::new(
            "https://example.test/seed/{seed}/{width}/{height}",
            640,
            480,
            Duration::from_secs(1),
        );
        assert_eq!(
            remote.url_for_seed(42),
            "https://example.test/seed/42/640/480"
        );
    }

    #[test]
    fn test_fallback_used_on_failure() {
        let chain = FallbackCover::new(Box::new(FailingCover), Box::new(GradientCover::new(16, 16)));
        let cover = chain.provide_cover_image().unwrap();
        assert_eq!(cover.width(), 16);
    }

    #[test]
    fn test_fallback_error_propagates() {
        let chain = FallbackCover::new(Box::new(FailingCover), Box::new(FailingCover));
        assert!(matches!(chain.provide_cover_image(), Err(Error::Cover(_))));
    }
}
