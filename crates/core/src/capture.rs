//! Screen capture functionality.
//!
//! [`ScreenCapturer`] talks to the OS through the `screenshots` crate and
//! hands back a base64 PNG. [`CaptureService`] turns that into a
//! [`ScreenshotArtifact`] with a fresh identity.
//!
//! # Example
//!
//! ```ignore
//! use shade_shot_core::capture::{CaptureService, ScreenCapturer};
//!
//! let service = CaptureService::new(ScreenCapturer::new(0));
//! let artifact = service.capture().await?;
//! println!("captured {}", artifact.id);
//! ```

use crate::error::CaptureError;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{DynamicImage, ImageFormat};
use screenshots::Screen;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// A single captured screen image with its generated identity.
///
/// Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScreenshotArtifact {
    /// Unique id within the session.
    pub id: String,
    /// Logical location derived from the id. Nothing is written there.
    pub storage_path: PathBuf,
    /// Base64-encoded PNG.
    pub image_data: String,
}

impl ScreenshotArtifact {
    /// Assembles an artifact with a freshly generated id.
    pub fn new(image_data: String) -> Self {
        let id = Uuid::new_v4().to_string();
        let storage_path = storage_path_for(&id);
        Self {
            id,
            storage_path,
            image_data,
        }
    }

    /// The image as a `data:` URL, as vision APIs expect it.
    pub fn data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.image_data)
    }
}

fn storage_path_for(id: &str) -> PathBuf {
    std::env::temp_dir()
        .join("shade-shot")
        .join(format!("{id}.png"))
}

/// Native capture primitive: one blocking call, one encoded image.
pub trait ScreenSource: Send + Sync + 'static {
    /// Captures the screen and returns base64-encoded PNG bytes.
    fn capture_base64_png(&self) -> Result<String, CaptureError>;
}

/// Produces [`ScreenshotArtifact`]s from a [`ScreenSource`].
///
/// Has no effect on window state; the workflow controller takes care of
/// lifting and restoring protection around the call.
pub struct CaptureService<S> {
    source: Arc<S>,
}

impl<S: ScreenSource> CaptureService<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Captures the screen on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError`] if the primitive fails or the blocking task
    /// dies. No partial artifact is returned.
    pub async fn capture(&self) -> Result<ScreenshotArtifact, CaptureError> {
        let source = Arc::clone(&self.source);
        let image_data = tokio::task::spawn_blocking(move || source.capture_base64_png())
            .await
            .map_err(|e| CaptureError::native(format!("Capture task failed: {}", e)))??;

        let artifact = ScreenshotArtifact::new(image_data);
        log::info!(
            "Captured screenshot {} ({} bytes encoded)",
            artifact.id,
            artifact.image_data.len()
        );
        Ok(artifact)
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Screen capturer backed by the `screenshots` crate.
///
/// Screens are enumerated on every capture so monitors plugged in after
/// startup are picked up.
pub struct ScreenCapturer {
    monitor_index: usize,
}

impl ScreenCapturer {
    /// Creates a capturer for the monitor at `monitor_index`.
    pub fn new(monitor_index: usize) -> Self {
        Self { monitor_index }
    }

    /// Lists available screens with their dimensions and scale factor.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Enumeration`] if no display server is
    /// reachable.
    pub fn list_screens() -> Result<Vec<String>, CaptureError> {
        let screens = Self::screens()?;
        Ok(screens
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "Monitor {}: {}x{} (scale: {})",
                    i, s.display_info.width, s.display_info.height, s.display_info.scale_factor
                )
            })
            .collect())
    }

    fn screens() -> Result<Vec<Screen>, CaptureError> {
        let screens = Screen::all().map_err(|e| CaptureError::Enumeration(e.to_string()))?;
        if screens.is_empty() {
            return Err(CaptureError::Enumeration("no screens detected".into()));
        }
        Ok(screens)
    }

    fn capture_image(&self) -> Result<DynamicImage, CaptureError> {
        let screens = Self::screens()?;
        let screen = screens
            .get(self.monitor_index)
            .ok_or(CaptureError::ScreenNotFound(self.monitor_index))?;

        let captured = screen
            .capture()
            .map_err(|e| CaptureError::native(e.to_string()))?;

        // screenshots ships its own `image` version, so go through raw RGBA
        let width = captured.width();
        let height = captured.height();
        let rgba_data = captured.into_raw();

        let buffer = image::ImageBuffer::from_raw(width, height, rgba_data)
            .ok_or_else(|| CaptureError::native("Failed to create image buffer"))?;

        log::debug!("Captured monitor {}: {}x{}", self.monitor_index, width, height);
        Ok(DynamicImage::ImageRgba8(buffer))
    }
}

impl ScreenSource for ScreenCapturer {
    fn capture_base64_png(&self) -> Result<String, CaptureError> {
        let image = self.capture_image()?;
        encode_png_base64(&image)
    }
}

/// Encodes an image as PNG and then base64.
pub fn encode_png_base64(image: &DynamicImage) -> Result<String, CaptureError> {
    let mut buffer: Vec<u8> = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| CaptureError::encoding(e.to_string()))?;
    Ok(BASE64.encode(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Result<String, CaptureError>);

    impl ScreenSource for FixedSource {
        fn capture_base64_png(&self) -> Result<String, CaptureError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn capture_assigns_fresh_ids_and_paths() {
        let service = CaptureService::new(FixedSource(Ok("aGVsbG8=".into())));
        let first = service.capture().await.unwrap();
        let second = service.capture().await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.image_data, "aGVsbG8=");
        assert!(first.storage_path.ends_with(format!("{}.png", first.id)));
    }

    #[tokio::test]
    async fn capture_failure_yields_no_artifact() {
        let service = CaptureService::new(FixedSource(Err(CaptureError::native("boom"))));
        assert_eq!(
            service.capture().await,
            Err(CaptureError::Native("boom".into()))
        );
    }

    #[test]
    fn encodes_png_signature() {
        let image = DynamicImage::new_rgba8(2, 2);
        let encoded = encode_png_base64(&image).unwrap();
        let bytes = BASE64.decode(encoded).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }

    #[test]
    fn data_url_has_png_prefix() {
        let artifact = ScreenshotArtifact::new("abc".into());
        assert_eq!(artifact.data_url(), "data:image/png;base64,abc");
    }
}
