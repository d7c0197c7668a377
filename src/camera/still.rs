//! Image-file backed camera
//!
//! Serves a still image as the live frame. Lets the engine run end to end
//! on machines without capture hardware.

use std::path::{Path, PathBuf};

use image::RgbaImage;

use super::{CameraDevice, CameraHandle, CameraRequest, DeviceError, Frame};

/// Camera that replays one image file
pub struct StillImageCamera {
    path: PathBuf,
    image: Option<RgbaImage>,
    live: Option<CameraHandle>,
    next_handle: u64,
    sequence: u64,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            image: None,
            live: None,
            next_handle: 1,
            sequence: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CameraDevice for StillImageCamera {
    fn acquire(&mut self, _request: &CameraRequest) -> Result<CameraHandle, DeviceError> {
        if self.live.is_some() {
            return Err(DeviceError::DeviceUnavailable("device busy".to_string()));
        }
        if !self.path.exists() {
            return Err(DeviceError::DeviceNotFound);
        }

        let image = image::open(&self.path)
            .map_err(|e| DeviceError::DeviceUnavailable(format!("{}: {}", self.path.display(), e)))?
            .to_rgba8();

        log::debug!(
            "Loaded still image {} ({}x{})",
            self.path.display(),
            image.width(),
            image.height()
        );

        let handle = CameraHandle::new(self.next_handle);
        self.next_handle += 1;
        self.image = Some(image);
        self.live = Some(handle);
        Ok(handle)
    }

    fn current_frame(&mut self, handle: CameraHandle) -> Option<Frame> {
        if self.live != Some(handle) {
            return None;
        }
        let image = self.image.as_ref()?;
        let frame = Frame::new(image.width(), image.height(), image.as_raw().clone(), self.sequence);
        self.sequence += 1;
        Some(frame)
    }

    fn release(&mut self, handle: CameraHandle) {
        if self.live == Some(handle) {
            self.live = None;
            self.image = None;
        }
    }

    fn name(&self) -> &str {
        "still-image"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("scan-engine-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let mut camera = StillImageCamera::new(scratch_path("missing.png"));
        assert_eq!(
            camera.acquire(&CameraRequest::default()),
            Err(DeviceError::DeviceNotFound)
        );
    }

    #[test]
    fn test_undecodable_file_is_unavailable() {
        let path = scratch_path("garbage.png");
        std::fs::write(&path, b"not an image").unwrap();

        let mut camera = StillImageCamera::new(&path);
        let result = camera.acquire(&CameraRequest::default());
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(DeviceError::DeviceUnavailable(_))));
    }

    #[test]
    fn test_serves_image_until_released() {
        let path = scratch_path("still.png");
        RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();

        let mut camera = StillImageCamera::new(&path);
        let handle = camera.acquire(&CameraRequest::default()).unwrap();
        std::fs::remove_file(&path).ok();

        let frame = camera.current_frame(handle).unwrap();
        assert_eq!((frame.width, frame.height), (3, 2));
        assert!(frame.is_valid());
        assert_eq!(&frame.pixels[..4], &[1, 2, 3, 255]);

        camera.release(handle);
        camera.release(handle);
        assert!(camera.current_frame(handle).is_none());
    }
}
