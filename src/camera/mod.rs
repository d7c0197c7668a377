//! Camera capture module
//!
//! Defines the capture-device capability and the scoped `CameraResource`
//! that owns at most one open device handle. Concrete devices:
//! - `native::NativeCamera` - hardware capture through nokhwa (feature `camera`)
//! - `still::StillImageCamera` - serves an image file as the live frame
//! - `fake::FakeCamera` - deterministic device for tests and demos

pub mod fake;
pub mod frame;
#[cfg(feature = "camera")]
pub mod native;
pub mod still;

use serde::{Deserialize, Serialize};

pub use fake::{CameraProbe, FakeCamera, ProbeCounts};
pub use frame::Frame;
#[cfg(feature = "camera")]
pub use native::NativeCamera;
pub use still::StillImageCamera;

/// Which way the requested camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Rear camera, pointed away from the operator
    #[default]
    Environment,
    /// Front camera, pointed at the operator
    User,
}

/// Capture resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either side is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// Parameters for a camera acquisition
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CameraRequest {
    /// Preferred facing; devices that cannot tell fall back to the first camera
    pub facing: Facing,
    /// Resolution to ask for; the device may deliver something else
    pub ideal_resolution: Resolution,
    /// Explicit device index, overrides `facing`
    pub device_index: Option<u32>,
}

/// Camera acquisition failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("Camera permission denied")]
    PermissionDenied,
    #[error("No camera device found")]
    DeviceNotFound,
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
}

impl DeviceError {
    /// Persistent advisory shown to the operator while the camera is down
    pub fn user_message(&self) -> &'static str {
        match self {
            DeviceError::PermissionDenied => {
                "Camera access was denied. Allow camera access to scan, or search by SKU or name."
            }
            DeviceError::DeviceNotFound => {
                "No camera was detected. Connect a camera to scan, or search by SKU or name."
            }
            DeviceError::DeviceUnavailable(_) => {
                "The camera could not be started. You can still search by SKU or name."
            }
        }
    }
}

/// Opaque token for one open device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraHandle(u64);

impl CameraHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Platform capture device
///
/// Implementations own the platform resources behind a handle. `release`
/// must tolerate unknown or already-released handles.
pub trait CameraDevice {
    /// Request exclusive access to a device
    fn acquire(&mut self, request: &CameraRequest) -> Result<CameraHandle, DeviceError>;

    /// Most recent frame, or `None` if nothing is available yet. Never blocks.
    fn current_frame(&mut self, handle: CameraHandle) -> Option<Frame>;

    /// Give the device back. Idempotent.
    fn release(&mut self, handle: CameraHandle);

    /// Human readable device name for logs
    fn name(&self) -> &str {
        "camera"
    }
}

/// Device that never has a camera
///
/// Used by hosts without capture support so sessions go straight to the
/// manual search path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCamera;

impl CameraDevice for NoCamera {
    fn acquire(&mut self, _request: &CameraRequest) -> Result<CameraHandle, DeviceError> {
        Err(DeviceError::DeviceNotFound)
    }

    fn current_frame(&mut self, _handle: CameraHandle) -> Option<Frame> {
        None
    }

    fn release(&mut self, _handle: CameraHandle) {}

    fn name(&self) -> &str {
        "none"
    }
}

/// Scoped owner of a camera device and its single live handle
///
/// The handle is released on `release`, on re-acquisition, and on drop.
pub struct CameraResource {
    device: Box<dyn CameraDevice>,
    handle: Option<CameraHandle>,
}

impl CameraResource {
    pub fn new(device: Box<dyn CameraDevice>) -> Self {
        Self {
            device,
            handle: None,
        }
    }

    /// Acquire the device, releasing any handle already held
    pub fn acquire(&mut self, request: &CameraRequest) -> Result<CameraHandle, DeviceError> {
        self.release();

        log::info!(
            "Acquiring camera '{}' ({:?}, {}x{})",
            self.device.name(),
            request.facing,
            request.ideal_resolution.width,
            request.ideal_resolution.height
        );

        match self.device.acquire(request) {
            Ok(handle) => {
                log::info!("Camera '{}' acquired (handle {})", self.device.name(), handle.id());
                self.handle = Some(handle);
                Ok(handle)
            }
            Err(e) => {
                log::warn!("Camera '{}' acquisition failed: {}", self.device.name(), e);
                Err(e)
            }
        }
    }

    /// Latest frame from the live handle, if any
    pub fn current_frame(&mut self) -> Option<Frame> {
        let handle = self.handle?;
        self.device.current_frame(handle)
    }

    /// Release the live handle. Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.device.release(handle);
            log::info!("Camera '{}' released (handle {})", self.device.name(), handle.id());
        }
    }

    /// Whether a handle is currently held
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Option<CameraHandle> {
        self.handle
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }
}

impl Drop for CameraResource {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_release_is_idempotent() {
        let camera = FakeCamera::new();
        let probe = camera.probe();
        let mut resource = CameraResource::new(Box::new(camera));

        resource.acquire(&CameraRequest::default()).unwrap();
        assert!(resource.is_open());

        resource.release();
        resource.release();
        assert!(!resource.is_open());

        let counts = probe.counts();
        assert_eq!(counts.acquired, 1);
        assert_eq!(counts.released, 1);
        assert_eq!(counts.open_handles, 0);
    }

    #[test]
    fn test_resource_reacquire_releases_previous_handle() {
        let camera = FakeCamera::new();
        let probe = camera.probe();
        let mut resource = CameraResource::new(Box::new(camera));

        let first = resource.acquire(&CameraRequest::default()).unwrap();
        let second = resource.acquire(&CameraRequest::default()).unwrap();
        assert_ne!(first, second);

        let counts = probe.counts();
        assert_eq!(counts.acquired, 2);
        assert_eq!(counts.released, 1);
        assert_eq!(counts.open_handles, 1);
    }

    #[test]
    fn test_resource_drop_releases() {
        let camera = FakeCamera::new();
        let probe = camera.probe();
        {
            let mut resource = CameraResource::new(Box::new(camera));
            resource.acquire(&CameraRequest::default()).unwrap();
        }
        assert_eq!(probe.counts().open_handles, 0);
        assert_eq!(probe.counts().released, 1);
    }

    #[test]
    fn test_failed_acquire_holds_nothing() {
        let camera = FakeCamera::failing(DeviceError::PermissionDenied);
        let probe = camera.probe();
        let mut resource = CameraResource::new(Box::new(camera));

        let err = resource.acquire(&CameraRequest::default()).unwrap_err();
        assert_eq!(err, DeviceError::PermissionDenied);
        assert!(!resource.is_open());
        assert!(resource.current_frame().is_none());

        resource.release();
        let counts = probe.counts();
        assert_eq!(counts.acquire_attempts, 1);
        assert_eq!(counts.acquired, 0);
        assert_eq!(counts.released, 0);
    }

    #[test]
    fn test_no_camera_reports_not_found() {
        let mut resource = CameraResource::new(Box::new(NoCamera));
        assert_eq!(
            resource.acquire(&CameraRequest::default()),
            Err(DeviceError::DeviceNotFound)
        );
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let denied = DeviceError::PermissionDenied.user_message();
        let missing = DeviceError::DeviceNotFound.user_message();
        let other = DeviceError::DeviceUnavailable("busy".to_string()).user_message();
        assert_ne!(denied, missing);
        assert_ne!(missing, other);
        assert!(denied.contains("denied"));
    }

    #[test]
    fn test_facing_serde() {
        let facing: Facing = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(facing, Facing::User);
        assert_eq!(serde_json::to_string(&Facing::Environment).unwrap(), "\"environment\"");
    }
}
