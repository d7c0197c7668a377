//! Hardware camera capture
//!
//! Provides cross-platform camera capture using the nokhwa crate.
//! The device is opened on a background thread which keeps the latest
//! frame in a shared slot; the scan loop takes frames from that slot
//! without ever waiting on the device.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
};
use nokhwa::Camera;
use parking_lot::Mutex;

use super::{CameraDevice, CameraHandle, CameraRequest, DeviceError, Facing, Frame};

/// Information about an available camera
#[derive(Clone, Debug)]
pub struct CameraInfo {
    /// Camera index
    pub index: u32,
    /// Camera name
    pub name: String,
}

/// Running capture thread for one open handle
struct CaptureThread {
    handle: CameraHandle,
    /// Latest captured frame, taken by `current_frame`
    latest: Arc<Mutex<Option<Frame>>>,
    running: Arc<AtomicBool>,
    frame_count: Arc<AtomicU64>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
}

impl CaptureThread {
    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        log::info!(
            "Camera capture stopped. Total frames captured: {}",
            self.frame_count.load(Ordering::Relaxed)
        );
    }
}

/// nokhwa-backed capture device
pub struct NativeCamera {
    open_timeout: Duration,
    next_handle: u64,
    capture: Option<CaptureThread>,
}

impl NativeCamera {
    /// Create a device that waits at most `open_timeout` for the camera to open
    pub fn new(open_timeout: Duration) -> Self {
        Self {
            open_timeout,
            next_handle: 1,
            capture: None,
        }
    }

    /// List available cameras
    pub fn list_cameras() -> Vec<CameraInfo> {
        match nokhwa::query(ApiBackend::Auto) {
            Ok(camera_list) => camera_list
                .iter()
                .enumerate()
                .map(|(idx, info)| CameraInfo {
                    index: idx as u32,
                    name: info.human_name(),
                })
                .collect(),
            Err(e) => {
                log::warn!("Failed to enumerate cameras: {:?}", e);
                Vec::new()
            }
        }
    }

    /// Pick the device index for a request
    fn select_index(request: &CameraRequest) -> Result<CameraIndex, DeviceError> {
        if let Some(index) = request.device_index {
            return Ok(CameraIndex::Index(index));
        }

        let cameras = nokhwa::query(ApiBackend::Auto).map_err(|e| classify_error(&e.to_string()))?;
        if cameras.is_empty() {
            return Err(DeviceError::DeviceNotFound);
        }

        let chosen = cameras
            .iter()
            .find(|info| facing_matches(&info.human_name(), request.facing))
            .unwrap_or(&cameras[0]);

        log::info!("Selected camera: {}", chosen.human_name());
        Ok(chosen.index().clone())
    }

    /// Camera capture thread
    fn capture_thread(
        index: CameraIndex,
        request: CameraRequest,
        opened: Sender<Result<(), DeviceError>>,
        latest: Arc<Mutex<Option<Frame>>>,
        running: Arc<AtomicBool>,
        frame_count: Arc<AtomicU64>,
    ) {
        log::info!("Starting camera capture thread ({:?})", index);

        let mut camera = match Self::open_camera(index, &request) {
            Ok(camera) => camera,
            Err(e) => {
                let _ = opened.send(Err(e));
                return;
            }
        };

        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );

        // The receiver may have timed out and gone away; stop in that case.
        if opened.send(Ok(())).is_err() {
            running.store(false, Ordering::Release);
        }

        while running.load(Ordering::Acquire) {
            match camera.frame() {
                Ok(buffer) => match buffer.decode_image::<RgbAFormat>() {
                    Ok(image) => {
                        let sequence = frame_count.fetch_add(1, Ordering::Relaxed);
                        let resolution = buffer.resolution();
                        *latest.lock() = Some(Frame::new(
                            resolution.width(),
                            resolution.height(),
                            image.into_raw(),
                            sequence,
                        ));
                    }
                    Err(e) => {
                        log::warn!("Failed to decode frame: {:?}", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to capture frame: {:?}", e);
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }

        if let Err(e) = camera.stop_stream() {
            log::warn!("Failed to stop camera stream: {:?}", e);
        }
        log::info!("Camera capture thread stopped");
    }

    /// Open the camera, trying progressively looser formats
    fn open_camera(index: CameraIndex, request: &CameraRequest) -> Result<Camera, DeviceError> {
        let ideal = nokhwa::utils::Resolution::new(
            request.ideal_resolution.width,
            request.ideal_resolution.height,
        );
        let attempts = [
            RequestedFormatType::Closest(CameraFormat::new(ideal, FrameFormat::MJPEG, 30)),
            RequestedFormatType::HighestResolution(nokhwa::utils::Resolution::new(640, 480)),
            RequestedFormatType::None,
        ];

        let mut last_error = DeviceError::DeviceNotFound;
        for format_type in attempts {
            let label = format!("{:?}", format_type);
            let requested = RequestedFormat::new::<RgbAFormat>(format_type);
            match Camera::new(index.clone(), requested) {
                Ok(mut camera) => {
                    return match camera.open_stream() {
                        Ok(()) => Ok(camera),
                        Err(e) => {
                            log::error!("Failed to open camera stream: {:?}", e);
                            Err(classify_error(&e.to_string()))
                        }
                    };
                }
                Err(e) => {
                    log::warn!("Failed to open camera with {}: {:?}", label, e);
                    last_error = classify_error(&e.to_string());
                    // Permission failures are not format specific
                    if last_error == DeviceError::PermissionDenied {
                        break;
                    }
                }
            }
        }

        Err(last_error)
    }
}

impl CameraDevice for NativeCamera {
    fn acquire(&mut self, request: &CameraRequest) -> Result<CameraHandle, DeviceError> {
        if self.capture.is_some() {
            return Err(DeviceError::DeviceUnavailable("device busy".to_string()));
        }

        let index = Self::select_index(request)?;

        let latest = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let frame_count = Arc::new(AtomicU64::new(0));
        let (opened_tx, opened_rx) = crossbeam_channel::bounded(1);

        let latest_clone = latest.clone();
        let running_clone = running.clone();
        let frame_count_clone = frame_count.clone();
        let request_clone = request.clone();

        let thread_handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                Self::capture_thread(
                    index,
                    request_clone,
                    opened_tx,
                    latest_clone,
                    running_clone,
                    frame_count_clone,
                );
            })
            .map_err(|e| {
                DeviceError::DeviceUnavailable(format!("Failed to spawn capture thread: {}", e))
            })?;

        match opened_rx.recv_timeout(self.open_timeout) {
            Ok(Ok(())) => {
                let handle = CameraHandle::new(self.next_handle);
                self.next_handle += 1;
                self.capture = Some(CaptureThread {
                    handle,
                    latest,
                    running,
                    frame_count,
                    thread_handle: Some(thread_handle),
                });
                Ok(handle)
            }
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                // Leave the thread detached; it exits once it sees the flag.
                running.store(false, Ordering::Release);
                Err(DeviceError::DeviceUnavailable(
                    "timed out waiting for camera to open".to_string(),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = thread_handle.join();
                Err(DeviceError::DeviceUnavailable(
                    "capture thread exited before opening".to_string(),
                ))
            }
        }
    }

    fn current_frame(&mut self, handle: CameraHandle) -> Option<Frame> {
        let capture = self.capture.as_ref().filter(|c| c.handle == handle)?;
        capture.latest.lock().take()
    }

    fn release(&mut self, handle: CameraHandle) {
        if self.capture.as_ref().is_some_and(|c| c.handle == handle) {
            if let Some(mut capture) = self.capture.take() {
                capture.stop();
            }
        }
    }

    fn name(&self) -> &str {
        "native"
    }
}

impl Drop for NativeCamera {
    fn drop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
    }
}

/// Map a platform error message onto the acquisition error taxonomy
fn classify_error(message: &str) -> DeviceError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        DeviceError::PermissionDenied
    } else if lower.contains("not found") || lower.contains("no such device") {
        DeviceError::DeviceNotFound
    } else {
        DeviceError::DeviceUnavailable(message.to_string())
    }
}

/// Guess a camera's facing from its name
fn facing_matches(name: &str, facing: Facing) -> bool {
    let lower = name.to_lowercase();
    match facing {
        Facing::Environment => ["back", "rear", "environment", "world"]
            .iter()
            .any(|hint| lower.contains(hint)),
        Facing::User => ["front", "user", "facetime", "integrated"]
            .iter()
            .any(|hint| lower.contains(hint)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_error() {
        assert_eq!(
            classify_error("Could not open device: Permission denied (os error 13)"),
            DeviceError::PermissionDenied
        );
        assert_eq!(
            classify_error("Device /dev/video3 not found"),
            DeviceError::DeviceNotFound
        );
        assert!(matches!(
            classify_error("Device or resource busy"),
            DeviceError::DeviceUnavailable(_)
        ));
    }

    #[test]
    fn test_facing_matches() {
        assert!(facing_matches("Back Camera", Facing::Environment));
        assert!(facing_matches("FaceTime HD Camera", Facing::User));
        assert!(!facing_matches("USB Video Device", Facing::Environment));
    }
}
