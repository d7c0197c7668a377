//! Deterministic camera device
//!
//! `FakeCamera` hands out solid-color frames and records every acquire and
//! release in a shared `CameraProbe`, so callers can inspect resource
//! balance after the device has been moved into a session.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{CameraDevice, CameraHandle, CameraRequest, DeviceError, Frame};

/// Counters recorded by a `FakeCamera`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeCounts {
    /// Calls to `acquire`, successful or not
    pub acquire_attempts: u32,
    /// Acquisitions that produced a handle
    pub acquired: u32,
    /// Releases that actually closed a live handle
    pub released: u32,
    /// Handles currently open
    pub open_handles: u32,
    /// Frames returned from `current_frame`
    pub frames_served: u64,
}

/// Shared view of a fake camera's counters
#[derive(Debug, Clone, Default)]
pub struct CameraProbe {
    counts: Arc<Mutex<ProbeCounts>>,
}

impl CameraProbe {
    /// Snapshot of the counters
    pub fn counts(&self) -> ProbeCounts {
        *self.counts.lock()
    }

    fn update(&self, f: impl FnOnce(&mut ProbeCounts)) {
        f(&mut *self.counts.lock());
    }
}

/// Scripted capture device
pub struct FakeCamera {
    failure: Option<DeviceError>,
    warmup: u32,
    warmup_remaining: u32,
    width: u32,
    height: u32,
    live: Option<CameraHandle>,
    next_handle: u64,
    sequence: u64,
    probe: CameraProbe,
}

impl FakeCamera {
    /// A camera that opens and produces 4x4 frames immediately
    pub fn new() -> Self {
        Self {
            failure: None,
            warmup: 0,
            warmup_remaining: 0,
            width: 4,
            height: 4,
            live: None,
            next_handle: 1,
            sequence: 0,
            probe: CameraProbe::default(),
        }
    }

    /// A camera whose every acquisition fails with `error`
    pub fn failing(error: DeviceError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new()
        }
    }

    /// Return no frame for the first `cycles` samples after each acquisition
    pub fn with_warmup(mut self, cycles: u32) -> Self {
        self.warmup = cycles;
        self
    }

    /// Frame dimensions to produce
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Shared counters for this device
    pub fn probe(&self) -> CameraProbe {
        self.probe.clone()
    }
}

impl Default for FakeCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDevice for FakeCamera {
    fn acquire(&mut self, _request: &CameraRequest) -> Result<CameraHandle, DeviceError> {
        self.probe.update(|c| c.acquire_attempts += 1);

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if self.live.is_some() {
            return Err(DeviceError::DeviceUnavailable("device busy".to_string()));
        }

        let handle = CameraHandle::new(self.next_handle);
        self.next_handle += 1;
        self.live = Some(handle);
        self.warmup_remaining = self.warmup;
        self.probe.update(|c| {
            c.acquired += 1;
            c.open_handles += 1;
        });
        Ok(handle)
    }

    fn current_frame(&mut self, handle: CameraHandle) -> Option<Frame> {
        if self.live != Some(handle) {
            return None;
        }
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return None;
        }

        let frame = Frame::solid(self.width, self.height, [255, 255, 255, 255], self.sequence);
        self.sequence += 1;
        self.probe.update(|c| c.frames_served += 1);
        Some(frame)
    }

    fn release(&mut self, handle: CameraHandle) {
        if self.live == Some(handle) {
            self.live = None;
            self.probe.update(|c| {
                c.released += 1;
                c.open_handles -= 1;
            });
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_yields_no_frames() {
        let mut camera = FakeCamera::new().with_warmup(2);
        let handle = camera.acquire(&CameraRequest::default()).unwrap();

        assert!(camera.current_frame(handle).is_none());
        assert!(camera.current_frame(handle).is_none());
        let frame = camera.current_frame(handle).unwrap();
        assert_eq!(frame.sequence, 0);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_exclusive_access() {
        let mut camera = FakeCamera::new();
        let handle = camera.acquire(&CameraRequest::default()).unwrap();
        assert!(matches!(
            camera.acquire(&CameraRequest::default()),
            Err(DeviceError::DeviceUnavailable(_))
        ));

        camera.release(handle);
        assert!(camera.acquire(&CameraRequest::default()).is_ok());
    }

    #[test]
    fn test_stale_handle_is_ignored() {
        let mut camera = FakeCamera::new();
        let probe = camera.probe();
        let first = camera.acquire(&CameraRequest::default()).unwrap();
        camera.release(first);
        let second = camera.acquire(&CameraRequest::default()).unwrap();

        camera.release(first);
        assert!(camera.current_frame(first).is_none());
        assert!(camera.current_frame(second).is_some());
        assert_eq!(probe.counts().open_handles, 1);
        assert_eq!(probe.counts().released, 1);
    }
}
