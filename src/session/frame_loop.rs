//! Cooperative frame polling loop
//!
//! The loop never blocks or sleeps. The host scheduler calls `run_cycle`
//! once per tick; each call samples at most one frame and hands it to the
//! callback. Because `run_cycle` takes `&mut self`, callbacks can never
//! overlap.

use crate::camera::{CameraResource, Frame};

/// What the frame callback wants the loop to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep sampling on the next cycle
    Continue,
    /// Pause until explicitly resumed
    Stop,
}

/// Loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    /// Never started
    #[default]
    Idle,
    /// Sampling every cycle
    Running,
    /// Suspended by the callback or the owner; camera stays open
    Paused,
    /// Cancelled
    Stopped,
}

/// Result of one `run_cycle` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Loop is not running, nothing was sampled
    Skipped,
    /// Camera had no frame yet
    NoFrame,
    /// Frame processed, loop keeps running
    Continued,
    /// Frame processed, callback paused the loop
    Paused,
}

/// Pausable polling loop handle
#[derive(Debug, Default)]
pub struct FrameLoop {
    state: LoopState,
    cycles: u64,
    frames: u64,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin sampling. Does nothing if the loop is already running or paused.
    pub fn start(&mut self) {
        match self.state {
            LoopState::Idle | LoopState::Stopped => {
                log::debug!("Frame loop started");
                self.state = LoopState::Running;
            }
            LoopState::Running | LoopState::Paused => {
                log::debug!("Frame loop already active ({:?})", self.state);
            }
        }
    }

    /// Suspend sampling without cancelling the loop
    pub fn pause(&mut self) {
        if self.state == LoopState::Running {
            log::debug!("Frame loop paused");
            self.state = LoopState::Paused;
        }
    }

    /// Continue after a pause
    pub fn resume(&mut self) {
        if self.state == LoopState::Paused {
            log::debug!("Frame loop resumed");
            self.state = LoopState::Running;
        }
    }

    /// Cancel the loop. Safe to call in any state.
    pub fn stop(&mut self) {
        if self.state != LoopState::Stopped {
            log::debug!(
                "Frame loop stopped after {} cycles ({} frames)",
                self.cycles,
                self.frames
            );
        }
        self.state = LoopState::Stopped;
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Cycles that sampled the camera
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Frames handed to the callback
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run one sampling cycle
    ///
    /// The frame is dropped when this returns.
    pub fn run_cycle<F>(&mut self, camera: &mut CameraResource, on_frame: F) -> CycleOutcome
    where
        F: FnOnce(&Frame) -> Flow,
    {
        if self.state != LoopState::Running {
            return CycleOutcome::Skipped;
        }
        self.cycles += 1;

        let frame = match camera.current_frame() {
            Some(frame) if !frame.is_empty() => frame,
            _ => return CycleOutcome::NoFrame,
        };
        self.frames += 1;

        match on_frame(&frame) {
            Flow::Continue => CycleOutcome::Continued,
            Flow::Stop => {
                self.pause();
                CycleOutcome::Paused
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraRequest, FakeCamera};

    fn open_camera(camera: FakeCamera) -> CameraResource {
        let mut resource = CameraResource::new(Box::new(camera));
        resource.acquire(&CameraRequest::default()).unwrap();
        resource
    }

    #[test]
    fn test_idle_loop_skips() {
        let mut camera = open_camera(FakeCamera::new());
        let mut frame_loop = FrameLoop::new();
        let outcome = frame_loop.run_cycle(&mut camera, |_| panic!("should not sample"));
        assert_eq!(outcome, CycleOutcome::Skipped);
        assert_eq!(frame_loop.cycles(), 0);
    }

    #[test]
    fn test_no_frame_during_warmup() {
        let mut camera = open_camera(FakeCamera::new().with_warmup(1));
        let mut frame_loop = FrameLoop::new();
        frame_loop.start();

        assert_eq!(
            frame_loop.run_cycle(&mut camera, |_| Flow::Continue),
            CycleOutcome::NoFrame
        );
        assert_eq!(
            frame_loop.run_cycle(&mut camera, |_| Flow::Continue),
            CycleOutcome::Continued
        );
        assert!(frame_loop.is_running());
        assert_eq!(frame_loop.frames(), 1);
    }

    #[test]
    fn test_empty_frame_is_not_delivered() {
        let mut camera = open_camera(FakeCamera::new().with_frame_size(0, 0));
        let mut frame_loop = FrameLoop::new();
        frame_loop.start();

        let outcome = frame_loop.run_cycle(&mut camera, |_| panic!("empty frame delivered"));
        assert_eq!(outcome, CycleOutcome::NoFrame);
    }

    #[test]
    fn test_stop_flow_pauses_until_resumed() {
        let mut camera = open_camera(FakeCamera::new());
        let mut frame_loop = FrameLoop::new();
        frame_loop.start();

        assert_eq!(
            frame_loop.run_cycle(&mut camera, |_| Flow::Stop),
            CycleOutcome::Paused
        );
        assert_eq!(frame_loop.state(), LoopState::Paused);
        assert_eq!(
            frame_loop.run_cycle(&mut camera, |_| Flow::Continue),
            CycleOutcome::Skipped
        );

        // start() on a paused loop must not spawn a second loop
        frame_loop.start();
        assert_eq!(frame_loop.state(), LoopState::Paused);

        frame_loop.resume();
        assert_eq!(
            frame_loop.run_cycle(&mut camera, |_| Flow::Continue),
            CycleOutcome::Continued
        );
        assert!(camera.is_open());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut frame_loop = FrameLoop::new();
        frame_loop.stop();
        frame_loop.stop();
        assert_eq!(frame_loop.state(), LoopState::Stopped);

        frame_loop.resume();
        assert_eq!(frame_loop.state(), LoopState::Stopped);
    }

    #[test]
    fn test_released_camera_yields_no_frame() {
        let mut camera = open_camera(FakeCamera::new());
        let mut frame_loop = FrameLoop::new();
        frame_loop.start();
        camera.release();

        assert_eq!(
            frame_loop.run_cycle(&mut camera, |_| Flow::Continue),
            CycleOutcome::NoFrame
        );
    }
}
