//! Scan session runtime
//!
//! `ScanSession` connects the pure `ScanMachine` to the camera, the frame
//! loop, the decoder, the catalog and the host. Nothing here runs on its
//! own: the host calls `pump` once per tick and forwards operator actions.
//! Every call runs to completion before the next one starts, so a decode
//! result can never race a close.

pub mod clock;
pub mod frame_loop;
pub mod machine;

use std::time::Duration;

use serde::Serialize;

use crate::camera::{CameraDevice, CameraResource};
use crate::catalog::{normalize_query, CatalogEntry, CatalogProvider};
use crate::config::ScanConfig;
use crate::decoder::Decoder;

pub use clock::{Clock, ManualClock, RecoveryTimer, SystemClock, TimerId};
pub use frame_loop::{CycleOutcome, Flow, FrameLoop, LoopState};
pub use machine::{
    Effect, Event, MatchSource, Phase, ResumeTarget, ScanMachine, ScanMode, ScanState,
};

/// Host callbacks
pub trait ScanObserver {
    /// A match was confirmed
    fn on_detect(&mut self, entry: &CatalogEntry);

    /// The session closed
    fn on_close(&mut self) {}

    /// A match was found; play a beep or haptic pulse
    fn on_feedback(&mut self) {}
}

/// What the host should display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanStatus {
    pub phase: Phase,
    /// Operator-facing advisory, if any
    pub message: Option<String>,
    /// Time until a NotFound indicator clears
    pub retry_in: Option<Duration>,
}

/// Session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Loop cycles that sampled the camera
    pub cycles: u64,
    /// Frames handed to the decoder
    pub frames_sampled: u64,
    pub payloads_decoded: u64,
    pub matches: u64,
    pub misses: u64,
    pub manual_queries: u64,
    /// Entries handed to `on_detect`
    pub delivered: u64,
}

/// One scanner lifetime, from open to close
pub struct ScanSession {
    config: ScanConfig,
    machine: ScanMachine,
    camera: CameraResource,
    frame_loop: FrameLoop,
    decoder: Box<dyn Decoder>,
    catalog: Box<dyn CatalogProvider>,
    snapshot: Vec<CatalogEntry>,
    clock: Box<dyn Clock>,
    recovery: RecoveryTimer,
    observer: Box<dyn ScanObserver>,
    stats: SessionStats,
}

impl ScanSession {
    pub fn new(
        config: ScanConfig,
        camera: Box<dyn CameraDevice>,
        decoder: Box<dyn Decoder>,
        catalog: Box<dyn CatalogProvider>,
        observer: Box<dyn ScanObserver>,
    ) -> Self {
        let machine = ScanMachine::new(config.mode, config.recovery_delay());
        Self {
            config,
            machine,
            camera: CameraResource::new(camera),
            frame_loop: FrameLoop::new(),
            decoder,
            catalog,
            snapshot: Vec::new(),
            clock: Box::new(SystemClock::new()),
            recovery: RecoveryTimer::new(),
            observer,
            stats: SessionStats::default(),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Open the scanner: snapshot the catalog and acquire the camera
    ///
    /// Camera failures are not returned; the session moves to the camera
    /// error state and keeps serving manual queries.
    pub fn start(&mut self) {
        if self.machine.phase() != Phase::Idle {
            log::debug!("Scan session already started ({:?})", self.machine.phase());
            return;
        }
        self.snapshot = self.catalog.snapshot();
        log::info!(
            "Starting scan session ({:?} mode, {} catalog entries, decoder '{}')",
            self.machine.mode(),
            self.snapshot.len(),
            self.decoder.name()
        );
        self.dispatch(Event::Start);
    }

    /// Run one host tick: fire a due recovery timer, then sample one frame
    pub fn pump(&mut self) -> CycleOutcome {
        if let Some(timer) = self.recovery.take_due(self.clock.now()) {
            self.dispatch(Event::RecoveryElapsed(timer));
        }

        let machine = &self.machine;
        let decoder = &self.decoder;
        let stats = &mut self.stats;
        let mut accepted = None;

        let outcome = self.frame_loop.run_cycle(&mut self.camera, |frame| {
            let payload = match decoder.decode(frame) {
                Some(payload) if !payload.text.is_empty() => payload.text,
                _ => return Flow::Continue,
            };
            stats.payloads_decoded += 1;
            if machine.is_duplicate(&payload) {
                return Flow::Continue;
            }
            accepted = Some(payload);
            Flow::Stop
        });

        if let Some(payload) = accepted {
            self.dispatch(Event::Decoded(payload));
        }
        outcome
    }

    /// Search the catalog by SKU or name
    ///
    /// Blank queries are ignored without touching the catalog.
    pub fn manual_query(&mut self, query: &str) {
        let Some(query) = normalize_query(query) else {
            log::debug!("Ignoring blank manual query");
            return;
        };
        if !self.machine.accepts_manual_query() {
            log::debug!("Manual query ignored in {:?}", self.machine.phase());
            return;
        }

        self.stats.manual_queries += 1;
        self.snapshot = self.catalog.snapshot();
        self.dispatch(Event::ManualQuery(query.to_string()));
    }

    /// Accept the found entry; what happens next depends on the mode
    pub fn confirm(&mut self) {
        self.dispatch(Event::Confirm);
    }

    /// Accept the found entry and close, regardless of mode
    pub fn confirm_and_close(&mut self) {
        self.dispatch(Event::ConfirmAndClose);
    }

    /// Reject the found entry
    pub fn cancel(&mut self) {
        self.dispatch(Event::Cancel);
    }

    /// Close the scanner and release everything. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.dispatch(Event::Close);
    }

    pub fn status(&self) -> ScanStatus {
        let (message, retry_in) = match self.machine.state() {
            ScanState::Acquiring => (Some("Starting camera...".to_string()), None),
            ScanState::CameraError(error) => (Some(error.user_message().to_string()), None),
            ScanState::NotFound { input, resume, .. } => {
                let mut message = format!("No product matches \"{}\". Try again.", input);
                if let ResumeTarget::CameraError(error) = resume {
                    message.push(' ');
                    message.push_str(error.user_message());
                }
                (Some(message), self.recovery.remaining(self.clock.now()))
            }
            _ => (None, None),
        };

        ScanStatus {
            phase: self.machine.phase(),
            message,
            retry_in,
        }
    }

    /// Entry awaiting confirmation
    pub fn found_entry(&self) -> Option<&CatalogEntry> {
        match self.machine.state() {
            ScanState::Found { entry, .. } => Some(entry),
            _ => None,
        }
    }

    pub fn state(&self) -> &ScanState {
        self.machine.state()
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn mode(&self) -> ScanMode {
        self.machine.mode()
    }

    pub fn is_closed(&self) -> bool {
        self.machine.is_closed()
    }

    pub fn last_accepted_payload(&self) -> Option<&str> {
        self.machine.last_accepted_payload()
    }

    pub fn loop_state(&self) -> LoopState {
        self.frame_loop.state()
    }

    pub fn camera_open(&self) -> bool {
        self.camera.is_open()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            cycles: self.frame_loop.cycles(),
            frames_sampled: self.frame_loop.frames(),
            ..self.stats
        }
    }

    fn dispatch(&mut self, event: Event) {
        let counts_match = matches!(event, Event::Decoded(_) | Event::ManualQuery(_));
        let before = self.machine.phase();

        let effects = self.machine.handle(event, &self.snapshot);

        if counts_match && before != Phase::Found && self.machine.phase() == Phase::Found {
            self.stats.matches += 1;
        }
        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::AcquireCamera => {
                let request = self.config.camera_request();
                let event = match self.camera.acquire(&request) {
                    Ok(_) => Event::CameraReady,
                    Err(e) => Event::CameraFailed(e),
                };
                self.dispatch(event);
            }
            Effect::ReleaseCamera => self.camera.release(),
            Effect::StartLoop => self.frame_loop.start(),
            Effect::PauseLoop => self.frame_loop.pause(),
            Effect::ResumeLoop => self.frame_loop.resume(),
            Effect::ScheduleRecovery { timer, delay } => {
                self.stats.misses += 1;
                self.recovery.schedule(timer, self.clock.now(), delay);
            }
            Effect::CancelRecovery => self.recovery.cancel(),
            Effect::Feedback => {
                if self.config.feedback_enabled {
                    self.observer.on_feedback();
                }
            }
            Effect::Deliver(entry) => {
                log::info!("Delivering '{}' ({})", entry.name, entry.id);
                self.stats.delivered += 1;
                self.observer.on_detect(&entry);
            }
            Effect::Teardown => self.teardown(),
            Effect::NotifyClosed => self.observer.on_close(),
        }
    }

    fn teardown(&mut self) {
        self.recovery.cancel();
        self.frame_loop.stop();
        self.camera.release();

        let stats = self.stats();
        log::info!(
            "Scan session closed: {} cycles, {} frames, {} matches, {} misses, {} delivered",
            stats.cycles,
            stats.frames_sampled,
            stats.matches,
            stats.misses,
            stats.delivered
        );
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if !self.machine.is_closed() {
            self.close();
        }
    }
}
