//! Scan session state machine
//!
//! All decisions live in `ScanMachine::handle`, which consumes one `Event`
//! and returns the `Effect`s the runtime must perform. The machine itself
//! never touches the camera, the loop, or the clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::DeviceError;
use crate::catalog::{normalize_query, resolve_code, resolve_query, CatalogEntry, MatchResult};

use super::clock::TimerId;

/// What confirming a match does to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Keep scanning after each confirmed item
    #[default]
    Add,
    /// Close after the first confirmed item
    View,
}

/// Where the session returns once a Found/NotFound episode ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeTarget {
    Scanning,
    CameraError(DeviceError),
}

/// How a match was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Camera,
    Manual,
}

/// Session state
#[derive(Debug, Clone, PartialEq)]
pub enum ScanState {
    /// Created, camera not requested yet
    Idle,
    /// Waiting on the camera
    Acquiring,
    /// Frame loop running
    Scanning,
    /// Waiting for the operator to confirm or cancel
    Found {
        entry: CatalogEntry,
        source: MatchSource,
        resume: ResumeTarget,
    },
    /// Nothing matched; recovers when `timer` fires
    NotFound {
        input: String,
        source: MatchSource,
        timer: TimerId,
        resume: ResumeTarget,
    },
    /// Camera pipeline is down; manual queries only
    CameraError(DeviceError),
    /// Terminal
    Closed,
}

/// Data-free view of `ScanState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Acquiring,
    Scanning,
    Found,
    NotFound,
    CameraError,
    Closed,
}

impl ScanState {
    pub fn phase(&self) -> Phase {
        match self {
            ScanState::Idle => Phase::Idle,
            ScanState::Acquiring => Phase::Acquiring,
            ScanState::Scanning => Phase::Scanning,
            ScanState::Found { .. } => Phase::Found,
            ScanState::NotFound { .. } => Phase::NotFound,
            ScanState::CameraError(_) => Phase::CameraError,
            ScanState::Closed => Phase::Closed,
        }
    }
}

/// Inputs to the machine
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Host opened the scanner
    Start,
    /// Camera acquisition succeeded
    CameraReady,
    /// Camera acquisition failed
    CameraFailed(DeviceError),
    /// Frame loop decoded a payload
    Decoded(String),
    /// Operator typed a search
    ManualQuery(String),
    /// Operator accepted the found entry
    Confirm,
    /// Operator accepted the found entry and wants the scanner closed
    ConfirmAndClose,
    /// Operator rejected the found entry
    Cancel,
    /// A recovery timer fired
    RecoveryElapsed(TimerId),
    /// Host closed the scanner
    Close,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    AcquireCamera,
    ReleaseCamera,
    StartLoop,
    PauseLoop,
    ResumeLoop,
    ScheduleRecovery { timer: TimerId, delay: Duration },
    CancelRecovery,
    /// Found feedback hook (haptic pulse, beep)
    Feedback,
    /// Hand a confirmed entry to the host
    Deliver(CatalogEntry),
    /// Cancel recovery, stop the loop and release the camera, together
    Teardown,
    /// Tell the host the session closed
    NotifyClosed,
}

/// Session state plus the debounce guard
#[derive(Debug, Clone)]
pub struct ScanMachine {
    state: ScanState,
    mode: ScanMode,
    last_accepted: Option<String>,
    recovery_delay: Duration,
    next_timer: u64,
}

impl ScanMachine {
    pub fn new(mode: ScanMode, recovery_delay: Duration) -> Self {
        Self {
            state: ScanState::Idle,
            mode,
            last_accepted: None,
            recovery_delay,
            next_timer: 1,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.state == ScanState::Closed
    }

    /// Payload of the last accepted match, cleared on resume
    pub fn last_accepted_payload(&self) -> Option<&str> {
        self.last_accepted.as_deref()
    }

    /// True if `payload` repeats the last accepted one
    pub fn is_duplicate(&self, payload: &str) -> bool {
        self.last_accepted.as_deref() == Some(payload)
    }

    /// Whether a manual query would be considered in the current state
    pub fn accepts_manual_query(&self) -> bool {
        matches!(
            self.state,
            ScanState::Scanning | ScanState::NotFound { .. } | ScanState::CameraError(_)
        )
    }

    /// Consume the machine and one event, producing the next machine
    pub fn transition(mut self, event: Event, catalog: &[CatalogEntry]) -> (Self, Vec<Effect>) {
        let effects = self.handle(event, catalog);
        (self, effects)
    }

    /// Apply one event in place
    pub fn handle(&mut self, event: Event, catalog: &[CatalogEntry]) -> Vec<Effect> {
        let state = std::mem::replace(&mut self.state, ScanState::Closed);
        let (next, effects) = self.step(state, event, catalog);
        log::trace!("Scan state -> {:?} ({} effects)", next.phase(), effects.len());
        self.state = next;
        effects
    }

    fn step(
        &mut self,
        state: ScanState,
        event: Event,
        catalog: &[CatalogEntry],
    ) -> (ScanState, Vec<Effect>) {
        match (state, event) {
            // A camera that finishes opening after close must still be given back
            (ScanState::Closed, Event::CameraReady) => {
                (ScanState::Closed, vec![Effect::ReleaseCamera])
            }
            (ScanState::Closed, _) => (ScanState::Closed, Vec::new()),

            (_, Event::Close) => (ScanState::Closed, vec![Effect::Teardown, Effect::NotifyClosed]),

            (ScanState::Idle, Event::Start) => (ScanState::Acquiring, vec![Effect::AcquireCamera]),

            (ScanState::Acquiring, Event::CameraReady) => {
                (ScanState::Scanning, vec![Effect::StartLoop])
            }
            (ScanState::Acquiring, Event::CameraFailed(error)) => {
                log::warn!("Camera unavailable, manual search only: {}", error);
                (ScanState::CameraError(error), Vec::new())
            }

            (ScanState::Scanning, Event::Decoded(payload)) => self.on_decoded(payload, catalog),

            (state, Event::ManualQuery(query)) => self.on_manual_query(state, query, catalog),

            (ScanState::Found { entry, resume, .. }, Event::Confirm) => match self.mode {
                ScanMode::View => (
                    ScanState::Closed,
                    vec![Effect::Deliver(entry), Effect::Teardown, Effect::NotifyClosed],
                ),
                ScanMode::Add => {
                    let (next, mut effects) = self.resume(resume);
                    effects.insert(0, Effect::Deliver(entry));
                    (next, effects)
                }
            },
            (ScanState::Found { entry, .. }, Event::ConfirmAndClose) => (
                ScanState::Closed,
                vec![Effect::Deliver(entry), Effect::Teardown, Effect::NotifyClosed],
            ),
            (ScanState::Found { resume, .. }, Event::Cancel) => self.resume(resume),

            (
                ScanState::NotFound {
                    input,
                    source,
                    timer,
                    resume,
                },
                Event::RecoveryElapsed(fired),
            ) => {
                if fired == timer {
                    log::debug!("Recovery timer {:?} fired", fired);
                    self.resume(resume)
                } else {
                    (
                        ScanState::NotFound {
                            input,
                            source,
                            timer,
                            resume,
                        },
                        Vec::new(),
                    )
                }
            }

            // Anything else is ignored in the current state
            (state, event) => {
                log::debug!("Ignoring {:?} in {:?}", event, state.phase());
                (state, Vec::new())
            }
        }
    }

    fn on_decoded(&mut self, payload: String, catalog: &[CatalogEntry]) -> (ScanState, Vec<Effect>) {
        if payload.is_empty() || self.is_duplicate(&payload) {
            return (ScanState::Scanning, vec![Effect::ResumeLoop]);
        }

        match resolve_code(&payload, catalog) {
            MatchResult::Found(entry) => {
                log::info!("Matched {:?} to '{}' ({})", payload, entry.name, entry.id);
                self.last_accepted = Some(payload);
                (
                    ScanState::Found {
                        entry,
                        source: MatchSource::Camera,
                        resume: ResumeTarget::Scanning,
                    },
                    vec![Effect::PauseLoop, Effect::Feedback],
                )
            }
            MatchResult::NotFound => {
                log::info!("No catalog entry for payload {:?}", payload);
                let (state, effects) =
                    self.not_found(payload, MatchSource::Camera, ResumeTarget::Scanning);
                (state, [vec![Effect::PauseLoop], effects].concat())
            }
        }
    }

    fn on_manual_query(
        &mut self,
        state: ScanState,
        query: String,
        catalog: &[CatalogEntry],
    ) -> (ScanState, Vec<Effect>) {
        let resume = match &state {
            ScanState::Scanning => ResumeTarget::Scanning,
            ScanState::NotFound { resume, .. } => resume.clone(),
            ScanState::CameraError(error) => ResumeTarget::CameraError(error.clone()),
            _ => {
                log::debug!("Manual query ignored in {:?}", state.phase());
                return (state, Vec::new());
            }
        };
        let Some(query) = normalize_query(&query).map(str::to_string) else {
            return (state, Vec::new());
        };

        let mut effects = Vec::new();
        if matches!(state, ScanState::NotFound { .. }) {
            effects.push(Effect::CancelRecovery);
        }
        if resume == ResumeTarget::Scanning {
            effects.push(Effect::PauseLoop);
        }

        match resolve_query(&query, catalog) {
            MatchResult::Found(entry) => {
                log::info!("Query {:?} matched '{}' ({})", query, entry.name, entry.id);
                effects.push(Effect::Feedback);
                (
                    ScanState::Found {
                        entry,
                        source: MatchSource::Manual,
                        resume,
                    },
                    effects,
                )
            }
            MatchResult::NotFound => {
                log::info!("No catalog entry for query {:?}", query);
                let (next, more) = self.not_found(query, MatchSource::Manual, resume);
                effects.extend(more);
                (next, effects)
            }
        }
    }

    fn not_found(
        &mut self,
        input: String,
        source: MatchSource,
        resume: ResumeTarget,
    ) -> (ScanState, Vec<Effect>) {
        let timer = TimerId(self.next_timer);
        self.next_timer += 1;
        (
            ScanState::NotFound {
                input,
                source,
                timer,
                resume,
            },
            vec![Effect::ScheduleRecovery {
                timer,
                delay: self.recovery_delay,
            }],
        )
    }

    fn resume(&mut self, target: ResumeTarget) -> (ScanState, Vec<Effect>) {
        self.last_accepted = None;
        match target {
            ResumeTarget::Scanning => (ScanState::Scanning, vec![Effect::ResumeLoop]),
            ResumeTarget::CameraError(error) => (ScanState::CameraError(error), Vec::new()),
        }
    }
}
