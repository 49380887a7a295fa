//! [`StateController`] – supervisory lifecycle state machine.
//!
//! Tracks the robot lifecycle state ([`RobotState`]) and the drive mode
//! ([`DriveMode`]), applying the safety interlocks below.  All inputs arrive as
//! boolean signals; the tick loop calls [`StateController::tick`] at a fixed
//! rate and publishes the returned [`StatusReport`] every cycle.
//!
//! | Current | Signal | Next | Side effect |
//! |---|---|---|---|
//! | `STARTUP` | tick, wait elapsed | `READY` | interfaces established once |
//! | any | kill = true | `KILL` | drive mode forced to `MANUAL` |
//! | `KILL` | kill = false | `STARTUP` | boot sequence restarts |
//! | any | pause = true | `PAUSE` | |
//! | `PAUSE` | pause = false | `READY` | |
//! | any | drive-mode toggle = true | | `MANUAL` ↔ `AUTONOMOUS` |
//!
//! Soft pause and emergency stop are recorded but drive no transition.
//!
//! # Startup wait
//!
//! Booting never blocks.  The first [`boot`][StateController::boot] arms a
//! deadline `startup_wait` in the future and later ticks promote the robot to
//! `READY` once it has passed.  Signals keep being handled in between, so a
//! kill during the wait takes effect immediately and cancels the pending boot.
//! A wait too long to be represented as an [`Instant`] never elapses.

use std::time::{Duration, Instant};

use rover_types::{DriveMode, RobotState, SignalKind, StateControllerParams, StatusReport};
use tracing::{debug, info, warn};

/// Result of a [`StateController::boot`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootProgress {
    /// The robot was not in `STARTUP`; nothing happened.
    AlreadyBooted,
    /// Still inside the startup wait.
    Waiting { remaining: Duration },
    /// The robot just became `READY`.
    Ready,
}

/// Pending boot deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BootWait {
    Idle,
    Until(Instant),
    Forever,
}

/// Owns the robot lifecycle state and drive mode.
#[derive(Debug, Clone)]
pub struct StateController {
    params: StateControllerParams,
    state: RobotState,
    drive_mode: DriveMode,
    interfaces_established: bool,
    boot_wait: BootWait,
    soft_pause: bool,
    emergency_stop: bool,
}

impl StateController {
    /// Start in `STARTUP` / `MANUAL`.  Invalid parameters are replaced by
    /// their defaults and reported with a warning.
    pub fn new(mut params: StateControllerParams) -> Self {
        for field in params.sanitize() {
            warn!(field, "invalid state controller parameter, using default");
        }
        Self {
            params,
            state: RobotState::Startup,
            drive_mode: DriveMode::Manual,
            interfaces_established: false,
            boot_wait: BootWait::Idle,
            soft_pause: false,
            emergency_stop: false,
        }
    }

    // ── Cycle ───────────────────────────────────────────────────────────────

    /// Per-cycle update: boot while in `STARTUP`, keep `MANUAL` while in
    /// `KILL`, and report the current status.
    pub fn tick(&mut self, now: Instant) -> StatusReport {
        match self.state {
            RobotState::Startup => {
                self.boot(now);
            }
            RobotState::Kill => self.drive_mode = DriveMode::Manual,
            RobotState::Ready | RobotState::Pause => {}
        }
        self.status()
    }

    /// Advance the boot sequence.  A no-op outside `STARTUP`.
    pub fn boot(&mut self, now: Instant) -> BootProgress {
        if self.state != RobotState::Startup {
            return BootProgress::AlreadyBooted;
        }

        if !self.interfaces_established {
            self.interfaces_established = true;
            info!("external interfaces established");
        }

        if self.boot_wait == BootWait::Idle {
            let wait = self.params.startup_wait();
            if self.params.enable_logging {
                debug!(?wait, "Booting...");
            }
            self.boot_wait = match now.checked_add(wait) {
                Some(deadline) => BootWait::Until(deadline),
                None => {
                    warn!(?wait, "startup wait out of range, holding in STARTUP");
                    BootWait::Forever
                }
            };
        }

        match self.boot_wait {
            BootWait::Until(deadline) if now >= deadline => {
                self.set_state(RobotState::Ready);
                BootProgress::Ready
            }
            BootWait::Until(deadline) => BootProgress::Waiting {
                remaining: deadline - now,
            },
            BootWait::Forever | BootWait::Idle => BootProgress::Waiting {
                remaining: Duration::MAX,
            },
        }
    }

    // ── Signal handlers ─────────────────────────────────────────────────────

    /// Route a boolean signal to its handler.
    pub fn handle_signal(&mut self, kind: SignalKind, value: bool) {
        match kind {
            SignalKind::Kill => self.on_kill(value),
            SignalKind::Pause => self.on_pause(value),
            SignalKind::SoftPause => self.on_soft_pause(value),
            SignalKind::DriveModeToggle => self.on_drive_mode_toggle(value),
            SignalKind::EmergencyStop => self.on_emergency_stop(value),
        }
    }

    /// `true` kills the robot from any state; `false` restarts the boot
    /// sequence when killed.
    pub fn on_kill(&mut self, signal: bool) {
        if signal {
            self.set_state(RobotState::Kill);
            self.drive_mode = DriveMode::Manual;
        } else if self.state == RobotState::Kill {
            self.set_state(RobotState::Startup);
        }
    }

    /// `true` pauses from any state; `false` resumes to `READY` when paused.
    pub fn on_pause(&mut self, signal: bool) {
        if signal {
            self.set_state(RobotState::Pause);
        } else if self.state == RobotState::Pause {
            self.set_state(RobotState::Ready);
        }
    }

    /// Every `true` is one operator press and flips the drive mode.
    pub fn on_drive_mode_toggle(&mut self, signal: bool) {
        if !signal {
            return;
        }
        self.drive_mode = self.drive_mode.toggled();
        info!(drive_mode = %self.drive_mode, "drive mode changed");
    }

    /// Recorded only.
    pub fn on_soft_pause(&mut self, signal: bool) {
        self.soft_pause = signal;
        if self.params.enable_logging {
            debug!(signal, "soft pause received");
        }
    }

    /// Recorded only.
    pub fn on_emergency_stop(&mut self, signal: bool) {
        self.emergency_stop = signal;
        if self.params.enable_logging {
            debug!(signal, "emergency stop received");
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> RobotState {
        self.state
    }

    pub fn drive_mode(&self) -> DriveMode {
        self.drive_mode
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            state: self.state,
            drive_mode: self.drive_mode,
        }
    }

    /// The robot may move only while `READY`.
    pub fn motion_permitted(&self) -> bool {
        self.state == RobotState::Ready
    }

    /// `true` while a startup wait is pending.
    pub fn is_booting(&self) -> bool {
        self.boot_wait != BootWait::Idle
    }

    /// `true` once a boot has run its one-time setup.  Leaving `STARTUP`
    /// through pause / unpause skips the boot and leaves this `false`.
    pub fn interfaces_established(&self) -> bool {
        self.interfaces_established
    }

    pub fn soft_pause_requested(&self) -> bool {
        self.soft_pause
    }

    pub fn emergency_stop_engaged(&self) -> bool {
        self.emergency_stop
    }

    fn set_state(&mut self, next: RobotState) {
        // Leaving STARTUP abandons any pending boot; it is re-armed on return.
        if next != RobotState::Startup {
            self.boot_wait = BootWait::Idle;
        }
        if next != self.state {
            info!(from = %self.state, to = %next, "robot state changed");
            self.state = next;
        }
    }
}

impl Default for StateController {
    fn default() -> Self {
        Self::new(StateControllerParams::default())
    }
}
