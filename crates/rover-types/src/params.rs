//! Tunable parameters for the supervisor components.
//!
//! Every field carries a `#[serde(default)]` so a partial TOML table (or none
//! at all) resolves to the documented defaults.  Values that parse but make no
//! physical sense are replaced by [`sanitize`][StallDetectionParams::sanitize],
//! which returns the names of the fields it had to correct so the caller can
//! log them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Stall detection
// ────────────────────────────────────────────────────────────────────────────

/// Parameters of the stall / slip detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StallDetectionParams {
    /// Number of pose samples in a full evaluation window.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Upper bound on the summed squared x/y range of the window.
    #[serde(default = "default_movement_tolerance")]
    pub movement_tolerance: f64,

    /// Upper bound on the heading range of the window (degrees).
    #[serde(default = "default_rotation_tolerance")]
    pub rotation_tolerance: f64,

    /// Multiplier applied to `max_speed` for the backup command.  Must not be
    /// positive.
    #[serde(default = "default_reverse_speed_factor")]
    pub reverse_speed_factor: f64,

    #[serde(default = "default_max_speed")]
    pub max_speed: f64,

    /// Advisory duration of the backup maneuver, in seconds.
    #[serde(default = "default_reverse_duration_secs")]
    pub reverse_duration_secs: f64,

    /// Two velocities closer than this are treated as equal.  Ignored when
    /// `exact_velocity_compare` is set.
    #[serde(default = "default_velocity_tolerance")]
    pub velocity_tolerance: f64,

    /// Compare expected and actual velocities with `!=` instead of
    /// `velocity_tolerance`.
    #[serde(default)]
    pub exact_velocity_compare: bool,

    /// Evaluate the stall condition with the legacy precedence, where an
    /// angular velocity mismatch alone is enough to declare a stall.
    #[serde(default)]
    pub legacy_condition_precedence: bool,

    #[serde(default)]
    pub enable_logging: bool,
}

fn default_queue_size() -> usize {
    100
}
fn default_movement_tolerance() -> f64 {
    0.1
}
fn default_rotation_tolerance() -> f64 {
    5.0
}
fn default_reverse_speed_factor() -> f64 {
    -0.5
}
fn default_max_speed() -> f64 {
    0.7
}
fn default_reverse_duration_secs() -> f64 {
    0.7
}
fn default_velocity_tolerance() -> f64 {
    1e-6
}

impl Default for StallDetectionParams {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            movement_tolerance: default_movement_tolerance(),
            rotation_tolerance: default_rotation_tolerance(),
            reverse_speed_factor: default_reverse_speed_factor(),
            max_speed: default_max_speed(),
            reverse_duration_secs: default_reverse_duration_secs(),
            velocity_tolerance: default_velocity_tolerance(),
            exact_velocity_compare: false,
            legacy_condition_precedence: false,
            enable_logging: false,
        }
    }
}

impl StallDetectionParams {
    /// Replace invalid values with their defaults.
    ///
    /// Returns the names of the corrected fields; empty when everything was
    /// already valid.
    pub fn sanitize(&mut self) -> Vec<&'static str> {
        let mut fixed = Vec::new();
        if self.queue_size == 0 {
            self.queue_size = default_queue_size();
            fixed.push("queue_size");
        }
        fix(
            &mut self.movement_tolerance,
            default_movement_tolerance(),
            |v| v > 0.0,
            "movement_tolerance",
            &mut fixed,
        );
        fix(
            &mut self.rotation_tolerance,
            default_rotation_tolerance(),
            |v| v > 0.0,
            "rotation_tolerance",
            &mut fixed,
        );
        fix(
            &mut self.reverse_speed_factor,
            default_reverse_speed_factor(),
            |v| v <= 0.0,
            "reverse_speed_factor",
            &mut fixed,
        );
        fix(
            &mut self.max_speed,
            default_max_speed(),
            |v| v >= 0.0,
            "max_speed",
            &mut fixed,
        );
        fix(
            &mut self.reverse_duration_secs,
            default_reverse_duration_secs(),
            |v| v >= 0.0,
            "reverse_duration_secs",
            &mut fixed,
        );
        fix(
            &mut self.velocity_tolerance,
            default_velocity_tolerance(),
            |v| v >= 0.0,
            "velocity_tolerance",
            &mut fixed,
        );
        fixed
    }

    /// The advisory backup duration as a [`Duration`].
    pub fn reverse_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.reverse_duration_secs).unwrap_or_default()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State controller
// ────────────────────────────────────────────────────────────────────────────

/// Parameters of the supervisory state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateControllerParams {
    /// Minimum time spent in `STARTUP` before the robot may become `READY`,
    /// in seconds.
    #[serde(default)]
    pub startup_wait_secs: f64,

    #[serde(default)]
    pub enable_logging: bool,
}

impl Default for StateControllerParams {
    fn default() -> Self {
        Self {
            startup_wait_secs: 0.0,
            enable_logging: false,
        }
    }
}

impl StateControllerParams {
    /// Replace invalid values with their defaults.  See
    /// [`StallDetectionParams::sanitize`].
    pub fn sanitize(&mut self) -> Vec<&'static str> {
        let mut fixed = Vec::new();
        fix(
            &mut self.startup_wait_secs,
            0.0,
            |v| v >= 0.0,
            "startup_wait_secs",
            &mut fixed,
        );
        fixed
    }

    /// The startup wait as a [`Duration`].  Waits too long to represent
    /// saturate at [`Duration::MAX`].
    pub fn startup_wait(&self) -> Duration {
        Duration::try_from_secs_f64(self.startup_wait_secs).unwrap_or(Duration::MAX)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Supervisor loop
// ────────────────────────────────────────────────────────────────────────────

/// Parameters of the tick loop and its input queues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopParams {
    /// Rate of the state machine tick.
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: f64,

    /// Depth of every bus topic queue.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

fn default_tick_rate_hz() -> f64 {
    10.0
}
fn default_bus_capacity() -> usize {
    100
}

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            tick_rate_hz: default_tick_rate_hz(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

impl LoopParams {
    /// Replace invalid values with their defaults.  See
    /// [`StallDetectionParams::sanitize`].
    pub fn sanitize(&mut self) -> Vec<&'static str> {
        let mut fixed = Vec::new();
        fix(
            &mut self.tick_rate_hz,
            default_tick_rate_hz(),
            |v| v > 0.0,
            "tick_rate_hz",
            &mut fixed,
        );
        if self.bus_capacity == 0 {
            self.bus_capacity = default_bus_capacity();
            fixed.push("bus_capacity");
        }
        fixed
    }

    /// Period between two ticks.
    pub fn tick_period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.tick_rate_hz)
            .unwrap_or_else(|_| Duration::from_millis(100))
    }
}

fn fix(
    value: &mut f64,
    default: f64,
    valid: impl Fn(f64) -> bool,
    name: &'static str,
    fixed: &mut Vec<&'static str>,
) {
    if !value.is_finite() || !valid(*value) {
        *value = default;
        fixed.push(name);
    }
}
