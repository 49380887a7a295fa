use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod params;

pub use params::{LoopParams, StallDetectionParams, StateControllerParams};

/// Robot pose at one instant, as produced by localization.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseSample {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl PoseSample {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }
}

/// Planar velocity command (forward speed and yaw rate).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub linear_x: f64,
    pub angular_z: f64,
}

impl VelocityCommand {
    pub fn new(linear_x: f64, angular_z: f64) -> Self {
        Self {
            linear_x,
            angular_z,
        }
    }
}

/// Which of the two tracked velocities a sample updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VelocitySource {
    /// Last commanded velocity (obstacle reaction / planner output).
    Expected,
    /// Last observed velocity (localization).
    Actual,
}

/// Outcome of the latest stall evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StallVerdict {
    pub detected: bool,
    /// Wall-clock time of the most recent positive verdict.
    pub since: Option<DateTime<Utc>>,
}

/// Backup command plus the advisory time it should be applied for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoveryManeuver {
    pub command: VelocityCommand,
    pub duration: Duration,
}

// ────────────────────────────────────────────────────────────────────────────
// Supervisory state
// ────────────────────────────────────────────────────────────────────────────

/// High-level lifecycle state of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RobotState {
    #[default]
    Startup,
    Ready,
    Pause,
    Kill,
}

impl RobotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotState::Startup => "STARTUP",
            RobotState::Ready => "READY",
            RobotState::Pause => "PAUSE",
            RobotState::Kill => "KILL",
        }
    }
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RobotState {
    type Err = RoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STARTUP" => Ok(RobotState::Startup),
            "READY" => Ok(RobotState::Ready),
            "PAUSE" => Ok(RobotState::Pause),
            "KILL" => Ok(RobotState::Kill),
            other => Err(RoverError::Serialization(format!(
                "unknown robot state {other:?}"
            ))),
        }
    }
}

/// Origin of motion commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriveMode {
    /// A human operator drives the robot.
    #[default]
    Manual,
    /// The autonomy stack drives the robot.
    Autonomous,
}

impl DriveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriveMode::Manual => "MANUAL",
            DriveMode::Autonomous => "AUTONOMOUS",
        }
    }

    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            DriveMode::Manual => DriveMode::Autonomous,
            DriveMode::Autonomous => DriveMode::Manual,
        }
    }
}

impl fmt::Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriveMode {
    type Err = RoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANUAL" => Ok(DriveMode::Manual),
            "AUTONOMOUS" => Ok(DriveMode::Autonomous),
            other => Err(RoverError::Serialization(format!(
                "unknown drive mode {other:?}"
            ))),
        }
    }
}

/// Heartbeat emitted by the state controller on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: RobotState,
    pub drive_mode: DriveMode,
}

/// Boolean safety and control inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    Kill,
    Pause,
    /// Software pause; accepted but not wired to any transition.
    SoftPause,
    /// Operator request to flip between manual and autonomous driving.
    DriveModeToggle,
    /// Hardware emergency stop status; read by the stall detector.
    EmergencyStop,
}

// ────────────────────────────────────────────────────────────────────────────
// Bus envelope
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the supervisor event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "localization", "rover-runtime::supervisor"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a freshly stamped envelope.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Pose(PoseSample),
    Velocity {
        source: VelocitySource,
        command: VelocityCommand,
    },
    Signal {
        kind: SignalKind,
        value: bool,
    },
    Status(StatusReport),
    Recovery(RecoveryManeuver),
}

/// Global error type for the supervisor crates.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoverError {
    #[error("Empty Window: no pose samples to evaluate")]
    EmptyWindow,

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_state_strings_match_wire_names() {
        for state in [
            RobotState::Startup,
            RobotState::Ready,
            RobotState::Pause,
            RobotState::Kill,
        ] {
            let parsed: RobotState = state.to_string().parse().unwrap();
            assert_eq!(parsed, state);
        }
        assert_eq!(RobotState::Kill.to_string(), "KILL");
        assert!("kill".parse::<RobotState>().is_err());
    }

    #[test]
    fn drive_mode_toggles_both_ways() {
        assert_eq!(DriveMode::Manual.toggled(), DriveMode::Autonomous);
        assert_eq!(DriveMode::Autonomous.toggled(), DriveMode::Manual);
        assert_eq!(DriveMode::default(), DriveMode::Manual);
        assert_eq!("AUTONOMOUS".parse::<DriveMode>().unwrap(), DriveMode::Autonomous);
    }

    #[test]
    fn status_serializes_as_upper_case() {
        let status = StatusReport {
            state: RobotState::Ready,
            drive_mode: DriveMode::Autonomous,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"state":"READY","drive_mode":"AUTONOMOUS"}"#);
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "localization",
            EventPayload::Velocity {
                source: VelocitySource::Actual,
                command: VelocityCommand::new(0.4, -0.1),
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(back.source, "localization");
        match back.payload {
            EventPayload::Velocity { source, command } => {
                assert_eq!(source, VelocitySource::Actual);
                assert_eq!(command, VelocityCommand::new(0.4, -0.1));
            }
            _ => panic!("unexpected variant"),
        }
    }

    #[test]
    fn rover_error_display() {
        assert!(RoverError::EmptyWindow.to_string().contains("Empty Window"));
        let err = RoverError::Channel("no subscribers".to_string());
        assert!(err.to_string().contains("no subscribers"));
    }
}
