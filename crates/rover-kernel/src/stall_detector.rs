//! [`StallDetector`] – stuck / slip detection over a sliding pose window.
//!
//! Pose samples are appended to a [`PoseHistory`].  Every time the window is
//! full the detector evaluates the stall condition:
//!
//! 1. the summed squared x/y range of the window is below the movement
//!    tolerance,
//! 2. the heading range is below the rotation tolerance,
//! 3. the emergency stop is engaged,
//! 4. the expected and actual velocities disagree (linear or angular).
//!
//! A positive verdict stamps the detection time and clears the window, so the
//! next evaluation needs a complete fresh window.  A negative evaluation resets
//! `detected` to `false`.
//!
//! Two compatibility switches in [`StallDetectionParams`] reproduce legacy
//! behaviour:
//!
//! - `legacy_condition_precedence`: the angular mismatch term is OR-ed with the
//!   whole conjunction instead of with the linear mismatch, so an angular
//!   disagreement alone declares a stall.
//! - `exact_velocity_compare`: velocities disagree whenever they are not
//!   bit-identical, instead of differing by more than `velocity_tolerance`.
//!
//! # Example
//!
//! ```
//! use rover_kernel::StallDetector;
//! use rover_types::{PoseSample, StallDetectionParams, VelocityCommand, VelocitySource};
//!
//! let mut detector = StallDetector::new(StallDetectionParams {
//!     queue_size: 3,
//!     ..StallDetectionParams::default()
//! });
//! detector.set_emergency_stop(true);
//! detector.ingest_velocity(VelocitySource::Expected, VelocityCommand::new(0.5, 0.0));
//!
//! for _ in 0..3 {
//!     detector.ingest_pose(PoseSample::new(1.0, 1.0, 0.0));
//! }
//! assert!(detector.is_stalled());
//! assert_eq!(detector.backup_command().linear_x, -0.35);
//! ```

use chrono::{DateTime, Utc};
use rover_types::{
    PoseSample, RecoveryManeuver, RoverError, StallDetectionParams, StallVerdict,
    VelocityCommand, VelocitySource,
};
use tracing::{debug, warn};

use crate::pose_history::{PoseBounds, PoseHistory};

/// Detects a robot that is commanded to move but does not.
#[derive(Debug, Clone)]
pub struct StallDetector {
    params: StallDetectionParams,
    history: PoseHistory,
    expected: VelocityCommand,
    actual: VelocityCommand,
    emergency_stop: bool,
    verdict: StallVerdict,
}

impl StallDetector {
    /// Build a detector.  Invalid parameters are replaced by their defaults
    /// and reported with a warning.
    pub fn new(mut params: StallDetectionParams) -> Self {
        for field in params.sanitize() {
            warn!(field, "invalid stall detection parameter, using default");
        }
        Self {
            history: PoseHistory::new(params.queue_size),
            params,
            expected: VelocityCommand::default(),
            actual: VelocityCommand::default(),
            emergency_stop: false,
            verdict: StallVerdict::default(),
        }
    }

    // ── Inputs ──────────────────────────────────────────────────────────────

    /// Record a pose sample, evaluating the window once it is full.
    ///
    /// Returns the fresh verdict when an evaluation ran, `None` otherwise.
    pub fn ingest_pose(&mut self, pose: PoseSample) -> Option<StallVerdict> {
        self.ingest_pose_at(pose, Utc::now())
    }

    /// [`ingest_pose`][Self::ingest_pose] with an explicit wall-clock time for
    /// the detection stamp.
    pub fn ingest_pose_at(&mut self, pose: PoseSample, now: DateTime<Utc>) -> Option<StallVerdict> {
        self.history.push(pose);
        if !self.history.is_full() {
            return None;
        }
        match self.evaluate(now) {
            Ok(verdict) => Some(verdict),
            Err(e) => {
                warn!(error = %e, "stall evaluation skipped");
                None
            }
        }
    }

    /// Overwrite the expected or actual velocity.
    pub fn ingest_velocity(&mut self, source: VelocitySource, command: VelocityCommand) {
        match source {
            VelocitySource::Expected => self.expected = command,
            VelocitySource::Actual => self.actual = command,
        }
    }

    /// Overwrite the emergency-stop flag.  Only read during evaluation.
    pub fn set_emergency_stop(&mut self, engaged: bool) {
        self.emergency_stop = engaged;
    }

    // ── Outputs ─────────────────────────────────────────────────────────────

    pub fn verdict(&self) -> StallVerdict {
        self.verdict
    }

    pub fn is_stalled(&self) -> bool {
        self.verdict.detected
    }

    /// Time of the most recent positive verdict, if any.
    pub fn last_stuck_time(&self) -> Option<DateTime<Utc>> {
        self.verdict.since
    }

    /// Reverse at `max_speed * reverse_speed_factor` without turning.
    pub fn backup_command(&self) -> VelocityCommand {
        VelocityCommand {
            linear_x: self.params.max_speed * self.params.reverse_speed_factor,
            angular_z: 0.0,
        }
    }

    /// The backup command together with its advisory duration.  Timing the
    /// maneuver is up to the executor.
    pub fn recovery_maneuver(&self) -> RecoveryManeuver {
        RecoveryManeuver {
            command: self.backup_command(),
            duration: self.params.reverse_duration(),
        }
    }

    pub fn expected_velocity(&self) -> VelocityCommand {
        self.expected
    }

    pub fn actual_velocity(&self) -> VelocityCommand {
        self.actual
    }

    pub fn emergency_stop(&self) -> bool {
        self.emergency_stop
    }

    pub fn history(&self) -> &PoseHistory {
        &self.history
    }

    pub fn params(&self) -> &StallDetectionParams {
        &self.params
    }

    // ── Evaluation ──────────────────────────────────────────────────────────

    fn evaluate(&mut self, now: DateTime<Utc>) -> Result<StallVerdict, RoverError> {
        let bounds = self.history.bounds()?;
        let stalled = self.stall_condition(&bounds);

        if self.params.enable_logging {
            debug!(
                spread = bounds.spread(),
                heading_spread = bounds.heading_spread(),
                emergency_stop = self.emergency_stop,
                stalled,
                "stall window evaluated"
            );
        }

        if stalled {
            self.verdict.detected = true;
            self.verdict.since = Some(now);
            self.history.clear();
            warn!(
                expected = ?self.expected,
                actual = ?self.actual,
                "stall detected, pose window cleared"
            );
        } else {
            self.verdict.detected = false;
        }
        Ok(self.verdict)
    }

    fn stall_condition(&self, bounds: &PoseBounds) -> bool {
        let stationary = bounds.spread() < self.params.movement_tolerance
            && bounds.heading_spread() < self.params.rotation_tolerance;
        let linear = self.mismatch(self.expected.linear_x, self.actual.linear_x);
        let angular = self.mismatch(self.expected.angular_z, self.actual.angular_z);

        if self.params.legacy_condition_precedence {
            (stationary && self.emergency_stop && linear) || angular
        } else {
            stationary && self.emergency_stop && (linear || angular)
        }
    }

    fn mismatch(&self, a: f64, b: f64) -> bool {
        if self.params.exact_velocity_compare {
            a != b
        } else {
            (a - b).abs() > self.params.velocity_tolerance
        }
    }
}

impl Default for StallDetector {
    fn default() -> Self {
        Self::new(StallDetectionParams::default())
    }
}
