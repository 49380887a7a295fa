//! [`PoseHistory`] – bounded sliding window of pose samples.
//!
//! The window holds at most `capacity` samples, oldest first.  Pushing into a
//! full window evicts the oldest sample before the new one is appended, so the
//! length never exceeds the capacity.
//!
//! Extreme values are only defined over a non-empty window; querying an empty
//! one returns [`RoverError::EmptyWindow`].
//!
//! # Example
//!
//! ```
//! use rover_kernel::pose_history::{Axis, PoseHistory};
//! use rover_types::PoseSample;
//!
//! let mut history = PoseHistory::new(2);
//! history.push(PoseSample::new(0.0, 0.0, 0.0));
//! history.push(PoseSample::new(1.0, 0.0, 0.0));
//! history.push(PoseSample::new(3.0, 0.0, 0.0)); // evicts x = 0.0
//!
//! assert_eq!(history.len(), 2);
//! assert_eq!(history.min(Axis::X).unwrap(), 1.0);
//! ```

use std::collections::VecDeque;

use rover_types::{PoseSample, RoverError};

// ────────────────────────────────────────────────────────────────────────────
// Axis selection
// ────────────────────────────────────────────────────────────────────────────

/// Pose component an extreme is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Theta,
}

impl Axis {
    /// Parse the axis names `"x"`, `"y"` and `"theta"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "theta" => Some(Axis::Theta),
            _ => None,
        }
    }

    fn of(self, pose: &PoseSample) -> f64 {
        match self {
            Axis::X => pose.x,
            Axis::Y => pose.y,
            Axis::Theta => pose.theta,
        }
    }
}

/// Which end of the range to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Min,
    Max,
}

/// Per-axis extremes of a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_theta: f64,
    pub max_theta: f64,
}

impl PoseBounds {
    /// Sum of the squared x and y ranges.
    ///
    /// This is not a squared displacement; it is compared directly against the
    /// movement tolerance.
    pub fn spread(&self) -> f64 {
        (self.max_x - self.min_x).powi(2) + (self.max_y - self.min_y).powi(2)
    }

    pub fn heading_spread(&self) -> f64 {
        self.max_theta - self.min_theta
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PoseHistory
// ────────────────────────────────────────────────────────────────────────────

/// Fixed-capacity FIFO of recent pose samples.
#[derive(Debug, Clone)]
pub struct PoseHistory {
    capacity: usize,
    samples: VecDeque<PoseSample>,
}

impl PoseHistory {
    /// Create an empty window.  A `capacity` of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append `sample`, evicting the oldest sample first when the window is
    /// full.
    pub fn push(&mut self, sample: PoseSample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Samples oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PoseSample> {
        self.samples.iter()
    }

    /// Smallest value of `axis` in the window.
    pub fn min(&self, axis: Axis) -> Result<f64, RoverError> {
        self.extreme(axis, Extreme::Min)
    }

    /// Largest value of `axis` in the window.
    pub fn max(&self, axis: Axis) -> Result<f64, RoverError> {
        self.extreme(axis, Extreme::Max)
    }

    pub fn extreme(&self, axis: Axis, which: Extreme) -> Result<f64, RoverError> {
        let values = self.samples.iter().map(|pose| axis.of(pose));
        let found = match which {
            Extreme::Min => values.reduce(f64::min),
            Extreme::Max => values.reduce(f64::max),
        };
        found.ok_or(RoverError::EmptyWindow)
    }

    /// String-keyed variant of [`extreme`][Self::extreme].
    ///
    /// Unknown axis names yield `0.0` instead of an error, whatever the
    /// window holds.
    pub fn extreme_by_name(&self, axis: &str, which: Extreme) -> Result<f64, RoverError> {
        match Axis::from_name(axis) {
            Some(axis) => self.extreme(axis, which),
            None => Ok(0.0),
        }
    }

    /// All extremes in a single pass.
    pub fn bounds(&self) -> Result<PoseBounds, RoverError> {
        let mut samples = self.samples.iter();
        let first = samples.next().ok_or(RoverError::EmptyWindow)?;
        let seed = PoseBounds {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
            min_theta: first.theta,
            max_theta: first.theta,
        };
        Ok(samples.fold(seed, |b, p| PoseBounds {
            min_x: b.min_x.min(p.x),
            max_x: b.max_x.max(p.x),
            min_y: b.min_y.min(p.y),
            max_y: b.max_y.max(p.y),
            min_theta: b.min_theta.min(p.theta),
            max_theta: b.max_theta.max(p.theta),
        }))
    }
}
