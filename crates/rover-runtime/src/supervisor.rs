//! [`SupervisorLoop`] – the fixed-rate tick driver.
//!
//! Owns the [`StateController`] and the [`StallDetector`] and is the only code
//! that touches them.  Each [`cycle`][SupervisorLoop::cycle]:
//!
//! 1. **Tick** – [`StateController::tick`] (boot while in `STARTUP`, keep
//!    `MANUAL` while killed).
//! 2. **Heartbeat** – publish the [`StatusReport`] on [`Topic::Status`],
//!    whether or not it changed.
//! 3. **Dispatch** – drain every event queued since the previous cycle and
//!    hand it to the matching handler, in the order the events were
//!    published across the signal, velocity and pose topics.
//!
//! When a pose completes a window that evaluates to a stall, the backup
//! [`RecoveryManeuver`][rover_types::RecoveryManeuver] is published on
//! [`Topic::Recovery`].
//!
//! Handlers and ticks run on one task and never overlap, so the components
//! need no locking.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::{Arc, atomic::AtomicBool};
//! use rover_middleware::EventBus;
//! use rover_runtime::supervisor::{SupervisorConfig, SupervisorLoop};
//!
//! # async fn run() {
//! let bus = EventBus::default();
//! let mut supervisor = SupervisorLoop::new(bus.clone(), SupervisorConfig::default());
//! supervisor.run(Arc::new(AtomicBool::new(false))).await;
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rover_kernel::{StallDetector, StateController};
use rover_middleware::{EventBus, MergedReceiver, Topic};
use rover_types::{
    Event, EventPayload, LoopParams, SignalKind, StallDetectionParams, StateControllerParams,
    StatusReport,
};
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// `source` stamped on every event the supervisor publishes.
const SOURCE: &str = "rover-runtime::supervisor";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`SupervisorLoop`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub stall_detection: StallDetectionParams,
    #[serde(default)]
    pub state_controller: StateControllerParams,
    #[serde(default)]
    pub supervisor_loop: LoopParams,
}

// ─────────────────────────────────────────────────────────────────────────────
// SupervisorLoop
// ─────────────────────────────────────────────────────────────────────────────

pub struct SupervisorLoop {
    bus: EventBus,
    controller: StateController,
    detector: StallDetector,
    inputs: MergedReceiver,
    tick_period: Duration,
}

impl SupervisorLoop {
    /// Build the components from `config` and subscribe to the input topics.
    ///
    /// Only events published after this call are seen by the loop.
    pub fn new(bus: EventBus, config: SupervisorConfig) -> Self {
        let mut loop_params = config.supervisor_loop;
        for field in loop_params.sanitize() {
            warn!(field, "invalid supervisor loop parameter, using default");
        }
        Self {
            inputs: bus.subscribe_merged(&[Topic::Signals, Topic::Velocity, Topic::Localization]),
            controller: StateController::new(config.state_controller),
            detector: StallDetector::new(config.stall_detection),
            tick_period: loop_params.tick_period(),
            bus,
        }
    }

    /// Run one tick followed by dispatch of every pending input.
    ///
    /// Returns the status published by this cycle's heartbeat.
    pub fn cycle(&mut self, now: Instant) -> StatusReport {
        let status = self.controller.tick(now);
        self.publish(Topic::Status, EventPayload::Status(status));
        let dispatched = self.dispatch_pending();
        if dispatched > 0 {
            debug!(dispatched, "inputs dispatched");
        }
        status
    }

    /// Cycle at the configured rate until `shutdown` is set.
    pub async fn run(&mut self, shutdown: Arc<AtomicBool>) {
        let mut interval = tokio::time::interval(self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period = ?self.tick_period, "supervisor loop started");

        while !shutdown.load(Ordering::SeqCst) {
            interval.tick().await;
            self.cycle(Instant::now());
        }
        info!("supervisor loop stopped");
    }

    /// Apply one input event to the components.
    pub fn handle_event(&mut self, event: Event) {
        match event.payload {
            EventPayload::Pose(pose) => {
                let stalled = self.detector.ingest_pose(pose).is_some_and(|v| v.detected);
                if stalled {
                    let maneuver = self.detector.recovery_maneuver();
                    info!(?maneuver, "issuing backup maneuver");
                    self.publish(Topic::Recovery, EventPayload::Recovery(maneuver));
                }
            }
            EventPayload::Velocity { source, command } => {
                self.detector.ingest_velocity(source, command);
            }
            EventPayload::Signal { kind, value } => {
                if kind == SignalKind::EmergencyStop {
                    self.detector.set_emergency_stop(value);
                }
                self.controller.handle_signal(kind, value);
            }
            EventPayload::Status(_) | EventPayload::Recovery(_) => {
                debug!(source = %event.source, "ignoring supervisor output on an input topic");
            }
        }
    }

    pub fn controller(&self) -> &StateController {
        &self.controller
    }

    pub fn detector(&self) -> &StallDetector {
        &self.detector
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    fn dispatch_pending(&mut self) -> usize {
        let mut count = 0;
        while let Some((_, event)) = self.inputs.try_recv() {
            self.handle_event(event);
            count += 1;
        }
        count
    }

    fn publish(&self, topic: Topic, payload: EventPayload) {
        // Nobody listening is normal (e.g. during bring-up).
        if let Err(e) = self.bus.publish_to(topic, Event::new(SOURCE, payload)) {
            debug!(error = %e, "output not delivered");
        }
    }
}
