//! `rover-middleware` – in-process messaging
//!
//! Carries pose samples, velocities, safety signals and supervisor outputs
//! between producers and the supervisor without caring about their meaning.
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.

pub mod bus;

pub use bus::{EventBus, MergedReceiver, Topic, TopicReceiver};
