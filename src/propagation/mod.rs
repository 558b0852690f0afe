//! Propagation between ingestion and status relays.
//!
//! # Data Flow
//! ```text
//! Ingestion (producer)
//!     → PropagationHub::publish (waits for an eligible subscriber)
//!     → per-subscriber bounded queue
//!     → Subscription::recv (one per Watch call)
//!     → Status relay
//! ```
//!
//! # Design Decisions
//! - Registry of named subscribers instead of one shared queue
//! - `Queue` mode hands each record to exactly one subscriber,
//!   `Broadcast` mode fans out to every eligible subscriber
//! - Bounded queues give back-pressure: publishers wait, never drop

pub mod hub;

pub use hub::{DeliveryMode, PropagationHub, PublishError, Subscription};
