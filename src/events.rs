//! Structured observability events.
//!
//! The engine reports what it measured and what it touched through an
//! injectable sink instead of global logging, so callers can discard,
//! print, or aggregate per invocation. The default sink discards.

use crate::blending::UnblendStats;
use crate::detection::DetectionResult;
use crate::inpaint::RepairStats;

/// A structured event emitted while the engine works on one image.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A stencil variant was chosen for an image; `found` is false when
    /// that size class never loaded and the caller must go manual.
    MaskSelected {
        /// Nominal size the selection rules named.
        nominal_size: u32,
        /// Whether the repository actually holds that variant.
        found: bool,
    },
    /// Presence detection finished.
    Detection(DetectionResult),
    /// A reverse-blending pass finished.
    Unblend(UnblendStats),
    /// A manual-repair pass finished.
    Repair(RepairStats),
}

/// Receives engine events, synchronously, in emission order.
///
/// Closures of the right shape implement this, so
/// `engine.with_event_sink(|e| eprintln!("{e:?}"))` works.
pub trait EventSink: Send + Sync {
    /// Called once per event.
    fn on_event(&self, event: &EngineEvent);
}

impl<F> EventSink for F
where
    F: Fn(&EngineEvent) + Send + Sync,
{
    fn on_event(&self, event: &EngineEvent) {
        self(event);
    }
}

/// Discards every event; the default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&self, _event: &EngineEvent) {}
}
