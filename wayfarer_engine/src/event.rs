//! Event sink capability injected into the progression engines.
//!
//! Engines mutate their own state first, then broadcast a named event
//! through the sink so UI, audio, and narration collaborators can react.
//! A sink failure never rolls back or propagates out of an engine call.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use log::warn;
use serde_json::Value;

/// Capability for broadcasting engine events to outside observers.
pub trait EventSink {
    /// Deliver one named event with a JSON payload.
    ///
    /// # Errors
    /// Observer failures may be reported here; callers inside the
    /// engine swallow them.
    fn emit(&mut self, event: &str, payload: Value) -> Result<()>;
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &str, _payload: Value) -> Result<()> {
        Ok(())
    }
}

/// Sink that records every event in order. Used by tests and tooling
/// that inspects what the engines announced.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub events: Vec<(String, Value)>,
}

impl CollectingSink {
    /// Count of recorded events with the given name.
    pub fn count(&self, event: &str) -> usize {
        self.events.iter().filter(|(name, _)| name == event).count()
    }
}

impl EventSink for CollectingSink {
    fn emit(&mut self, event: &str, payload: Value) -> Result<()> {
        self.events.push((event.to_string(), payload));
        Ok(())
    }
}

/// Lets one sink be shared between the quest and milestone engines on
/// the single game-turn thread.
impl<S: EventSink> EventSink for Rc<RefCell<S>> {
    fn emit(&mut self, event: &str, payload: Value) -> Result<()> {
        self.borrow_mut().emit(event, payload)
    }
}

/// Emit through a sink, swallowing observer failures with a warning.
pub(crate) fn emit_quiet(sink: &mut dyn EventSink, event: &str, payload: Value) {
    if let Err(err) = sink.emit(event, payload) {
        warn!("event sink rejected '{event}': {err:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use serde_json::json;

    struct FailingSink;
    impl EventSink for FailingSink {
        fn emit(&mut self, _event: &str, _payload: Value) -> Result<()> {
            bail!("observer exploded");
        }
    }

    #[test]
    fn collecting_sink_records_in_order() {
        let mut sink = CollectingSink::default();
        emit_quiet(&mut sink, "first", json!({"n": 1}));
        emit_quiet(&mut sink, "second", json!({"n": 2}));
        assert_eq!(sink.events.len(), 2);
        assert_eq!(sink.events[0].0, "first");
        assert_eq!(sink.count("second"), 1);
    }

    #[test]
    fn emit_quiet_swallows_sink_failure() {
        let mut sink = FailingSink;
        emit_quiet(&mut sink, "anything", json!({}));
    }

    #[test]
    fn shared_sink_delivers_through_refcell() {
        let shared = Rc::new(RefCell::new(CollectingSink::default()));
        let mut handle = shared.clone();
        emit_quiet(&mut handle, "ping", json!({}));
        assert_eq!(shared.borrow().count("ping"), 1);
    }
}
