//! Destination for decoded trace events.

use tokio::sync::mpsc;

use crate::protocol::TraceEvent;

/// Receives everything the session decodes, in arrival order.
///
/// Only [`on_trace_event`](TraceSink::on_trace_event) is required.
pub trait TraceSink: Send {
    /// Called once per decoded event.
    fn on_trace_event(&mut self, event: TraceEvent);

    /// Called once per TRACEPOINT_LIST_REPLY with the names it carried.
    fn on_tracepoints_discovered(&mut self, _names: &[String]) {}

    /// Called once when the connection to the tracer ends.
    fn on_connection_lost(&mut self) {}
}

/// Collects events in memory.
impl TraceSink for Vec<TraceEvent> {
    fn on_trace_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// Forwards events to a channel; events are dropped once the receiver is gone.
impl TraceSink for mpsc::UnboundedSender<TraceEvent> {
    fn on_trace_event(&mut self, event: TraceEvent) {
        if self.send(event).is_err() {
            tracing::debug!("Event receiver dropped, discarding trace event");
        }
    }
}

impl<S: TraceSink + ?Sized> TraceSink for Box<S> {
    fn on_trace_event(&mut self, event: TraceEvent) {
        (**self).on_trace_event(event);
    }

    fn on_tracepoints_discovered(&mut self, names: &[String]) {
        (**self).on_tracepoints_discovered(names);
    }

    fn on_connection_lost(&mut self) {
        (**self).on_connection_lost();
    }
}
