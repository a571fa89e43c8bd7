//! Destination for playback notifications.

use crate::types::{NodeId, StreamEvent};

/// Receives stream start/stop notifications from the monitor worker.
///
/// Calls arrive on the worker thread, one at a time, in the order the
/// reconciler produced them. Implementations must not call back into the
/// monitor that owns them.
pub trait StreamSink: Send + Sync {
    fn on_start(&self, node_id: NodeId, app_name: &str);
    fn on_stop(&self, node_id: NodeId, app_name: &str);
}

pub(crate) fn deliver(sink: &dyn StreamSink, event: &StreamEvent) {
    match event {
        StreamEvent::Started { node_id, app_name } => sink.on_start(*node_id, app_name),
        StreamEvent::Stopped {
            node_id, app_name, ..
        } => sink.on_stop(*node_id, app_name),
    }
}
