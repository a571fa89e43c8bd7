use pw_monitor::{NodeId, StreamSink};
use tracing::info;

/// `--dry-run` sink: logs what would be sent to Home Assistant.
#[derive(Debug, Default)]
pub struct LogSink;

impl StreamSink for LogSink {
    fn on_start(&self, node_id: NodeId, app_name: &str) {
        info!(node_id, app = %app_name, "dry-run: would report playing");
    }

    fn on_stop(&self, node_id: NodeId, app_name: &str) {
        info!(node_id, app = %app_name, "dry-run: would report stopped");
    }
}
