//! Mirrors active PipeWire streams into a Home Assistant `media_player` entity.
//!
//! Every start/stop pushes the full aggregate state; Home Assistant keeps no
//! per-stream history. Push failures are logged and dropped so a flaky
//! network never stalls the monitor worker.

use ha_bridge_protocol::{build_state_update, entity_id_for_device, state_endpoint, StateUpdate};
use pw_monitor::{NodeId, StreamSink};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::HomeAssistantSettings;

const REQUEST_TIMEOUT_SECS: u64 = 5;
const FALLBACK_DEVICE_NAME: &str = "localhost";

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("State update for {entity_id} failed: {source}")]
    Push {
        entity_id: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Active streams in the order they started.
#[derive(Debug, Default)]
pub struct ActiveStreams {
    streams: Vec<(NodeId, String)>,
}

impl ActiveStreams {
    /// Records a started stream; a repeated id keeps its slot and takes the new name.
    pub fn start(&mut self, node_id: NodeId, app_name: &str) {
        match self.streams.iter_mut().find(|(id, _)| *id == node_id) {
            Some((_, name)) => *name = app_name.to_string(),
            None => self.streams.push((node_id, app_name.to_string())),
        }
    }

    pub fn stop(&mut self, node_id: NodeId) {
        self.streams.retain(|(id, _)| *id != node_id);
    }

    pub fn applications(&self) -> Vec<String> {
        self.streams.iter().map(|(_, name)| name.clone()).collect()
    }
}

pub struct HomeAssistantSink {
    client: reqwest::blocking::Client,
    endpoint: String,
    entity_id: String,
    token: String,
    device_name: String,
    active: Mutex<ActiveStreams>,
}

impl HomeAssistantSink {
    pub fn new(settings: &HomeAssistantSettings) -> Result<Self, SinkError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(SinkError::Client)?;

        let device_name = settings
            .device_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(host_name)
            .unwrap_or_else(|| FALLBACK_DEVICE_NAME.to_string());
        let entity_id = entity_id_for_device(&device_name);

        Ok(Self {
            client,
            endpoint: state_endpoint(&settings.url, &entity_id),
            entity_id,
            token: settings.token.clone(),
            device_name,
            active: Mutex::new(ActiveStreams::default()),
        })
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn publish(&self, applications: Vec<String>) {
        let update = build_state_update(&self.device_name, applications);
        match self.post(&update) {
            Ok(()) => info!(
                entity_id = %self.entity_id,
                state = ?update.state,
                active_streams = update.attributes.active_streams,
                "State updated"
            ),
            Err(err) => warn!(error = %err, "Failed to update Home Assistant state"),
        }
    }

    fn post(&self, update: &StateUpdate) -> Result<(), SinkError> {
        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(update)
            .send()
            .and_then(|response| response.error_for_status())
            .map(|_| ())
            .map_err(|source| SinkError::Push {
                entity_id: self.entity_id.clone(),
                source,
            })
    }
}

impl StreamSink for HomeAssistantSink {
    fn on_start(&self, node_id: NodeId, app_name: &str) {
        let applications = {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            active.start(node_id, app_name);
            active.applications()
        };
        self.publish(applications);
    }

    fn on_stop(&self, node_id: NodeId, _app_name: &str) {
        let applications = {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            active.stop(node_id);
            active.applications()
        };
        self.publish(applications);
    }
}

fn host_name() -> Option<String> {
    let mut buffer = [0u8; 256];
    // SAFETY: gethostname writes at most buffer.len() bytes into a buffer we
    // own for the duration of the call. A missing NUL terminator is handled
    // below by falling back to the full buffer length.
    let result = unsafe { libc::gethostname(buffer.as_mut_ptr().cast::<libc::c_char>(), buffer.len()) };
    if result != 0 {
        return None;
    }
    let len = buffer.iter().position(|byte| *byte == 0).unwrap_or(buffer.len());
    let name = String::from_utf8_lossy(&buffer[..len]).trim().to_string();
    (!name.is_empty()).then_some(name)
}
