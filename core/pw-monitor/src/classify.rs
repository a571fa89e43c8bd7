//! Picks the playback-relevant nodes out of one `pw-dump` snapshot.
//! Anything that does not look like an audio output node is skipped.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::types::{NodeId, NodeState, RelevantNode, UNKNOWN_APP_NAME};

pub const NODE_TYPE: &str = "PipeWire:Interface:Node";

/// `media.class` substrings that mark an output stream or a sink.
pub const PLAYBACK_MEDIA_CLASSES: &[&str] = &["Stream/Output/Audio", "Audio/Sink"];

#[derive(Debug, Deserialize)]
struct NodeRecord {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    id: Option<NodeId>,
    #[serde(default)]
    info: Option<NodeInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeInfo {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    props: Option<NodeProps>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeProps {
    #[serde(rename = "media.class", default)]
    media_class: Option<String>,
    #[serde(rename = "application.name", default)]
    application_name: Option<String>,
}

/// Returns the relevant nodes of `document` in document order.
///
/// A document that is not an array yields no nodes.
pub fn classify(document: &Value) -> Vec<RelevantNode> {
    let Some(records) = document.as_array() else {
        debug!("Snapshot is not a JSON array; treating as empty");
        return Vec::new();
    };

    records.iter().filter_map(classify_record).collect()
}

fn classify_record(value: &Value) -> Option<RelevantNode> {
    let record = match NodeRecord::deserialize(value) {
        Ok(record) => record,
        Err(err) => {
            debug!(error = %err, "Skipping malformed node record");
            return None;
        }
    };

    if record.kind.as_deref() != Some(NODE_TYPE) {
        return None;
    }

    let info = record.info.unwrap_or_default();
    let props = info.props.unwrap_or_default();
    if !is_playback_class(props.media_class.as_deref()?) {
        return None;
    }

    let id = record.id?;
    Some(RelevantNode {
        id,
        app_name: props
            .application_name
            .unwrap_or_else(|| UNKNOWN_APP_NAME.to_string()),
        state: NodeState::from_wire(info.state.as_deref()),
    })
}

fn is_playback_class(media_class: &str) -> bool {
    PLAYBACK_MEDIA_CLASSES
        .iter()
        .any(|pattern| media_class.contains(pattern))
}
