//! Payload types for pushing playback state to the Home Assistant states API.
//!
//! The bridge only ever writes one `media_player` entity per machine, via
//! `POST /api/states/<entity_id>`. Keeping the body shape here lets it be
//! tested without an HTTP client.

use serde::{Deserialize, Serialize};

pub const ENTITY_DOMAIN: &str = "media_player";
pub const ENTITY_PREFIX: &str = "pipewire_";
pub const DEVICE_CLASS_SPEAKER: &str = "speaker";
/// Read-only player: no transport controls.
pub const SUPPORTED_FEATURES_NONE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaPlayerState {
    Playing,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPlayerAttributes {
    pub friendly_name: String,
    pub device_class: String,
    pub supported_features: u32,
    /// First active application, `null` when idle.
    pub app_name: Option<String>,
    pub active_streams: usize,
    pub applications: Vec<String>,
}

/// Request body for `POST /api/states/<entity_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub state: MediaPlayerState,
    pub attributes: MediaPlayerAttributes,
}

/// `media_player.pipewire_<device>` with the device name lowercased and
/// dashes turned into underscores.
pub fn entity_id_for_device(device_name: &str) -> String {
    let object_id = device_name.to_lowercase().replace('-', "_");
    format!("{ENTITY_DOMAIN}.{ENTITY_PREFIX}{object_id}")
}

pub fn friendly_name_for_device(device_name: &str) -> String {
    format!("PipeWire Audio - {device_name}")
}

/// Builds the state body for the given active application names, in the
/// order their streams started.
pub fn build_state_update(device_name: &str, applications: Vec<String>) -> StateUpdate {
    let state = if applications.is_empty() {
        MediaPlayerState::Idle
    } else {
        MediaPlayerState::Playing
    };

    StateUpdate {
        state,
        attributes: MediaPlayerAttributes {
            friendly_name: friendly_name_for_device(device_name),
            device_class: DEVICE_CLASS_SPEAKER.to_string(),
            supported_features: SUPPORTED_FEATURES_NONE,
            app_name: applications.first().cloned(),
            active_streams: applications.len(),
            applications,
        },
    }
}

/// Joins the configured base URL and the entity's states endpoint.
pub fn state_endpoint(base_url: &str, entity_id: &str) -> String {
    format!("{}/api/states/{}", base_url.trim_end_matches('/'), entity_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_id_normalizes_device_name() {
        assert_eq!(
            entity_id_for_device("Living-Room-PC"),
            "media_player.pipewire_living_room_pc"
        );
        assert_eq!(entity_id_for_device("desk"), "media_player.pipewire_desk");
    }

    #[test]
    fn idle_update_has_null_app_name() {
        let update = build_state_update("desk", Vec::new());
        let value = serde_json::to_value(&update).expect("serialize");
        assert_eq!(
            value,
            json!({
                "state": "idle",
                "attributes": {
                    "friendly_name": "PipeWire Audio - desk",
                    "device_class": "speaker",
                    "supported_features": 0,
                    "app_name": null,
                    "active_streams": 0,
                    "applications": []
                }
            })
        );
    }

    #[test]
    fn playing_update_reports_first_application() {
        let update = build_state_update("desk", vec!["mpv".to_string(), "Firefox".to_string()]);
        assert_eq!(update.state, MediaPlayerState::Playing);
        assert_eq!(update.attributes.app_name.as_deref(), Some("mpv"));
        assert_eq!(update.attributes.active_streams, 2);
        assert_eq!(update.attributes.applications, vec!["mpv", "Firefox"]);
    }

    #[test]
    fn state_endpoint_strips_trailing_slash() {
        assert_eq!(
            state_endpoint("http://ha.local:8123/", "media_player.pipewire_desk"),
            "http://ha.local:8123/api/states/media_player.pipewire_desk"
        );
        assert_eq!(
            state_endpoint("http://ha.local:8123", "media_player.pipewire_desk"),
            "http://ha.local:8123/api/states/media_player.pipewire_desk"
        );
    }
}
