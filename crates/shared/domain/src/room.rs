use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Link between a Matrix room and a remote (Discord) channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEntry {
    pub matrix_id: String,
    pub remote_id: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// Parameters for a homeserver `createRoom` call issued in answer to an alias query.
///
/// Fields the bridge does not model are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomCreationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_alias_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initial_state: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Localpart of a room alias: `#_discord_123:example.org` -> `_discord_123`.
#[must_use]
pub fn alias_localpart(alias: &str) -> &str {
    let trimmed = alias.strip_prefix('#').unwrap_or(alias);
    trimmed.split_once(':').map_or(trimmed, |(local, _)| local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_localpart_strips_sigil_and_server() {
        assert_eq!(alias_localpart("#_discord_1_2:example.org"), "_discord_1_2");
        assert_eq!(alias_localpart("_discord_1"), "_discord_1");
    }

    #[test]
    fn creation_options_skip_empty_fields() {
        let opts = RoomCreationOptions { name: Some("general".to_owned()), ..Default::default() };
        let json = serde_json::to_value(&opts).expect("serialize");
        assert_eq!(json, serde_json::json!({ "name": "general" }));
    }
}
