//! The appservice registration artifact handed to the homeserver.

use serde::{Deserialize, Serialize};

pub const BRIDGE_ID: &str = "discord-bridge";
pub const SENDER_LOCALPART: &str = "_discord_bot";
pub const USER_NAMESPACE: &str = "@_discord_.*";
pub const ALIAS_NAMESPACE: &str = "#_discord_.*";
pub const PROTOCOL: &str = "discord";

/// Identity and namespace claims of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: String,
    pub hs_token: String,
    pub as_token: String,
    pub namespaces: Namespaces,
    #[serde(default)]
    pub url: Option<String>,
    pub sender_localpart: String,
    #[serde(default)]
    pub rate_limited: bool,
    #[serde(default)]
    pub protocols: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespaces {
    #[serde(default)]
    pub users: Vec<NamespaceClaim>,
    #[serde(default)]
    pub aliases: Vec<NamespaceClaim>,
    #[serde(default)]
    pub rooms: Vec<NamespaceClaim>,
}

/// A regex-scoped ownership claim over a class of identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceClaim {
    pub regex: String,
    pub exclusive: bool,
}

impl NamespaceClaim {
    #[must_use]
    pub fn exclusive(regex: impl Into<String>) -> Self {
        Self { regex: regex.into(), exclusive: true }
    }
}

impl Registration {
    /// Builds the Discord bridge registration around a freshly minted token pair.
    #[must_use]
    pub fn discord(url: impl Into<String>, as_token: String, hs_token: String) -> Self {
        Self {
            id: BRIDGE_ID.to_owned(),
            hs_token,
            as_token,
            namespaces: Namespaces {
                users: vec![NamespaceClaim::exclusive(USER_NAMESPACE)],
                aliases: vec![NamespaceClaim::exclusive(ALIAS_NAMESPACE)],
                rooms: Vec::new(),
            },
            url: Some(url.into()),
            sender_localpart: SENDER_LOCALPART.to_owned(),
            rate_limited: false,
            protocols: vec![PROTOCOL.to_owned()],
        }
    }

    /// Full user id of the bridge bot on `domain`.
    #[must_use]
    pub fn bot_user_id(&self, domain: &str) -> String {
        user_id(&self.sender_localpart, domain)
    }
}

/// `@localpart:domain`.
#[must_use]
pub fn user_id(localpart: &str, domain: &str) -> String {
    format!("@{localpart}:{domain}")
}
