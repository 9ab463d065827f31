use crate::error::{TransportError, TransportErrorExt};
use crate::model::RoomCreator;
use futures::FutureExt;
use futures::future::BoxFuture;
use mxd_domain::registration;
use mxd_domain::room::RoomCreationOptions;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

const CLIENT_API: &str = "/_matrix/client/v3";
const UNKNOWN_ERRCODE: &str = "M_UNKNOWN";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MatrixErrorBody {
    errcode: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateRoomResponse {
    room_id: String,
}

/// Client-server API calls made with the appservice's `as_token`.
#[derive(Debug, Clone)]
pub struct HomeserverClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    as_token: Arc<str>,
    domain: Arc<str>,
}

impl HomeserverClient {
    /// # Errors
    /// [`TransportError::Validation`] for a blank base URL, or when the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, as_token: &str, domain: &str) -> Result<Self, TransportError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(TransportError::Validation {
                message: "Homeserver URL is required".into(),
                context: None,
            });
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("mxd-appservice/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Building HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            as_token: as_token.into(),
            domain: domain.into(),
        })
    }

    #[must_use]
    pub fn user_id(&self, localpart: &str) -> String {
        registration::user_id(localpart, &self.domain)
    }

    /// Registers an appservice user.
    ///
    /// # Errors
    /// [`TransportError::Homeserver`] with the homeserver's errcode
    /// (`M_USER_IN_USE` when the user already exists), or transport failures.
    #[instrument(skip(self))]
    pub async fn register(&self, localpart: &str) -> Result<(), TransportError> {
        let response = self
            .http
            .post(self.endpoint("register"))
            .bearer_auth(&*self.as_token)
            .json(&json!({ "type": "m.login.application_service", "username": localpart }))
            .send()
            .await
            .context("Registering appservice user")?;

        checked(response).await?;
        debug!(user_id = %self.user_id(localpart), "User registered");
        Ok(())
    }

    /// # Errors
    /// Homeserver rejections and transport failures.
    #[instrument(skip(self, options), fields(alias = ?options.room_alias_name))]
    pub async fn create_room(
        &self,
        options: &RoomCreationOptions,
    ) -> Result<String, TransportError> {
        let response = self
            .http
            .post(self.endpoint("createRoom"))
            .bearer_auth(&*self.as_token)
            .json(options)
            .send()
            .await
            .context("Creating room")?;

        let created: CreateRoomResponse =
            checked(response).await?.json().await.context("Decoding createRoom response")?;
        debug!(room_id = %created.room_id, "Room created");
        Ok(created.room_id)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{CLIENT_API}/{path}", self.base_url)
    }
}

impl RoomCreator for HomeserverClient {
    fn create_room(
        &self,
        options: RoomCreationOptions,
    ) -> BoxFuture<'_, Result<String, TransportError>> {
        async move { Self::create_room(self, &options).await }.boxed()
    }
}

async fn checked(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.json::<MatrixErrorBody>().await.unwrap_or_default();
    Err(TransportError::Homeserver {
        status: status.as_u16(),
        errcode: body.errcode.unwrap_or_else(|| UNKNOWN_ERRCODE.to_owned()).into(),
        message: body.error.unwrap_or_else(|| status.to_string()).into(),
        context: None,
    })
}
