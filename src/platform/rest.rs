use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Method, Response, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use super::{
    ChatPlatform,
    error::{PlatformError, PlatformResult},
    models::{
        ChatMessage, HistoryQuery, InteractionHandle, InteractionReply, Member, OutgoingMessage,
        Snowflake,
    },
};

/// Default REST endpoint (API v10).
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
/// Upper bound for any single REST call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Command type code for message context-menu commands.
const MESSAGE_COMMAND_TYPE: u8 = 3;

/// Runtime configuration describing how to reach the Discord REST API.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the REST API.
    pub api_base: String,
    /// Bot token.
    pub token: String,
    /// Application the commands are registered under.
    pub application_id: Snowflake,
}

impl RestConfig {
    /// Construct a configuration against the public API.
    pub fn new(token: impl Into<String>, application_id: Snowflake) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            application_id,
        }
    }
}

/// Error body returned by the REST API on failure.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<u64>,
    #[serde(default)]
    retry_after: Option<f64>,
}

#[derive(Debug, Serialize)]
struct InteractionCallback<'a> {
    #[serde(rename = "type")]
    kind: u8,
    data: &'a OutgoingMessage,
}

/// [`ChatPlatform`] implementation backed by the Discord HTTP API.
#[derive(Clone)]
pub struct DiscordRest {
    client: Client,
    base_url: Arc<Url>,
    authorization: Arc<str>,
    application_id: Snowflake,
}

impl DiscordRest {
    /// Build the HTTP client; no request is issued until the first call.
    pub fn new(config: RestConfig) -> PlatformResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("DiscordBot (gatehouse-bot, ", env!("CARGO_PKG_VERSION"), ")"))
            .build()
            .map_err(|source| PlatformError::ClientBuilder { source })?;

        let base_url = Url::parse(config.api_base.trim_end_matches('/')).map_err(|_| {
            PlatformError::InvalidApiBase {
                url: config.api_base.clone(),
            }
        })?;

        Ok(Self {
            client,
            base_url: Arc::new(base_url),
            authorization: Arc::<str>::from(format!("Bot {}", config.token)),
            application_id: config.application_id,
        })
    }

    /// Build a URL from path segments, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = Url::clone(&self.base_url);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(segments))
            .header(reqwest::header::AUTHORIZATION, self.authorization.as_ref())
    }

    async fn send(
        operation: &'static str,
        builder: reqwest::RequestBuilder,
    ) -> PlatformResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|source| PlatformError::Request { operation, source })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<ApiErrorBody>(&body).unwrap_or_default();
        Err(PlatformError::from_status(
            operation,
            status,
            parsed.code,
            parsed.retry_after,
            body,
        ))
    }

    async fn send_json<T>(
        operation: &'static str,
        builder: reqwest::RequestBuilder,
    ) -> PlatformResult<T>
    where
        T: DeserializeOwned,
    {
        Self::send(operation, builder)
            .await?
            .json::<T>()
            .await
            .map_err(|source| PlatformError::Decode { operation, source })
    }
}

impl ChatPlatform for DiscordRest {
    fn send_message(
        &self,
        channel: Snowflake,
        message: OutgoingMessage,
    ) -> BoxFuture<'static, PlatformResult<ChatMessage>> {
        let rest = self.clone();
        Box::pin(async move {
            let channel = channel.to_string();
            let builder = rest
                .request(Method::POST, &["channels", &channel, "messages"])
                .json(&message);
            Self::send_json("send_message", builder).await
        })
    }

    fn add_reaction(
        &self,
        channel: Snowflake,
        message: Snowflake,
        emoji: String,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let rest = self.clone();
        Box::pin(async move {
            let (channel, message) = (channel.to_string(), message.to_string());
            let builder = rest.request(
                Method::PUT,
                &["channels", &channel, "messages", &message, "reactions", &emoji, "@me"],
            );
            Self::send("add_reaction", builder).await.map(drop)
        })
    }

    fn delete_message(
        &self,
        channel: Snowflake,
        message: Snowflake,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let rest = self.clone();
        Box::pin(async move {
            let (channel, message) = (channel.to_string(), message.to_string());
            let builder = rest.request(Method::DELETE, &["channels", &channel, "messages", &message]);
            Self::send("delete_message", builder).await.map(drop)
        })
    }

    fn fetch_messages(
        &self,
        channel: Snowflake,
        query: HistoryQuery,
    ) -> BoxFuture<'static, PlatformResult<Vec<ChatMessage>>> {
        let rest = self.clone();
        Box::pin(async move {
            let channel = channel.to_string();
            let mut params = vec![("limit", query.limit.clamp(1, 100).to_string())];
            if let Some(before) = query.before {
                params.push(("before", before.to_string()));
            }
            let builder = rest
                .request(Method::GET, &["channels", &channel, "messages"])
                .query(&params);
            Self::send_json("fetch_messages", builder).await
        })
    }

    fn fetch_member(
        &self,
        guild: Snowflake,
        user: Snowflake,
    ) -> BoxFuture<'static, PlatformResult<Member>> {
        let rest = self.clone();
        Box::pin(async move {
            let (guild, user) = (guild.to_string(), user.to_string());
            let builder = rest.request(Method::GET, &["guilds", &guild, "members", &user]);
            Self::send_json("fetch_member", builder).await
        })
    }

    fn grant_role(
        &self,
        guild: Snowflake,
        user: Snowflake,
        role: Snowflake,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let rest = self.clone();
        Box::pin(async move {
            let (guild, user, role) = (guild.to_string(), user.to_string(), role.to_string());
            let builder = rest.request(
                Method::PUT,
                &["guilds", &guild, "members", &user, "roles", &role],
            );
            Self::send("grant_role", builder).await.map(drop)
        })
    }

    fn timeout_member(
        &self,
        guild: Snowflake,
        user: Snowflake,
        duration: Duration,
        reason: String,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let rest = self.clone();
        Box::pin(async move {
            let until = (OffsetDateTime::now_utc() + duration)
                .format(&Rfc3339)
                .unwrap_or_default();
            let (guild, user) = (guild.to_string(), user.to_string());
            let builder = rest
                .request(Method::PATCH, &["guilds", &guild, "members", &user])
                .header("X-Audit-Log-Reason", encode_audit_reason(&reason))
                .json(&json!({ "communication_disabled_until": until }));
            Self::send("timeout_member", builder).await.map(drop)
        })
    }

    fn respond_to_interaction(
        &self,
        interaction: InteractionHandle,
        reply: InteractionReply,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let rest = self.clone();
        Box::pin(async move {
            let id = interaction.id.to_string();
            let body = InteractionCallback {
                kind: reply.kind as u8,
                data: &reply.message,
            };
            let builder = rest
                .request(
                    Method::POST,
                    &["interactions", &id, &interaction.token, "callback"],
                )
                .json(&body);
            Self::send("respond_to_interaction", builder).await.map(drop)
        })
    }

    fn register_message_command(
        &self,
        guild: Snowflake,
        name: String,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let rest = self.clone();
        Box::pin(async move {
            let (application, guild) = (rest.application_id.to_string(), guild.to_string());
            let builder = rest
                .request(
                    Method::POST,
                    &["applications", &application, "guilds", &guild, "commands"],
                )
                .json(&json!({ "name": name, "type": MESSAGE_COMMAND_TYPE }));
            Self::send("register_message_command", builder).await.map(drop)
        })
    }
}

/// Audit log reasons travel in a header and must be percent-encoded.
fn encode_audit_reason(reason: &str) -> String {
    let mut encoded = String::with_capacity(reason.len());
    for byte in reason.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}
