//! reqwest-backed transport for the preview controller.

use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::{Client, RequestBuilder, Url};

use crate::application::controller::{PreviewReply, PreviewTransport, TransportError};
use crate::domain::preview::{PreviewBootstrap, PreviewCall, RESULT_HEADER, ResultKind};

use super::error::InfraError;
use super::http::BOOTSTRAP_PATH;

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(server: &str, api_key: Option<String>) -> Result<Self, InfraError> {
        let base = Url::parse(server)?.join("/")?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self {
            client,
            endpoint: base.clone(),
            base,
            api_key,
        })
    }

    /// Build a transport and fetch the bootstrap values the server hands to
    /// clients. The render endpoint is taken from the bootstrap payload.
    pub async fn connect(
        server: &str,
        api_key: Option<String>,
    ) -> Result<(Self, PreviewBootstrap), InfraError> {
        let mut transport = Self::new(server, api_key)?;
        let bootstrap = transport.bootstrap().await?;
        transport.endpoint = transport.base.join(&bootstrap.ajax_url)?;
        Ok((transport, bootstrap))
    }

    pub fn user_agent() -> &'static str {
        concat!("toric/", env!("CARGO_PKG_VERSION"))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn bootstrap(&self) -> Result<PreviewBootstrap, InfraError> {
        let url = self.base.join(BOOTSTRAP_PATH)?;
        let response = self.authorize(self.client.get(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InfraError::http(format!(
                "bootstrap failed with status {status}: {}",
                error_message(&body)
            )));
        }
        Ok(response.json().await?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl PreviewTransport for HttpTransport {
    async fn send(&self, call: PreviewCall) -> Result<PreviewReply, TransportError> {
        let response = self
            .authorize(self.client.post(self.endpoint.clone()))
            .form(&call)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let kind = response
            .headers()
            .get(RESULT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<ResultKind>().ok());
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Status {
                status,
                message: error_message(&body),
            });
        }

        match kind {
            Some(ResultKind::Empty) => Ok(PreviewReply::Empty(body)),
            Some(ResultKind::Markup) | None => Ok(PreviewReply::Markup(body)),
            Some(ResultKind::Error) => Err(TransportError::Status {
                status,
                message: error_message(&body),
            }),
        }
    }
}

/// Error bodies are JSON string literals; anything else is passed through.
fn error_message(body: &str) -> String {
    serde_json::from_str::<String>(body).unwrap_or_else(|_| body.trim().to_string())
}
