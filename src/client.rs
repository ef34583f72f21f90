use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Client for one ad account on the Marketing Graph API.
///
/// Cloning is cheap: clones share the underlying connection pool, so distinct
/// operations may run concurrently from clones of the same client.
#[derive(Debug, Clone)]
pub struct MarketingClient {
    http: Client,
    base_url: Url,
    api_version: String,
    account_id: String,
    access_token: String,
}

impl MarketingClient {
    pub fn new(account_id: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        Self::from_config(ClientConfig::new(account_id, access_token))
    }

    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Self::with_http_client(config, http)
    }

    /// Builds a client on top of a caller-owned `reqwest::Client`.
    ///
    /// The config's `timeout` is ignored here; it belongs to `http`.
    pub fn with_http_client(config: ClientConfig, http: Client) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl(config.base_url));
        }

        Ok(Self {
            http,
            base_url,
            api_version: config.api_version,
            account_id: config.account_id,
            access_token: config.access_token,
        })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Replaces the token used for subsequent calls, e.g. after
    /// [`refresh_access_token`](Self::refresh_access_token).
    pub fn set_access_token(&mut self, access_token: impl Into<String>) {
        self.access_token = access_token.into();
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// `{base}/{api_version}/{segments...}`, each segment percent-encoded.
    pub(crate) fn versioned_url(&self, segments: &[&str]) -> Result<Url> {
        let mut all = Vec::with_capacity(segments.len() + 1);
        all.push(self.api_version.as_str());
        all.extend_from_slice(segments);
        self.root_url(&all)
    }

    /// `{base}/{segments...}` without the API version.
    pub(crate) fn root_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn account_node(&self) -> String {
        format!("act_{}", self.account_id)
    }

    /// Sends `request`, requires a success status and decodes the body as `T`.
    ///
    /// Cancellation is observed before the request leaves and while it is in
    /// flight. Nothing is retried.
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<T> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let request = request.build()?;
        debug!(
            method = %request.method(),
            path = request.url().path(),
            "Sending Graph API request"
        );

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.http.execute(request) => response?,
        };

        let status = response.status();
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            body = response.text() => body?,
        };

        if !status.is_success() {
            debug!(status = status.as_u16(), "Graph API request rejected");
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn client_for(base_url: &str) -> MarketingClient {
        MarketingClient::from_config(ClientConfig::new("1234", "token").with_base_url(base_url))
            .unwrap()
    }

    #[test]
    fn test_versioned_url() {
        let client = client_for("https://graph.facebook.com");
        let url = client.versioned_url(&["act_1234", "customaudiences"]).unwrap();
        assert_eq!(url.as_str(), "https://graph.facebook.com/v20.0/act_1234/customaudiences");
    }

    #[test]
    fn test_root_url_skips_version() {
        let client = client_for("https://graph.facebook.com/");
        let url = client.root_url(&["oauth", "access_token"]).unwrap();
        assert_eq!(url.as_str(), "https://graph.facebook.com/oauth/access_token");
    }

    #[test]
    fn test_path_segments_are_encoded() {
        let client = client_for("https://graph.facebook.com");
        let url = client.versioned_url(&["a/b?c", "users"]).unwrap();
        assert_eq!(url.path(), "/v20.0/a%2Fb%3Fc/users");
    }

    #[test]
    fn test_rejects_cannot_be_a_base() {
        let result = MarketingClient::from_config(
            ClientConfig::new("1", "t").with_base_url("mailto:ads@example.com"),
        );
        assert!(matches!(result, Err(Error::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_set_access_token() {
        let mut client = client_for("https://graph.facebook.com");
        client.set_access_token("fresh");
        assert_eq!(client.access_token(), "fresh");
        assert_eq!(client.account_node(), "act_1234");
    }

    #[derive(Debug, Deserialize)]
    struct Echo {
        ok: bool,
    }

    #[tokio::test]
    async fn test_execute_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v20.0/me")
            .with_status(500)
            .with_body(r#"{"error":{"message":"boom"}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let url = client.versioned_url(&["me"]).unwrap();
        let result: Result<Echo> = client
            .execute(client.http().get(url), &CancellationToken::new())
            .await;

        match result {
            Err(Error::Status { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_execute_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v20.0/me")
            .with_status(200)
            .with_body(r#"{"unexpected":1}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let url = client.versioned_url(&["me"]).unwrap();
        let result: Result<Echo> = client
            .execute(client.http().get(url), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_execute_cancelled_before_send() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v20.0/me")
            .with_body(r#"{"ok":true}"#)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let url = client.versioned_url(&["me"]).unwrap();
        let result: Result<Echo> = client.execute(client.http().get(url), &cancel).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_execute_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v20.0/me")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let url = client.versioned_url(&["me"]).unwrap();
        let echo: Echo = client
            .execute(client.http().get(url), &CancellationToken::new())
            .await
            .unwrap();
        assert!(echo.ok);
    }
}
