use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::MarketingClient;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    #[serde(rename = "access_token")]
    pub token: String,
    /// Seconds until expiry. Absent for tokens that never expire.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl MarketingClient {
    /// Exchanges the client's current token for a long-lived one.
    ///
    /// The client keeps using its old token; call
    /// [`set_access_token`](MarketingClient::set_access_token) to switch.
    pub async fn refresh_access_token(
        &self,
        app_id: &str,
        app_secret: &str,
        cancel: &CancellationToken,
    ) -> Result<AccessToken> {
        let url = self.root_url(&["oauth", "access_token"])?;

        let request = self.http().get(url).query(&[
            ("client_id", app_id),
            ("client_secret", app_secret),
            ("grant_type", "fb_exchange_token"),
            ("fb_exchange_token", self.access_token()),
        ]);

        let token: AccessToken = self.execute(request, cancel).await?;
        info!(expires_in = ?token.expires_in, "Exchanged access token");

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::Error;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_refresh_access_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/oauth/access_token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("client_id".into(), "app".into()),
                Matcher::UrlEncoded("client_secret".into(), "s&cret=1".into()),
                Matcher::UrlEncoded("grant_type".into(), "fb_exchange_token".into()),
                Matcher::UrlEncoded("fb_exchange_token".into(), "short".into()),
            ]))
            .with_body(r#"{"access_token":"long","token_type":"bearer","expires_in":5183944}"#)
            .expect(1)
            .create_async()
            .await;

        let client = MarketingClient::from_config(
            ClientConfig::new("1", "short").with_base_url(server.url()),
        )
        .unwrap();

        let token = client
            .refresh_access_token("app", "s&cret=1", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(token.token, "long");
        assert_eq!(token.expires_in, Some(5183944));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_access_token_rejected() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/oauth/access_token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"message":"Invalid OAuth access token."}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = MarketingClient::from_config(
            ClientConfig::new("1", "short").with_base_url(server.url()),
        )
        .unwrap();

        let result = client
            .refresh_access_token("app", "secret", &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(Error::Status { status: 400, .. })));
        mock.assert_async().await;
    }

    #[test]
    fn test_access_token_without_expiry() {
        let token: AccessToken = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(token.expires_in, None);
    }
}
