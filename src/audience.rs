use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::MarketingClient;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Where the identifiers of a customer-file audience came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomAudienceSource {
    UserProvidedOnly,
    PartnerProvidedOnly,
    BothUserAndPartnerProvided,
}

impl CustomAudienceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomAudienceSource::UserProvidedOnly => "USER_PROVIDED_ONLY",
            CustomAudienceSource::PartnerProvidedOnly => "PARTNER_PROVIDED_ONLY",
            CustomAudienceSource::BothUserAndPartnerProvided => "BOTH_USER_AND_PARTNER_PROVIDED",
        }
    }
}

#[derive(Debug, Deserialize)]
struct AudienceList {
    #[serde(default)]
    data: Vec<AudienceInfo>,
}

#[derive(Debug, Deserialize)]
struct CreatedAudience {
    id: String,
}

impl MarketingClient {
    pub async fn enumerate_custom_audiences(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<AudienceInfo>> {
        let url = self.versioned_url(&[self.account_node().as_str(), "customaudiences"])?;

        let request = self.http().get(url).query(&[
            ("fields", "id,name,description"),
            ("access_token", self.access_token()),
        ]);

        let list: AudienceList = self.execute(request, cancel).await?;
        info!(
            account_id = self.account_id(),
            count = list.data.len(),
            "Enumerated custom audiences"
        );

        Ok(list.data)
    }

    pub async fn create_custom_audience(
        &self,
        name: &str,
        description: &str,
        source: CustomAudienceSource,
        cancel: &CancellationToken,
    ) -> Result<AudienceInfo> {
        let url = self.versioned_url(&[self.account_node().as_str(), "customaudiences"])?;

        let request = self.http().post(url).form(&[
            ("name", name),
            ("subtype", "CUSTOM"),
            ("description", description),
            ("customer_file_source", source.as_str()),
            ("access_token", self.access_token()),
        ]);

        let created: CreatedAudience = self.execute(request, cancel).await?;
        info!(audience_id = %created.id, name, "Created custom audience");

        Ok(AudienceInfo {
            id: created.id,
            name: name.to_string(),
            description: description.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::{Error, ErrorKind};
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> MarketingClient {
        MarketingClient::from_config(ClientConfig::new("555", "tok").with_base_url(server.url()))
            .unwrap()
    }

    #[test]
    fn test_source_wire_names() {
        assert_eq!(CustomAudienceSource::UserProvidedOnly.as_str(), "USER_PROVIDED_ONLY");
        assert_eq!(CustomAudienceSource::PartnerProvidedOnly.as_str(), "PARTNER_PROVIDED_ONLY");
        assert_eq!(
            serde_json::to_string(&CustomAudienceSource::BothUserAndPartnerProvided).unwrap(),
            "\"BOTH_USER_AND_PARTNER_PROVIDED\""
        );
    }

    #[tokio::test]
    async fn test_enumerate_custom_audiences() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v20.0/act_555/customaudiences")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("fields".into(), "id,name,description".into()),
                Matcher::UrlEncoded("access_token".into(), "tok".into()),
            ]))
            .with_body(
                r#"{"data":[
                    {"id":"1","name":"Buyers","description":"Past buyers"},
                    {"id":"2","name":"Newsletter"}
                ]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let audiences = client_for(&server)
            .enumerate_custom_audiences(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(audiences.len(), 2);
        assert_eq!(audiences[0].name, "Buyers");
        assert_eq!(audiences[1].description, "");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_custom_audience() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v20.0/act_555/customaudiences")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("name".into(), "VIP & friends".into()),
                Matcher::UrlEncoded("subtype".into(), "CUSTOM".into()),
                Matcher::UrlEncoded("description".into(), "a=b".into()),
                Matcher::UrlEncoded("customer_file_source".into(), "USER_PROVIDED_ONLY".into()),
                Matcher::UrlEncoded("access_token".into(), "tok".into()),
            ]))
            .with_body(r#"{"id":"23853262716910525"}"#)
            .expect(1)
            .create_async()
            .await;

        let audience = client_for(&server)
            .create_custom_audience(
                "VIP & friends",
                "a=b",
                CustomAudienceSource::UserProvidedOnly,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            audience,
            AudienceInfo {
                id: "23853262716910525".to_string(),
                name: "VIP & friends".to_string(),
                description: "a=b".to_string(),
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_custom_audience_forbidden() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v20.0/act_555/customaudiences")
            .with_status(403)
            .with_body(r#"{"error":{"code":200}}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .create_custom_audience(
                "x",
                "y",
                CustomAudienceSource::PartnerProvidedOnly,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(matches!(err, Error::Status { status: 403, .. }));
    }
}
