use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::client::MarketingClient;
use crate::error::{Error, Result};

/// Column order used when exporting leads of a standard contact form.
pub const DEFAULT_LEAD_COLUMNS: [&str; 6] = [
    "full_name",
    "phone_number",
    "email",
    "company_name",
    "job_title",
    "submitted_at",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub field_data: Vec<LeadField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadField {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl Lead {
    /// First submitted value of the form field `name`.
    ///
    /// `submitted_at` falls back to the lead's `created_time` when the form has
    /// no field of that name.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.field_data
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.values.first())
            .map(String::as_str)
            .or_else(|| match name {
                "submitted_at" => self.created_time.as_deref(),
                _ => None,
            })
    }

    /// Every form field mapped to its first value.
    pub fn fields(&self) -> BTreeMap<&str, &str> {
        self.field_data
            .iter()
            .filter_map(|f| f.values.first().map(|v| (f.name.as_str(), v.as_str())))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct LeadsPage {
    #[serde(default)]
    data: Vec<Lead>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<String>,
}

impl LeadsPage {
    fn next_url(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_deref())
            .filter(|next| !next.is_empty())
    }
}

/// `paging.next` comes from the response body; a malformed one is a decode error.
fn parse_next_page(next: &str) -> Result<Url> {
    Url::parse(next).map_err(|e| {
        Error::Decode(serde::de::Error::custom(format!(
            "invalid paging.next url {next:?}: {e}"
        )))
    })
}

impl MarketingClient {
    /// Retrieves every lead submitted to `lead_form_id`, following `paging.next`
    /// until the last page.
    ///
    /// Lead forms belong to pages, so this takes a page access token rather than
    /// the client's user token.
    pub async fn retrieve_lead_form_leads(
        &self,
        lead_form_id: &str,
        page_access_token: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Lead>> {
        let url = self.versioned_url(&[lead_form_id, "leads"])?;
        let request = self
            .http()
            .get(url)
            .query(&[("access_token", page_access_token)]);

        let mut page: LeadsPage = self.execute(request, cancel).await?;
        let mut leads = Vec::new();
        let mut pages = 1;

        loop {
            let next = page.next_url().map(parse_next_page).transpose()?;
            leads.append(&mut page.data);

            let Some(next) = next else { break };

            debug!(lead_form_id, page = pages + 1, "Following leads pagination");
            page = self.execute(self.http().get(next), cancel).await?;
            pages += 1;
        }

        info!(lead_form_id, leads = leads.len(), pages, "Retrieved lead form leads");

        Ok(leads)
    }
}
