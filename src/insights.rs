use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::MarketingClient;
use crate::error::Result;
use crate::serde_util::{lenient_f64, lenient_u64};

/// Aggregated metrics of one insights report row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Insights {
    pub spend: f64,
    pub impressions: u64,
    pub reach: u64,
    pub outbound_clicks: u64,
    pub link_click: u64,
    pub leads_count: u64,
    pub conversions_count: u64,
    pub post_reaction: u64,
}

#[derive(Debug, Deserialize)]
struct InsightsResponse {
    #[serde(default)]
    data: Vec<InsightsRow>,
}

#[derive(Debug, Default, Deserialize)]
struct InsightsRow {
    #[serde(default, deserialize_with = "lenient_f64")]
    spend: f64,
    #[serde(default, deserialize_with = "lenient_u64")]
    impressions: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    reach: u64,
    #[serde(default)]
    actions: Vec<ActionValue>,
    #[serde(default)]
    outbound_clicks: Vec<ActionValue>,
}

#[derive(Debug, Deserialize)]
struct ActionValue {
    action_type: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    value: u64,
}

impl Insights {
    fn from_row(row: &InsightsRow) -> Self {
        let mut insights = Insights {
            spend: row.spend,
            impressions: row.impressions,
            reach: row.reach,
            ..Default::default()
        };

        for action in &row.actions {
            match action.action_type.as_str() {
                "link_click" => insights.link_click = action.value,
                "lead" => insights.leads_count = action.value,
                "post_reaction" => insights.post_reaction = action.value,
                other
                    if other.contains("onsite_conversion")
                        || other.contains("offsite_conversion") =>
                {
                    insights.conversions_count += action.value
                }
                _ => {}
            }
        }

        for click in &row.outbound_clicks {
            if click.action_type == "outbound_click" {
                insights.outbound_clicks = click.value;
            }
        }

        insights
    }
}

/// Renders a date the way the insights `time_range` expects it: `{year}-{month}-{day}`, unpadded.
pub fn graph_date(date: NaiveDate) -> String {
    format!("{}-{}-{}", date.year(), date.month(), date.day())
}

fn insights_from_response(response: InsightsResponse) -> Insights {
    response
        .data
        .first()
        .map(Insights::from_row)
        .unwrap_or_default()
}

impl MarketingClient {
    /// Retrieves insights for `object_id` (an account, campaign, ad set or ad)
    /// between `since` and `until`, projected from the first report row.
    pub async fn retrieve_insights(
        &self,
        since: NaiveDate,
        until: NaiveDate,
        object_id: &str,
        fields: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Insights> {
        let url = self.versioned_url(&[object_id, "insights"])?;

        let mut query = vec![
            ("access_token", self.access_token().to_string()),
            ("time_range[since]", graph_date(since)),
            ("time_range[until]", graph_date(until)),
        ];
        if !fields.is_empty() {
            query.push(("fields", fields.join(",")));
        }

        let response: InsightsResponse = self
            .execute(self.http().get(url).query(&query), cancel)
            .await?;
        let insights = insights_from_response(response);

        info!(
            object_id,
            spend = insights.spend,
            impressions = insights.impressions,
            "Retrieved insights"
        );

        Ok(insights)
    }
}
