// Example usage of the meta_marketing library.
// This is not meant to be run as-is: it needs network access and real
// credentials in META_ACCOUNT_ID / META_ACCESS_TOKEN. It demonstrates the API.

use anyhow::Result;
use chrono::NaiveDate;
use meta_marketing::*;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let client = MarketingClient::from_config(ClientConfig::from_env()?)?;
    let cancel = CancellationToken::new();

    // Example 1: Account insights for January
    let insights = client
        .retrieve_insights(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            &format!("act_{}", client.account_id()),
            &["spend", "impressions", "reach", "actions", "outbound_clicks"],
            &cancel,
        )
        .await?;
    println!("Spent {:.2} for {} impressions", insights.spend, insights.impressions);

    // Example 2: Create an audience and fill it
    let audience = client
        .create_custom_audience(
            "Newsletter subscribers",
            "Imported from the mailing list",
            CustomAudienceSource::UserProvidedOnly,
            &cancel,
        )
        .await?;

    let users = vec![
        UserRecord::new().with_email("first@example.com"),
        UserRecord::new().with_email("second@example.com"),
    ];
    let report = client
        .add_users_to_custom_audience(&audience.id, &users, &cancel)
        .await?;
    println!("{} of {} users received", report.total_received(), report.total_records);

    // Example 3: List audiences
    for audience in client.enumerate_custom_audiences(&cancel).await? {
        println!("Audience: {} ({})", audience.name, audience.id);
    }

    Ok(())
}
