use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use meta_marketing::config::{DEFAULT_API_VERSION, DEFAULT_GRAPH_URL};
use meta_marketing::{
    ClientConfig, CustomAudienceSource, DEFAULT_LEAD_COLUMNS, MarketingClient, read_users_from_csv,
    write_audiences_to_csv, write_leads_to_csv,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, env = "META_ACCOUNT_ID", default_value = "")]
    account_id: String,

    #[arg(long, env = "META_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    #[arg(long, env = "META_API_VERSION", default_value = DEFAULT_API_VERSION)]
    api_version: String,

    #[arg(long, env = "META_GRAPH_URL", default_value = DEFAULT_GRAPH_URL)]
    graph_url: String,

    #[arg(long, env = "META_TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Exchange the access token for a long-lived one
    RefreshToken {
        #[arg(long, env = "META_APP_ID")]
        app_id: String,
        #[arg(long, env = "META_APP_SECRET", hide_env_values = true)]
        app_secret: String,
    },
    /// Print insights for an ad object over a date range
    Insights {
        #[arg(long)]
        object: String,
        #[arg(long)]
        since: NaiveDate,
        #[arg(long)]
        until: NaiveDate,
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "spend,impressions,reach,actions,outbound_clicks"
        )]
        fields: Vec<String>,
    },
    /// List the account's custom audiences
    Audiences {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Create a customer-file custom audience
    CreateAudience {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_enum, default_value_t = Source::User)]
        source: Source,
    },
    /// Upload users from a CSV file (first_name,last_name,email) to an audience
    Upload {
        #[arg(long)]
        audience: String,
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Export all leads of a lead form to CSV
    Leads {
        #[arg(long)]
        form: String,
        #[arg(long, env = "META_PAGE_ACCESS_TOKEN", hide_env_values = true)]
        page_token: String,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    User,
    Partner,
    Both,
}

impl From<Source> for CustomAudienceSource {
    fn from(source: Source) -> Self {
        match source {
            Source::User => CustomAudienceSource::UserProvidedOnly,
            Source::Partner => CustomAudienceSource::PartnerProvidedOnly,
            Source::Both => CustomAudienceSource::BothUserAndPartnerProvided,
        }
    }
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ClientConfig::new(cli.account_id, cli.access_token)
        .with_base_url(cli.graph_url)
        .with_api_version(cli.api_version)
        .with_timeout(Duration::from_secs(cli.timeout_secs));
    let client = MarketingClient::from_config(config).context("failed to build client")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling");
            on_signal.cancel();
        }
    });

    match cli.command {
        Command::RefreshToken { app_id, app_secret } => {
            let token = client.refresh_access_token(&app_id, &app_secret, &cancel).await?;
            println!("{}", token.token);
            match token.expires_in {
                Some(secs) => eprintln!("Expires in {} days", secs / 86_400),
                None => eprintln!("Token does not expire"),
            }
        }
        Command::Insights { object, since, until, fields } => {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            let insights = client
                .retrieve_insights(since, until, &object, &fields, &cancel)
                .await?;
            println!("{}", serde_json::to_string_pretty(&insights)?);
        }
        Command::Audiences { output } => {
            require_account(&client)?;
            let audiences = client.enumerate_custom_audiences(&cancel).await?;

            match output {
                Some(path) => {
                    write_audiences_to_csv(&audiences, &path)?;
                    println!("You can see the output in: {}", path.display());
                }
                None if audiences.is_empty() => println!("No custom audiences on this account"),
                None => {
                    for audience in audiences {
                        println!("{}\t{}\t{}", audience.id, audience.name, audience.description);
                    }
                }
            }
        }
        Command::CreateAudience { name, description, source } => {
            require_account(&client)?;
            let audience = client
                .create_custom_audience(&name, &description, source.into(), &cancel)
                .await?;
            println!("Created audience {} ({})", audience.id, audience.name);
        }
        Command::Upload { audience, input } => {
            let users = read_users_from_csv(&input)
                .with_context(|| format!("failed to read users from {}", input.display()))?;
            println!("{} users found", users.len());

            let pb = spinner("Uploading hashed users")?;
            let result = client
                .add_users_to_custom_audience(&audience, &users, &cancel)
                .await;
            pb.finish_and_clear();

            let report = result?;
            println!(
                "Uploaded in {} request(s): {} received, {} invalid",
                report.chunks.len(),
                report.total_received(),
                report.total_invalid()
            );
            if !report.is_fully_accepted() {
                println!("Some records were not accepted; see the log for the affected chunks");
            }
        }
        Command::Leads { form, page_token, output } => {
            let pb = spinner("Retrieving leads")?;
            let result = client
                .retrieve_lead_form_leads(&form, &page_token, &cancel)
                .await;
            pb.finish_and_clear();

            let leads = result?;
            if leads.is_empty() {
                println!("Sorry, this form has no leads");
            } else {
                write_leads_to_csv(&leads, &DEFAULT_LEAD_COLUMNS, &output)?;
                println!("{} leads written to: {}", leads.len(), output.display());
            }
        }
    }

    Ok(())
}

fn require_account(client: &MarketingClient) -> Result<()> {
    if client.account_id().is_empty() {
        anyhow::bail!("--account-id (or META_ACCOUNT_ID) is required for this command");
    }
    Ok(())
}
