//! Client for Meta's Marketing Graph API.
//!
//! Every operation lives on [`MarketingClient`] and takes a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) that is checked at
//! each network call. Nothing is retried; callers bring their own resilience
//! policy.
//!
//! ```no_run
//! use meta_marketing::{MarketingClient, UserRecord};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> meta_marketing::Result<()> {
//! let client = MarketingClient::new("1234567890", "access-token")?;
//! let users = vec![UserRecord::new().with_email("someone@example.com")];
//! let report = client
//!     .add_users_to_custom_audience("23853262716910525", &users, &CancellationToken::new())
//!     .await?;
//! println!("{} received", report.total_received());
//! # Ok(())
//! # }
//! ```

pub mod audience;
pub mod client;
pub mod config;
pub mod csv_io;
pub mod error;
pub mod insights;
pub mod leads;
mod serde_util;
pub mod token;
pub mod upload;

pub use audience::{AudienceInfo, CustomAudienceSource};
pub use client::MarketingClient;
pub use config::ClientConfig;
pub use csv_io::{read_users_from_csv, write_audiences_to_csv, write_leads_to_csv};
pub use error::{Error, ErrorKind, Result};
pub use insights::{Insights, graph_date};
pub use leads::{DEFAULT_LEAD_COLUMNS, Lead, LeadField};
pub use token::AccessToken;
pub use upload::{
    AudienceBatchUploader, MAX_USERS_PER_BATCH, Schema, SchemaField, UploadAcknowledgment,
    UploadReport, UserRecord, sha256_hex,
};
