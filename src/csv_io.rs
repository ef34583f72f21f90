use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, Trim, Writer};

use crate::audience::AudienceInfo;
use crate::error::Result;
use crate::leads::Lead;
use crate::upload::UserRecord;

/// Reads user records from a CSV file with `first_name`, `last_name` and
/// `email` columns. Any of the columns may be missing; empty cells are absent.
pub fn read_users_from_csv(path: impl AsRef<Path>) -> Result<Vec<UserRecord>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(path)?;

    let mut users = Vec::new();
    for record in reader.deserialize() {
        let user: UserRecord = record?;
        users.push(UserRecord {
            first_name: user.first_name.filter(|v| !v.is_empty()),
            last_name: user.last_name.filter(|v| !v.is_empty()),
            email: user.email.filter(|v| !v.is_empty()),
        });
    }

    Ok(users)
}

/// Writes one row per lead with the given columns, first value per field.
pub fn write_leads_to_csv(leads: &[Lead], columns: &[&str], path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path)?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record(columns)?;
    for lead in leads {
        wtr.write_record(columns.iter().map(|column| lead.value(column).unwrap_or_default()))?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_audiences_to_csv(audiences: &[AudienceInfo], path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path)?;
    let mut wtr = Writer::from_writer(file);

    for audience in audiences {
        wtr.serialize(audience)?;
    }

    wtr.flush()?;
    Ok(())
}
