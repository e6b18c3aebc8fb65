use serde::Serialize;
use tend_core::{CalorieEntry, CollectionItem, PasswordAccount, WorkoutActivity};

use crate::commands::common::{finish, Context};
use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub collection: &'static str,
    pub records: usize,
    pub pending: usize,
    pub pending_deletes: usize,
}

impl SyncReport {
    pub fn render(&self) -> String {
        let mut line = format!("{:<9} {} records", self.collection, self.records);
        if self.pending > 0 {
            line.push_str(&format!(", {} waiting to upload", self.pending));
        }
        if self.pending_deletes > 0 {
            line.push_str(&format!(", {} deletes to retry", self.pending_deletes));
        }
        line
    }

    pub const fn is_clean(&self) -> bool {
        self.pending == 0 && self.pending_deletes == 0
    }
}

async fn sync_collection<T: CollectionItem>(context: &Context) -> Result<SyncReport, CliError> {
    // Opening the engine runs the push and pull pass.
    let engine = context.engine::<T>().await?;
    finish(&engine).await;

    Ok(SyncReport {
        collection: T::LABEL,
        records: engine.records().len(),
        pending: engine.pending_count(),
        pending_deletes: engine.pending_deletes().len(),
    })
}

pub async fn collect_reports(context: &Context) -> Result<Vec<SyncReport>, CliError> {
    Ok(vec![
        sync_collection::<CalorieEntry>(context).await?,
        sync_collection::<WorkoutActivity>(context).await?,
        sync_collection::<PasswordAccount>(context).await?,
    ])
}

pub async fn run_sync(context: &Context) -> Result<(), CliError> {
    if !context.config().is_remote_configured() {
        return Err(CliError::SyncNotConfigured);
    }

    let reports = collect_reports(context).await?;
    for report in &reports {
        println!("{}", report.render());
    }

    if reports.iter().all(SyncReport::is_clean) {
        println!("Sync complete.");
    } else {
        println!("Server unreachable for some changes; they stay queued locally.");
    }
    Ok(())
}
