use serde::Serialize;
use tend_core::util::normalize_text_option;
use tend_core::{Record, WorkoutActivity, WorkoutPatch};

use crate::commands::common::{
    finish, on_date, parse_date, pending_marker, resolve_record_id, short_id, Context,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct WorkoutListItem {
    pub id: String,
    pub date: String,
    pub name: String,
    pub duration: u32,
    pub calories: u32,
    pub synced: bool,
}

impl From<&Record<WorkoutActivity>> for WorkoutListItem {
    fn from(record: &Record<WorkoutActivity>) -> Self {
        Self {
            id: record.id.to_string(),
            date: record.date.to_string(),
            name: record.fields.name.clone(),
            duration: record.fields.duration,
            calories: record.fields.calories,
            synced: record.synced,
        }
    }
}

pub fn format_workout_line(record: &Record<WorkoutActivity>) -> String {
    format!(
        "{}  {}  {:>3} min  {:>5} kcal  {}{}",
        short_id(&record.id),
        record.date,
        record.fields.duration,
        record.fields.calories,
        record.fields.name,
        pending_marker(record.synced)
    )
}

pub async fn run_add(
    context: &Context,
    name: &str,
    duration: u32,
    calories: u32,
    date: Option<&str>,
) -> Result<(), CliError> {
    let date = parse_date(date)?;
    let engine = context.engine::<WorkoutActivity>().await?;
    let record = engine.add(WorkoutActivity::new(name.trim(), duration, calories), date)?;
    finish(&engine).await;

    println!(
        "Logged {}: {} for {} min",
        short_id(&record.id),
        record.fields.name,
        record.fields.duration
    );
    Ok(())
}

pub async fn run_list(
    context: &Context,
    date: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let date = parse_date(date)?;
    let engine = context.engine::<WorkoutActivity>().await?;
    let records = on_date(&engine.records(), date);
    finish(&engine).await;

    if as_json {
        let items = records
            .iter()
            .map(WorkoutListItem::from)
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if records.is_empty() {
        println!("No workouts");
    } else {
        for record in &records {
            println!("{}", format_workout_line(record));
        }
    }
    Ok(())
}

pub async fn run_update(
    context: &Context,
    id: &str,
    patch: WorkoutPatch,
) -> Result<(), CliError> {
    let patch = WorkoutPatch {
        name: normalize_text_option(patch.name),
        ..patch
    };
    if patch == WorkoutPatch::default() {
        return Err(CliError::EmptyPatch);
    }

    let engine = context.engine::<WorkoutActivity>().await?;
    let id = resolve_record_id(&engine.records(), id)?;
    let record = engine.update(&id, patch)?;
    finish(&engine).await;

    println!("Updated {}", format_workout_line(&record));
    Ok(())
}

pub async fn run_delete(context: &Context, id: &str) -> Result<(), CliError> {
    let engine = context.engine::<WorkoutActivity>().await?;
    let id = resolve_record_id(&engine.records(), id)?;
    engine.delete(&id)?;
    finish(&engine).await;

    println!("Deleted {}", short_id(&id));
    Ok(())
}
