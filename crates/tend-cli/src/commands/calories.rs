use serde::Serialize;
use tend_core::util::normalize_text_option;
use tend_core::{CalorieEntry, CaloriePatch, Record};

use crate::commands::common::{
    finish, on_date, parse_date, pending_marker, resolve_record_id, short_id, Context,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct CalorieListItem {
    pub id: String,
    pub date: String,
    pub food: String,
    pub calories: u32,
    pub synced: bool,
}

impl From<&Record<CalorieEntry>> for CalorieListItem {
    fn from(record: &Record<CalorieEntry>) -> Self {
        Self {
            id: record.id.to_string(),
            date: record.date.to_string(),
            food: record.fields.food.clone(),
            calories: record.fields.calories,
            synced: record.synced,
        }
    }
}

pub fn format_calorie_line(record: &Record<CalorieEntry>) -> String {
    format!(
        "{}  {}  {:>5} kcal  {}{}",
        short_id(&record.id),
        record.date,
        record.fields.calories,
        record.fields.food,
        pending_marker(record.synced)
    )
}

pub async fn run_add(
    context: &Context,
    food: &str,
    calories: u32,
    date: Option<&str>,
) -> Result<(), CliError> {
    let date = parse_date(date)?;
    let engine = context.engine::<CalorieEntry>().await?;
    let record = engine.add(CalorieEntry::new(food.trim(), calories), date)?;
    finish(&engine).await;

    println!(
        "Logged {}: {} ({} kcal)",
        short_id(&record.id),
        record.fields.food,
        record.fields.calories
    );
    Ok(())
}

pub async fn run_list(
    context: &Context,
    date: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let date = parse_date(date)?;
    let engine = context.engine::<CalorieEntry>().await?;
    let records = on_date(&engine.records(), date);
    finish(&engine).await;

    if as_json {
        let items = records
            .iter()
            .map(CalorieListItem::from)
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if records.is_empty() {
        println!("No entries");
    } else {
        for record in &records {
            println!("{}", format_calorie_line(record));
        }
    }
    Ok(())
}

pub async fn run_update(
    context: &Context,
    id: &str,
    food: Option<String>,
    calories: Option<u32>,
) -> Result<(), CliError> {
    let patch = CaloriePatch {
        food: normalize_text_option(food),
        calories,
    };
    if patch == CaloriePatch::default() {
        return Err(CliError::EmptyPatch);
    }

    let engine = context.engine::<CalorieEntry>().await?;
    let id = resolve_record_id(&engine.records(), id)?;
    let record = engine.update(&id, patch)?;
    finish(&engine).await;

    println!("Updated {}", format_calorie_line(&record));
    Ok(())
}

pub async fn run_delete(context: &Context, id: &str) -> Result<(), CliError> {
    let engine = context.engine::<CalorieEntry>().await?;
    let id = resolve_record_id(&engine.records(), id)?;
    engine.delete(&id)?;
    finish(&engine).await;

    println!("Deleted {}", short_id(&id));
    Ok(())
}
