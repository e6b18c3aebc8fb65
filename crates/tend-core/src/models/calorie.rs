//! Calorie entry model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record::{CollectionItem, Record};
use crate::error::{Error, Result};

/// A food item logged against the daily calorie budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalorieEntry {
    /// What was eaten
    pub food: String,
    /// Energy in kcal
    pub calories: u32,
}

impl CalorieEntry {
    pub fn new(food: impl Into<String>, calories: u32) -> Self {
        Self {
            food: food.into(),
            calories,
        }
    }
}

/// Partial update for a calorie entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaloriePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
}

impl CollectionItem for CalorieEntry {
    type Patch = CaloriePatch;

    const STORAGE_KEY: &'static str = "calorie_entries";
    const REMOTE_PATH: &'static str = "calories";
    const LABEL: &'static str = "calories";

    fn apply_patch(&mut self, patch: &CaloriePatch) {
        if let Some(food) = &patch.food {
            self.food.clone_from(food);
        }
        if let Some(calories) = patch.calories {
            self.calories = calories;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.food.trim().is_empty() {
            return Err(Error::InvalidInput("Food name cannot be empty".into()));
        }
        Ok(())
    }
}

/// Total calories logged on `date`.
pub fn daily_calorie_total(records: &[Record<CalorieEntry>], date: NaiveDate) -> u32 {
    records
        .iter()
        .filter(|record| record.date == date)
        .fold(0u32, |total, record| {
            total.saturating_add(record.fields.calories)
        })
}
