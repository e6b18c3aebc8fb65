//! Workout activity model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::record::{CollectionItem, Record};
use crate::error::{Error, Result};

/// A logged workout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutActivity {
    /// Activity name, e.g. "Running"
    pub name: String,
    /// Duration in minutes
    pub duration: u32,
    /// Estimated kcal burned
    #[serde(default)]
    pub calories: u32,
}

impl WorkoutActivity {
    pub fn new(name: impl Into<String>, duration: u32, calories: u32) -> Self {
        Self {
            name: name.into(),
            duration,
            calories,
        }
    }
}

/// Partial update for a workout activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
}

impl CollectionItem for WorkoutActivity {
    type Patch = WorkoutPatch;

    const STORAGE_KEY: &'static str = "workout_activities";
    const REMOTE_PATH: &'static str = "workouts";
    const LABEL: &'static str = "workouts";

    fn apply_patch(&mut self, patch: &WorkoutPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(calories) = patch.calories {
            self.calories = calories;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("Activity name cannot be empty".into()));
        }
        if self.duration == 0 {
            return Err(Error::InvalidInput(
                "Workout duration must be at least one minute".into(),
            ));
        }
        Ok(())
    }
}

/// Workout totals for a single day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkoutSummary {
    pub sessions: usize,
    pub minutes: u32,
    pub calories: u32,
}

/// Summarize the workouts logged on `date`.
pub fn daily_workout_summary(
    records: &[Record<WorkoutActivity>],
    date: NaiveDate,
) -> WorkoutSummary {
    records
        .iter()
        .filter(|record| record.date == date)
        .fold(WorkoutSummary::default(), |summary, record| WorkoutSummary {
            sessions: summary.sessions + 1,
            minutes: summary.minutes.saturating_add(record.fields.duration),
            calories: summary.calories.saturating_add(record.fields.calories),
        })
}
