use chrono::NaiveDate;
use serde::Serialize;
use tend_core::models::{daily_calorie_total, daily_workout_summary};
use tend_core::util::today;
use tend_core::{CalorieEntry, Record, WorkoutActivity};

use crate::commands::common::{finish, parse_date, Context};
use crate::error::CliError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodaySummary {
    pub date: NaiveDate,
    pub intake: u32,
    pub sessions: usize,
    pub minutes: u32,
    pub burned: u32,
    /// Intake minus energy burned; negative on a deficit.
    pub net: i64,
}

impl TodaySummary {
    pub fn compute(
        date: NaiveDate,
        calories: &[Record<CalorieEntry>],
        workouts: &[Record<WorkoutActivity>],
    ) -> Self {
        let intake = daily_calorie_total(calories, date);
        let workout = daily_workout_summary(workouts, date);
        Self {
            date,
            intake,
            sessions: workout.sessions,
            minutes: workout.minutes,
            burned: workout.calories,
            net: i64::from(intake) - i64::from(workout.calories),
        }
    }

    pub fn render(&self) -> Vec<String> {
        vec![
            format!("{}", self.date.format("%A, %B %-d %Y")),
            format!("  Intake:   {} kcal", self.intake),
            format!(
                "  Workouts: {} ({} min, {} kcal burned)",
                self.sessions, self.minutes, self.burned
            ),
            format!("  Net:      {} kcal", self.net),
        ]
    }
}

pub async fn run_today(
    context: &Context,
    date: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let date = parse_date(date)?.unwrap_or_else(today);

    let calories = context.engine::<CalorieEntry>().await?;
    let workouts = context.engine::<WorkoutActivity>().await?;
    let summary = TodaySummary::compute(date, &calories.records(), &workouts.records());
    finish(&calories).await;
    finish(&workouts).await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for line in summary.render() {
            println!("{line}");
        }
    }
    Ok(())
}
