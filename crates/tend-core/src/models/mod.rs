//! Data models for Tend

mod account;
mod calorie;
mod record;
mod workout;

pub use account::{group_accounts, AccountPatch, PasswordAccount, DEFAULT_ACCOUNT_GROUP};
pub use calorie::{daily_calorie_total, CalorieEntry, CaloriePatch};
pub use record::{sort_records, CollectionItem, Record, RecordId};
pub use workout::{daily_workout_summary, WorkoutActivity, WorkoutPatch, WorkoutSummary};
