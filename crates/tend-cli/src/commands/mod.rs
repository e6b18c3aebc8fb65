pub mod accounts;
pub mod calories;
pub mod common;
pub mod sync;
pub mod today;
pub mod workouts;
