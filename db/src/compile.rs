//! Attendance compilation engine.
//!
//! Aggregates the attendance ledger over a rolling window into per-student
//! percentages and risk tiers. Pure read-only: compiling twice over an
//! unchanged ledger yields identical reports.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use serde::Serialize;

use crate::models::{
    attendance_record::{self, RecordStatus},
    class_enrollment,
};

pub const DEFAULT_WINDOW_DAYS: i64 = 15;

/// Fraction of sessions a student must attend to be in good standing.
const REQUIRED_RATIO: f64 = 0.75;
const GOOD_THRESHOLD: f64 = 75.0;
const WARNING_THRESHOLD: f64 = 60.0;

/// Risk classification derived from an attendance percentage. Lower bounds
/// are inclusive: exactly 75.00 is good, exactly 60.00 is warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Good,
    Warning,
    Critical,
}

impl Tier {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= GOOD_THRESHOLD {
            Tier::Good
        } else if percentage >= WARNING_THRESHOLD {
            Tier::Warning
        } else {
            Tier::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAttendance {
    pub student_id: i64,
    pub total_sessions: i64,
    pub attended_sessions: i64,
    /// Rounded to two decimal places; 0 when the class has no records.
    pub percentage: f64,
    pub tier: Tier,
    /// How many more attended sessions would bring the student to the
    /// required ratio. Zero once they are at or above it.
    pub classes_needed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompilationReport {
    pub class_id: i64,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub per_student: Vec<StudentAttendance>,
}

/// Compiles the attendance report for `class_id` over the trailing
/// `window_days` days ending now.
pub async fn compile(
    db: &DatabaseConnection,
    class_id: i64,
    window_days: i64,
    now: DateTime<Utc>,
) -> Result<CompilationReport, DbErr> {
    let window_end = now.date_naive();
    let window_start = (now - Duration::days(window_days)).date_naive();

    let records = attendance_record::Entity::find()
        .filter(attendance_record::Column::ClassId.eq(class_id))
        .filter(attendance_record::Column::Date.between(window_start, window_end))
        .all(db)
        .await?;

    // Denominator carried over from the original system: the count of all
    // attendance documents for the class in the window, not the count of
    // distinct session instances. See DESIGN.md.
    let total_sessions = records.len() as i64;

    let mut attended: HashMap<i64, i64> = HashMap::new();
    for rec in &records {
        if rec.status == RecordStatus::Present {
            *attended.entry(rec.student_id).or_insert(0) += 1;
        }
    }

    let students = class_enrollment::Model::students_in_class(db, class_id).await?;
    let per_student = students
        .into_iter()
        .map(|student_id| {
            let attended_sessions = attended.get(&student_id).copied().unwrap_or(0);
            let percentage = if total_sessions > 0 {
                round2(attended_sessions as f64 / total_sessions as f64 * 100.0)
            } else {
                0.0
            };
            let classes_needed = (REQUIRED_RATIO * total_sessions as f64
                - attended_sessions as f64)
                .ceil()
                .max(0.0) as i64;

            StudentAttendance {
                student_id,
                total_sessions,
                attended_sessions,
                percentage,
                tier: Tier::from_percentage(percentage),
                classes_needed,
            }
        })
        .collect();

    Ok(CompilationReport {
        class_id,
        window_start,
        window_end,
        per_student,
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
