//! Redemption validator.
//!
//! Accepts a student's attempt to redeem a session token and records it with
//! an exactly-once guarantee. All contention is resolved at the storage
//! boundary: the redemption append is a single conditional INSERT whose
//! active/expiry gate the database re-evaluates at write time, and the
//! ledger's `(student, subject, date)` unique key is the second line of
//! defense. The append and the ledger row commit in one transaction, so a
//! fault between them never leaves a redemption without its record. No
//! in-process locking.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, SqlErr, TransactionTrait,
};
use tracing::{debug, info};

use crate::models::{
    attendance_record::{self, RecordMethod, RecordStatus},
    class_enrollment, session_token, token_redemption,
};

#[derive(Debug, thiserror::Error)]
pub enum RedemptionError {
    /// Unknown code, or the claimed subject/class do not match it.
    #[error("Invalid attendance code")]
    InvalidToken,

    /// Time-expired or explicitly cancelled. The time check dominates the
    /// active flag.
    #[error("This code has expired")]
    Expired,

    /// Attendance is already recorded for this student. Not a failure from
    /// the caller's perspective: a retried request observes the same outcome
    /// as the original success.
    #[error("Attendance already recorded")]
    AlreadyMarked,

    /// The student is not part of the class the token belongs to.
    #[error("Student is not enrolled in this class")]
    NotEnrolled,

    /// Transient infrastructure fault. Safe to retry; the two writes share a
    /// transaction, so a failure never commits a partial outcome.
    #[error("Storage failure: {0}")]
    Storage(#[from] DbErr),
}

/// Redeems `code` for `student_id`, marking them present for the token's
/// session. Safe under arbitrary concurrent invocation, including duplicate
/// retries of the same request.
pub async fn redeem(
    db: &DatabaseConnection,
    code: &str,
    subject_id: i64,
    class_id: i64,
    student_id: i64,
    now: DateTime<Utc>,
) -> Result<attendance_record::Model, RedemptionError> {
    let token = session_token::Model::find_by_code(db, code, subject_id, class_id)
        .await?
        .ok_or(RedemptionError::InvalidToken)?;

    // Fast path; the same gate is re-evaluated inside the atomic append, so
    // this check alone is never relied on.
    if !token.active || token.is_expired(now) {
        return Err(RedemptionError::Expired);
    }

    if !class_enrollment::Model::is_enrolled(db, class_id, student_id).await? {
        return Err(RedemptionError::NotEnrolled);
    }

    // Both writes commit together or not at all.
    let txn = db.begin().await?;

    if let Err(err) = append_redemption(&txn, &token, student_id, now).await {
        txn.rollback().await?;
        return match err {
            // The composite key says this student already redeemed the
            // token. Normally the ledger row exists too; if an earlier
            // attempt was interrupted between its writes it may not, so
            // finish the job instead of echoing a success that never landed.
            RedemptionError::AlreadyMarked => {
                complete_interrupted_redemption(db, &token, subject_id, class_id, student_id, now)
                    .await
            }
            other => Err(other),
        };
    }
    debug!(token_id = token.id, student_id, "redemption appended");

    // The append won; write the ledger row. A conflicting row (e.g. a manual
    // mark landing concurrently) rolls the append back and resolves to
    // AlreadyMarked, never a storage error surfaced to the caller.
    let record = write_ledger_row(
        &txn,
        &token,
        subject_id,
        class_id,
        student_id,
        now.date_naive(),
        now,
    )
    .await;

    match record {
        Ok(rec) => {
            txn.commit().await?;
            info!(
                token_id = token.id,
                student_id,
                subject_id,
                class_id,
                "attendance recorded via token redemption"
            );
            Ok(rec)
        }
        Err(err) => {
            txn.rollback().await?;
            match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => Err(RedemptionError::AlreadyMarked),
                _ => Err(RedemptionError::Storage(err)),
            }
        }
    }
}

async fn write_ledger_row<C: ConnectionTrait>(
    conn: &C,
    token: &session_token::Model,
    subject_id: i64,
    class_id: i64,
    student_id: i64,
    date: NaiveDate,
    recorded_at: DateTime<Utc>,
) -> Result<attendance_record::Model, DbErr> {
    attendance_record::ActiveModel {
        student_id: Set(student_id),
        subject_id: Set(subject_id),
        class_id: Set(class_id),
        date: Set(date),
        status: Set(RecordStatus::Present),
        method: Set(RecordMethod::TokenRedeem),
        token_id: Set(Some(token.id)),
        recorded_at: Set(recorded_at),
        ..Default::default()
    }
    .insert(conn)
    .await
}

/// Recovery path for a redemption row with no matching ledger row, which can
/// only predate the transactional pairing of the two writes. Re-creates the
/// missing record, dated by the original redemption, so the retry observes
/// the success the interrupted attempt was owed. When the ledger row is
/// present this is the ordinary duplicate-tap outcome.
async fn complete_interrupted_redemption(
    db: &DatabaseConnection,
    token: &session_token::Model,
    subject_id: i64,
    class_id: i64,
    student_id: i64,
    now: DateTime<Utc>,
) -> Result<attendance_record::Model, RedemptionError> {
    let Some(redemption) = token_redemption::Entity::find_by_id((token.id, student_id))
        .one(db)
        .await?
    else {
        return Err(RedemptionError::AlreadyMarked);
    };

    let date = redemption.redeemed_at.date_naive();
    let existing = attendance_record::Entity::find()
        .filter(attendance_record::Column::StudentId.eq(student_id))
        .filter(attendance_record::Column::SubjectId.eq(subject_id))
        .filter(attendance_record::Column::Date.eq(date))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(RedemptionError::AlreadyMarked);
    }

    match write_ledger_row(db, token, subject_id, class_id, student_id, date, now).await {
        Ok(rec) => {
            info!(
                token_id = token.id,
                student_id,
                subject_id,
                class_id,
                "ledger row restored for interrupted redemption"
            );
            Ok(rec)
        }
        Err(err) => match err.sql_err() {
            // A concurrent retry restored it first.
            Some(SqlErr::UniqueConstraintViolation(_)) => Err(RedemptionError::AlreadyMarked),
            _ => Err(RedemptionError::Storage(err)),
        },
    }
}

/// Appends `(student_id, now)` to the token's redemption list iff the token
/// is still active and unexpired, as one conditional `INSERT .. SELECT`.
///
/// The gate runs inside the same statement that appends, so a cancellation
/// or expiry landing between lookup and write is still honored, and two
/// racing appends for the same student collapse onto the composite primary
/// key — the loser sees a unique violation, which is `AlreadyMarked`.
async fn append_redemption<C: ConnectionTrait>(
    conn: &C,
    token: &session_token::Model,
    student_id: i64,
    now: DateTime<Utc>,
) -> Result<(), RedemptionError> {
    let gate = Query::select()
        .column(session_token::Column::Id)
        .expr(Expr::val(student_id))
        .expr(Expr::val(now))
        .from(session_token::Entity)
        .and_where(session_token::Column::Id.eq(token.id))
        .and_where(session_token::Column::Active.eq(true))
        .and_where(session_token::Column::ExpiresAt.gt(now))
        .to_owned();

    let insert = Query::insert()
        .into_table(token_redemption::Entity)
        .columns([
            token_redemption::Column::TokenId,
            token_redemption::Column::StudentId,
            token_redemption::Column::RedeemedAt,
        ])
        .select_from(gate)
        .map_err(|e| DbErr::Custom(e.to_string()))?
        .to_owned();

    let backend = conn.get_database_backend();
    match conn.execute(backend.build(&insert)).await {
        // Zero rows means the gate failed at write time: cancelled or
        // expired, both surfaced as expiry.
        Ok(res) if res.rows_affected() == 0 => Err(RedemptionError::Expired),
        Ok(_) => Ok(()),
        Err(err) => match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Err(RedemptionError::AlreadyMarked),
            _ => Err(RedemptionError::Storage(err)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::token_redemption::{
        ActiveModel as RedemptionActive, Column as RedemptionCol, Entity as RedemptionEntity,
    };
    use crate::models::{attendance_record, class_enrollment, session_token};
    use crate::test_utils::setup_test_db;
    use chrono::{Duration, TimeZone};
    use sea_orm::{EntityTrait, PaginatorTrait, QueryFilter};

    const SUBJECT: i64 = 301;
    const CLASS: i64 = 7;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 9, 8, 0, 0).unwrap()
    }

    async fn seed(db: &DatabaseConnection, students: &[i64]) -> session_token::Model {
        for s in students {
            class_enrollment::Model::enroll(db, CLASS, *s).await.unwrap();
        }
        session_token::Model::issue(db, SUBJECT, CLASS, 1, 10, t0())
            .await
            .unwrap()
    }

    async fn record_count(db: &DatabaseConnection, student_id: i64) -> u64 {
        attendance_record::Entity::find()
            .filter(attendance_record::Column::StudentId.eq(student_id))
            .filter(attendance_record::Column::SubjectId.eq(SUBJECT))
            .count(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn successful_redemption_creates_one_record() {
        let db = setup_test_db().await;
        let token = seed(&db, &[42]).await;

        let rec = redeem(&db, &token.code, SUBJECT, CLASS, 42, t0() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(rec.student_id, 42);
        assert_eq!(rec.status, RecordStatus::Present);
        assert_eq!(rec.method, RecordMethod::TokenRedeem);
        assert_eq!(rec.token_id, Some(token.id));
        assert_eq!(rec.date, t0().date_naive());
        assert_eq!(record_count(&db, 42).await, 1);
    }

    #[tokio::test]
    async fn retry_of_identical_request_is_already_marked() {
        let db = setup_test_db().await;
        let token = seed(&db, &[42]).await;
        let at = t0() + Duration::minutes(1);

        redeem(&db, &token.code, SUBJECT, CLASS, 42, at).await.unwrap();
        let retry = redeem(&db, &token.code, SUBJECT, CLASS, 42, at + Duration::minutes(1)).await;
        assert!(matches!(retry, Err(RedemptionError::AlreadyMarked)));
        assert_eq!(record_count(&db, 42).await, 1);
    }

    #[tokio::test]
    async fn unknown_or_mismatched_code_is_invalid_token() {
        let db = setup_test_db().await;
        let token = seed(&db, &[42]).await;

        let bad = redeem(&db, "no-such-code", SUBJECT, CLASS, 42, t0()).await;
        assert!(matches!(bad, Err(RedemptionError::InvalidToken)));

        // Right code, wrong subject claim.
        let mismatched = redeem(&db, &token.code, SUBJECT + 1, CLASS, 42, t0()).await;
        assert!(matches!(mismatched, Err(RedemptionError::InvalidToken)));
    }

    #[tokio::test]
    async fn expired_token_rejected_even_while_active() {
        let db = setup_test_db().await;
        let token = seed(&db, &[42]).await;

        // Past expiry, active flag still true: the time check dominates.
        let late = redeem(
            &db,
            &token.code,
            SUBJECT,
            CLASS,
            42,
            t0() + Duration::minutes(11),
        )
        .await;
        assert!(matches!(late, Err(RedemptionError::Expired)));
        assert_eq!(record_count(&db, 42).await, 0);
    }

    #[tokio::test]
    async fn cancelled_token_rejected_before_expiry() {
        let db = setup_test_db().await;
        let token = seed(&db, &[42]).await;

        session_token::Model::cancel(&db, token.id, CLASS).await.unwrap();

        let attempt = redeem(
            &db,
            &token.code,
            SUBJECT,
            CLASS,
            42,
            t0() + Duration::minutes(1),
        )
        .await;
        assert!(matches!(attempt, Err(RedemptionError::Expired)));
    }

    #[tokio::test]
    async fn unenrolled_student_is_rejected() {
        let db = setup_test_db().await;
        let token = seed(&db, &[42]).await;

        let attempt = redeem(&db, &token.code, SUBJECT, CLASS, 999, t0()).await;
        assert!(matches!(attempt, Err(RedemptionError::NotEnrolled)));
    }

    #[tokio::test]
    async fn different_students_redeem_independently() {
        let db = setup_test_db().await;
        let token = seed(&db, &[1, 2, 3]).await;
        let at = t0() + Duration::minutes(1);

        for s in [1, 2, 3] {
            redeem(&db, &token.code, SUBJECT, CLASS, s, at).await.unwrap();
        }

        let redemptions = RedemptionEntity::find()
            .filter(RedemptionCol::TokenId.eq(token.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(redemptions, 3);
    }

    #[tokio::test]
    async fn concurrent_same_student_attempts_yield_one_winner() {
        let db = setup_test_db().await;
        let token = seed(&db, &[42]).await;
        let at = t0() + Duration::minutes(1);

        let attempts = (0..8).map(|_| redeem(&db, &token.code, SUBJECT, CLASS, 42, at));
        let outcomes = futures::future::join_all(attempts).await;

        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        let dupes = outcomes
            .iter()
            .filter(|r| matches!(r, Err(RedemptionError::AlreadyMarked)))
            .count();
        assert_eq!(wins, 1);
        assert_eq!(dupes, 7);

        assert_eq!(record_count(&db, 42).await, 1);
        let redemptions = RedemptionEntity::find()
            .filter(RedemptionCol::TokenId.eq(token.id))
            .filter(RedemptionCol::StudentId.eq(42))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(redemptions, 1);
    }

    #[tokio::test]
    async fn ledger_unique_key_backstops_manual_marking() {
        let db = setup_test_db().await;
        let token = seed(&db, &[42]).await;
        let at = t0() + Duration::minutes(1);

        // A manual mark already exists for the same (student, subject, day).
        attendance_record::ActiveModel {
            student_id: Set(42),
            subject_id: Set(SUBJECT),
            class_id: Set(CLASS),
            date: Set(at.date_naive()),
            status: Set(RecordStatus::Present),
            method: Set(RecordMethod::Manual),
            token_id: Set(None),
            recorded_at: Set(at),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let attempt = redeem(&db, &token.code, SUBJECT, CLASS, 42, at).await;
        assert!(matches!(attempt, Err(RedemptionError::AlreadyMarked)));
        assert_eq!(record_count(&db, 42).await, 1);

        // The losing append rolled back with the ledger conflict; no stray
        // redemption row survives.
        let redemptions = RedemptionEntity::find()
            .filter(RedemptionCol::TokenId.eq(token.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(redemptions, 0);
    }

    #[tokio::test]
    async fn interrupted_redemption_is_completed_on_retry() {
        let db = setup_test_db().await;
        let token = seed(&db, &[42]).await;
        let redeemed_at = t0() + Duration::minutes(1);

        // A redemption row with no ledger row, as a fault between the two
        // writes could once leave behind.
        RedemptionActive {
            token_id: Set(token.id),
            student_id: Set(42),
            redeemed_at: Set(redeemed_at),
        }
        .insert(&db)
        .await
        .unwrap();
        assert_eq!(record_count(&db, 42).await, 0);

        // The retry must restore the missing record, dated by the original
        // redemption, rather than report it as already marked.
        let rec = redeem(
            &db,
            &token.code,
            SUBJECT,
            CLASS,
            42,
            redeemed_at + Duration::minutes(1),
        )
        .await
        .unwrap();
        assert_eq!(rec.date, redeemed_at.date_naive());
        assert_eq!(rec.token_id, Some(token.id));
        assert_eq!(record_count(&db, 42).await, 1);

        // With the record in place, further retries are duplicates again.
        let again = redeem(
            &db,
            &token.code,
            SUBJECT,
            CLASS,
            42,
            redeemed_at + Duration::minutes(2),
        )
        .await;
        assert!(matches!(again, Err(RedemptionError::AlreadyMarked)));
        assert_eq!(record_count(&db, 42).await, 1);
    }
}
