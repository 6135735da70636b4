//! Lesson completion ledger.
//!
//! One `Progress` row per `(user, lesson)` holds the completion flag. Module
//! and course percentages are derived from those rows on every request and
//! never stored.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use uuid::Uuid;

use crate::{
    enrollment::EnrollmentGate,
    error::{AppError, AppResult},
    models::{Lesson, Progress},
    store::{Store, StoreError, StoreResult},
};

/// Format of `completed_at` in toggle responses.
pub const COMPLETED_AT_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rollup {
    pub completed: i64,
    pub total: i64,
    pub percentage: i64,
}

impl Rollup {
    /// Percentage is truncated, never rounded up: 1 of 3 is 33.
    pub fn new(completed: i64, total: i64) -> Self {
        let percentage = if total > 0 { completed * 100 / total } else { 0 };
        Self {
            completed,
            total,
            percentage,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LessonProgress {
    pub lesson: Lesson,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ToggleResult {
    pub record: Progress,
    pub module: Rollup,
    pub course: Rollup,
}

/// Response body of the mark-lesson-completed action.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TogglePayload {
    pub success: bool,
    pub completed: bool,
    pub completed_at: Option<String>,
    pub module_progress: i64,
    pub course_progress: i64,
    pub module_completed: i64,
    pub module_total: i64,
    pub course_completed: i64,
    pub course_total: i64,
    pub message: String,
}

impl From<&ToggleResult> for TogglePayload {
    fn from(r: &ToggleResult) -> Self {
        let message = if r.record.completed {
            "Lesson marked as completed"
        } else {
            "Lesson marked as not completed"
        };
        Self {
            success: true,
            completed: r.record.completed,
            completed_at: r
                .record
                .completed_at
                .map(|t| t.format(COMPLETED_AT_FORMAT).to_string()),
            module_progress: r.module.percentage,
            course_progress: r.course.percentage,
            module_completed: r.module.completed,
            module_total: r.module.total,
            course_completed: r.course.completed,
            course_total: r.course.total,
            message: message.to_string(),
        }
    }
}

pub struct ProgressLedger<'a> {
    store: &'a dyn Store,
}

impl<'a> ProgressLedger<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Marks a lesson completed or not completed for an enrolled user and
    /// returns the stored record with fresh module and course roll-ups.
    pub async fn toggle_completion(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        completed: bool,
    ) -> AppResult<ToggleResult> {
        let lesson = self
            .store
            .lesson(lesson_id)
            .await?
            .ok_or_else(|| AppError::not_found("lesson not found"))?;
        let module = self
            .store
            .module(lesson.module_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("lesson {lesson_id} has no module")))?;

        EnrollmentGate::new(self.store)
            .require_enrolled(user_id, module.course_id)
            .await?;

        let now = Utc::now();
        let upsert = || self.store.upsert_progress(user_id, lesson_id, completed, now);
        let record = retry_once_on_conflict(upsert)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(detail) => {
                    AppError::Internal(format!("progress upsert conflicted twice: {detail}"))
                }
                other => other.into(),
            })?;

        let module_rollup = self.module_counts(user_id, module.id).await?;
        let course_rollup = self.course_counts(user_id, module.course_id).await?;

        tracing::info!(
            %user_id,
            %lesson_id,
            completed = record.completed,
            module_pct = module_rollup.percentage,
            course_pct = course_rollup.percentage,
            "lesson progress updated"
        );

        Ok(ToggleResult {
            record,
            module: module_rollup,
            course: course_rollup,
        })
    }

    pub async fn module_rollup(&self, user_id: Uuid, module_id: Uuid) -> AppResult<Rollup> {
        if self.store.module(module_id).await?.is_none() {
            return Err(AppError::not_found("module not found"));
        }
        self.module_counts(user_id, module_id).await
    }

    pub async fn course_rollup(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Rollup> {
        if self.store.course(course_id).await?.is_none() {
            return Err(AppError::not_found("course not found"));
        }
        self.course_counts(user_id, course_id).await
    }

    /// Lessons of the module in ascending order with this user's state; a
    /// lesson without a record reads as not completed.
    pub async fn lessons_with_progress(
        &self,
        user_id: Uuid,
        module_id: Uuid,
    ) -> AppResult<Vec<LessonProgress>> {
        if self.store.module(module_id).await?.is_none() {
            return Err(AppError::not_found("module not found"));
        }
        let lessons = self.store.lessons_for_module(module_id).await?;
        let ids: Vec<Uuid> = lessons.iter().map(|l| l.id).collect();
        let records = self.store.progress_for_lessons(user_id, &ids).await?;

        Ok(lessons
            .into_iter()
            .map(|lesson| {
                let record = records.iter().find(|p| p.lesson_id == lesson.id);
                LessonProgress {
                    completed: record.map(|p| p.completed).unwrap_or(false),
                    completed_at: record.and_then(|p| p.completed_at),
                    lesson,
                }
            })
            .collect())
    }

    pub async fn lesson_state(
        &self,
        user_id: Uuid,
        lesson: &Lesson,
    ) -> AppResult<(bool, Option<DateTime<Utc>>)> {
        let record = self.store.progress(user_id, lesson.id).await?;
        Ok(record
            .map(|p| (p.completed, p.completed_at))
            .unwrap_or((false, None)))
    }

    async fn module_counts(&self, user_id: Uuid, module_id: Uuid) -> AppResult<Rollup> {
        let total = self.store.count_lessons_in_module(module_id).await?;
        let completed = self.store.count_completed_in_module(user_id, module_id).await?;
        Ok(Rollup::new(completed, total))
    }

    async fn course_counts(&self, user_id: Uuid, course_id: Uuid) -> AppResult<Rollup> {
        let total = self.store.count_lessons_in_course(course_id).await?;
        let completed = self.store.count_completed_in_course(user_id, course_id).await?;
        Ok(Rollup::new(completed, total))
    }
}

/// Runs `op` again once if it lost a uniqueness race.
pub(crate) async fn retry_once_on_conflict<T, F, Fut>(mut op: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    match op().await {
        Err(StoreError::Conflict(detail)) => {
            tracing::debug!(%detail, "write conflict, retrying once");
            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::ProgressStore, testutil::Fixture};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn percentage_truncates() {
        assert_eq!(Rollup::new(1, 3).percentage, 33);
        assert_eq!(Rollup::new(2, 3).percentage, 66);
        assert_eq!(Rollup::new(3, 4).percentage, 75);
        assert_eq!(Rollup::new(0, 0).percentage, 0);
        assert_eq!(Rollup::new(5, 5).percentage, 100);
    }

    #[tokio::test]
    async fn untouched_lessons_read_as_incomplete() {
        let fx = Fixture::with_layout(&[3]).await;
        fx.enroll_learner().await;
        let ledger = ProgressLedger::new(fx.store.as_ref());

        let rows = ledger.lessons_with_progress(fx.learner.id, fx.modules[0].id).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| !r.completed && r.completed_at.is_none()));
        let orders: Vec<i32> = rows.iter().map(|r| r.lesson.position).collect();
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn repeat_completion_keeps_timestamp() {
        let fx = Fixture::with_layout(&[2]).await;
        fx.enroll_learner().await;
        let ledger = ProgressLedger::new(fx.store.as_ref());
        let lesson = fx.lessons[0][0].id;

        let first = ledger.toggle_completion(fx.learner.id, lesson, true).await.unwrap();
        let second = ledger.toggle_completion(fx.learner.id, lesson, true).await.unwrap();
        assert!(first.record.completed_at.is_some());
        assert_eq!(first.record.completed_at, second.record.completed_at);
        assert_eq!(first.record.id, second.record.id);
    }

    #[tokio::test]
    async fn uncompleting_clears_timestamp() {
        let fx = Fixture::with_layout(&[2]).await;
        fx.enroll_learner().await;
        let ledger = ProgressLedger::new(fx.store.as_ref());
        let lesson = fx.lessons[0][1].id;

        ledger.toggle_completion(fx.learner.id, lesson, true).await.unwrap();
        let off = ledger.toggle_completion(fx.learner.id, lesson, false).await.unwrap();
        assert!(!off.record.completed);
        assert_eq!(off.record.completed_at, None);
        assert_eq!(off.module.completed, 0);

        let rows = ledger.lessons_with_progress(fx.learner.id, fx.modules[0].id).await.unwrap();
        assert!(!rows[1].completed);
    }

    #[tokio::test]
    async fn first_toggle_to_false_creates_incomplete_record() {
        let fx = Fixture::with_layout(&[1]).await;
        fx.enroll_learner().await;
        let ledger = ProgressLedger::new(fx.store.as_ref());

        let r = ledger.toggle_completion(fx.learner.id, fx.lessons[0][0].id, false).await.unwrap();
        assert!(!r.record.completed);
        assert!(r.record.completed_at.is_none());
        assert!(fx.store.progress(fx.learner.id, fx.lessons[0][0].id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn module_rollup_floors() {
        let fx = Fixture::with_layout(&[3]).await;
        fx.enroll_learner().await;
        let ledger = ProgressLedger::new(fx.store.as_ref());

        let r = ledger.toggle_completion(fx.learner.id, fx.lessons[0][0].id, true).await.unwrap();
        assert_eq!(
            r.module,
            Rollup {
                completed: 1,
                total: 3,
                percentage: 33,
            }
        );
        assert_eq!(
            ledger.module_rollup(fx.learner.id, fx.modules[0].id).await.unwrap(),
            r.module
        );
    }

    #[tokio::test]
    async fn course_rollup_spans_modules() {
        let fx = Fixture::with_layout(&[2, 2]).await;
        fx.enroll_learner().await;
        let ledger = ProgressLedger::new(fx.store.as_ref());

        for lesson in [&fx.lessons[0][0], &fx.lessons[0][1], &fx.lessons[1][0]] {
            ledger.toggle_completion(fx.learner.id, lesson.id, true).await.unwrap();
        }
        let course = ledger.course_rollup(fx.learner.id, fx.course.id).await.unwrap();
        assert_eq!(
            course,
            Rollup {
                completed: 3,
                total: 4,
                percentage: 75,
            }
        );

        let second = ledger.module_rollup(fx.learner.id, fx.modules[1].id).await.unwrap();
        assert_eq!(second.percentage, 50);
    }

    #[tokio::test]
    async fn progress_of_one_learner_does_not_leak() {
        let fx = Fixture::with_layout(&[2]).await;
        fx.enroll_learner().await;
        let other = fx.add_enrolled_user("other").await;
        let ledger = ProgressLedger::new(fx.store.as_ref());

        ledger.toggle_completion(other.id, fx.lessons[0][0].id, true).await.unwrap();
        let mine = ledger.course_rollup(fx.learner.id, fx.course.id).await.unwrap();
        assert_eq!(mine.completed, 0);
    }

    #[tokio::test]
    async fn stranger_is_forbidden_and_nothing_is_written() {
        let fx = Fixture::with_layout(&[2]).await;
        let ledger = ProgressLedger::new(fx.store.as_ref());
        let lesson = fx.lessons[0][0].id;

        let err = ledger.toggle_completion(fx.learner.id, lesson, true).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(fx.store.progress(fx.learner.id, lesson).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_lesson_is_not_found() {
        let fx = Fixture::with_layout(&[1]).await;
        fx.enroll_learner().await;
        let ledger = ProgressLedger::new(fx.store.as_ref());

        let err = ledger
            .toggle_completion(fx.learner.id, Uuid::new_v4(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let rows = ledger.lessons_with_progress(fx.learner.id, fx.modules[0].id).await.unwrap();
        assert!(rows.iter().all(|r| !r.completed));
    }

    #[tokio::test]
    async fn rollups_for_missing_parents_are_not_found() {
        let fx = Fixture::with_layout(&[1]).await;
        let ledger = ProgressLedger::new(fx.store.as_ref());
        assert!(matches!(
            ledger.module_rollup(fx.learner.id, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            ledger.course_rollup(fx.learner.id, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_completions_share_one_record() {
        let fx = Fixture::with_layout(&[1]).await;
        fx.enroll_learner().await;
        let lesson = fx.lessons[0][0].id;
        let user = fx.learner.id;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&fx.store);
            handles.push(tokio::spawn(async move {
                ProgressLedger::new(store.as_ref())
                    .toggle_completion(user, lesson, true)
                    .await
                    .map(|r| r.record)
            }));
        }
        let mut records = Vec::new();
        for h in handles {
            records.push(h.await.unwrap().unwrap());
        }

        let first = &records[0];
        assert!(records.iter().all(|r| r.id == first.id && r.completed_at == first.completed_at));
        let stored = fx.store.progress_for_lessons(user, &[lesson]).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn conflict_is_retried_once() {
        let calls = AtomicUsize::new(0);
        let out: StoreResult<u8> = retry_once_on_conflict(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(StoreError::Conflict("race".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let out: StoreResult<u8> = retry_once_on_conflict(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::NotFound("lesson".into())) }
        })
        .await;
        assert!(matches!(out, Err(StoreError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn payload_formats_timestamp_and_message() {
        let now = DateTime::parse_from_rfc3339("2024-03-05T14:07:00Z").unwrap().with_timezone(&Utc);
        let record = Progress::new(Uuid::new_v4(), Uuid::new_v4(), true, now);
        let result = ToggleResult {
            record,
            module: Rollup::new(1, 3),
            course: Rollup::new(1, 6),
        };
        let payload = TogglePayload::from(&result);
        assert_eq!(payload.completed_at.as_deref(), Some("05.03.2024 14:07"));
        assert_eq!(payload.module_progress, 33);
        assert_eq!(payload.course_progress, 16);
        assert_eq!(payload.message, "Lesson marked as completed");
    }
}
