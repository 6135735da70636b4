use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Enrollment,
    store::Store,
};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnrollStatus {
    Created,
    AlreadyEnrolled,
}

/// Decides whether a user holds access to a course, and grants it.
pub struct EnrollmentGate<'a> {
    store: &'a dyn Store,
}

impl<'a> EnrollmentGate<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> AppResult<bool> {
        Ok(self.store.enrollment(user_id, course_id).await?.is_some())
    }

    pub async fn require_enrolled(&self, user_id: Uuid, course_id: Uuid) -> AppResult<()> {
        if self.is_enrolled(user_id, course_id).await? {
            Ok(())
        } else {
            tracing::warn!(%user_id, %course_id, "access denied: not enrolled");
            Err(AppError::forbidden("you are not enrolled in this course"))
        }
    }

    /// Explicit enrollment. Only published courses accept new learners; a
    /// repeat call returns the existing record with `AlreadyEnrolled`.
    pub async fn enroll(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> AppResult<(Enrollment, EnrollStatus)> {
        let course = self
            .store
            .course(course_id)
            .await?
            .filter(|c| c.is_published)
            .ok_or_else(|| AppError::not_found("course not found"))?;

        let (enrollment, created) = self.store.insert_enrollment(user_id, course.id).await?;
        let status = if created {
            tracing::info!(%user_id, course_id = %course.id, "enrolled");
            EnrollStatus::Created
        } else {
            EnrollStatus::AlreadyEnrolled
        };
        Ok((enrollment, status))
    }
}
