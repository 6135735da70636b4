//! Persistence seam.
//!
//! Every table is reached through one of the traits below. `PgStore` is the
//! production backend; `MemoryStore` keeps everything in process and backs the
//! test suite and `STORE_BACKEND=memory`.
//!
//! Writes that must stay unique under concurrent requests (progress upserts,
//! enrollments, cart rows, reviews) are single atomic operations on the store,
//! never an existence check followed by an insert in the caller. The cart is
//! written row by row, never as a whole snapshot, so two requests editing the
//! same cart cannot overwrite each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::*;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("integrity error: {0}")]
    Integrity(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Catalog listing filter. `None` means "no restriction".
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub category_id: Option<Uuid>,
    pub level: Option<Level>,
    pub free_only: bool,
    /// Case-insensitive match on title, description or author username.
    pub search: Option<String>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_user(&self, username: &str, is_staff: bool) -> StoreResult<User>;
    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<String>;
    async fn user_for_token(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_category(&self, name: &str, description: &str) -> StoreResult<Category>;
    async fn categories(&self) -> StoreResult<Vec<Category>>;
    /// Published course count per category id.
    async fn published_counts_by_category(&self) -> StoreResult<Vec<(Uuid, i64)>>;

    async fn create_course(&self, author_id: Uuid, new: &NewCourse) -> StoreResult<Course>;
    async fn course(&self, id: Uuid) -> StoreResult<Option<Course>>;
    async fn courses_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Course>>;
    /// Published courses matching `filter`, newest first.
    async fn published_courses(&self, filter: &CourseFilter) -> StoreResult<Vec<Course>>;
    /// Published courses whose title or category name contains `needle`.
    async fn published_courses_matching_direction(
        &self,
        needle: Option<&str>,
        level: Option<Level>,
        free_only: bool,
        limit: i64,
    ) -> StoreResult<Vec<Course>>;

    /// Writes back the editable fields: title, description, category,
    /// duration and publication flag.
    async fn update_course(&self, course: &Course) -> StoreResult<Course>;
    /// Cascades to modules, lessons, progress, enrollments, cart rows and
    /// reviews. Fails with `Conflict` once the course has been sold.
    async fn delete_course(&self, id: Uuid) -> StoreResult<()>;
    /// Drafts included, newest first.
    async fn courses_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Course>>;

    /// Fails with `Conflict` when `new.order` is taken inside the course.
    async fn create_module(&self, course_id: Uuid, new: &NewModule) -> StoreResult<Module>;
    async fn module(&self, id: Uuid) -> StoreResult<Option<Module>>;
    async fn modules_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Module>>;
    async fn update_module(&self, module: &Module) -> StoreResult<Module>;
    /// Cascades to the module's lessons and their progress.
    async fn delete_module(&self, id: Uuid) -> StoreResult<()>;

    /// Fails with `Conflict` when `new.order` is taken inside the module.
    async fn create_lesson(&self, module_id: Uuid, new: &NewLesson) -> StoreResult<Lesson>;
    async fn update_lesson(&self, lesson: &Lesson) -> StoreResult<Lesson>;
    async fn lesson(&self, id: Uuid) -> StoreResult<Option<Lesson>>;
    /// Lessons of a module, ascending by order.
    async fn lessons_for_module(&self, module_id: Uuid) -> StoreResult<Vec<Lesson>>;
    async fn count_lessons_in_module(&self, module_id: Uuid) -> StoreResult<i64>;
    async fn count_lessons_in_course(&self, course_id: Uuid) -> StoreResult<i64>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn enrollment(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<Option<Enrollment>>;
    /// Returns the enrollment and whether this call created it.
    async fn insert_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<(Enrollment, bool)>;
    async fn enrollments_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Enrollment>>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Atomic get-or-create plus update for `(user_id, lesson_id)`, following
    /// the stamping rule of [`Progress::set_completed`].
    async fn upsert_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        completed: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Progress>;
    async fn progress(&self, user_id: Uuid, lesson_id: Uuid) -> StoreResult<Option<Progress>>;
    async fn progress_for_lessons(
        &self,
        user_id: Uuid,
        lesson_ids: &[Uuid],
    ) -> StoreResult<Vec<Progress>>;
    async fn count_completed_in_module(&self, user_id: Uuid, module_id: Uuid) -> StoreResult<i64>;
    async fn count_completed_in_course(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<i64>;
}

#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Cart course ids in the order they were added.
    async fn cart_course_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>>;
    /// Appends one course to the cart. `false` when it was already there.
    async fn add_cart_item(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool>;
    /// `false` when the course was not in the cart.
    async fn remove_cart_item(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool>;
    /// Writes a paid order with its items, enrolls the user into every line's
    /// course and drops those courses from the cart. Cart rows for other
    /// courses are left alone. All of it or none of it.
    async fn place_order(&self, user_id: Uuid, lines: &[OrderLine]) -> StoreResult<OrderWithItems>;
    /// The `top` best selling courses, plus revenue and order count of paid
    /// orders placed at or after `since`.
    async fn sales_stats(&self, since: DateTime<Utc>, top: i64) -> StoreResult<SalesStats>;
    /// Newest first.
    async fn orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<OrderWithItems>>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Fails with `Conflict` when the user already reviewed the course.
    async fn insert_review(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        review: &NewReview,
    ) -> StoreResult<Review>;
    /// Newest first.
    async fn reviews_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Review>>;
    async fn has_reviewed(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait AssistantStore: Send + Sync {
    async fn create_assistant_category(&self, name: &str) -> StoreResult<AssistantCategory>;
    async fn create_assistant_question(
        &self,
        category_id: Uuid,
        question: &str,
        answer: &str,
    ) -> StoreResult<AssistantQuestion>;
    /// Sorted by name.
    async fn assistant_categories(&self) -> StoreResult<Vec<AssistantCategory>>;
    async fn assistant_questions(&self, category_id: Uuid) -> StoreResult<Vec<AssistantQuestion>>;
    async fn insert_support_request(&self, req: &NewSupportRequest) -> StoreResult<SupportRequest>;
}

pub trait Store:
    SessionStore
    + CatalogStore
    + EnrollmentStore
    + ProgressStore
    + CommerceStore
    + ReviewStore
    + AssistantStore
{
}

impl<T> Store for T where
    T: SessionStore
        + CatalogStore
        + EnrollmentStore
        + ProgressStore
        + CommerceStore
        + ReviewStore
        + AssistantStore
{
}

pub type SharedStore = Arc<dyn Store>;
