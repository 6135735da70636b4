use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub full_description: String,
    pub price_cents: i64,
    pub is_free: bool,
    pub level: String,
    pub is_popular: bool,
    pub is_published: bool,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub duration_hours: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Price charged at checkout right now.
    pub fn effective_price_cents(&self) -> i64 {
        if self.is_free {
            0
        } else {
            self.price_cents
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: String,
    // `order` is reserved in SQL
    #[serde(rename = "order")]
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Lesson {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(rename = "order")]
    pub position: i32,
    pub duration_minutes: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
    pub completed: bool,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Progress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lesson_id: Uuid,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Progress {
    pub fn new(user_id: Uuid, lesson_id: Uuid, completed: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            lesson_id,
            completed,
            completed_at: completed.then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the completion flag. A first completion stamps `completed_at`;
    /// repeating a completion keeps the original stamp; clearing the flag
    /// always clears the stamp.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = if completed {
            self.completed_at.or(Some(now))
        } else {
            None
        };
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Middle,
    Advanced,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Middle => "middle",
            Level::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Level::Beginner),
            "middle" => Ok(Level::Middle),
            "advanced" => Ok(Level::Advanced),
            other => Err(format!("unknown level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    Paid,
    Delivering,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Paid => "paid",
            OrderStatus::Delivering => "delivering",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(OrderStatus::New),
            "paid" => Ok(OrderStatus::Paid),
            "delivering" => Ok(OrderStatus::Delivering),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub course_id: Uuid,
    pub price_cents: i64,
}

/// A line to be written by checkout, priced at the moment of purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub course_id: Uuid,
    pub price_cents: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderWithItems {
    pub fn total_cents(&self) -> i64 {
        self.items.iter().map(|i| i.price_cents).sum()
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TopCourse {
    pub course_id: Uuid,
    pub title: String,
    pub sold: i64,
}

/// Sales figures for staff. Revenue and order count cover paid orders since
/// the window start; `top_courses` counts every item ever sold.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SalesStats {
    pub top_courses: Vec<TopCourse>,
    pub revenue_cents: i64,
    pub paid_orders: i64,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Review {
    pub id: Uuid,
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AssistantCategory {
    pub id: Uuid,
    pub name: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AssistantQuestion {
    pub id: Uuid,
    pub category_id: Uuid,
    pub question: String,
    pub answer: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SupportRequest {
    pub id: Uuid,
    pub name: String,
    pub contact: String,
    pub message: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

// --- request bodies ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub full_description: String,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default = "default_level")]
    pub level: Level,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default = "default_true")]
    pub is_published: bool,
    pub category_id: Option<Uuid>,
    #[serde(default = "default_duration_hours")]
    pub duration_hours: i32,
}

fn default_level() -> Level {
    Level::Beginner
}

fn default_true() -> bool {
    true
}

fn default_duration_hours() -> i32 {
    10
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewModule {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewLesson {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub order: i32,
    #[serde(default)]
    pub duration_minutes: i32,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

/// Partial edit of a course. Absent fields keep their value.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub duration_hours: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ModuleUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub order: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub order: Option<i32>,
    pub duration_minutes: Option<i32>,
    pub is_published: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewReview {
    pub rating: i32,
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewSupportRequest {
    pub name: String,
    pub contact: String,
    pub message: String,
}
