use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{NewReview, Review},
    store::Store,
};

const MIN_TEXT_CHARS: usize = 10;
const MAX_TEXT_CHARS: usize = 1000;
const FORBIDDEN_WORDS: [&str; 4] = ["spam", "advert", "buy", "sell"];

pub fn validate(review: &NewReview) -> AppResult<()> {
    if !(1..=5).contains(&review.rating) {
        return Err(AppError::validation("rating must be between 1 and 5"));
    }
    if review.text.trim().chars().count() < MIN_TEXT_CHARS {
        return Err(AppError::validation(format!(
            "review must be at least {MIN_TEXT_CHARS} characters"
        )));
    }
    if review.text.chars().count() > MAX_TEXT_CHARS {
        return Err(AppError::validation(format!(
            "review must not exceed {MAX_TEXT_CHARS} characters"
        )));
    }
    let lowered = review.text.to_lowercase();
    if let Some(word) = FORBIDDEN_WORDS.iter().find(|w| lowered.contains(*w)) {
        return Err(AppError::validation(format!("review contains a forbidden word: \"{word}\"")));
    }
    Ok(())
}

/// One review per user and course.
pub async fn add_review(
    store: &dyn Store,
    user_id: Uuid,
    course_id: Uuid,
    review: &NewReview,
) -> AppResult<Review> {
    if store.course(course_id).await?.is_none() {
        return Err(AppError::not_found("course not found"));
    }
    validate(review)?;
    let saved = store.insert_review(user_id, course_id, review).await?;
    tracing::info!(%user_id, %course_id, rating = saved.rating, "review added");
    Ok(saved)
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ReviewSummary {
    pub review_count: usize,
    /// Mean rating rounded to one decimal, absent without reviews.
    pub average_rating: Option<f64>,
}

impl ReviewSummary {
    pub fn of(reviews: &[Review]) -> Self {
        let review_count = reviews.len();
        let average_rating = (review_count > 0).then(|| {
            let sum: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
            let mean = sum as f64 / review_count as f64;
            (mean * 10.0).round() / 10.0
        });
        Self {
            review_count,
            average_rating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use chrono::Utc;

    fn review(rating: i32, text: &str) -> NewReview {
        NewReview {
            rating,
            text: text.to_string(),
        }
    }

    #[test]
    fn validation_rules() {
        assert!(validate(&review(5, "Clear explanations throughout")).is_ok());
        assert!(validate(&review(0, "Clear explanations throughout")).is_err());
        assert!(validate(&review(6, "Clear explanations throughout")).is_err());
        assert!(validate(&review(4, "   short    ")).is_err());
        assert!(validate(&review(4, &"a".repeat(1001))).is_err());
        assert!(validate(&review(4, "Great course, BUY it now")).is_err());
    }

    #[test]
    fn summary_rounds_to_one_decimal() {
        let make = |rating| Review {
            id: Uuid::new_v4(),
            course_id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            rating,
            text: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let s = ReviewSummary::of(&[make(5), make(4), make(4)]);
        assert_eq!(s.review_count, 3);
        assert_eq!(s.average_rating, Some(4.3));
        assert_eq!(ReviewSummary::of(&[]).average_rating, None);
    }

    #[tokio::test]
    async fn second_review_conflicts() {
        let fx = Fixture::with_layout(&[1]).await;
        let r = review(5, "Loved every single lesson");
        add_review(fx.store.as_ref(), fx.learner.id, fx.course.id, &r).await.unwrap();
        let err = add_review(fx.store.as_ref(), fx.learner.id, fx.course.id, &r)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let fx = Fixture::with_layout(&[1]).await;
        let r = review(5, "Loved every single lesson");
        let err = add_review(fx.store.as_ref(), fx.learner.id, Uuid::new_v4(), &r)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
