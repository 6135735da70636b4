//! Demo data for the in-memory backend, which otherwise starts with no user
//! to sign in as.

use anyhow::Result;
use chrono::{Duration, Utc};

use crate::{
    models::{Level, NewCourse, NewLesson, NewModule},
    store::Store,
};

const DEMO_SESSION_DAYS: i64 = 30;

/// Returns the bearer token of the seeded `demo` user.
pub async fn demo_data(store: &dyn Store) -> Result<String> {
    let author = store.create_user("instructor", true).await?;
    let learner = store.create_user("demo", false).await?;

    let category = store
        .create_category("Programming", "Languages and tooling")
        .await?;
    let course = store
        .create_course(
            author.id,
            &NewCourse {
                title: "Rust Basics".into(),
                description: "Ownership, borrowing and the standard library".into(),
                full_description: String::new(),
                price_cents: 4900,
                is_free: false,
                level: Level::Beginner,
                is_popular: true,
                is_published: true,
                category_id: Some(category.id),
                duration_hours: 12,
            },
        )
        .await?;

    for (m, title) in ["Getting started", "Ownership"].iter().enumerate() {
        let module = store
            .create_module(
                course.id,
                &NewModule {
                    title: title.to_string(),
                    description: String::new(),
                    order: m as i32 + 1,
                },
            )
            .await?;
        for l in 1..=3 {
            store
                .create_lesson(
                    module.id,
                    &NewLesson {
                        title: format!("{title}, part {l}"),
                        content: String::new(),
                        order: l,
                        duration_minutes: 20,
                        is_published: true,
                    },
                )
                .await?;
        }
    }

    let faq = store.create_assistant_category("Payments").await?;
    store
        .create_assistant_question(
            faq.id,
            "Where do I find my purchased courses?",
            "Every paid course appears under My enrollments right after checkout.",
        )
        .await?;

    let token = store
        .create_session(learner.id, Utc::now() + Duration::days(DEMO_SESSION_DAYS))
        .await?;
    tracing::info!(course_id = %course.id, "seeded demo catalog");
    Ok(token)
}
