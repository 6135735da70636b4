use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::{
    models::*,
    store::{CatalogStore, EnrollmentStore, MemoryStore, SessionStore, SharedStore},
};

/// A published course by `author` with modules and lessons laid out as
/// requested, plus a `learner` who is not enrolled yet.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub author: User,
    pub learner: User,
    pub course: Course,
    pub modules: Vec<Module>,
    pub lessons: Vec<Vec<Lesson>>,
}

pub fn course_request(title: &str, published: bool, price_cents: i64) -> NewCourse {
    NewCourse {
        title: title.to_string(),
        description: format!("{title} from scratch"),
        full_description: String::new(),
        price_cents,
        is_free: price_cents == 0,
        level: Level::Beginner,
        is_popular: false,
        is_published: published,
        category_id: None,
        duration_hours: 10,
    }
}

impl Fixture {
    /// `layout[i]` is the number of lessons in module `i + 1`.
    pub async fn with_layout(layout: &[usize]) -> Self {
        let store = Arc::new(MemoryStore::new());
        let author = store.create_user("author", false).await.unwrap();
        let learner = store.create_user("learner", false).await.unwrap();
        let course = store
            .create_course(author.id, &course_request("Rust Basics", true, 4900))
            .await
            .unwrap();

        let mut modules = Vec::new();
        let mut lessons = Vec::new();
        for (i, count) in layout.iter().enumerate() {
            let module = store
                .create_module(
                    course.id,
                    &NewModule {
                        title: format!("Module {}", i + 1),
                        description: String::new(),
                        order: i as i32 + 1,
                    },
                )
                .await
                .unwrap();
            let mut in_module = Vec::new();
            for j in 0..*count {
                let lesson = store
                    .create_lesson(
                        module.id,
                        &NewLesson {
                            title: format!("Lesson {}.{}", i + 1, j + 1),
                            content: String::new(),
                            order: j as i32 + 1,
                            duration_minutes: 15,
                            is_published: true,
                        },
                    )
                    .await
                    .unwrap();
                in_module.push(lesson);
            }
            modules.push(module);
            lessons.push(in_module);
        }

        Self {
            store,
            author,
            learner,
            course,
            modules,
            lessons,
        }
    }

    pub fn shared(&self) -> SharedStore {
        self.store.clone()
    }

    pub async fn enroll_learner(&self) {
        self.store
            .insert_enrollment(self.learner.id, self.course.id)
            .await
            .unwrap();
    }

    pub async fn add_enrolled_user(&self, username: &str) -> User {
        let user = self.store.create_user(username, false).await.unwrap();
        self.store.insert_enrollment(user.id, self.course.id).await.unwrap();
        user
    }

    pub async fn add_course(&self, title: &str, published: bool, price_cents: i64) -> Course {
        self.store
            .create_course(self.author.id, &course_request(title, published, price_cents))
            .await
            .unwrap()
    }

    pub async fn token_for(&self, user: &User) -> String {
        self.store
            .create_session(user.id, Utc::now() + Duration::hours(1))
            .await
            .unwrap()
    }
}
