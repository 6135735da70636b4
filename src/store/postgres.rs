use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, query_scalar, Postgres, QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use super::*;
use crate::db::Db;

const COURSE_COLUMNS: &str = "c.id, c.title, c.description, c.full_description, c.price_cents, \
    c.is_free, c.level, c.is_popular, c.is_published, c.author_id, c.category_id, \
    c.duration_hours, c.created_at, c.updated_at";

const MODULE_COLUMNS: &str = "id, course_id, title, description, position, created_at";

const LESSON_COLUMNS: &str =
    "id, module_id, title, content, position, duration_minutes, is_published, created_at";

const PROGRESS_COLUMNS: &str =
    "id, user_id, lesson_id, completed, completed_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

/// Turns constraint violations into domain errors; everything else stays a
/// database error.
fn classify(e: sqlx::Error, conflict: &str, missing: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict(conflict.to_string());
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound(missing.to_string());
        }
    }
    StoreError::Database(e)
}

fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_user(&self, username: &str, is_staff: bool) -> StoreResult<User> {
        query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, is_staff)
            VALUES ($1,$2,$3)
            RETURNING id, username, is_staff, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(is_staff)
        .fetch_one(&self.db)
        .await
        .map_err(|e| classify(e, &format!("username {username} is taken"), "user"))
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<String> {
        let token = Uuid::new_v4().simple().to_string();
        query("INSERT INTO user_sessions (token, user_id, expires_at) VALUES ($1,$2,$3)")
            .bind(&token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.db)
            .await
            .map_err(|e| classify(e, "session token collision", "user"))?;
        Ok(token)
    }

    async fn user_for_token(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        Ok(query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.is_staff, u.created_at
            FROM user_sessions s JOIN users u ON u.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > $2
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.db)
        .await?)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn create_category(&self, name: &str, description: &str) -> StoreResult<Category> {
        Ok(query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, name, description)
            VALUES ($1,$2,$3)
            RETURNING id, name, description
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .fetch_one(&self.db)
        .await?)
    }

    async fn categories(&self) -> StoreResult<Vec<Category>> {
        Ok(query_as::<_, Category>("SELECT id, name, description FROM categories ORDER BY name")
            .fetch_all(&self.db)
            .await?)
    }

    async fn published_counts_by_category(&self) -> StoreResult<Vec<(Uuid, i64)>> {
        Ok(query_as::<_, (Uuid, i64)>(
            r#"
            SELECT category_id, COUNT(*) FROM courses
            WHERE is_published AND category_id IS NOT NULL
            GROUP BY category_id
            "#,
        )
        .fetch_all(&self.db)
        .await?)
    }

    async fn create_course(&self, author_id: Uuid, new: &NewCourse) -> StoreResult<Course> {
        let sql = format!(
            r#"
            INSERT INTO courses AS c (id, title, description, full_description, price_cents,
                                      is_free, level, is_popular, is_published, author_id,
                                      category_id, duration_hours)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
            RETURNING {COURSE_COLUMNS}
            "#
        );
        query_as::<_, Course>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.full_description)
            .bind(new.price_cents)
            .bind(new.is_free)
            .bind(new.level.as_str())
            .bind(new.is_popular)
            .bind(new.is_published)
            .bind(author_id)
            .bind(new.category_id)
            .bind(new.duration_hours)
            .fetch_one(&self.db)
            .await
            .map_err(|e| classify(e, "course already exists", "author or category"))
    }

    async fn course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses c WHERE c.id=$1");
        Ok(query_as::<_, Course>(&sql).bind(id).fetch_optional(&self.db).await?)
    }

    async fn courses_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Course>> {
        let sql = format!("SELECT {COURSE_COLUMNS} FROM courses c WHERE c.id = ANY($1)");
        let rows = query_as::<_, Course>(&sql)
            .bind(ids)
            .fetch_all(&self.db)
            .await?;
        // keep the caller's ordering
        let mut by_id: HashMap<Uuid, Course> = rows.into_iter().map(|c| (c.id, c)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn published_courses(&self, filter: &CourseFilter) -> StoreResult<Vec<Course>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COURSE_COLUMNS} FROM courses c JOIN users u ON u.id = c.author_id \
             WHERE c.is_published"
        ));
        if let Some(category_id) = filter.category_id {
            qb.push(" AND c.category_id = ").push_bind(category_id);
        }
        if let Some(level) = filter.level {
            qb.push(" AND c.level = ").push_bind(level.as_str());
        }
        if filter.free_only {
            qb.push(" AND c.is_free");
        }
        if let Some(search) = filter.search.as_deref() {
            let pattern = like_pattern(search);
            qb.push(" AND (c.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR c.description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR u.username ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY c.created_at DESC");
        Ok(qb.build_query_as::<Course>().fetch_all(&self.db).await?)
    }

    async fn published_courses_matching_direction(
        &self,
        needle: Option<&str>,
        level: Option<Level>,
        free_only: bool,
        limit: i64,
    ) -> StoreResult<Vec<Course>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {COURSE_COLUMNS} FROM courses c \
             LEFT JOIN categories cat ON cat.id = c.category_id WHERE c.is_published"
        ));
        if let Some(level) = level {
            qb.push(" AND c.level = ").push_bind(level.as_str());
        }
        if free_only {
            qb.push(" AND c.is_free");
        }
        if let Some(needle) = needle {
            let pattern = like_pattern(needle);
            qb.push(" AND (c.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR cat.name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY c.created_at DESC LIMIT ").push_bind(limit);
        Ok(qb.build_query_as::<Course>().fetch_all(&self.db).await?)
    }

    async fn update_course(&self, course: &Course) -> StoreResult<Course> {
        let sql = format!(
            r#"
            UPDATE courses AS c
            SET title=$2, description=$3, category_id=$4, duration_hours=$5, is_published=$6,
                updated_at=now()
            WHERE c.id=$1
            RETURNING {COURSE_COLUMNS}
            "#
        );
        query_as::<_, Course>(&sql)
            .bind(course.id)
            .bind(&course.title)
            .bind(&course.description)
            .bind(course.category_id)
            .bind(course.duration_hours)
            .bind(course.is_published)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| classify(e, "course already exists", "category"))?
            .ok_or_else(|| StoreError::NotFound("course".into()))
    }

    async fn delete_course(&self, id: Uuid) -> StoreResult<()> {
        // order_items restrict the delete; everything else cascades
        let done = query("DELETE FROM courses WHERE id=$1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| match classify(e, "course", "course") {
                StoreError::NotFound(_) => {
                    StoreError::Conflict("course has been sold and cannot be deleted".into())
                }
                other => other,
            })?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound("course".into()));
        }
        Ok(())
    }

    async fn courses_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Course>> {
        let sql = format!(
            "SELECT {COURSE_COLUMNS} FROM courses c WHERE c.author_id=$1 ORDER BY c.created_at DESC"
        );
        Ok(query_as::<_, Course>(&sql)
            .bind(author_id)
            .fetch_all(&self.db)
            .await?)
    }

    async fn create_module(&self, course_id: Uuid, new: &NewModule) -> StoreResult<Module> {
        query_as::<_, Module>(
            r#"
            INSERT INTO modules (id, course_id, title, description, position)
            VALUES ($1,$2,$3,$4,$5)
            RETURNING id, course_id, title, description, position, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.order)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            classify(
                e,
                &format!("a module with order {} already exists in this course", new.order),
                "course",
            )
        })
    }

    async fn module(&self, id: Uuid) -> StoreResult<Option<Module>> {
        let sql = format!("SELECT {MODULE_COLUMNS} FROM modules WHERE id=$1");
        Ok(query_as::<_, Module>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn modules_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Module>> {
        let sql = format!(
            "SELECT {MODULE_COLUMNS} FROM modules WHERE course_id=$1 ORDER BY position, created_at"
        );
        Ok(query_as::<_, Module>(&sql)
            .bind(course_id)
            .fetch_all(&self.db)
            .await?)
    }

    async fn update_module(&self, module: &Module) -> StoreResult<Module> {
        let sql = format!(
            "UPDATE modules SET title=$2, description=$3, position=$4 WHERE id=$1 \
             RETURNING {MODULE_COLUMNS}"
        );
        query_as::<_, Module>(&sql)
            .bind(module.id)
            .bind(&module.title)
            .bind(&module.description)
            .bind(module.position)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| {
                classify(
                    e,
                    &format!(
                        "a module with order {} already exists in this course",
                        module.position
                    ),
                    "course",
                )
            })?
            .ok_or_else(|| StoreError::NotFound("module".into()))
    }

    async fn delete_module(&self, id: Uuid) -> StoreResult<()> {
        let done = query("DELETE FROM modules WHERE id=$1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound("module".into()));
        }
        Ok(())
    }

    async fn create_lesson(&self, module_id: Uuid, new: &NewLesson) -> StoreResult<Lesson> {
        let sql = format!(
            r#"
            INSERT INTO lessons (id, module_id, title, content, position, duration_minutes,
                                 is_published)
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            RETURNING {LESSON_COLUMNS}
            "#
        );
        query_as::<_, Lesson>(&sql)
            .bind(Uuid::new_v4())
            .bind(module_id)
            .bind(&new.title)
            .bind(&new.content)
            .bind(new.order)
            .bind(new.duration_minutes)
            .bind(new.is_published)
            .fetch_one(&self.db)
            .await
            .map_err(|e| {
                classify(
                    e,
                    &format!("a lesson with order {} already exists in this module", new.order),
                    "module",
                )
            })
    }

    async fn update_lesson(&self, lesson: &Lesson) -> StoreResult<Lesson> {
        let sql = format!(
            r#"
            UPDATE lessons
            SET title=$2, content=$3, position=$4, duration_minutes=$5, is_published=$6
            WHERE id=$1
            RETURNING {LESSON_COLUMNS}
            "#
        );
        query_as::<_, Lesson>(&sql)
            .bind(lesson.id)
            .bind(&lesson.title)
            .bind(&lesson.content)
            .bind(lesson.position)
            .bind(lesson.duration_minutes)
            .bind(lesson.is_published)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| {
                classify(
                    e,
                    &format!(
                        "a lesson with order {} already exists in this module",
                        lesson.position
                    ),
                    "module",
                )
            })?
            .ok_or_else(|| StoreError::NotFound("lesson".into()))
    }

    async fn lesson(&self, id: Uuid) -> StoreResult<Option<Lesson>> {
        let sql = format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE id=$1");
        Ok(query_as::<_, Lesson>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn lessons_for_module(&self, module_id: Uuid) -> StoreResult<Vec<Lesson>> {
        let sql = format!(
            "SELECT {LESSON_COLUMNS} FROM lessons WHERE module_id=$1 ORDER BY position, created_at"
        );
        Ok(query_as::<_, Lesson>(&sql)
            .bind(module_id)
            .fetch_all(&self.db)
            .await?)
    }

    async fn count_lessons_in_module(&self, module_id: Uuid) -> StoreResult<i64> {
        Ok(query_scalar::<_, i64>("SELECT COUNT(*) FROM lessons WHERE module_id=$1")
            .bind(module_id)
            .fetch_one(&self.db)
            .await?)
    }

    async fn count_lessons_in_course(&self, course_id: Uuid) -> StoreResult<i64> {
        Ok(query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM lessons l JOIN modules m ON m.id = l.module_id
            WHERE m.course_id=$1
            "#,
        )
        .bind(course_id)
        .fetch_one(&self.db)
        .await?)
    }
}

#[async_trait]
impl EnrollmentStore for PgStore {
    async fn enrollment(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<Option<Enrollment>> {
        Ok(query_as::<_, Enrollment>(
            r#"
            SELECT id, user_id, course_id, enrolled_at, completed
            FROM enrollments WHERE user_id=$1 AND course_id=$2
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.db)
        .await?)
    }

    async fn insert_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<(Enrollment, bool)> {
        let inserted = query_as::<_, Enrollment>(
            r#"
            INSERT INTO enrollments (id, user_id, course_id)
            VALUES ($1,$2,$3)
            ON CONFLICT (user_id, course_id) DO NOTHING
            RETURNING id, user_id, course_id, enrolled_at, completed
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| classify(e, "already enrolled", "course"))?;

        if let Some(e) = inserted {
            return Ok((e, true));
        }
        let existing = self
            .enrollment(user_id, course_id)
            .await?
            .ok_or_else(|| StoreError::Integrity("enrollment vanished after conflict".into()))?;
        Ok((existing, false))
    }

    async fn enrollments_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        Ok(query_as::<_, Enrollment>(
            r#"
            SELECT id, user_id, course_id, enrolled_at, completed
            FROM enrollments WHERE user_id=$1 ORDER BY enrolled_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?)
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn upsert_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        completed: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Progress> {
        // The completed_at rule mirrors Progress::set_completed.
        let sql = format!(
            r#"
            INSERT INTO progress (id, user_id, lesson_id, completed, completed_at, created_at,
                                  updated_at)
            VALUES ($1, $2, $3, $4, CASE WHEN $4 THEN $5::timestamptz ELSE NULL END, $5, $5)
            ON CONFLICT (user_id, lesson_id) DO UPDATE SET
                completed = EXCLUDED.completed,
                completed_at = CASE
                    WHEN EXCLUDED.completed
                        THEN COALESCE(progress.completed_at, EXCLUDED.updated_at)
                    ELSE NULL
                END,
                updated_at = EXCLUDED.updated_at
            RETURNING {PROGRESS_COLUMNS}
            "#
        );
        query_as::<_, Progress>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(lesson_id)
            .bind(completed)
            .bind(now)
            .fetch_one(&self.db)
            .await
            .map_err(|e| classify(e, "concurrent progress write", "lesson"))
    }

    async fn progress(&self, user_id: Uuid, lesson_id: Uuid) -> StoreResult<Option<Progress>> {
        let sql =
            format!("SELECT {PROGRESS_COLUMNS} FROM progress WHERE user_id=$1 AND lesson_id=$2");
        Ok(query_as::<_, Progress>(&sql)
            .bind(user_id)
            .bind(lesson_id)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn progress_for_lessons(
        &self,
        user_id: Uuid,
        lesson_ids: &[Uuid],
    ) -> StoreResult<Vec<Progress>> {
        let sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM progress WHERE user_id=$1 AND lesson_id = ANY($2)"
        );
        Ok(query_as::<_, Progress>(&sql)
            .bind(user_id)
            .bind(lesson_ids)
            .fetch_all(&self.db)
            .await?)
    }

    async fn count_completed_in_module(&self, user_id: Uuid, module_id: Uuid) -> StoreResult<i64> {
        Ok(query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM progress p JOIN lessons l ON l.id = p.lesson_id
            WHERE p.user_id=$1 AND l.module_id=$2 AND p.completed
            "#,
        )
        .bind(user_id)
        .bind(module_id)
        .fetch_one(&self.db)
        .await?)
    }

    async fn count_completed_in_course(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<i64> {
        Ok(query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM progress p
            JOIN lessons l ON l.id = p.lesson_id
            JOIN modules m ON m.id = l.module_id
            WHERE p.user_id=$1 AND m.course_id=$2 AND p.completed
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.db)
        .await?)
    }
}

#[async_trait]
impl CommerceStore for PgStore {
    async fn cart_course_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(query_scalar::<_, Uuid>(
            "SELECT course_id FROM cart_items WHERE user_id=$1 ORDER BY position",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn add_cart_item(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool> {
        let done = query(
            r#"
            INSERT INTO cart_items (user_id, course_id)
            VALUES ($1,$2)
            ON CONFLICT (user_id, course_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .execute(&self.db)
        .await
        .map_err(|e| classify(e, "course already in cart", "course"))?;
        Ok(done.rows_affected() == 1)
    }

    async fn remove_cart_item(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool> {
        let done = query("DELETE FROM cart_items WHERE user_id=$1 AND course_id=$2")
            .bind(user_id)
            .bind(course_id)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn place_order(&self, user_id: Uuid, lines: &[OrderLine]) -> StoreResult<OrderWithItems> {
        let mut tx = self.db.begin().await?;

        let order = query_as::<_, Order>(
            r#"
            INSERT INTO orders (id, user_id, status)
            VALUES ($1,$2,$3)
            RETURNING id, user_id, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(OrderStatus::Paid.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = query_as::<_, OrderItem>(
                r#"
                INSERT INTO order_items (id, order_id, course_id, price_cents)
                VALUES ($1,$2,$3,$4)
                RETURNING id, order_id, course_id, price_cents
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(line.course_id)
            .bind(line.price_cents)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match classify(e, "duplicate order line", "course") {
                StoreError::NotFound(_) => StoreError::Integrity(format!(
                    "order line references unknown course {}",
                    line.course_id
                )),
                other => other,
            })?;
            items.push(item);

            query(
                r#"
                INSERT INTO enrollments (id, user_id, course_id)
                VALUES ($1,$2,$3)
                ON CONFLICT (user_id, course_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(line.course_id)
            .execute(&mut *tx)
            .await?;
        }

        // rows added while the order was being priced stay in the cart
        let bought: Vec<Uuid> = lines.iter().map(|l| l.course_id).collect();
        query("DELETE FROM cart_items WHERE user_id=$1 AND course_id = ANY($2)")
            .bind(user_id)
            .bind(&bought)
            .execute(&mut *tx)
            .await?;

        // dropping tx before this point rolls everything back
        tx.commit().await?;
        Ok(OrderWithItems { order, items })
    }

    async fn sales_stats(&self, since: DateTime<Utc>, top: i64) -> StoreResult<SalesStats> {
        let top_courses = query_as::<_, TopCourse>(
            r#"
            SELECT c.id AS course_id, c.title, COUNT(oi.id) AS sold
            FROM courses c LEFT JOIN order_items oi ON oi.course_id = c.id
            GROUP BY c.id, c.title
            ORDER BY sold DESC, c.title
            LIMIT $1
            "#,
        )
        .bind(top)
        .fetch_all(&self.db)
        .await?;

        let (revenue_cents, paid_orders) = query_as::<_, (i64, i64)>(
            r#"
            SELECT COALESCE(SUM(oi.price_cents), 0)::BIGINT, COUNT(DISTINCT o.id)
            FROM orders o LEFT JOIN order_items oi ON oi.order_id = o.id
            WHERE o.status=$1 AND o.created_at >= $2
            "#,
        )
        .bind(OrderStatus::Paid.as_str())
        .bind(since)
        .fetch_one(&self.db)
        .await?;

        Ok(SalesStats {
            top_courses,
            revenue_cents,
            paid_orders,
        })
    }

    async fn orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<OrderWithItems>> {
        let orders = query_as::<_, Order>(
            r#"
            SELECT id, user_id, status, created_at FROM orders
            WHERE user_id=$1 ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = query_as::<_, OrderItem>(
            "SELECT id, order_id, course_id, price_cents FROM order_items WHERE order_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(orders
            .into_iter()
            .map(|order| OrderWithItems {
                items: grouped.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn insert_review(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        review: &NewReview,
    ) -> StoreResult<Review> {
        query_as::<_, Review>(
            r#"
            INSERT INTO reviews (id, course_id, user_id, rating, text)
            VALUES ($1,$2,$3,$4,$5)
            RETURNING id, course_id, user_id, rating, text, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(user_id)
        .bind(review.rating)
        .bind(&review.text)
        .fetch_one(&self.db)
        .await
        .map_err(|e| classify(e, "you have already reviewed this course", "course"))
    }

    async fn reviews_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Review>> {
        Ok(query_as::<_, Review>(
            r#"
            SELECT id, course_id, user_id, rating, text, created_at, updated_at
            FROM reviews WHERE course_id=$1 ORDER BY created_at DESC
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn has_reviewed(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool> {
        Ok(query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE user_id=$1 AND course_id=$2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.db)
        .await?)
    }
}

#[async_trait]
impl AssistantStore for PgStore {
    async fn create_assistant_category(&self, name: &str) -> StoreResult<AssistantCategory> {
        Ok(query_as::<_, AssistantCategory>(
            "INSERT INTO assistant_categories (id, name) VALUES ($1,$2) RETURNING id, name",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.db)
        .await?)
    }

    async fn create_assistant_question(
        &self,
        category_id: Uuid,
        question: &str,
        answer: &str,
    ) -> StoreResult<AssistantQuestion> {
        query_as::<_, AssistantQuestion>(
            r#"
            INSERT INTO assistant_questions (id, category_id, question, answer)
            VALUES ($1,$2,$3,$4)
            RETURNING id, category_id, question, answer
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(category_id)
        .bind(question)
        .bind(answer)
        .fetch_one(&self.db)
        .await
        .map_err(|e| classify(e, "duplicate question", "assistant category"))
    }

    async fn assistant_categories(&self) -> StoreResult<Vec<AssistantCategory>> {
        Ok(query_as::<_, AssistantCategory>(
            "SELECT id, name FROM assistant_categories ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?)
    }

    async fn assistant_questions(&self, category_id: Uuid) -> StoreResult<Vec<AssistantQuestion>> {
        Ok(query_as::<_, AssistantQuestion>(
            r#"
            SELECT id, category_id, question, answer FROM assistant_questions
            WHERE category_id=$1
            "#,
        )
        .bind(category_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn insert_support_request(&self, req: &NewSupportRequest) -> StoreResult<SupportRequest> {
        Ok(query_as::<_, SupportRequest>(
            r#"
            INSERT INTO support_requests (id, name, contact, message)
            VALUES ($1,$2,$3,$4)
            RETURNING id, name, contact, message, processed, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(&req.contact)
        .bind(&req.message)
        .fetch_one(&self.db)
        .await?)
    }
}
