//! Content management for course authors. Only the author may change a
//! course or anything in it, and nested ids must belong to the parent ids
//! given in the path.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    catalog::{find_course, find_module},
    error::{AppError, AppResult},
    models::*,
    store::Store,
};

pub async fn create_course(
    store: &dyn Store,
    author: &User,
    new: &NewCourse,
) -> AppResult<Course> {
    require_title(&new.title)?;
    require_text(&new.description, "description")?;
    if new.price_cents < 0 {
        return Err(AppError::validation("price must not be negative"));
    }
    require_non_negative(new.duration_hours)?;
    let course = store.create_course(author.id, new).await?;
    tracing::info!(course_id = %course.id, author_id = %author.id, "course created");
    Ok(course)
}

pub async fn update_course(
    store: &dyn Store,
    user: &User,
    course_id: Uuid,
    edit: &CourseUpdate,
) -> AppResult<Course> {
    let mut course = find_course(store, course_id).await?;
    require_author(&course, user)?;
    if let Some(title) = &edit.title {
        require_title(title)?;
        course.title = title.clone();
    }
    if let Some(description) = &edit.description {
        require_text(description, "description")?;
        course.description = description.clone();
    }
    if let Some(category_id) = edit.category_id {
        course.category_id = Some(category_id);
    }
    if let Some(hours) = edit.duration_hours {
        require_non_negative(hours)?;
        course.duration_hours = hours;
    }
    if let Some(published) = edit.is_published {
        course.is_published = published;
    }
    let course = store.update_course(&course).await?;
    tracing::info!(%course_id, "course updated");
    Ok(course)
}

pub async fn delete_course(store: &dyn Store, user: &User, course_id: Uuid) -> AppResult<()> {
    let course = find_course(store, course_id).await?;
    require_author(&course, user)?;
    store.delete_course(course.id).await?;
    tracing::info!(%course_id, "course deleted");
    Ok(())
}

pub async fn create_module(
    store: &dyn Store,
    user: &User,
    course_id: Uuid,
    new: &NewModule,
) -> AppResult<Module> {
    let course = find_course(store, course_id).await?;
    require_author(&course, user)?;
    require_title(&new.title)?;
    require_order(new.order)?;
    let module = store.create_module(course.id, new).await?;
    tracing::info!(module_id = %module.id, %course_id, "module created");
    Ok(module)
}

pub async fn update_module(
    store: &dyn Store,
    user: &User,
    course_id: Uuid,
    module_id: Uuid,
    edit: &ModuleUpdate,
) -> AppResult<Module> {
    let course = find_course(store, course_id).await?;
    let mut module = find_module(store, course_id, module_id).await?;
    require_author(&course, user)?;
    if let Some(title) = &edit.title {
        require_title(title)?;
        module.title = title.clone();
    }
    if let Some(description) = &edit.description {
        module.description = description.clone();
    }
    if let Some(order) = edit.order {
        require_order(order)?;
        module.position = order;
    }
    let module = store.update_module(&module).await?;
    tracing::info!(%module_id, %course_id, "module updated");
    Ok(module)
}

pub async fn delete_module(
    store: &dyn Store,
    user: &User,
    course_id: Uuid,
    module_id: Uuid,
) -> AppResult<()> {
    let course = find_course(store, course_id).await?;
    let module = find_module(store, course_id, module_id).await?;
    require_author(&course, user)?;
    store.delete_module(module.id).await?;
    tracing::info!(%module_id, %course_id, "module deleted");
    Ok(())
}

pub async fn create_lesson(
    store: &dyn Store,
    user: &User,
    course_id: Uuid,
    module_id: Uuid,
    new: &NewLesson,
) -> AppResult<Lesson> {
    let course = find_course(store, course_id).await?;
    let module = find_module(store, course_id, module_id).await?;
    require_author(&course, user)?;
    require_title(&new.title)?;
    require_order(new.order)?;
    require_non_negative(new.duration_minutes)?;
    let lesson = store.create_lesson(module.id, new).await?;
    tracing::info!(lesson_id = %lesson.id, %module_id, "lesson created");
    Ok(lesson)
}

pub async fn update_lesson(
    store: &dyn Store,
    user: &User,
    course_id: Uuid,
    module_id: Uuid,
    lesson_id: Uuid,
    edit: &LessonUpdate,
) -> AppResult<Lesson> {
    let course = find_course(store, course_id).await?;
    let module = find_module(store, course_id, module_id).await?;
    let mut lesson = store
        .lesson(lesson_id)
        .await?
        .filter(|l| l.module_id == module.id)
        .ok_or_else(|| AppError::not_found("lesson not found"))?;
    require_author(&course, user)?;
    if let Some(title) = &edit.title {
        require_title(title)?;
        lesson.title = title.clone();
    }
    if let Some(content) = &edit.content {
        lesson.content = content.clone();
    }
    if let Some(order) = edit.order {
        require_order(order)?;
        lesson.position = order;
    }
    if let Some(minutes) = edit.duration_minutes {
        require_non_negative(minutes)?;
        lesson.duration_minutes = minutes;
    }
    if let Some(published) = edit.is_published {
        lesson.is_published = published;
    }
    let lesson = store.update_lesson(&lesson).await?;
    tracing::info!(%lesson_id, %module_id, "lesson updated");
    Ok(lesson)
}

/// What an author sees about their own courses, drafts included.
#[derive(Serialize, Debug, Clone)]
pub struct AuthorDashboard {
    pub courses: Vec<Course>,
    pub total_count: usize,
    pub published_count: usize,
    pub draft_count: usize,
    pub total_hours: i64,
    /// One decimal place.
    pub avg_hours: f64,
    /// Truncated.
    pub published_percent: i64,
    pub latest_course: Option<Course>,
}

pub async fn dashboard(store: &dyn Store, author: &User) -> AppResult<AuthorDashboard> {
    let courses = store.courses_by_author(author.id).await?;
    let total_count = courses.len();
    let published_count = courses.iter().filter(|c| c.is_published).count();
    let total_hours: i64 = courses.iter().map(|c| i64::from(c.duration_hours)).sum();
    let (avg_hours, published_percent) = if total_count == 0 {
        (0.0, 0)
    } else {
        let avg = total_hours as f64 / total_count as f64;
        (
            (avg * 10.0).round() / 10.0,
            (published_count * 100 / total_count) as i64,
        )
    };
    Ok(AuthorDashboard {
        latest_course: courses.first().cloned(),
        total_count,
        published_count,
        draft_count: total_count - published_count,
        total_hours,
        avg_hours,
        published_percent,
        courses,
    })
}

fn require_author(course: &Course, user: &User) -> AppResult<()> {
    if course.author_id != user.id {
        tracing::warn!(user_id = %user.id, course_id = %course.id, "edit denied: not the author");
        return Err(AppError::forbidden("only the course author can change its content"));
    }
    Ok(())
}

fn require_title(title: &str) -> AppResult<()> {
    require_text(title, "title")
}

fn require_text(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn require_order(order: i32) -> AppResult<()> {
    if order < 1 {
        return Err(AppError::validation("order must be a positive number"));
    }
    Ok(())
}

fn require_non_negative(duration: i32) -> AppResult<()> {
    if duration < 0 {
        return Err(AppError::validation("duration must not be negative"));
    }
    Ok(())
}
