use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};
use uuid::Uuid;

use crate::{
    enrollment::EnrollmentGate,
    error::{AppError, AppResult},
    models::*,
    progress::{LessonProgress, ProgressLedger, Rollup},
    reviews::ReviewSummary,
    store::{CourseFilter, Store},
};

pub const PAGE_SIZE: usize = 9;
const SIMILAR_COURSES: usize = 3;
const RECOMMENDATIONS: i64 = 5;
const FEATURED_COURSES: usize = 3;

/// Query string of the course listing. `"all"` is the same as leaving a
/// filter out.
#[serde_as]
#[derive(Deserialize, Debug, Default, Clone)]
pub struct CourseListQuery {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub category: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub level: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub free: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub search: Option<String>,
    pub page: Option<usize>,
}

impl CourseListQuery {
    pub fn to_filter(&self) -> AppResult<CourseFilter> {
        let category_id = match self.category.as_deref() {
            None | Some("all") => None,
            Some(raw) => Some(
                raw.parse::<Uuid>()
                    .map_err(|_| AppError::bad_request("invalid category id"))?,
            ),
        };
        Ok(CourseFilter {
            category_id,
            level: parse_level(self.level.as_deref())?,
            free_only: self.free.as_deref() == Some("on"),
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }
}

fn parse_level(raw: Option<&str>) -> AppResult<Option<Level>> {
    match raw {
        None | Some("all") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(AppError::BadRequest),
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct CategoryCount {
    pub category: Category,
    pub count: i64,
}

#[derive(Serialize, Debug, Clone)]
pub struct CoursePage {
    pub courses: Vec<Course>,
    pub page: usize,
    pub total_pages: usize,
    pub total_count: usize,
    pub categories: Vec<CategoryCount>,
}

pub async fn list_courses(store: &dyn Store, query: &CourseListQuery) -> AppResult<CoursePage> {
    let filter = query.to_filter()?;
    let all = store.published_courses(&filter).await?;
    let total_count = all.len();
    let total_pages = total_count.div_ceil(PAGE_SIZE).max(1);
    let page = query.page.unwrap_or(1).clamp(1, total_pages);
    let courses = all
        .into_iter()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .collect();

    let counts = store.published_counts_by_category().await?;
    let categories = store
        .categories()
        .await?
        .into_iter()
        .map(|category| {
            let count = counts
                .iter()
                .find(|(id, _)| *id == category.id)
                .map(|(_, n)| *n)
                .unwrap_or(0);
            CategoryCount { category, count }
        })
        .collect();

    Ok(CoursePage {
        courses,
        page,
        total_pages,
        total_count,
        categories,
    })
}

#[derive(Serialize, Debug, Clone)]
pub struct EnrollmentInfo {
    pub enrolled_at: DateTime<Utc>,
    pub completed: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct CourseDetail {
    pub course: Course,
    pub reviews: Vec<Review>,
    #[serde(flatten)]
    pub summary: ReviewSummary,
    pub has_reviewed: bool,
    pub enrolled: bool,
    pub enrollment: Option<EnrollmentInfo>,
    pub similar_courses: Vec<Course>,
    pub progress: Option<Rollup>,
}

pub async fn course_detail(
    store: &dyn Store,
    course_id: Uuid,
    user: Option<&User>,
) -> AppResult<CourseDetail> {
    let course = find_course(store, course_id).await?;
    let reviews = store.reviews_for_course(course.id).await?;
    let summary = ReviewSummary::of(&reviews);

    let similar_courses = match course.category_id {
        Some(category_id) => {
            let filter = CourseFilter {
                category_id: Some(category_id),
                ..Default::default()
            };
            store
                .published_courses(&filter)
                .await?
                .into_iter()
                .filter(|c| c.id != course.id)
                .take(SIMILAR_COURSES)
                .collect()
        }
        None => Vec::new(),
    };

    let (has_reviewed, enrollment, progress) = match user {
        Some(user) => {
            let has_reviewed = store.has_reviewed(user.id, course.id).await?;
            let enrollment = store.enrollment(user.id, course.id).await?;
            let progress = match &enrollment {
                Some(_) => {
                    let ledger = ProgressLedger::new(store);
                    Some(ledger.course_rollup(user.id, course.id).await?)
                }
                None => None,
            };
            let info = enrollment.map(|e| EnrollmentInfo {
                enrolled_at: e.enrolled_at,
                completed: e.completed,
            });
            (has_reviewed, info, progress)
        }
        None => (false, None, None),
    };

    Ok(CourseDetail {
        course,
        reviews,
        summary,
        has_reviewed,
        enrolled: enrollment.is_some(),
        enrollment,
        similar_courses,
        progress,
    })
}

#[derive(Serialize, Debug, Clone)]
pub struct ModuleSummary {
    pub module: Module,
    pub lesson_count: usize,
    pub total_duration: i64,
}

#[derive(Serialize, Debug, Clone)]
pub struct ModuleListing {
    pub course: Course,
    pub modules: Vec<ModuleSummary>,
    pub total_lessons: usize,
    pub total_duration: i64,
}

pub async fn list_modules(store: &dyn Store, course_id: Uuid) -> AppResult<ModuleListing> {
    let course = find_course(store, course_id).await?;
    let mut modules = Vec::new();
    for module in store.modules_for_course(course.id).await? {
        let lessons = store.lessons_for_module(module.id).await?;
        modules.push(ModuleSummary {
            lesson_count: lessons.len(),
            total_duration: total_minutes(&lessons),
            module,
        });
    }
    Ok(ModuleListing {
        total_lessons: modules.iter().map(|m| m.lesson_count).sum(),
        total_duration: modules.iter().map(|m| m.total_duration).sum(),
        course,
        modules,
    })
}

#[derive(Serialize, Debug, Clone)]
pub struct ModuleDetail {
    pub module: Module,
    pub lessons: Vec<Lesson>,
    pub total_duration: i64,
    pub progress: Option<Rollup>,
    pub lessons_with_progress: Option<Vec<LessonProgress>>,
}

pub async fn module_detail(
    store: &dyn Store,
    course_id: Uuid,
    module_id: Uuid,
    user: Option<&User>,
) -> AppResult<ModuleDetail> {
    let module = find_module(store, course_id, module_id).await?;
    let lessons = store.lessons_for_module(module.id).await?;
    let total_duration = total_minutes(&lessons);

    let mut detail = ModuleDetail {
        module,
        lessons,
        total_duration,
        progress: None,
        lessons_with_progress: None,
    };
    if let Some(user) = enrolled_user(store, user, course_id).await? {
        let ledger = ProgressLedger::new(store);
        detail.progress = Some(ledger.module_rollup(user.id, module_id).await?);
        let lessons = ledger.lessons_with_progress(user.id, module_id).await?;
        detail.lessons_with_progress = Some(lessons);
    }
    Ok(detail)
}

#[derive(Serialize, Debug, Clone)]
pub struct LessonState {
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub module_progress: Rollup,
    pub course_progress: Rollup,
}

#[derive(Serialize, Debug, Clone)]
pub struct LessonDetail {
    pub course: Course,
    pub module: Module,
    pub lesson: Lesson,
    pub previous_lesson: Option<Lesson>,
    pub next_lesson: Option<Lesson>,
    pub progress: Option<LessonState>,
}

pub async fn lesson_detail(
    store: &dyn Store,
    course_id: Uuid,
    module_id: Uuid,
    lesson_id: Uuid,
    user: Option<&User>,
) -> AppResult<LessonDetail> {
    let course = find_course(store, course_id).await?;
    let module = find_module(store, course_id, module_id).await?;
    let siblings = store.lessons_for_module(module.id).await?;
    let index = siblings
        .iter()
        .position(|l| l.id == lesson_id)
        .ok_or_else(|| AppError::not_found("lesson not found"))?;

    let previous_lesson = index.checked_sub(1).and_then(|i| siblings.get(i)).cloned();
    let next_lesson = siblings.get(index + 1).cloned();
    let lesson = siblings[index].clone();

    let progress = match enrolled_user(store, user, course.id).await? {
        Some(user) => {
            let ledger = ProgressLedger::new(store);
            let (completed, completed_at) = ledger.lesson_state(user.id, &lesson).await?;
            Some(LessonState {
                completed,
                completed_at,
                module_progress: ledger.module_rollup(user.id, module.id).await?,
                course_progress: ledger.course_rollup(user.id, course.id).await?,
            })
        }
        None => None,
    };

    Ok(LessonDetail {
        course,
        module,
        lesson,
        previous_lesson,
        next_lesson,
        progress,
    })
}

// --- home ---

#[derive(Serialize, Debug, Clone)]
pub struct HomePage {
    /// Popular courses, or the newest ones when none is marked popular.
    pub featured_courses: Vec<Course>,
    pub free_courses: Vec<Course>,
    pub total_courses: usize,
}

pub async fn home(store: &dyn Store) -> AppResult<HomePage> {
    let published = store.published_courses(&CourseFilter::default()).await?;
    let pick = |keep: fn(&Course) -> bool| -> Vec<Course> {
        published
            .iter()
            .filter(|c| keep(c))
            .take(FEATURED_COURSES)
            .cloned()
            .collect()
    };
    let mut featured_courses = pick(|c| c.is_popular);
    if featured_courses.is_empty() {
        featured_courses = pick(|_| true);
    }
    Ok(HomePage {
        featured_courses,
        free_courses: pick(|c| c.is_free),
        total_courses: published.len(),
    })
}

// --- recommendations ---

#[serde_as]
#[derive(Deserialize, Debug, Default, Clone)]
pub struct RecommendationQuery {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub direction: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub level: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub free: Option<String>,
}

/// `None` when no criteria were given at all.
pub async fn recommend(
    store: &dyn Store,
    query: &RecommendationQuery,
) -> AppResult<Option<Vec<Course>>> {
    let free_only = query.free.as_deref() == Some("on");
    if query.direction.is_none() && query.level.is_none() && !free_only {
        return Ok(None);
    }
    let level = parse_level(query.level.as_deref())?;
    let courses = store
        .published_courses_matching_direction(
            query.direction.as_deref(),
            level,
            free_only,
            RECOMMENDATIONS,
        )
        .await?;
    Ok(Some(courses))
}

// --- helpers ---

pub(crate) async fn find_course(store: &dyn Store, course_id: Uuid) -> AppResult<Course> {
    store
        .course(course_id)
        .await?
        .ok_or_else(|| AppError::not_found("course not found"))
}

pub(crate) async fn find_module(
    store: &dyn Store,
    course_id: Uuid,
    module_id: Uuid,
) -> AppResult<Module> {
    store
        .module(module_id)
        .await?
        .filter(|m| m.course_id == course_id)
        .ok_or_else(|| AppError::not_found("module not found"))
}

async fn enrolled_user<'u>(
    store: &dyn Store,
    user: Option<&'u User>,
    course_id: Uuid,
) -> AppResult<Option<&'u User>> {
    match user {
        Some(u) if EnrollmentGate::new(store).is_enrolled(u.id, course_id).await? => Ok(Some(u)),
        _ => Ok(None),
    }
}

fn total_minutes(lessons: &[Lesson]) -> i64 {
    lessons.iter().map(|l| i64::from(l.duration_minutes)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::{CatalogStore, EnrollmentStore, ProgressStore},
        testutil::{course_request, Fixture},
    };

    #[tokio::test]
    async fn listing_filters_and_paginates() {
        let fx = Fixture::with_layout(&[1]).await;
        fx.add_course("Hidden draft", false, 100).await;
        for i in 0..10 {
            fx.add_course(&format!("Extra {i}"), true, 0).await;
        }

        let page = list_courses(fx.store.as_ref(), &CourseListQuery::default()).await.unwrap();
        assert_eq!(page.total_count, 11);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.courses.len(), PAGE_SIZE);
        // newest first
        assert_eq!(page.courses[0].title, "Extra 9");

        let q = CourseListQuery {
            page: Some(2),
            ..Default::default()
        };
        let second = list_courses(fx.store.as_ref(), &q).await.unwrap();
        assert_eq!(second.courses.len(), 2);

        let q = CourseListQuery {
            free: Some("on".into()),
            ..Default::default()
        };
        assert_eq!(list_courses(fx.store.as_ref(), &q).await.unwrap().total_count, 10);

        let q = CourseListQuery {
            search: Some("rust".into()),
            level: Some("all".into()),
            category: Some("all".into()),
            ..Default::default()
        };
        assert_eq!(list_courses(fx.store.as_ref(), &q).await.unwrap().total_count, 1);
    }

    #[tokio::test]
    async fn listing_rejects_bad_level() {
        let fx = Fixture::with_layout(&[1]).await;
        let q = CourseListQuery {
            level: Some("guru".into()),
            ..Default::default()
        };
        assert!(matches!(
            list_courses(fx.store.as_ref(), &q).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn detail_shows_progress_only_to_enrolled_users() {
        let fx = Fixture::with_layout(&[2]).await;
        let anon = course_detail(fx.store.as_ref(), fx.course.id, None).await.unwrap();
        assert!(anon.progress.is_none());
        assert!(!anon.has_reviewed);

        let stranger = course_detail(fx.store.as_ref(), fx.course.id, Some(&fx.learner))
            .await
            .unwrap();
        assert!(!stranger.enrolled);
        assert!(stranger.progress.is_none());

        fx.enroll_learner().await;
        fx.store
            .upsert_progress(fx.learner.id, fx.lessons[0][0].id, true, Utc::now())
            .await
            .unwrap();
        let mine = course_detail(fx.store.as_ref(), fx.course.id, Some(&fx.learner)).await.unwrap();
        assert!(mine.enrolled);
        assert_eq!(mine.progress.map(|p| p.percentage), Some(50));
    }

    #[tokio::test]
    async fn similar_courses_share_category() {
        let fx = Fixture::with_layout(&[1]).await;
        let cat = fx.store.create_category("Programming", "").await.unwrap();
        let mut req = course_request("Async Rust", true, 100);
        req.category_id = Some(cat.id);
        let main = fx.store.create_course(fx.author.id, &req).await.unwrap();
        req.title = "Embedded Rust".into();
        let sibling = fx.store.create_course(fx.author.id, &req).await.unwrap();

        let detail = course_detail(fx.store.as_ref(), main.id, None).await.unwrap();
        let ids: Vec<Uuid> = detail.similar_courses.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![sibling.id]);
    }

    #[tokio::test]
    async fn module_listing_totals() {
        let fx = Fixture::with_layout(&[2, 3]).await;
        let listing = list_modules(fx.store.as_ref(), fx.course.id).await.unwrap();
        assert_eq!(listing.modules.len(), 2);
        assert_eq!(listing.total_lessons, 5);
        assert_eq!(listing.total_duration, 75);
        assert_eq!(listing.modules[1].lesson_count, 3);
    }

    #[tokio::test]
    async fn module_must_belong_to_course() {
        let fx = Fixture::with_layout(&[1]).await;
        let other = fx.add_course("Other", true, 0).await;
        let err = module_detail(fx.store.as_ref(), other.id, fx.modules[0].id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn module_detail_for_enrolled_user() {
        let fx = Fixture::with_layout(&[3]).await;
        fx.enroll_learner().await;
        fx.store
            .upsert_progress(fx.learner.id, fx.lessons[0][2].id, true, Utc::now())
            .await
            .unwrap();
        let d = module_detail(fx.store.as_ref(), fx.course.id, fx.modules[0].id, Some(&fx.learner))
            .await
            .unwrap();
        assert_eq!(d.progress.map(|p| p.percentage), Some(33));
        let rows = d.lessons_with_progress.unwrap();
        assert!(rows[2].completed && !rows[0].completed);
    }

    #[tokio::test]
    async fn lesson_navigation() {
        let fx = Fixture::with_layout(&[3]).await;
        let (c, m) = (fx.course.id, fx.modules[0].id);
        let first = lesson_detail(fx.store.as_ref(), c, m, fx.lessons[0][0].id, None)
            .await
            .unwrap();
        assert!(first.previous_lesson.is_none());
        assert_eq!(first.next_lesson.map(|l| l.id), Some(fx.lessons[0][1].id));

        let last = lesson_detail(fx.store.as_ref(), c, m, fx.lessons[0][2].id, None).await.unwrap();
        assert_eq!(last.previous_lesson.map(|l| l.id), Some(fx.lessons[0][1].id));
        assert!(last.next_lesson.is_none());
        assert!(last.progress.is_none());

        let err = lesson_detail(fx.store.as_ref(), c, m, Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn lesson_detail_progress_for_enrolled_user() {
        let fx = Fixture::with_layout(&[2, 2]).await;
        fx.store.insert_enrollment(fx.learner.id, fx.course.id).await.unwrap();
        fx.store
            .upsert_progress(fx.learner.id, fx.lessons[1][0].id, true, Utc::now())
            .await
            .unwrap();
        let d = lesson_detail(
            fx.store.as_ref(),
            fx.course.id,
            fx.modules[1].id,
            fx.lessons[1][0].id,
            Some(&fx.learner),
        )
        .await
        .unwrap();
        let p = d.progress.unwrap();
        assert!(p.completed && p.completed_at.is_some());
        assert_eq!(p.module_progress.percentage, 50);
        assert_eq!(p.course_progress.percentage, 25);
    }

    #[tokio::test]
    async fn home_prefers_popular_courses() {
        let fx = Fixture::with_layout(&[1]).await;
        fx.add_course("Free intro", true, 0).await;
        fx.add_course("Hidden draft", false, 0).await;

        let page = home(fx.store.as_ref()).await.unwrap();
        assert_eq!(page.total_courses, 2);
        // nothing is popular yet, so the newest courses fill in
        assert_eq!(page.featured_courses[0].title, "Free intro");
        assert_eq!(page.featured_courses.len(), 2);
        assert_eq!(page.free_courses.len(), 1);

        let mut req = course_request("Async Rust", true, 900);
        req.is_popular = true;
        let popular = fx.store.create_course(fx.author.id, &req).await.unwrap();
        let page = home(fx.store.as_ref()).await.unwrap();
        let ids: Vec<Uuid> = page.featured_courses.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![popular.id]);
    }

    #[tokio::test]
    async fn recommendations_need_criteria() {
        let fx = Fixture::with_layout(&[1]).await;
        let none = recommend(fx.store.as_ref(), &RecommendationQuery::default()).await.unwrap();
        assert!(none.is_none());

        let q = RecommendationQuery {
            direction: Some("rust".into()),
            ..Default::default()
        };
        let found = recommend(fx.store.as_ref(), &q).await.unwrap().unwrap();
        assert_eq!(found.len(), 1);
    }
}
