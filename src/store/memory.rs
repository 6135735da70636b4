use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::*;

/// In-process store. Every mutation runs under the single write lock, which
/// gives the same uniqueness guarantees as the Postgres constraints.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    categories: Vec<Category>,
    // insertion order doubles as creation order
    courses: Vec<Course>,
    modules: HashMap<Uuid, Module>,
    lessons: HashMap<Uuid, Lesson>,
    enrollments: HashMap<(Uuid, Uuid), Enrollment>,
    progress: HashMap<(Uuid, Uuid), Progress>,
    carts: HashMap<Uuid, Vec<Uuid>>,
    orders: Vec<OrderWithItems>,
    reviews: Vec<Review>,
    assistant_categories: Vec<AssistantCategory>,
    assistant_questions: Vec<AssistantQuestion>,
    support_requests: Vec<SupportRequest>,
}

impl State {
    fn course(&self, id: Uuid) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    fn module_ids_of_course(&self, course_id: Uuid) -> Vec<Uuid> {
        self.modules
            .values()
            .filter(|m| m.course_id == course_id)
            .map(|m| m.id)
            .collect()
    }

    fn lesson_in_module(&self, lesson_id: Uuid, module_id: Uuid) -> bool {
        self.lessons
            .get(&lesson_id)
            .map(|l| l.module_id == module_id)
            .unwrap_or(false)
    }

    fn lesson_in_course(&self, lesson_id: Uuid, course_id: Uuid) -> bool {
        self.lessons
            .get(&lesson_id)
            .and_then(|l| self.modules.get(&l.module_id))
            .map(|m| m.course_id == course_id)
            .unwrap_or(false)
    }

    /// Removes the modules and everything hanging off them.
    fn drop_modules(&mut self, module_ids: &[Uuid]) {
        self.modules.retain(|id, _| !module_ids.contains(id));
        let lessons = &mut self.lessons;
        lessons.retain(|_, l| !module_ids.contains(&l.module_id));
        self.progress.retain(|_, p| lessons.contains_key(&p.lesson_id));
    }

    fn sold(&self, course_id: Uuid) -> bool {
        self.orders
            .iter()
            .flat_map(|o| o.items.iter())
            .any(|i| i.course_id == course_id)
    }

    fn enroll(&mut self, user_id: Uuid, course_id: Uuid, now: DateTime<Utc>) -> (Enrollment, bool) {
        if let Some(existing) = self.enrollments.get(&(user_id, course_id)) {
            return (existing.clone(), false);
        }
        let e = Enrollment {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            enrolled_at: now,
            completed: false,
        };
        self.enrollments.insert((user_id, course_id), e.clone());
        (e, true)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_user(&self, username: &str, is_staff: bool) -> StoreResult<User> {
        let mut st = self.state.write().await;
        if st.users.values().any(|u| u.username == username) {
            return Err(StoreError::Conflict(format!("username {username} is taken")));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            is_staff,
            created_at: Utc::now(),
        };
        st.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<String> {
        let mut st = self.state.write().await;
        if !st.users.contains_key(&user_id) {
            return Err(StoreError::NotFound("user".into()));
        }
        let token = Uuid::new_v4().simple().to_string();
        st.sessions.insert(token.clone(), (user_id, expires_at));
        Ok(token)
    }

    async fn user_for_token(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let st = self.state.read().await;
        Ok(st
            .sessions
            .get(token)
            .filter(|(_, expires_at)| *expires_at > now)
            .and_then(|(user_id, _)| st.users.get(user_id).cloned()))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn create_category(&self, name: &str, description: &str) -> StoreResult<Category> {
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
        };
        self.state.write().await.categories.push(category.clone());
        Ok(category)
    }

    async fn categories(&self) -> StoreResult<Vec<Category>> {
        let mut out = self.state.read().await.categories.clone();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn published_counts_by_category(&self) -> StoreResult<Vec<(Uuid, i64)>> {
        let st = self.state.read().await;
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for c in st.courses.iter().filter(|c| c.is_published) {
            if let Some(cat) = c.category_id {
                *counts.entry(cat).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    async fn create_course(&self, author_id: Uuid, new: &NewCourse) -> StoreResult<Course> {
        let mut st = self.state.write().await;
        if !st.users.contains_key(&author_id) {
            return Err(StoreError::NotFound("author".into()));
        }
        if let Some(cat) = new.category_id {
            if !st.categories.iter().any(|c| c.id == cat) {
                return Err(StoreError::NotFound("category".into()));
            }
        }
        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            title: new.title.clone(),
            description: new.description.clone(),
            full_description: new.full_description.clone(),
            price_cents: new.price_cents,
            is_free: new.is_free,
            level: new.level.as_str().to_string(),
            is_popular: new.is_popular,
            is_published: new.is_published,
            author_id,
            category_id: new.category_id,
            duration_hours: new.duration_hours,
            created_at: now,
            updated_at: now,
        };
        st.courses.push(course.clone());
        Ok(course)
    }

    async fn course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(self.state.read().await.course(id).cloned())
    }

    async fn courses_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Course>> {
        let st = self.state.read().await;
        Ok(ids.iter().filter_map(|id| st.course(*id).cloned()).collect())
    }

    async fn published_courses(&self, filter: &CourseFilter) -> StoreResult<Vec<Course>> {
        let st = self.state.read().await;
        let out = st
            .courses
            .iter()
            .rev()
            .filter(|c| c.is_published)
            .filter(|c| filter.category_id.map_or(true, |cat| c.category_id == Some(cat)))
            .filter(|c| filter.level.map_or(true, |lvl| c.level == lvl.as_str()))
            .filter(|c| !filter.free_only || c.is_free)
            .filter(|c| match filter.search.as_deref() {
                None => true,
                Some(q) => {
                    let author = st
                        .users
                        .get(&c.author_id)
                        .map(|u| u.username.as_str())
                        .unwrap_or("");
                    contains_ci(&c.title, q)
                        || contains_ci(&c.description, q)
                        || contains_ci(author, q)
                }
            })
            .cloned()
            .collect();
        Ok(out)
    }

    async fn published_courses_matching_direction(
        &self,
        needle: Option<&str>,
        level: Option<Level>,
        free_only: bool,
        limit: i64,
    ) -> StoreResult<Vec<Course>> {
        let st = self.state.read().await;
        let out = st
            .courses
            .iter()
            .rev()
            .filter(|c| c.is_published)
            .filter(|c| level.map_or(true, |lvl| c.level == lvl.as_str()))
            .filter(|c| !free_only || c.is_free)
            .filter(|c| match needle {
                None => true,
                Some(q) => {
                    let category = c
                        .category_id
                        .and_then(|id| st.categories.iter().find(|cat| cat.id == id))
                        .map(|cat| cat.name.as_str())
                        .unwrap_or("");
                    contains_ci(&c.title, q) || contains_ci(category, q)
                }
            })
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok(out)
    }

    async fn update_course(&self, course: &Course) -> StoreResult<Course> {
        let mut st = self.state.write().await;
        if let Some(cat) = course.category_id {
            if !st.categories.iter().any(|c| c.id == cat) {
                return Err(StoreError::NotFound("category".into()));
            }
        }
        let stored = st
            .courses
            .iter_mut()
            .find(|c| c.id == course.id)
            .ok_or_else(|| StoreError::NotFound("course".into()))?;
        stored.title = course.title.clone();
        stored.description = course.description.clone();
        stored.category_id = course.category_id;
        stored.duration_hours = course.duration_hours;
        stored.is_published = course.is_published;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_course(&self, id: Uuid) -> StoreResult<()> {
        let mut st = self.state.write().await;
        if st.course(id).is_none() {
            return Err(StoreError::NotFound("course".into()));
        }
        if st.sold(id) {
            return Err(StoreError::Conflict(
                "course has been sold and cannot be deleted".into(),
            ));
        }
        let modules = st.module_ids_of_course(id);
        st.drop_modules(&modules);
        st.courses.retain(|c| c.id != id);
        st.enrollments.retain(|(_, course_id), _| *course_id != id);
        st.reviews.retain(|r| r.course_id != id);
        for cart in st.carts.values_mut() {
            cart.retain(|course_id| *course_id != id);
        }
        Ok(())
    }

    async fn courses_by_author(&self, author_id: Uuid) -> StoreResult<Vec<Course>> {
        let st = self.state.read().await;
        Ok(st
            .courses
            .iter()
            .rev()
            .filter(|c| c.author_id == author_id)
            .cloned()
            .collect())
    }

    async fn create_module(&self, course_id: Uuid, new: &NewModule) -> StoreResult<Module> {
        let mut st = self.state.write().await;
        if st.course(course_id).is_none() {
            return Err(StoreError::NotFound("course".into()));
        }
        if st
            .modules
            .values()
            .any(|m| m.course_id == course_id && m.position == new.order)
        {
            return Err(StoreError::Conflict(format!(
                "a module with order {} already exists in this course",
                new.order
            )));
        }
        let module = Module {
            id: Uuid::new_v4(),
            course_id,
            title: new.title.clone(),
            description: new.description.clone(),
            position: new.order,
            created_at: Utc::now(),
        };
        st.modules.insert(module.id, module.clone());
        Ok(module)
    }

    async fn module(&self, id: Uuid) -> StoreResult<Option<Module>> {
        Ok(self.state.read().await.modules.get(&id).cloned())
    }

    async fn modules_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Module>> {
        let st = self.state.read().await;
        let mut out: Vec<Module> = st
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.position);
        Ok(out)
    }

    async fn update_module(&self, module: &Module) -> StoreResult<Module> {
        let mut st = self.state.write().await;
        if st
            .modules
            .values()
            .filter(|m| m.id != module.id)
            .any(|m| m.course_id == module.course_id && m.position == module.position)
        {
            return Err(StoreError::Conflict(format!(
                "a module with order {} already exists in this course",
                module.position
            )));
        }
        let stored = st
            .modules
            .get_mut(&module.id)
            .ok_or_else(|| StoreError::NotFound("module".into()))?;
        stored.title = module.title.clone();
        stored.description = module.description.clone();
        stored.position = module.position;
        Ok(stored.clone())
    }

    async fn delete_module(&self, id: Uuid) -> StoreResult<()> {
        let mut st = self.state.write().await;
        if !st.modules.contains_key(&id) {
            return Err(StoreError::NotFound("module".into()));
        }
        st.drop_modules(&[id]);
        Ok(())
    }

    async fn create_lesson(&self, module_id: Uuid, new: &NewLesson) -> StoreResult<Lesson> {
        let mut st = self.state.write().await;
        if !st.modules.contains_key(&module_id) {
            return Err(StoreError::NotFound("module".into()));
        }
        if st
            .lessons
            .values()
            .any(|l| l.module_id == module_id && l.position == new.order)
        {
            return Err(StoreError::Conflict(format!(
                "a lesson with order {} already exists in this module",
                new.order
            )));
        }
        let lesson = Lesson {
            id: Uuid::new_v4(),
            module_id,
            title: new.title.clone(),
            content: new.content.clone(),
            position: new.order,
            duration_minutes: new.duration_minutes,
            is_published: new.is_published,
            created_at: Utc::now(),
        };
        st.lessons.insert(lesson.id, lesson.clone());
        Ok(lesson)
    }

    async fn update_lesson(&self, lesson: &Lesson) -> StoreResult<Lesson> {
        let mut st = self.state.write().await;
        if st
            .lessons
            .values()
            .filter(|l| l.id != lesson.id)
            .any(|l| l.module_id == lesson.module_id && l.position == lesson.position)
        {
            return Err(StoreError::Conflict(format!(
                "a lesson with order {} already exists in this module",
                lesson.position
            )));
        }
        let stored = st
            .lessons
            .get_mut(&lesson.id)
            .ok_or_else(|| StoreError::NotFound("lesson".into()))?;
        stored.title = lesson.title.clone();
        stored.content = lesson.content.clone();
        stored.position = lesson.position;
        stored.duration_minutes = lesson.duration_minutes;
        stored.is_published = lesson.is_published;
        Ok(stored.clone())
    }

    async fn lesson(&self, id: Uuid) -> StoreResult<Option<Lesson>> {
        Ok(self.state.read().await.lessons.get(&id).cloned())
    }

    async fn lessons_for_module(&self, module_id: Uuid) -> StoreResult<Vec<Lesson>> {
        let st = self.state.read().await;
        let mut out: Vec<Lesson> = st
            .lessons
            .values()
            .filter(|l| l.module_id == module_id)
            .cloned()
            .collect();
        out.sort_by_key(|l| l.position);
        Ok(out)
    }

    async fn count_lessons_in_module(&self, module_id: Uuid) -> StoreResult<i64> {
        let st = self.state.read().await;
        Ok(st.lessons.values().filter(|l| l.module_id == module_id).count() as i64)
    }

    async fn count_lessons_in_course(&self, course_id: Uuid) -> StoreResult<i64> {
        let st = self.state.read().await;
        let modules = st.module_ids_of_course(course_id);
        Ok(st
            .lessons
            .values()
            .filter(|l| modules.contains(&l.module_id))
            .count() as i64)
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn enrollment(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<Option<Enrollment>> {
        Ok(self.state.read().await.enrollments.get(&(user_id, course_id)).cloned())
    }

    async fn insert_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<(Enrollment, bool)> {
        let mut st = self.state.write().await;
        if st.course(course_id).is_none() {
            return Err(StoreError::NotFound("course".into()));
        }
        Ok(st.enroll(user_id, course_id, Utc::now()))
    }

    async fn enrollments_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        let st = self.state.read().await;
        let mut out: Vec<Enrollment> = st
            .enrollments
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at));
        Ok(out)
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn upsert_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        completed: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<Progress> {
        let mut st = self.state.write().await;
        if !st.lessons.contains_key(&lesson_id) {
            return Err(StoreError::NotFound("lesson".into()));
        }
        let record = st
            .progress
            .entry((user_id, lesson_id))
            .and_modify(|p| p.set_completed(completed, now))
            .or_insert_with(|| Progress::new(user_id, lesson_id, completed, now));
        Ok(record.clone())
    }

    async fn progress(&self, user_id: Uuid, lesson_id: Uuid) -> StoreResult<Option<Progress>> {
        Ok(self.state.read().await.progress.get(&(user_id, lesson_id)).cloned())
    }

    async fn progress_for_lessons(
        &self,
        user_id: Uuid,
        lesson_ids: &[Uuid],
    ) -> StoreResult<Vec<Progress>> {
        let st = self.state.read().await;
        Ok(lesson_ids
            .iter()
            .filter_map(|l| st.progress.get(&(user_id, *l)).cloned())
            .collect())
    }

    async fn count_completed_in_module(&self, user_id: Uuid, module_id: Uuid) -> StoreResult<i64> {
        let st = self.state.read().await;
        Ok(st
            .progress
            .values()
            .filter(|p| p.user_id == user_id && p.completed)
            .filter(|p| st.lesson_in_module(p.lesson_id, module_id))
            .count() as i64)
    }

    async fn count_completed_in_course(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<i64> {
        let st = self.state.read().await;
        Ok(st
            .progress
            .values()
            .filter(|p| p.user_id == user_id && p.completed)
            .filter(|p| st.lesson_in_course(p.lesson_id, course_id))
            .count() as i64)
    }
}

#[async_trait]
impl CommerceStore for MemoryStore {
    async fn cart_course_ids(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(self.state.read().await.carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn add_cart_item(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool> {
        let mut st = self.state.write().await;
        if st.course(course_id).is_none() {
            return Err(StoreError::NotFound("course".into()));
        }
        let cart = st.carts.entry(user_id).or_default();
        if cart.contains(&course_id) {
            return Ok(false);
        }
        cart.push(course_id);
        Ok(true)
    }

    async fn remove_cart_item(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool> {
        let mut st = self.state.write().await;
        let Some(cart) = st.carts.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = cart.len();
        cart.retain(|id| *id != course_id);
        Ok(cart.len() != before)
    }

    async fn place_order(&self, user_id: Uuid, lines: &[OrderLine]) -> StoreResult<OrderWithItems> {
        let mut st = self.state.write().await;
        // validate everything before the first write
        if let Some(missing) = lines.iter().find(|l| st.course(l.course_id).is_none()) {
            return Err(StoreError::Integrity(format!(
                "order line references unknown course {}",
                missing.course_id
            )));
        }
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id,
            status: OrderStatus::Paid.as_str().to_string(),
            created_at: now,
        };
        let items = lines
            .iter()
            .map(|l| OrderItem {
                id: Uuid::new_v4(),
                order_id: order.id,
                course_id: l.course_id,
                price_cents: l.price_cents,
            })
            .collect();
        for line in lines {
            st.enroll(user_id, line.course_id, now);
        }
        if let Some(cart) = st.carts.get_mut(&user_id) {
            cart.retain(|id| !lines.iter().any(|l| l.course_id == *id));
        }
        let placed = OrderWithItems { order, items };
        st.orders.push(placed.clone());
        Ok(placed)
    }

    async fn sales_stats(&self, since: DateTime<Utc>, top: i64) -> StoreResult<SalesStats> {
        let st = self.state.read().await;
        let mut sold: HashMap<Uuid, i64> = HashMap::new();
        for item in st.orders.iter().flat_map(|o| o.items.iter()) {
            *sold.entry(item.course_id).or_default() += 1;
        }
        let mut top_courses: Vec<TopCourse> = st
            .courses
            .iter()
            .map(|c| TopCourse {
                course_id: c.id,
                title: c.title.clone(),
                sold: sold.get(&c.id).copied().unwrap_or(0),
            })
            .collect();
        top_courses.sort_by(|a, b| b.sold.cmp(&a.sold).then_with(|| a.title.cmp(&b.title)));
        top_courses.truncate(top.max(0) as usize);

        let paid = OrderStatus::Paid.as_str();
        let recent: Vec<&OrderWithItems> = st
            .orders
            .iter()
            .filter(|o| o.order.status == paid && o.order.created_at >= since)
            .collect();
        Ok(SalesStats {
            top_courses,
            revenue_cents: recent.iter().map(|o| o.total_cents()).sum(),
            paid_orders: recent.len() as i64,
        })
    }

    async fn orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<OrderWithItems>> {
        let st = self.state.read().await;
        Ok(st
            .orders
            .iter()
            .rev()
            .filter(|o| o.order.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert_review(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        review: &NewReview,
    ) -> StoreResult<Review> {
        let mut st = self.state.write().await;
        if st.course(course_id).is_none() {
            return Err(StoreError::NotFound("course".into()));
        }
        if st
            .reviews
            .iter()
            .any(|r| r.user_id == user_id && r.course_id == course_id)
        {
            return Err(StoreError::Conflict("you have already reviewed this course".into()));
        }
        let now = Utc::now();
        let r = Review {
            id: Uuid::new_v4(),
            course_id,
            user_id,
            rating: review.rating,
            text: review.text.clone(),
            created_at: now,
            updated_at: now,
        };
        st.reviews.push(r.clone());
        Ok(r)
    }

    async fn reviews_for_course(&self, course_id: Uuid) -> StoreResult<Vec<Review>> {
        let st = self.state.read().await;
        Ok(st
            .reviews
            .iter()
            .rev()
            .filter(|r| r.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn has_reviewed(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<bool> {
        let st = self.state.read().await;
        Ok(st
            .reviews
            .iter()
            .any(|r| r.user_id == user_id && r.course_id == course_id))
    }
}

#[async_trait]
impl AssistantStore for MemoryStore {
    async fn create_assistant_category(&self, name: &str) -> StoreResult<AssistantCategory> {
        let c = AssistantCategory {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.state.write().await.assistant_categories.push(c.clone());
        Ok(c)
    }

    async fn create_assistant_question(
        &self,
        category_id: Uuid,
        question: &str,
        answer: &str,
    ) -> StoreResult<AssistantQuestion> {
        let mut st = self.state.write().await;
        if !st.assistant_categories.iter().any(|c| c.id == category_id) {
            return Err(StoreError::NotFound("assistant category".into()));
        }
        let q = AssistantQuestion {
            id: Uuid::new_v4(),
            category_id,
            question: question.to_string(),
            answer: answer.to_string(),
        };
        st.assistant_questions.push(q.clone());
        Ok(q)
    }

    async fn assistant_categories(&self) -> StoreResult<Vec<AssistantCategory>> {
        let mut out = self.state.read().await.assistant_categories.clone();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn assistant_questions(&self, category_id: Uuid) -> StoreResult<Vec<AssistantQuestion>> {
        let st = self.state.read().await;
        Ok(st
            .assistant_questions
            .iter()
            .filter(|q| q.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn insert_support_request(&self, req: &NewSupportRequest) -> StoreResult<SupportRequest> {
        let r = SupportRequest {
            id: Uuid::new_v4(),
            name: req.name.clone(),
            contact: req.contact.clone(),
            message: req.message.clone(),
            processed: false,
            created_at: Utc::now(),
        };
        self.state.write().await.support_requests.push(r.clone());
        Ok(r)
    }
}
