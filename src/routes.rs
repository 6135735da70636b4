use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::{serde_as, NoneAsEmptyString};
use uuid::Uuid;

use crate::{
    admin, assistant,
    auth::{CurrentUser, MaybeUser},
    authoring,
    cart::OrderConverter,
    catalog::{self, CourseListQuery, RecommendationQuery},
    enrollment::{EnrollStatus, EnrollmentGate},
    error::{AppError, AppResult},
    extract::{Form, Json, Path, Query},
    models::*,
    progress::{ProgressLedger, Rollup, TogglePayload},
    reviews,
    store::SharedStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        // catalog
        .route("/home", get(home))
        .route("/courses", get(list_courses).post(create_course))
        .route(
            "/courses/:course_id",
            get(course_detail).patch(update_course).delete(delete_course),
        )
        .route("/courses/:course_id/enroll", post(enroll))
        .route("/courses/:course_id/reviews", post(add_review))
        .route(
            "/courses/:course_id/modules",
            get(list_modules).post(create_module),
        )
        .route(
            "/courses/:course_id/modules/:module_id",
            get(module_detail).patch(update_module).delete(delete_module),
        )
        .route(
            "/courses/:course_id/modules/:module_id/lessons",
            post(create_lesson),
        )
        .route(
            "/courses/:course_id/modules/:module_id/lessons/:lesson_id",
            get(lesson_detail).patch(update_lesson),
        )
        .route("/recommendations", get(recommendations))
        // learning
        .route("/progress/mark-lesson-completed", post(mark_lesson_completed))
        .route("/me/enrollments", get(my_enrollments))
        .route("/me/courses", get(my_courses))
        // commerce
        .route("/cart", get(view_cart))
        .route("/cart/add/:course_id", post(add_to_cart))
        .route("/cart/remove/:course_id", post(remove_from_cart))
        .route("/checkout", post(checkout))
        .route("/orders", get(order_history))
        // assistant
        .route("/assistant/faq", get(faq))
        .route("/assistant/contact", post(contact))
        // staff
        .route("/admin/stats", get(sales_stats))
        .with_state(state)
}

async fn home(State(st): State<AppState>) -> AppResult<Json<catalog::HomePage>> {
    Ok(Json(catalog::home(st.store.as_ref()).await?))
}

async fn list_courses(
    State(st): State<AppState>,
    Query(q): Query<CourseListQuery>,
) -> AppResult<Json<catalog::CoursePage>> {
    Ok(Json(catalog::list_courses(st.store.as_ref(), &q).await?))
}

async fn create_course(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<NewCourse>,
) -> AppResult<impl IntoResponse> {
    let course = authoring::create_course(st.store.as_ref(), &user, &body).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<Uuid>,
    Json(body): Json<CourseUpdate>,
) -> AppResult<Json<Course>> {
    Ok(Json(
        authoring::update_course(st.store.as_ref(), &user, course_id, &body).await?,
    ))
}

async fn delete_course(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    authoring::delete_course(st.store.as_ref(), &user, course_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn course_detail(
    State(st): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<catalog::CourseDetail>> {
    Ok(Json(
        catalog::course_detail(st.store.as_ref(), course_id, user.as_ref()).await?,
    ))
}

async fn enroll(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let (enrollment, status) = EnrollmentGate::new(st.store.as_ref())
        .enroll(user.id, course_id)
        .await?;
    let message = match status {
        EnrollStatus::Created => "You are now enrolled in this course",
        EnrollStatus::AlreadyEnrolled => "You are already enrolled in this course",
    };
    Ok(Json(json!({
        "success": true,
        "status": status,
        "enrolled_at": enrollment.enrolled_at,
        "message": message,
    })))
}

async fn add_review(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<Uuid>,
    Json(body): Json<NewReview>,
) -> AppResult<impl IntoResponse> {
    let review = reviews::add_review(st.store.as_ref(), user.id, course_id, &body).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn list_modules(
    State(st): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<catalog::ModuleListing>> {
    Ok(Json(catalog::list_modules(st.store.as_ref(), course_id).await?))
}

async fn create_module(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<Uuid>,
    Json(body): Json<NewModule>,
) -> AppResult<impl IntoResponse> {
    let module = authoring::create_module(st.store.as_ref(), &user, course_id, &body).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

async fn update_module(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ModuleUpdate>,
) -> AppResult<Json<Module>> {
    let module =
        authoring::update_module(st.store.as_ref(), &user, course_id, module_id, &body).await?;
    Ok(Json(module))
}

async fn delete_module(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    authoring::delete_module(st.store.as_ref(), &user, course_id, module_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn module_detail(
    State(st): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<catalog::ModuleDetail>> {
    let store = st.store.as_ref();
    Ok(Json(
        catalog::module_detail(store, course_id, module_id, user.as_ref()).await?,
    ))
}

async fn create_lesson(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<NewLesson>,
) -> AppResult<impl IntoResponse> {
    let store = st.store.as_ref();
    let lesson = authoring::create_lesson(store, &user, course_id, module_id, &body).await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

async fn lesson_detail(
    State(st): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path((course_id, module_id, lesson_id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<Json<catalog::LessonDetail>> {
    let store = st.store.as_ref();
    Ok(Json(
        catalog::lesson_detail(store, course_id, module_id, lesson_id, user.as_ref()).await?,
    ))
}

async fn update_lesson(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((course_id, module_id, lesson_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(body): Json<LessonUpdate>,
) -> AppResult<Json<Lesson>> {
    let store = st.store.as_ref();
    Ok(Json(
        authoring::update_lesson(store, &user, course_id, module_id, lesson_id, &body).await?,
    ))
}

async fn recommendations(
    State(st): State<AppState>,
    Query(q): Query<RecommendationQuery>,
) -> AppResult<impl IntoResponse> {
    let courses = catalog::recommend(st.store.as_ref(), &q).await?;
    Ok(Json(json!({
        "searched": courses.is_some(),
        "courses": courses.unwrap_or_default(),
    })))
}

#[serde_as]
#[derive(Deserialize, Debug)]
struct MarkLessonForm {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    lesson_id: Option<String>,
    #[serde(default)]
    completed: Option<String>,
}

/// Form post from the lesson page. `completed` is the literal `"true"` or
/// anything else for false.
async fn mark_lesson_completed(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<MarkLessonForm>,
) -> AppResult<Json<TogglePayload>> {
    let raw = form
        .lesson_id
        .ok_or_else(|| AppError::bad_request("lesson_id is required"))?;
    // an id that cannot name a lesson is reported like a missing lesson
    let lesson_id: Uuid = raw
        .trim()
        .parse()
        .map_err(|_| AppError::not_found("lesson not found"))?;
    let completed = form.completed.as_deref() == Some("true");

    let result = ProgressLedger::new(st.store.as_ref())
        .toggle_completion(user.id, lesson_id, completed)
        .await?;
    Ok(Json(TogglePayload::from(&result)))
}

#[derive(Serialize)]
struct EnrollmentView {
    enrollment: Enrollment,
    course: Course,
    progress: Rollup,
}

async fn my_enrollments(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<EnrollmentView>>> {
    let store = st.store.as_ref();
    let ledger = ProgressLedger::new(store);
    let enrollments = store.enrollments_for_user(user.id).await?;
    let ids: Vec<Uuid> = enrollments.iter().map(|e| e.course_id).collect();
    let courses = store.courses_by_ids(&ids).await?;

    let mut out = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        let Some(course) = courses.iter().find(|c| c.id == enrollment.course_id).cloned() else {
            continue;
        };
        let progress = ledger.course_rollup(user.id, course.id).await?;
        out.push(EnrollmentView {
            enrollment,
            course,
            progress,
        });
    }
    Ok(Json(out))
}

async fn my_courses(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<authoring::AuthorDashboard>> {
    Ok(Json(authoring::dashboard(st.store.as_ref(), &user).await?))
}

async fn view_cart(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<crate::cart::CartView>> {
    let orders = OrderConverter::new(st.store.as_ref());
    let cart = orders.load(user.id).await?;
    Ok(Json(orders.view(&cart).await?))
}

async fn add_to_cart(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let orders = OrderConverter::new(st.store.as_ref());
    let mut cart = orders.load(user.id).await?;
    let status = orders.add(user.id, &mut cart, course_id).await?;
    Ok(Json(json!({ "status": status, "cart_size": cart.course_ids().len() })))
}

async fn remove_from_cart(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let orders = OrderConverter::new(st.store.as_ref());
    let mut cart = orders.load(user.id).await?;
    orders.remove(user.id, &mut cart, course_id).await?;
    Ok(Json(json!({ "success": true, "cart_size": cart.course_ids().len() })))
}

async fn checkout(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<impl IntoResponse> {
    let orders = OrderConverter::new(st.store.as_ref());
    let mut cart = orders.load(user.id).await?;
    let placed = orders.checkout(user.id, &mut cart).await?;
    let total_cents = placed.total_cents();
    Ok((
        StatusCode::CREATED,
        Json(json!({ "order": placed, "total_cents": total_cents })),
    ))
}

async fn order_history(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<crate::cart::OrderView>>> {
    Ok(Json(OrderConverter::new(st.store.as_ref()).history(user.id).await?))
}

#[derive(Deserialize, Debug)]
struct FaqQuery {
    category: Option<String>,
}

async fn faq(
    State(st): State<AppState>,
    Query(q): Query<FaqQuery>,
) -> AppResult<Json<assistant::FaqView>> {
    let requested = q.category.as_deref().and_then(|raw| raw.parse().ok());
    Ok(Json(assistant::faq(st.store.as_ref(), requested).await?))
}

async fn contact(
    State(st): State<AppState>,
    Json(body): Json<NewSupportRequest>,
) -> AppResult<impl IntoResponse> {
    let saved = assistant::submit_support_request(st.store.as_ref(), &body).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "id": saved.id }))))
}

async fn sales_stats(
    State(st): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<admin::SalesOverview>> {
    Ok(Json(
        admin::sales_overview(st.store.as_ref(), &user, Utc::now()).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::{EnrollmentStore, SessionStore},
        testutil::Fixture,
    };
    use axum::body::{to_bytes, Body};
    use http::{header, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(fx: &Fixture) -> Router {
        router(AppState { store: fx.shared() })
    }

    fn mark(token: Option<&str>, form: &str) -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri("/progress/mark-lesson-completed")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        req.body(Body::from(form.to_string())).unwrap()
    }

    fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn with_json(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health() {
        let fx = Fixture::with_layout(&[1]).await;
        let resp = app(&fx)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn mark_completed_returns_rollups() {
        let fx = Fixture::with_layout(&[3]).await;
        fx.enroll_learner().await;
        let token = fx.token_for(&fx.learner).await;
        let form = format!("lesson_id={}&completed=true", fx.lessons[0][0].id);

        let resp = app(&fx).oneshot(mark(Some(&token), &form)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["completed"], true);
        assert_eq!(body["module_progress"], 33);
        assert_eq!(body["module_completed"], 1);
        assert_eq!(body["module_total"], 3);
        assert_eq!(body["message"], "Lesson marked as completed");
        assert!(body["completed_at"].is_string());

        let form = format!("lesson_id={}&completed=false", fx.lessons[0][0].id);
        let body = body_json(app(&fx).oneshot(mark(Some(&token), &form)).await.unwrap()).await;
        assert_eq!(body["completed"], false);
        assert!(body["completed_at"].is_null());
        assert_eq!(body["course_progress"], 0);
        assert_eq!(body["message"], "Lesson marked as not completed");
    }

    #[tokio::test]
    async fn mark_requires_lesson_id() {
        let fx = Fixture::with_layout(&[1]).await;
        let token = fx.token_for(&fx.learner).await;
        let resp = app(&fx).oneshot(mark(Some(&token), "completed=true")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn mark_requires_session() {
        let fx = Fixture::with_layout(&[1]).await;
        let form = format!("lesson_id={}&completed=true", fx.lessons[0][0].id);
        let resp = app(&fx).oneshot(mark(None, &form)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app(&fx).oneshot(mark(Some("bogus"), &form)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn mark_rejects_unenrolled_and_unknown_lessons() {
        let fx = Fixture::with_layout(&[1]).await;
        let token = fx.token_for(&fx.learner).await;
        let form = format!("lesson_id={}&completed=true", fx.lessons[0][0].id);
        let resp = app(&fx).oneshot(mark(Some(&token), &form)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let form = format!("lesson_id={}&completed=true", Uuid::new_v4());
        let resp = app(&fx).oneshot(mark(Some(&token), &form)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app(&fx)
            .oneshot(mark(Some(&token), "lesson_id=42&completed=true"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cart_checkout_enrolls() {
        let fx = Fixture::with_layout(&[2]).await;
        let token = fx.token_for(&fx.learner).await;
        let course = fx.course.id;

        let resp = app(&fx)
            .oneshot(authed("POST", &format!("/cart/add/{course}"), &token))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["status"], "added");
        let resp = app(&fx)
            .oneshot(authed("POST", &format!("/cart/add/{course}"), &token))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["status"], "already_in_cart");

        let resp = app(&fx).oneshot(authed("GET", "/cart", &token)).await.unwrap();
        let cart = body_json(resp).await;
        assert_eq!(cart["total_cents"], 4900);

        let resp = app(&fx).oneshot(authed("POST", "/checkout", &token)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(body_json(resp).await["order"]["status"], "paid");
        assert!(fx.store.enrollment(fx.learner.id, course).await.unwrap().is_some());

        let resp = app(&fx).oneshot(authed("POST", "/checkout", &token)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app(&fx).oneshot(authed("GET", "/orders", &token)).await.unwrap();
        let orders = body_json(resp).await;
        assert_eq!(orders.as_array().map(Vec::len), Some(1));

        let mine = body_json(
            app(&fx)
                .oneshot(authed("GET", "/me/enrollments", &token))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(mine[0]["course"]["title"], "Rust Basics");
        assert_eq!(mine[0]["progress"]["total"], 2);
    }

    #[tokio::test]
    async fn enroll_reports_status() {
        let fx = Fixture::with_layout(&[1]).await;
        let token = fx.token_for(&fx.learner).await;
        let uri = format!("/courses/{}/enroll", fx.course.id);

        let resp = app(&fx).oneshot(authed("POST", &uri, &token)).await.unwrap();
        let first = body_json(resp).await;
        assert_eq!(first["status"], "created");
        let resp = app(&fx).oneshot(authed("POST", &uri, &token)).await.unwrap();
        let second = body_json(resp).await;
        assert_eq!(second["status"], "already_enrolled");
    }

    #[tokio::test]
    async fn course_pages_are_public() {
        let fx = Fixture::with_layout(&[2]).await;
        let resp = app(&fx)
            .oneshot(Request::get("/courses").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["total_count"], 1);

        let uri = format!("/courses/{}/modules/{}", fx.course.id, fx.modules[0].id);
        let resp = app(&fx)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(resp).await;
        assert_eq!(body["total_duration"], 30);
        assert!(body["progress"].is_null());
    }

    #[tokio::test]
    async fn unknown_course_is_json_404() {
        let fx = Fixture::with_layout(&[1]).await;
        let uri = format!("/courses/{}", Uuid::new_v4());
        let resp = app(&fx)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["error"], "course not found");
    }

    #[tokio::test]
    async fn malformed_requests_get_json_errors() {
        let fx = Fixture::with_layout(&[1]).await;
        let token = fx.token_for(&fx.learner).await;

        let resp = app(&fx)
            .oneshot(Request::get("/courses/not-a-uuid").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["success"], false);

        let resp = app(&fx)
            .oneshot(authed("POST", "/cart/add/42", &token))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["success"], false);

        // a JSON body where the lesson page posts a form
        let body = json!({ "lesson_id": fx.lessons[0][0].id, "completed": "true" });
        let req = with_json("POST", "/progress/mark-lesson-completed", &token, body);
        let resp = app(&fx).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());

        let author = fx.token_for(&fx.author).await;
        let uri = format!("/courses/{}", fx.course.id);
        let req = with_json("PATCH", &uri, &author, json!({ "duration_hours": "long" }));
        let resp = app(&fx).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(resp).await["success"], false);
    }

    #[tokio::test]
    async fn author_manages_content_over_http() {
        let fx = Fixture::with_layout(&[1, 1]).await;
        let author = fx.token_for(&fx.author).await;
        let learner = fx.token_for(&fx.learner).await;
        let uri = format!("/courses/{}", fx.course.id);

        let edit = json!({ "title": "Rust, Second Edition" });
        let resp = app(&fx)
            .oneshot(with_json("PATCH", &uri, &learner, edit.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = app(&fx)
            .oneshot(with_json("PATCH", &uri, &author, edit))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["title"], "Rust, Second Edition");

        let module_uri = format!("{uri}/modules/{}", fx.modules[1].id);
        let resp = app(&fx)
            .oneshot(authed("DELETE", &module_uri, &author))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let lesson_uri = format!(
            "{uri}/modules/{}/lessons/{}",
            fx.modules[0].id, fx.lessons[0][0].id
        );
        let req = with_json("PATCH", &lesson_uri, &author, json!({ "order": 4 }));
        let resp = app(&fx).oneshot(req).await.unwrap();
        assert_eq!(body_json(resp).await["order"], 4);

        let resp = app(&fx).oneshot(authed("GET", "/me/courses", &author)).await.unwrap();
        let board = body_json(resp).await;
        assert_eq!(board["total_count"], 1);
        assert_eq!(board["published_percent"], 100);

        let resp = app(&fx).oneshot(authed("DELETE", &uri, &author)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = app(&fx)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn home_is_public_and_stats_are_staff_only() {
        let fx = Fixture::with_layout(&[1]).await;
        let resp = app(&fx)
            .oneshot(Request::get("/home").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let page = body_json(resp).await;
        assert_eq!(page["total_courses"], 1);
        assert_eq!(page["featured_courses"][0]["title"], "Rust Basics");

        let learner = fx.token_for(&fx.learner).await;
        let resp = app(&fx)
            .oneshot(authed("GET", "/admin/stats", &learner))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let staff = fx.store.create_user("admin", true).await.unwrap();
        let token = fx.token_for(&staff).await;
        let resp = app(&fx)
            .oneshot(authed("GET", "/admin/stats", &token))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let stats = body_json(resp).await;
        assert_eq!(stats["paid_orders"], 0);
        assert_eq!(stats["top_courses"][0]["sold"], 0);
    }
}
