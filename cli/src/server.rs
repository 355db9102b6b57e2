use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        Path, Query, Request, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::Config;
use crate::openfoodfacts::OpenFoodFactsClient;
use caltrack_core::Error;
use caltrack_core::models::{
    DailySummary, Favorite, Food, Goals, MealEntryView, MealSlot, NewFood, NewMealEntry,
    NewWeightEntry, SearchPage, UpdateFood, UpdateGoals, UpdateMealEntry, User, WeeklySummary, WeightEntry,
    parse_date,
};
use caltrack_core::service::{
    BarcodeMatch, CaltrackService, FoodLookup, validate_page, validate_query,
};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB
const APP_NAME: &str = "CalTrack";

#[derive(Clone)]
pub struct AppState {
    service: Arc<Mutex<CaltrackService>>,
    lookup: Arc<dyn FoodLookup>,
}

impl AppState {
    pub fn new(service: CaltrackService, lookup: Arc<dyn FoodLookup>) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            lookup,
        }
    }

    // Never hold the guard across an `.await`.
    fn service(&self) -> MutexGuard<'_, CaltrackService> {
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

// --- Request types ---

#[derive(Deserialize)]
struct CreateUserRequest {
    name: String,
    #[serde(flatten)]
    goals: UpdateGoals,
}

#[derive(Deserialize)]
struct FoodListQuery {
    query: Option<String>,
}

#[derive(Deserialize)]
struct SearchQuery {
    query: String,
    page: Option<u32>,
}

#[derive(Deserialize)]
struct CreateMealRequest {
    user_id: i64,
    food_id: i64,
    date: String,
    meal_slot: String,
    quantity_g: f64,
}

#[derive(Deserialize)]
struct UpdateMealRequest {
    quantity_g: Option<f64>,
    meal_slot: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct MealListQuery {
    user: i64,
    date: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

#[derive(Deserialize)]
struct DailyQuery {
    user: i64,
    date: Option<String>,
}

#[derive(Deserialize)]
struct WeeklyQuery {
    user: i64,
    end: Option<String>,
}

#[derive(Deserialize)]
struct CreateWeightRequest {
    user_id: i64,
    date: String,
    weight_kg: f64,
    note: Option<String>,
}

#[derive(Deserialize)]
struct WeightHistoryQuery {
    user: i64,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct UserQuery {
    user: i64,
}

#[derive(Deserialize)]
struct FavoriteRequest {
    user_id: i64,
    food_id: i64,
}

#[derive(Deserialize)]
struct FavoriteQuery {
    user: i64,
    food: i64,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

// --- Error handling ---

enum ApiError {
    Core(Error),
    Rejected(StatusCode, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            Self::Core(err) => {
                let status = match &err {
                    Error::Validation(_) => StatusCode::BAD_REQUEST,
                    Error::NotFound(_) => StatusCode::NOT_FOUND,
                    Error::Conflict(_) => StatusCode::CONFLICT,
                    Error::LookupUnavailable(_) => StatusCode::BAD_GATEWAY,
                    Error::Database(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    let detail = format!("{err:#}");
                    tracing::error!(error = %detail, "internal server error");
                    "Internal server error".to_string()
                } else {
                    err.to_string()
                };
                (status, err.kind(), message)
            }
            Self::Rejected(status, message) => (status, "validation_error", message),
        };
        (status, Json(ErrorResponse { error, message })).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Core(Error::Other(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected(rejection.status(), rejection.body_text())
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_optional_date(value: Option<&str>) -> caltrack_core::Result<Option<NaiveDate>> {
    value.map(parse_date).transpose()
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "app": APP_NAME }))
}

async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.service().list_users()?))
}

async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(req) = payload?;
    let goals = req.goals.apply_to(Goals::default());
    let user = state.service().create_user(&req.name, Some(goals))?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<User>> {
    Ok(Json(state.service().get_user(id)?))
}

async fn update_goals(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateGoals>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let Json(update) = payload?;
    Ok(Json(state.service().update_goals(id, &update)?))
}

async fn list_foods(
    State(state): State<AppState>,
    params: Result<Query<FoodListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Food>>> {
    let Query(params) = params?;
    Ok(Json(state.service().list_foods(params.query.as_deref())?))
}

async fn create_food(
    State(state): State<AppState>,
    payload: Result<Json<NewFood>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Food>)> {
    let Json(food) = payload?;
    let food = state.service().create_food(&food)?;
    Ok((StatusCode::CREATED, Json(food)))
}

async fn get_food(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Food>> {
    Ok(Json(state.service().get_food(id)?))
}

async fn update_food(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateFood>, JsonRejection>,
) -> ApiResult<Json<Food>> {
    let Json(update) = payload?;
    Ok(Json(state.service().update_food(id, &update)?))
}

async fn search_foods(
    State(state): State<AppState>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Json<SearchPage>> {
    let Query(params) = params?;
    let query = validate_query(&params.query)?;
    let page = validate_page(params.page)?;
    Ok(Json(state.lookup.search(&query, page).await?))
}

async fn lookup_barcode(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<BarcodeMatch>> {
    let cached = state.service().find_cached_barcode(&code)?;
    if let Some(food) = cached {
        return Ok(Json(BarcodeMatch::Catalog(food)));
    }

    let candidate = state.lookup.lookup_barcode(code.trim()).await?;
    Ok(Json(BarcodeMatch::External(candidate)))
}

async fn import_food(
    State(state): State<AppState>,
    payload: Result<Json<NewFood>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Food>)> {
    let Json(candidate) = payload?;
    let (food, created) = state.service().import_food(&candidate)?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(food)))
}

async fn list_meals(
    State(state): State<AppState>,
    params: Result<Query<MealListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<MealEntryView>>> {
    let Query(params) = params?;
    let (from, to) = match params.date.as_deref() {
        Some(date) => {
            if params.from.is_some() || params.to.is_some() {
                return Err(Error::validation("Use either date or from/to, not both").into());
            }
            let date = parse_date(date)?;
            (Some(date), Some(date))
        }
        None => (
            parse_optional_date(params.from.as_deref())?,
            parse_optional_date(params.to.as_deref())?,
        ),
    };
    let entries = state.service().list_meals(params.user, from, to)?;
    Ok(Json(entries.into_iter().map(MealEntryView::from).collect()))
}

async fn create_meal(
    State(state): State<AppState>,
    payload: Result<Json<CreateMealRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MealEntryView>)> {
    let Json(req) = payload?;
    let entry = NewMealEntry {
        user_id: req.user_id,
        food_id: req.food_id,
        date: parse_date(&req.date)?,
        meal_slot: req.meal_slot.parse::<MealSlot>()?,
        quantity_g: req.quantity_g,
    };
    let entry = state.service().log_meal(&entry)?;
    Ok((StatusCode::CREATED, Json(MealEntryView::from(entry))))
}

async fn update_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateMealRequest>, JsonRejection>,
) -> ApiResult<Json<MealEntryView>> {
    let Json(req) = payload?;
    let update = UpdateMealEntry {
        quantity_g: req.quantity_g,
        meal_slot: req
            .meal_slot
            .as_deref()
            .map(str::parse::<MealSlot>)
            .transpose()?,
        date: parse_optional_date(req.date.as_deref())?,
    };
    let entry = state.service().update_meal(id, &update)?;
    Ok(Json(MealEntryView::from(entry)))
}

async fn delete_meal(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.service().delete_meal(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn daily_stats(
    State(state): State<AppState>,
    params: Result<Query<DailyQuery>, QueryRejection>,
) -> ApiResult<Json<DailySummary>> {
    let Query(params) = params?;
    let date = parse_optional_date(params.date.as_deref())?.unwrap_or_else(today);
    Ok(Json(state.service().daily_summary(params.user, date)?))
}

async fn weekly_stats(
    State(state): State<AppState>,
    params: Result<Query<WeeklyQuery>, QueryRejection>,
) -> ApiResult<Json<WeeklySummary>> {
    let Query(params) = params?;
    let end = parse_optional_date(params.end.as_deref())?.unwrap_or_else(today);
    Ok(Json(state.service().weekly_summary(params.user, end)?))
}

async fn weight_history(
    State(state): State<AppState>,
    params: Result<Query<WeightHistoryQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<WeightEntry>>> {
    let Query(params) = params?;
    Ok(Json(
        state.service().weight_history(params.user, params.limit)?,
    ))
}

async fn log_weight(
    State(state): State<AppState>,
    payload: Result<Json<CreateWeightRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WeightEntry>)> {
    let Json(req) = payload?;
    let entry = NewWeightEntry {
        user_id: req.user_id,
        date: parse_date(&req.date)?,
        weight_kg: req.weight_kg,
        note: req.note,
    };
    let entry = state.service().log_weight(&entry)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_weight(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.service().delete_weight(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_favorites(
    State(state): State<AppState>,
    params: Result<Query<UserQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Food>>> {
    let Query(params) = params?;
    Ok(Json(state.service().list_favorites(params.user)?))
}

async fn add_favorite(
    State(state): State<AppState>,
    payload: Result<Json<FavoriteRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Favorite>)> {
    let Json(req) = payload?;
    let favorite = state.service().add_favorite(req.user_id, req.food_id)?;
    Ok((StatusCode::CREATED, Json(favorite)))
}

async fn remove_favorite(
    State(state): State<AppState>,
    params: Result<Query<FavoriteQuery>, QueryRejection>,
) -> ApiResult<StatusCode> {
    let Query(params) = params?;
    state.service().remove_favorite(params.user, params.food)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router builder ---

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", get(get_user).put(update_goals))
        .route("/api/foods", get(list_foods).post(create_food))
        .route("/api/foods/search", get(search_foods))
        .route("/api/foods/barcode/{code}", get(lookup_barcode))
        .route("/api/foods/import", post(import_food))
        .route("/api/foods/{id}", get(get_food).put(update_food))
        .route("/api/meals", get(list_meals).post(create_meal))
        .route("/api/meals/{id}", put(update_meal).delete(delete_meal))
        .route("/api/stats/daily", get(daily_stats))
        .route("/api/stats/weekly", get(weekly_stats))
        .route("/api/weights", get(weight_history).post(log_weight))
        .route("/api/weights/{id}", delete(delete_weight))
        .route(
            "/api/favorites",
            get(list_favorites)
                .post(add_favorite)
                .delete(remove_favorite),
        )
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    service: CaltrackService,
    lookup: OpenFoodFactsClient,
    config: &Config,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    let app = build_router(AppState::new(service, Arc::new(lookup)));

    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    if bind != "127.0.0.1" && bind != "localhost" {
        tracing::warn!(%bind, "listening beyond localhost without authentication");
    }
    tracing::info!(
        %addr,
        db = %config.db_path.display(),
        lookup = %config.off_url,
        "CalTrack API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use caltrack_core::models::FoodSource;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct MockLookup {
        foods: Vec<NewFood>,
        fail: bool,
    }

    #[async_trait]
    impl FoodLookup for MockLookup {
        async fn search(&self, query: &str, page: u32) -> caltrack_core::Result<SearchPage> {
            if self.fail {
                return Err(Error::LookupUnavailable("connection refused".to_string()));
            }
            let query = query.to_lowercase();
            let matches: Vec<NewFood> = self
                .foods
                .iter()
                .filter(|f| f.name.to_lowercase().contains(&query))
                .cloned()
                .collect();
            let size = caltrack_core::service::SEARCH_PAGE_SIZE as usize;
            Ok(SearchPage {
                count: matches.len() as u64,
                page,
                page_size: size as u32,
                products: matches
                    .into_iter()
                    .skip((page as usize - 1) * size)
                    .take(size)
                    .collect(),
            })
        }

        async fn lookup_barcode(&self, code: &str) -> caltrack_core::Result<NewFood> {
            if self.fail {
                return Err(Error::LookupUnavailable("timed out".to_string()));
            }
            self.foods
                .iter()
                .find(|f| f.barcode.as_deref() == Some(code))
                .cloned()
                .ok_or_else(|| Error::not_found(format!("No product found for barcode '{code}'")))
        }
    }

    fn apple() -> NewFood {
        NewFood {
            name: "Apple".to_string(),
            brand: None,
            barcode: Some("4000000000017".to_string()),
            kcal_per_100g: 52.0,
            protein_g: 0.3,
            carbs_g: 14.0,
            fat_g: 0.2,
            fiber_g: Some(2.4),
            sugar_g: None,
            source: FoodSource::External,
            external_id: Some("4000000000017".to_string()),
            image_url: None,
        }
    }

    fn test_app_with(fail: bool) -> Router {
        let lookup = MockLookup {
            foods: vec![apple()],
            fail,
        };
        build_router(AppState::new(
            CaltrackService::new_in_memory().unwrap(),
            Arc::new(lookup),
        ))
    }

    fn test_app() -> Router {
        test_app_with(false)
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: axum::http::Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    async fn create_user(app: &Router, name: &str) -> i64 {
        let (status, body) = send(app, json_request("POST", "/api/users", &json!({"name": name}))).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn import_apple(app: &Router) -> i64 {
        let body = serde_json::to_value(apple()).unwrap();
        let (_, food) = send(app, json_request("POST", "/api/foods/import", &body)).await;
        food["id"].as_i64().unwrap()
    }

    async fn log_meal(app: &Router, user: i64, food: i64, date: &str, quantity: f64) -> Value {
        let body = json!({
            "user_id": user,
            "food_id": food,
            "date": date,
            "meal_slot": "breakfast",
            "quantity_g": quantity,
        });
        let (status, entry) = send(app, json_request("POST", "/api/meals", &body)).await;
        assert_eq!(status, StatusCode::CREATED);
        entry
    }

    #[tokio::test]
    async fn health_reports_app() {
        let app = test_app();
        let (status, body) = send(&app, empty_request("GET", "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["app"], "CalTrack");
    }

    #[tokio::test]
    async fn security_headers_present() {
        let app = test_app();
        let response = app.oneshot(empty_request("GET", "/api/users")).await.unwrap();
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    }

    #[tokio::test]
    async fn create_user_applies_default_goals() {
        let app = test_app();
        let body = json!({"name": "Anna", "protein_goal_g": 120});
        let (status, user) = send(&app, json_request("POST", "/api/users", &body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(user["name"], "Anna");
        assert_eq!(user["calorie_goal"], 2000);
        assert_eq!(user["protein_goal_g"], 120);

        let (status, users) = send(&app, empty_request("GET", "/api/users")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(users.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_user_returns_409() {
        let app = test_app();
        create_user(&app, "Anna").await;
        let (status, body) =
            send(&app, json_request("POST", "/api/users", &json!({"name": "Anna"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn unknown_user_returns_404() {
        let app = test_app();
        let (status, body) = send(&app, empty_request("GET", "/api/users/42")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, _) = send(&app, empty_request("GET", "/api/stats/daily?user=42&date=2024-06-15")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_goals_endpoint() {
        let app = test_app();
        let user = create_user(&app, "Anna").await;
        let uri = format!("/api/users/{user}");
        let (status, body) =
            send(&app, json_request("PUT", &uri, &json!({"calorie_goal": 1800}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["calorie_goal"], 1800);

        let (status, body) = send(&app, json_request("PUT", &uri, &json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn create_and_edit_food() {
        let app = test_app();
        let body = json!({"name": "Rice", "kcal_per_100g": 130, "carbs_g": 28});
        let (status, food) = send(&app, json_request("POST", "/api/foods", &body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(food["source"], "manual");
        assert_eq!(food["protein_g"], 0.0);

        let uri = format!("/api/foods/{}", food["id"]);
        let (status, edited) =
            send(&app, json_request("PUT", &uri, &json!({"brand": "Uncle"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["brand"], "Uncle");

        let (status, list) = send(&app, empty_request("GET", "/api/foods?query=ric")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn negative_macro_is_400() {
        let app = test_app();
        let body = json!({"name": "Bad", "kcal_per_100g": -1});
        let (status, body) = send(&app, json_request("POST", "/api/foods", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_with_error_body() {
        let app = test_app();
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/users")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert!(status.is_client_error());
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn external_search_returns_candidates() {
        let app = test_app();
        let (status, body) = send(&app, empty_request("GET", "/api/foods/search?query=app")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["page"], 1);
        assert_eq!(body["page_size"], 20);
        assert_eq!(body["products"][0]["name"], "Apple");
        assert_eq!(body["products"][0]["external_id"], "4000000000017");
        assert_eq!(body["products"][0]["fiber_g"], 2.4);
        assert!(body["products"][0].get("sugar_g").is_none());

        // Candidates are not persisted
        let (_, local) = send(&app, empty_request("GET", "/api/foods")).await;
        assert!(local.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn external_search_pages() {
        let app = test_app();
        let (status, body) =
            send(&app, empty_request("GET", "/api/foods/search?query=app&page=2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["page"], 2);
        assert!(body["products"].as_array().unwrap().is_empty());

        let (status, body) =
            send(&app, empty_request("GET", "/api/foods/search?query=app&page=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");

        let (status, _) =
            send(&app, empty_request("GET", "/api/foods/search?query=app&page=-1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lookup_failure_returns_502() {
        let app = test_app_with(true);
        let (status, body) = send(&app, empty_request("GET", "/api/foods/search?query=apple")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "lookup_unavailable");

        let (status, _) = send(&app, empty_request("GET", "/api/foods/barcode/4000000000017")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn barcode_lookup_prefers_catalog() {
        let app = test_app();
        let uri = "/api/foods/barcode/4000000000017";
        let (status, body) = send(&app, empty_request("GET", uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["origin"], "external");

        let id = import_apple(&app).await;
        let (status, body) = send(&app, empty_request("GET", uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["origin"], "catalog");
        assert_eq!(body["food"]["id"], id);

        let (status, _) = send(&app, empty_request("GET", "/api/foods/barcode/999")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, empty_request("GET", "/api/foods/barcode/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn import_twice_returns_same_food() {
        let app = test_app();
        let body = serde_json::to_value(apple()).unwrap();
        let (first_status, first) = send(&app, json_request("POST", "/api/foods/import", &body)).await;
        let (second_status, second) =
            send(&app, json_request("POST", "/api/foods/import", &body)).await;
        assert_eq!(first_status, StatusCode::CREATED);
        assert_eq!(second_status, StatusCode::OK);
        assert_eq!(first["id"], second["id"]);

        let (_, local) = send(&app, empty_request("GET", "/api/foods")).await;
        assert_eq!(local.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn log_meal_and_daily_stats() {
        let app = test_app();
        let user = create_user(&app, "Anna").await;
        let food = import_apple(&app).await;

        let entry = log_meal(&app, user, food, "2024-06-15", 150.0).await;
        assert_eq!(entry["nutrients"]["kcal"], 78.0);
        assert_eq!(entry["nutrients"]["protein_g"], 0.45);
        assert_eq!(entry["nutrients"]["carbs_g"], 21.0);
        assert_eq!(entry["nutrients"]["fat_g"], 0.3);

        let uri = format!("/api/stats/daily?user={user}&date=2024-06-15");
        let (status, summary) = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["totals"]["kcal"], 78.0);
        assert_eq!(summary["meals"][0]["meal_slot"], "breakfast");
        assert_eq!(summary["remaining"]["kcal"], 1922.0);
    }

    #[tokio::test]
    async fn log_then_delete_restores_totals() {
        let app = test_app();
        let user = create_user(&app, "Anna").await;
        let food = import_apple(&app).await;
        let stats_uri = format!("/api/stats/daily?user={user}&date=2024-06-15");

        let (_, before) = send(&app, empty_request("GET", &stats_uri)).await;
        let entry = log_meal(&app, user, food, "2024-06-15", 200.0).await;
        let delete_uri = format!("/api/meals/{}", entry["id"]);
        let (status, _) = send(&app, empty_request("DELETE", &delete_uri)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, after) = send(&app, empty_request("GET", &stats_uri)).await;
        assert_eq!(before["totals"], after["totals"]);

        let (status, _) = send(&app, empty_request("DELETE", &delete_uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_meal_input_is_400() {
        let app = test_app();
        let user = create_user(&app, "Anna").await;
        let food = import_apple(&app).await;

        for (slot, date, quantity) in [
            ("brunch", "2024-06-15", 100.0),
            ("lunch", "15/06/2024", 100.0),
            ("lunch", "2024-06-15", 0.0),
        ] {
            let body = json!({
                "user_id": user, "food_id": food, "date": date,
                "meal_slot": slot, "quantity_g": quantity,
            });
            let (status, body) = send(&app, json_request("POST", "/api/meals", &body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{slot} {date} {quantity}");
            assert_eq!(body["error"], "validation_error");
        }

        let body = json!({
            "user_id": user, "food_id": 999, "date": "2024-06-15",
            "meal_slot": "lunch", "quantity_g": 10,
        });
        let (status, _) = send(&app, json_request("POST", "/api/meals", &body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_meal_and_list_range() {
        let app = test_app();
        let user = create_user(&app, "Anna").await;
        let food = import_apple(&app).await;
        let entry = log_meal(&app, user, food, "2024-06-15", 100.0).await;
        log_meal(&app, user, food, "2024-06-10", 100.0).await;

        let uri = format!("/api/meals/{}", entry["id"]);
        let body = json!({"quantity_g": 200, "meal_slot": "dinner"});
        let (status, updated) = send(&app, json_request("PUT", &uri, &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["meal_slot"], "dinner");
        assert_eq!(updated["nutrients"]["kcal"], 104.0);

        let uri = format!("/api/meals?user={user}&date=2024-06-15");
        let (_, day) = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(day.as_array().unwrap().len(), 1);

        let uri = format!("/api/meals?user={user}&from=2024-06-01&to=2024-06-30");
        let (_, range) = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(range.as_array().unwrap().len(), 2);
        assert_eq!(range[0]["date"], "2024-06-15");

        let uri = format!("/api/meals?user={user}&date=2024-06-15&from=2024-06-01");
        let (status, _) = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn weekly_stats_empty_week() {
        let app = test_app();
        let user = create_user(&app, "Anna").await;
        let uri = format!("/api/stats/weekly?user={user}&end=2024-06-16");
        let (status, week) = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(week["start"], "2024-06-10");
        assert_eq!(week["days"].as_array().unwrap().len(), 7);
        assert_eq!(week["totals"]["kcal"], 0.0);
    }

    #[tokio::test]
    async fn weight_upsert_and_history() {
        let app = test_app();
        let user = create_user(&app, "Anna").await;
        let body = json!({"user_id": user, "date": "2025-01-15", "weight_kg": 80.0});
        let (status, first) = send(&app, json_request("POST", "/api/weights", &body)).await;
        assert_eq!(status, StatusCode::CREATED);

        let body = json!({"user_id": user, "date": "2025-01-15", "weight_kg": 79.4, "note": "gym"});
        let (_, second) = send(&app, json_request("POST", "/api/weights", &body)).await;
        assert_eq!(first["id"], second["id"]);

        let uri = format!("/api/weights?user={user}");
        let (status, history) = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["weight_kg"], 79.4);
        assert_eq!(history[0]["note"], "gym");

        let delete_uri = format!("/api/weights/{}", first["id"]);
        let (status, _) = send(&app, empty_request("DELETE", &delete_uri)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, empty_request("DELETE", &delete_uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn favorites_lifecycle() {
        let app = test_app();
        let user = create_user(&app, "Anna").await;
        let food = import_apple(&app).await;
        let body = json!({"user_id": user, "food_id": food});

        let (status, _) = send(&app, json_request("POST", "/api/favorites", &body)).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body_json) = send(&app, json_request("POST", "/api/favorites", &body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body_json["error"], "conflict");

        let (_, list) = send(&app, empty_request("GET", &format!("/api/favorites?user={user}"))).await;
        assert_eq!(list[0]["name"], "Apple");

        let uri = format!("/api/favorites?user={user}&food={food}");
        let (status, _) = send(&app, empty_request("DELETE", &uri)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, empty_request("DELETE", &uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_query_parameter_is_400() {
        let app = test_app();
        let (status, body) = send(&app, empty_request("GET", "/api/stats/daily")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let app = test_app();
        let big_body = vec![b' '; BODY_LIMIT + 1];
        let response = app
            .oneshot(
                axum::http::Request::post("/api/foods")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::from(anyhow::anyhow!("secret database path /home/anna/caltrack.db"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "internal_error");
        assert!(!json["message"].as_str().unwrap().contains("secret"));
    }
}
