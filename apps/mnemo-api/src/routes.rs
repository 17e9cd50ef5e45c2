use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use mnemo_service::{
	AddContentParams, CategorizationResult, ContentResultItem, Error as ServiceError,
	KeywordSearchParams, SearchResultItem, SemanticSearchParams,
};
use mnemo_storage::{content::ListContentParams, models::BackgroundJob};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/api/v1/contents", post(add_content).get(list_contents))
		.route("/api/v1/contents/{id}", get(get_content))
		.route("/api/v1/search", get(keyword_search))
		.route("/api/v1/search/semantic", get(semantic_search))
		.route("/api/v1/categorize", post(categorize))
		.route("/api/v1/categorize/batch", post(categorize_batch))
		.route("/api/v1/batches", get(list_batches))
		.route("/api/v1/answer", post(answer))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct AddContentRequest {
	source: String,
	title: Option<String>,
	input: String,
}

#[derive(Debug, Serialize)]
struct AddContentResponse {
	content: mnemo_storage::models::Content,
	existed: bool,
}

async fn add_content(
	State(state): State<AppState>,
	Json(payload): Json<AddContentRequest>,
) -> Result<Json<AddContentResponse>, ApiError> {
	if payload.source.trim().is_empty() || payload.input.trim().is_empty() {
		return Err(ApiError::bad_request("source and input are required."));
	}

	let params = AddContentParams {
		source_name: payload.source,
		title: payload.title,
		raw_input: payload.input,
		source_type: "api".to_string(),
	};
	let (content, existed) = state.service.add_content(&params).await?;

	Ok(Json(AddContentResponse { content, existed }))
}

#[derive(Debug, Deserialize)]
struct ListContentsQuery {
	#[serde(default)]
	limit: Option<i64>,
	#[serde(default)]
	offset: Option<i64>,
	#[serde(default)]
	sort_by: Option<String>,
	#[serde(default)]
	sort_order: Option<String>,
	/// Comma-separated tag names, match-any.
	#[serde(default)]
	tags: Option<String>,
}

async fn list_contents(
	State(state): State<AppState>,
	Query(query): Query<ListContentsQuery>,
) -> Result<Json<Vec<ContentResultItem>>, ApiError> {
	let params = ListContentParams {
		limit: query.limit.unwrap_or(20),
		offset: query.offset.unwrap_or(0),
		sort_by: query.sort_by.unwrap_or_else(|| "created_at".to_string()),
		sort_order: query.sort_order.unwrap_or_else(|| "DESC".to_string()),
		filter_tags: split_tags(query.tags.as_deref()),
	};
	let items = state.service.list_content(&params).await?;

	Ok(Json(items))
}

async fn get_content(
	State(state): State<AppState>,
	Path(id): Path<i64>,
) -> Result<Json<mnemo_storage::models::Content>, ApiError> {
	let content = state.service.get_content(id).await?;

	Ok(Json(content))
}

#[derive(Debug, Deserialize)]
struct SearchQueryParams {
	q: String,
	#[serde(default)]
	tags: Option<String>,
	#[serde(default)]
	k: Option<i64>,
}

async fn keyword_search(
	State(state): State<AppState>,
	Query(query): Query<SearchQueryParams>,
) -> Result<Json<Vec<SearchResultItem>>, ApiError> {
	if query.q.trim().is_empty() {
		return Err(ApiError::bad_request("q is required."));
	}

	let params = KeywordSearchParams {
		query: query.q,
		filter_tags: split_tags(query.tags.as_deref()),
		limit: 0,
		offset: 0,
	};
	let items = state.service.keyword_search(&params).await?;

	Ok(Json(items))
}

async fn semantic_search(
	State(state): State<AppState>,
	Query(query): Query<SearchQueryParams>,
) -> Result<Json<Vec<SearchResultItem>>, ApiError> {
	if query.q.trim().is_empty() {
		return Err(ApiError::bad_request("q is required."));
	}

	let params = SemanticSearchParams {
		query: query.q,
		limit: query.k.unwrap_or(0),
		filter_tags: split_tags(query.tags.as_deref()),
	};
	let items = state.service.semantic_search(&params).await?;

	Ok(Json(items))
}

#[derive(Debug, Deserialize)]
struct CategorizeRequest {
	content_id: i64,
	#[serde(default)]
	apply: bool,
}

async fn categorize(
	State(state): State<AppState>,
	Json(payload): Json<CategorizeRequest>,
) -> Result<Json<CategorizationResult>, ApiError> {
	let content = state.service.get_content(payload.content_id).await?;
	let result =
		state.service.categorize_content(&content.title, &content.body, Vec::new()).await?;

	state.service.apply_categories(payload.content_id, &result, payload.apply).await?;

	Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct CategorizeBatchRequest {
	content_ids: Vec<i64>,
}

async fn categorize_batch(
	State(state): State<AppState>,
	Json(payload): Json<CategorizeBatchRequest>,
) -> Result<Json<std::collections::HashMap<i64, CategorizationResult>>, ApiError> {
	if payload.content_ids.is_empty() {
		return Err(ApiError::bad_request("content_ids must be non-empty."));
	}

	let results = state.service.batch_categorize(&payload.content_ids).await?;

	Ok(Json(results))
}

#[derive(Debug, Deserialize)]
struct ListBatchesQuery {
	#[serde(default)]
	limit: Option<i64>,
	#[serde(default)]
	offset: Option<i64>,
}

async fn list_batches(
	State(state): State<AppState>,
	Query(query): Query<ListBatchesQuery>,
) -> Result<Json<Vec<BackgroundJob>>, ApiError> {
	let jobs = state
		.service
		.list_batches(query.limit.unwrap_or(20), query.offset.unwrap_or(0))
		.await?;

	Ok(Json(jobs))
}

#[derive(Debug, Deserialize)]
struct AnswerRequest {
	query: String,
}

#[derive(Debug, Serialize)]
struct AnswerResponse {
	answer: String,
}

async fn answer(
	State(state): State<AppState>,
	Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
	let answer = state.service.answer(&payload.query).await?;

	Ok(Json(AnswerResponse { answer }))
}

fn split_tags(raw: Option<&str>) -> Vec<String> {
	raw.map(|raw| {
		raw.split(',')
			.map(str::trim)
			.filter(|tag| !tag.is_empty())
			.map(str::to_string)
			.collect()
	})
	.unwrap_or_default()
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
	error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	code: &'static str,
	message: String,
}
impl ApiError {
	fn bad_request(message: impl Into<String>) -> Self {
		Self { status: StatusCode::BAD_REQUEST, code: "bad_request", message: message.into() }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let (status, code) = match &err {
			ServiceError::InvalidRequest { .. }
			| ServiceError::PermissionDenied { .. }
			| ServiceError::ReadError { .. }
			| ServiceError::FetchError { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
			ServiceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
			ServiceError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
			ServiceError::NotImplemented { .. } =>
				(StatusCode::NOT_IMPLEMENTED, "not_implemented"),
			ServiceError::Provider { .. }
			| ServiceError::Storage { .. }
			| ServiceError::Queue { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
		};

		Self { status, code, message: err.to_string() }
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorEnvelope {
			error: ErrorBody { code: self.code.to_string(), message: self.message },
		};

		(self.status, Json(body)).into_response()
	}
}
