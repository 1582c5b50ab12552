use axum::{
	Json, Router,
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

use compass_service::{
	AddCompanyResponse, ChatRequest, ChatResponse, CompanyListResponse, DeleteCompanyResponse,
	Error, NewCompany, SearchRequest, SearchResponse,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/chat", post(chat))
		.route("/v1/companies", get(list_companies).post(add_company))
		.route("/v1/companies/search", post(search))
		.route("/v1/companies/{id}", delete(delete_company))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn chat(
	State(state): State<AppState>,
	Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
	let response = state.service.chat(payload).await?;

	Ok(Json(response))
}

async fn search(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(payload).await?;

	Ok(Json(response))
}

async fn list_companies(
	State(state): State<AppState>,
) -> Result<Json<CompanyListResponse>, ApiError> {
	let response = state.service.list_companies().await?;

	Ok(Json(response))
}

async fn add_company(
	State(state): State<AppState>,
	Json(payload): Json<NewCompany>,
) -> Result<(StatusCode, Json<AddCompanyResponse>), ApiError> {
	let response = state.service.add_company(payload).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn delete_company(
	State(state): State<AppState>,
	Path(id): Path<i64>,
) -> Result<Json<DeleteCompanyResponse>, ApiError> {
	let response = state.service.delete_company(id).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
	pub error_code: String,
	pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: &'static str, message: String) -> Self {
		Self { status, error_code, message }
	}
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let message = err.to_string();

		match err {
			Error::InvalidRequest { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			Error::InvalidFilter { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_filter", message),
			Error::InvalidQuery { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_query", message),
			Error::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "not_found", message),
			Error::Embedding { .. } =>
				Self::new(StatusCode::BAD_GATEWAY, "embedding_unavailable", message),
			Error::Provider { .. } => Self::new(StatusCode::BAD_GATEWAY, "provider_error", message),
			Error::StoreUnavailable { .. } =>
				Self::new(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", message),
			Error::ToolLoopExhausted { .. } =>
				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "tool_loop_exhausted", message),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		if self.status.is_server_error() {
			tracing::error!(
				status = self.status.as_u16(),
				error_code = self.error_code,
				message = %self.message,
				"Request failed."
			);
		}

		let body = ErrorBody { error_code: self.error_code.to_string(), message: self.message };

		(self.status, Json(body)).into_response()
	}
}
