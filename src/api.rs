//! # API Server Module
//!
//! ## Purpose
//! REST API server exposing the retrieval engine: hybrid search, search
//! explanation, point-in-time statute lookup, health and statistics.
//!
//! ## Input/Output Specification
//! - **Input**: HTTP requests with query text, jurisdiction, as-of date
//! - **Output**: JSON responses; an empty result list means "no relevant
//!   match" and is distinguishable from an error
//!
//! ## Endpoints
//! - `POST /search`: ranked results
//! - `POST /search/explain`: results plus the cleaned query echo
//! - `GET /statute/{act_id}?date=`: an Act's sections as of a date
//! - `GET /graph/{act_id}`: act-to-sections structural graph view
//! - `GET /timeline/{act_id}/{section_no}`: version history of one section
//! - `GET /health`, `GET /stats`

use crate::engine::RankedResult;
use crate::errors::{Result, RetrievalError};
use crate::temporal::today;
use crate::text::clean_text;
use crate::{AppState, SearchRequest};
use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use serde::{Deserialize, Serialize};

/// API server wrapping the shared application state
pub struct ApiServer {
    app_state: AppState,
}

/// Query parameters for the statute endpoint
#[derive(Debug, Deserialize)]
pub struct StatuteParams {
    /// ISO date, or "today" (the default)
    pub date: Option<String>,
}

/// Search explanation payload
#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub query_clean: String,
    pub as_of_date: String,
    pub jurisdiction: String,
    pub count: usize,
    pub results: Vec<RankedResult>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl ApiServer {
    pub fn new(app_state: AppState) -> Self {
        Self { app_state }
    }

    /// Run the API server until the process is stopped.
    pub async fn run(self) -> Result<()> {
        let bind_addr = format!(
            "{}:{}",
            self.app_state.config.server.host, self.app_state.config.server.port
        );
        let enable_cors = self.app_state.config.server.enable_cors;

        tracing::info!("Starting API server on {}", bind_addr);

        let app_state = self.app_state.clone();
        let server = HttpServer::new(move || {
            let cors = if enable_cors {
                Cors::permissive()
            } else {
                Cors::default()
            };
            App::new()
                .wrap(cors)
                .app_data(web::Data::new(app_state.clone()))
                .route("/search", web::post().to(search_handler))
                .route("/search/explain", web::post().to(explain_handler))
                .route("/statute/{act_id}", web::get().to(statute_handler))
                .route("/graph/{act_id}", web::get().to(graph_handler))
                .route(
                    "/timeline/{act_id}/{section_no}",
                    web::get().to(timeline_handler),
                )
                .route("/health", web::get().to(health_handler))
                .route("/stats", web::get().to(stats_handler))
        })
        .bind(&bind_addr)
        .map_err(|e| RetrievalError::Internal {
            message: format!("Failed to bind server to {}: {}", bind_addr, e),
        })?
        .run();

        server.await.map_err(|e| RetrievalError::Internal {
            message: format!("Server error: {}", e),
        })?;

        Ok(())
    }
}

fn error_response(err: &RetrievalError) -> HttpResponse {
    let body = serde_json::json!({
        "error": err.category(),
        "message": err.to_string(),
    });
    match err {
        RetrievalError::InvalidRequest { .. } => HttpResponse::BadRequest().json(body),
        RetrievalError::UnknownEntity { .. } => HttpResponse::NotFound().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// Hybrid search endpoint
async fn search_handler(
    app_state: web::Data<AppState>,
    request: web::Json<SearchRequest>,
) -> ActixResult<HttpResponse> {
    if request.query.trim().is_empty() {
        return Ok(error_response(&RetrievalError::InvalidRequest {
            reason: "query must be non-empty".to_string(),
        }));
    }

    match app_state.engine.search(request.into_inner()).await {
        Ok(results) => Ok(HttpResponse::Ok().json(results)),
        Err(e) => {
            tracing::error!(error = %e, category = e.category(), "Search failed");
            Ok(error_response(&e))
        }
    }
}

/// Search endpoint with the cleaned-query echo used by explanation UIs
async fn explain_handler(
    app_state: web::Data<AppState>,
    request: web::Json<SearchRequest>,
) -> ActixResult<HttpResponse> {
    let request = request.into_inner();
    if request.query.trim().is_empty() {
        return Ok(error_response(&RetrievalError::InvalidRequest {
            reason: "query must be non-empty".to_string(),
        }));
    }

    let query_clean = clean_text(&request.query);
    let as_of_date = request.as_of_date.clone().unwrap_or_else(today);
    let jurisdiction = request
        .jurisdiction
        .clone()
        .unwrap_or_else(|| "ALL".to_string());

    match app_state.engine.search(request).await {
        Ok(results) => Ok(HttpResponse::Ok().json(ExplainResponse {
            query_clean,
            as_of_date,
            jurisdiction,
            count: results.len(),
            results,
        })),
        Err(e) => {
            tracing::error!(error = %e, category = e.category(), "Search failed");
            Ok(error_response(&e))
        }
    }
}

/// Point-in-time statute lookup
async fn statute_handler(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<StatuteParams>,
) -> ActixResult<HttpResponse> {
    let act_id = path.into_inner();
    let as_of = match params.date.as_deref() {
        None | Some("today") => None,
        Some(date) => Some(date.to_string()),
    };

    match app_state.engine.statute_as_of(&act_id, as_of).await {
        Ok(snapshot) => Ok(HttpResponse::Ok().json(snapshot)),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Act structure graph view
async fn graph_handler(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let act_id = path.into_inner();
    match app_state.engine.act_graph(&act_id).await {
        Ok(graph) => Ok(HttpResponse::Ok().json(graph)),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Version history of one section
async fn timeline_handler(
    app_state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ActixResult<HttpResponse> {
    let (act_id, section_no) = path.into_inner();
    match app_state.engine.section_timeline(&act_id, &section_no).await {
        Ok(timeline) => Ok(HttpResponse::Ok().json(timeline)),
        Err(e) => Ok(error_response(&e)),
    }
}

/// Health check endpoint
async fn health_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let (status, healthy) = match app_state.engine.health_check().await {
        Ok(_) => ("healthy", true),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            ("unhealthy", false)
        }
    };

    let response = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    if healthy {
        Ok(HttpResponse::Ok().json(response))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(response))
    }
}

/// Engine statistics endpoint
async fn stats_handler(app_state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(app_state.engine.stats().await))
}
