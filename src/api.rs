//! REST API for the star notary service
//!
//! Thin glue over the chain manager and admission mempool: routing, payload
//! field checks, and hex/text story encoding. Every error kind survives to
//! this boundary with its own message instead of collapsing into a generic
//! failure.

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

use crate::block::{Block, BlockBody, ClaimRecord, StarRecord};
use crate::chain::Chain;
use crate::error::NotaryError;
use crate::mempool::Mempool;

/// Shared handler state: one chain, one mempool.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<Chain>,
    pub mempool: Arc<Mempool>,
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Notary(NotaryError),
    InvalidInput(String),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "status": 404,
                    "message": message,
                })),
            )
                .into_response(),
            ApiError::InvalidInput(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse { error: message }),
            )
                .into_response(),
            ApiError::Notary(err) => {
                let message = match &err {
                    NotaryError::ValidationNotFound => {
                        "No active requests for this wallet. Submit one using /requestValidation"
                            .to_string()
                    }
                    NotaryError::InvalidSignature => "Message Validation Failed!".to_string(),
                    other => other.to_string(),
                };
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { error: message }),
                )
                    .into_response()
            }
        }
    }
}

impl From<NotaryError> for ApiError {
    fn from(err: NotaryError) -> Self {
        ApiError::Notary(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
struct ValidationBody {
    address: Option<String>,
}

#[derive(Deserialize)]
struct SignatureBody {
    address: Option<String>,
    signature: Option<String>,
}

#[derive(Deserialize)]
struct StarClaimBody {
    address: Option<String>,
    star: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StarInput {
    ra: String,
    dec: String,
    mag: Option<String>,
    cen: Option<String>,
    story: String,
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Serialize a block for a response, adding the decoded story text next to
/// the hex-encoded one. The decoded field is never persisted or hashed.
fn with_decoded_story(block: &Block) -> Result<serde_json::Value, NotaryError> {
    let mut value = serde_json::to_value(block)?;
    if let Some(star) = value
        .pointer_mut("/body/star")
        .and_then(|v| v.as_object_mut())
    {
        let decoded = star.get("story").and_then(|s| s.as_str()).map(|story_hex| {
            hex::decode(story_hex)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        });
        if let Some(decoded) = decoded {
            star.insert(
                "storyDecoded".to_string(),
                serde_json::Value::String(decoded),
            );
        }
    }
    Ok(value)
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware. Logs method, path, status and duration.
async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints (also used by tests).
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Admission endpoints
        .route("/requestValidation", post(request_validation))
        .route("/message-signature/validate", post(validate_signature))
        // Ledger endpoints
        .route("/block", post(register_star))
        .route("/block/:height", get(block_by_height))
        .route("/stars/hash/:hash", get(star_by_hash))
        .route("/stars/address/:address", get(stars_by_address))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
        .layer(cors)
}

/// Run the API server on the given port.
pub async fn serve(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "notary API listening");

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn request_validation(
    State(state): State<AppState>,
    Json(body): Json<ValidationBody>,
) -> Result<impl IntoResponse, ApiError> {
    let address = body
        .address
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("Please provide an address!".to_string()))?;

    let request = state.mempool.request_challenge(&address)?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn validate_signature(
    State(state): State<AppState>,
    Json(body): Json<SignatureBody>,
) -> Result<impl IntoResponse, ApiError> {
    let (address, signature) = match (body.address, body.signature) {
        (Some(address), Some(signature)) if !address.is_empty() && !signature.is_empty() => {
            (address, signature)
        }
        _ => {
            return Err(ApiError::InvalidInput(
                "Please provide an address and signature!".to_string(),
            ))
        }
    };

    let ticket = state.mempool.verify_ownership(&address, &signature)?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn register_star(
    State(state): State<AppState>,
    Json(body): Json<StarClaimBody>,
) -> Result<impl IntoResponse, ApiError> {
    let (address, star_value) = match (body.address, body.star) {
        (Some(address), Some(star)) if !address.is_empty() => (address, star),
        _ => {
            return Err(ApiError::InvalidInput(
                "Please provide correct payload content".to_string(),
            ))
        }
    };

    // One star at a time
    if star_value.is_array() {
        return Err(ApiError::InvalidInput(
            "Make sure you send one star only!".to_string(),
        ));
    }

    let star: StarInput = serde_json::from_value(star_value).map_err(|_| {
        ApiError::InvalidInput("Bad request! please check the payload!".to_string())
    })?;

    if !state.mempool.is_admitted(&address)? {
        return Err(ApiError::InvalidInput(
            "No active requests for this address!".to_string(),
        ));
    }

    let record = ClaimRecord {
        address: address.clone(),
        star: StarRecord {
            ra: star.ra,
            dec: star.dec,
            mag: star.mag,
            cen: star.cen,
            story: hex::encode(star.story.as_bytes()),
        },
    };

    let block = state.chain.append(BlockBody::Claim(record)).await?;

    // One registration per admission ticket
    state.mempool.consume(&address)?;

    let response = with_decoded_story(&block)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn block_by_height(
    State(state): State<AppState>,
    Path(height): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let block = state
        .chain
        .get_by_height(height)?
        .ok_or_else(|| ApiError::NotFound("Block not found".to_string()))?;

    let response = with_decoded_story(&block)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn star_by_hash(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let block = state
        .chain
        .get_by_hash(hash.trim())?
        .ok_or_else(|| ApiError::NotFound("Block not found".to_string()))?;

    let response = with_decoded_story(&block)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn stars_by_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blocks = state.chain.get_by_owner(address.trim())?;
    if blocks.is_empty() {
        return Err(ApiError::NotFound(
            "No Blocks found for the address!".to_string(),
        ));
    }

    let response = blocks
        .iter()
        .map(with_decoded_story)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((StatusCode::CREATED, Json(response)))
}
