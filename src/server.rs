use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{prelude::BASE64_STANDARD, Engine};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::{
    config::{AppConfig, Credentials},
    extract_encryption_certificate, locate_sp_metadata, parse_admin_response,
    rewrite_locations, translate_error, ShimError, URI_SP_METADATA,
};

/// Reads `Authorization: Basic ...`; anything malformed counts as no credentials.
pub fn basic_auth_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = String::from_utf8(BASE64_STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Couldn't find spMetadata field")]
    MetadataNotFound { response_content: String },
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },
    #[error("Please provide authentication")]
    Unauthenticated,
    #[error("No IdP metadata URL configured")]
    FeatureDisabled,
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{error}")]
    Shim {
        error: ShimError,
        response_content: String,
    },
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    response_content: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::MetadataNotFound { response_content } => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    message: "Couldn't find spMetadata field".to_string(),
                    response_content,
                }),
            )
                .into_response(),
            AppError::Upstream { status, message } => (status, message).into_response(),
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic")],
                "Please provide authentication",
            )
                .into_response(),
            AppError::FeatureDisabled => {
                (StatusCode::NOT_FOUND, "No IdP metadata URL configured").into_response()
            }
            AppError::Transport(e) => (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
            AppError::Shim {
                error,
                response_content,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    message: error.to_string(),
                    response_content,
                }),
            )
                .into_response(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

pub fn router(config: AppConfig) -> Router {
    let root_path = format!("/{}", config.root_path.trim_matches('/'));
    let state = AppState {
        config: Arc::new(config),
    };

    let routes = Router::new()
        .route("/", get(sp_metadata))
        .route("/health", get(health))
        .route("/extract_idp_cert", get(extract_idp_cert))
        .with_state(state);

    let app = if root_path == "/" {
        routes
    } else {
        Router::new().nest(&root_path, routes)
    };
    app.layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "OK"
}

/// One client per upstream call, dropped with the request.
fn upstream_client(config: &AppConfig, insecure: bool) -> Result<reqwest::Client, AppError> {
    Ok(reqwest::Client::builder()
        .timeout(config.upstream_timeout())
        .danger_accept_invalid_certs(insecure)
        .build()?)
}

fn upstream_status(status: reqwest::StatusCode) -> StatusCode {
    StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY)
}

async fn sp_metadata(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let config = &state.config;
    let credentials = match basic_auth_credentials(&headers) {
        Some(credentials) => credentials,
        None => {
            let credentials = config
                .fallback_credentials()
                .ok_or(AppError::Unauthenticated)?;
            debug!(username = %credentials.username, "Using configured username/password");
            credentials
        }
    };

    let url = format!("{}{}", config.base_url(), URI_SP_METADATA);
    let response = upstream_client(config, config.splunk_insecure)?
        .get(&url)
        .basic_auth(&credentials.username, Some(&credentials.password))
        .send()
        .await
        .inspect_err(|e| error!("client error connecting to '{url}': {e}"))?;
    let status = response.status();
    let content = response.bytes().await?;

    if !status.is_success() {
        error!("client error connecting to '{url}': {status}");
        return Err(AppError::Upstream {
            status: upstream_status(status),
            message: translate_error(&content),
        });
    }

    let metadata = render_sp_metadata(&content, config)?;
    Ok(([(header::CONTENT_TYPE, "application/xml")], metadata).into_response())
}

/// Runs after every await in the handler, so no libxml document is held across one.
fn render_sp_metadata(content: &[u8], config: &AppConfig) -> Result<String, AppError> {
    let response_content = || String::from_utf8_lossy(content).into_owned();

    // An unparseable envelope is reported the same way as one without the key.
    let Ok(document) = parse_admin_response(content) else {
        return Err(AppError::MetadataNotFound {
            response_content: response_content(),
        });
    };
    let metadata = locate_sp_metadata(&document)
        .map_err(|error| AppError::Shim {
            error,
            response_content: response_content(),
        })?
        .ok_or_else(|| AppError::MetadataNotFound {
            response_content: response_content(),
        })?;

    rewrite_locations(&metadata, &config.rewrite_config())
        .map(|metadata| metadata.to_xml())
        .map_err(|error| AppError::Shim {
            error,
            response_content: response_content(),
        })
}

async fn extract_idp_cert(State(state): State<AppState>) -> Result<Response, AppError> {
    let config = &state.config;
    let url = config
        .idp_metadata_url
        .as_deref()
        .ok_or(AppError::FeatureDisabled)?;

    let response = upstream_client(config, false)?.get(url).send().await?;
    let status = upstream_status(response.status());
    let content = response.bytes().await?;
    debug!(%status, "fetched IdP metadata from {url}");

    if !status.is_success() {
        return Err(AppError::Upstream {
            status,
            message: translate_error(&content),
        });
    }

    let pem = match extract_encryption_certificate(&content) {
        Ok(certificate) => certificate.map(|c| c.to_pem()).unwrap_or_default(),
        Err(error) => {
            return Err(AppError::Shim {
                error,
                response_content: String::from_utf8_lossy(&content).into_owned(),
            })
        }
    };
    Ok((status, pem).into_response())
}
