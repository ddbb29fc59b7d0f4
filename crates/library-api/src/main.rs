//! 도서관 API 서버.
//!
//! 설정을 로드하고 PostgreSQL에 연결한 뒤 Axum REST API 서버를 시작합니다.
//! DB가 설정되지 않았거나 연결에 실패하면 메모리 대출 저장소로 동작합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, middleware, routing::get, Router};
use library_api::auth::JwtConfig;
use library_api::{create_api_router, metrics_layer, setup_metrics_recorder, AppState};
use library_core::{init_logging, AppConfig, LendingPolicy, LogConfig, MemoryLendingStore};
use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use library_api::openapi::swagger_ui_router;

/// 개발용 JWT 비밀 키 (운영 환경에서는 반드시 설정).
const DEV_JWT_SECRET: &str = "dev-secret-key-change-in-production";

/// JWT 비밀 키 권장 최소 길이.
const MIN_JWT_SECRET_LEN: usize = 32;

/// JWT 설정 구성.
fn jwt_config(config: &AppConfig) -> JwtConfig {
    let secret = match &config.auth.jwt_secret {
        Some(secret) => {
            if secret.expose_secret().len() < MIN_JWT_SECRET_LEN {
                warn!(
                    "JWT secret is shorter than {} characters, consider a longer one",
                    MIN_JWT_SECRET_LEN
                );
            }
            secret.clone()
        }
        None => {
            warn!("JWT secret not set, using default (INSECURE for development only)");
            SecretString::from(DEV_JWT_SECRET)
        }
    };

    JwtConfig {
        secret,
        token_ttl_minutes: config.auth.token_ttl_minutes,
    }
}

/// PostgreSQL 연결 및 마이그레이션.
async fn connect_database(config: &AppConfig) -> anyhow::Result<Option<PgPool>> {
    let Some(url) = config.database.url.as_deref() else {
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .connect(url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    Ok(Some(pool))
}

/// AppState 생성.
///
/// DB 연결에 실패하면 에러를 기록하고 메모리 저장소로 계속합니다.
async fn create_app_state(config: &AppConfig) -> AppState {
    let policy = LendingPolicy::from(&config.lending);
    let jwt = jwt_config(config);

    match connect_database(config).await {
        Ok(Some(pool)) => {
            info!("Connected to PostgreSQL and applied migrations");
            AppState::with_postgres(pool, policy, jwt)
        }
        Ok(None) => {
            warn!("Database URL not set, lending records are kept in memory only");
            AppState::new(Arc::new(MemoryLendingStore::new()), policy, jwt)
        }
        Err(e) => {
            error!(error = ?e, "Database initialization failed, falling back to memory store");
            AppState::new(Arc::new(MemoryLendingStore::new()), policy, jwt)
        }
    }
}

/// CORS 미들웨어 구성.
///
/// `CORS_ORIGINS` 환경변수(쉼표로 구분)가 설정되어 있으면 해당 origin만 허용하고,
/// 설정되지 않으면 개발 모드로 간주하여 모든 origin을 허용합니다.
fn cors_layer() -> CorsLayer {
    let allow_origin = match std::env::var("CORS_ORIGINS") {
        Ok(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                AllowOrigin::any()
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                AllowOrigin::list(origins)
            }
        }
        _ => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    // 메트릭 라우터 (별도 상태)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router().with_state(state))
        // OpenAPI 문서 및 Swagger UI
        .merge(swagger_ui_router())
        // 메트릭 미들웨어 (모든 요청에 적용)
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(cors_layer())
}

/// OpenAPI 스펙 내보내기 처리.
///
/// `--export-openapi` 플래그 또는 `EXPORT_OPENAPI` 환경변수가 설정된 경우
/// OpenAPI JSON 스펙을 stdout으로 출력하고 `true`를 반환합니다.
fn handle_export_openapi() -> anyhow::Result<bool> {
    use library_api::openapi::ApiDoc;
    use utoipa::OpenApi as _;

    let export_flag = std::env::args().any(|arg| arg == "--export-openapi");
    let export_env = std::env::var("EXPORT_OPENAPI")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    if export_flag || export_env {
        let json = serde_json::to_string_pretty(&ApiDoc::openapi())?;
        println!("{}", json);
        return Ok(true);
    }

    Ok(false)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    // OpenAPI 내보내기 처리 (서버 시작 전)
    if handle_export_openapi()? {
        return Ok(());
    }

    let config = AppConfig::load_default().context("failed to load configuration")?;

    init_logging(LogConfig::from(&config.logging))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    info!("Starting Library API server...");

    let metrics_handle =
        setup_metrics_recorder().context("failed to install Prometheus recorder")?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid server address {}:{} (check LIBRARY__SERVER__HOST / LIBRARY__SERVER__PORT)",
                config.server.host, config.server.port
            )
        })?;

    let state = Arc::new(create_app_state(&config).await);

    let policy = state.lending.policy();
    info!(
        version = %state.version,
        has_db = state.db_pool.is_some(),
        borrow_limit = policy.borrow_limit,
        loan_period_days = policy.loan_period_days,
        fine_per_day = %policy.fine_per_day,
        "Application state initialized"
    );

    let app = create_router(state, metrics_handle);

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let shutdown_token = CancellationToken::new();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
}
