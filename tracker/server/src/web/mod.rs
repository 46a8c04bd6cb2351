use askama::Template;
use axum::Router;
use axum::extract::{DefaultBodyLimit, MatchedPath};
use axum::middleware::from_fn;
use axum::response::Html;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::Span;

use crate::backend::Backend;
use crate::backend::supabase::SupabaseClient;
use crate::config::Config;
use crate::record::DeleteGuard;
use crate::record::pages::PageError;
use crate::run::web::{RunState, create_run_router};
use crate::run::{self, RunSettings};
use crate::task::web::{TaskState, create_task_router};
use crate::task::{self, TaskSettings};

pub mod middleware;

/// Process-wide handles shared by every router.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn Backend>,
}

/// Request span carrying the method, the URI and the matched route.
#[derive(Clone, Debug)]
pub struct RouteMakeSpan;

impl<B> MakeSpan<B> for RouteMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let matched_path = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str);

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            matched_path,
        )
    }
}

/// Builds the whole application: landing page, health check and both record front-ends.
pub fn create_app(state: AppState) -> Router {
    let AppState { config, backend } = state;
    let task_state = Arc::new(TaskState {
        backend: backend.clone(),
        settings: TaskSettings {
            table: config.task_table.clone(),
            bucket: config.task_bucket.clone(),
        },
        date_format: config.date_format.clone(),
        deletes: DeleteGuard::new(),
    });

    let run_state = Arc::new(RunState {
        backend,
        settings: RunSettings {
            table: config.run_table.clone(),
            create_bucket: config.run_bucket.clone(),
            edit_bucket: config.run_edit_bucket.clone(),
        },
        date_format: config.date_format.clone(),
        deletes: DeleteGuard::new(),
    });

    Router::new()
        .route("/health", axum::routing::get(health_check_handler))
        .route("/", axum::routing::get(welcome_handler))
        .merge(create_task_router(task_state))
        .merge(create_run_router(run_state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(RouteMakeSpan))
                .layer(from_fn(middleware::no_store_middleware))
                .layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let backend = SupabaseClient::from_config(&config)?;
    tracing::info!("Using Supabase project at {}", config.supabase_url);

    let app = create_app(AppState {
        config: Arc::new(config),
        backend: Arc::new(backend),
    });

    axum::serve(listener, app).await?;
    Ok(())
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

#[tracing::instrument]
pub async fn welcome_handler() -> Result<Html<String>, PageError> {
    let template = IndexTemplate::new();
    template.render().map(Html).map_err(PageError::from)
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    tasks_title: &'static str,
    runs_title: &'static str,
}

impl IndexTemplate {
    pub fn new() -> Self {
        Self {
            tasks_title: task::WORDING.app_title,
            runs_title: run::WORDING.app_title,
        }
    }
}
