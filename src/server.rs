use crate::metrics;
use crate::tools::{
    app_template, check_requirements, data_loading, dataset_info, discovery, guidance,
    list_datasets, list_modules, module_code, module_details, renv, search, startup_check,
    AppContext,
};
use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Json as AxumJson, Router,
};
use hyper::Server;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, Instrument};
use uuid::Uuid;

/// Health check endpoint
async fn health(Extension(ctx): Extension<Arc<AppContext>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "tealflow-server",
        "version": env!("CARGO_PKG_VERSION"),
        "modules": ctx.catalog.module_count(),
        "knowledge_base_fingerprint": ctx.catalog.fingerprint(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Run one tool invocation under a correlation span, recording metrics and
/// mapping errors to a 500 with the error text as the body.
async fn run_tool<F>(tool: &'static str, fut: F) -> Response
where
    F: Future<Output = crate::error::Result<String>>,
{
    let request_id = Uuid::new_v4();
    metrics::record_tool_invocation(tool);
    let span = tracing::info_span!("tool_invocation", tool, request_id = %request_id);
    match fut.instrument(span).await {
        Ok(body) => {
            metrics::record_tool_response_chars(tool, body.chars().count());
            body.into_response()
        }
        Err(e) => {
            metrics::record_tool_error(tool);
            error!(tool, request_id = %request_id, "tool invocation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Create the HTTP server with all tool routes
pub fn create_server(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route(
            "/tools/tealflow_agent_guidance",
            post({
                let ctx = ctx.clone();
                move || {
                    let ctx = ctx.clone();
                    async move { run_tool("tealflow_agent_guidance", guidance::run(&ctx)).await }
                }
            }),
        )
        .route(
            "/tools/tealflow_list_modules",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<list_modules::Params>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool("tealflow_list_modules", list_modules::run(&ctx, p)).await
                    }
                }
            }),
        )
        .route(
            "/tools/tealflow_get_module_details",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<module_details::Params>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool("tealflow_get_module_details", module_details::run(&ctx, p)).await
                    }
                }
            }),
        )
        .route(
            "/tools/tealflow_search_modules_by_analysis",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<search::Params>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool("tealflow_search_modules_by_analysis", search::run(&ctx, p)).await
                    }
                }
            }),
        )
        .route(
            "/tools/tealflow_check_dataset_requirements",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<check_requirements::Params>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool(
                            "tealflow_check_dataset_requirements",
                            check_requirements::run(&ctx, p),
                        )
                        .await
                    }
                }
            }),
        )
        .route(
            "/tools/tealflow_list_datasets",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<list_datasets::Params>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool("tealflow_list_datasets", list_datasets::run(&ctx, p)).await
                    }
                }
            }),
        )
        .route(
            "/tools/tealflow_discover_datasets",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<discovery::Params>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool("tealflow_discover_datasets", discovery::run(&ctx, p)).await
                    }
                }
            }),
        )
        .route(
            "/tools/tealflow_get_dataset_info",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<dataset_info::Params>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool("tealflow_get_dataset_info", dataset_info::run(&ctx, p)).await
                    }
                }
            }),
        )
        .route(
            "/tools/tealflow_generate_data_loading",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<data_loading::Params>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool("tealflow_generate_data_loading", data_loading::run(&ctx, p))
                            .await
                    }
                }
            }),
        )
        .route(
            "/tools/tealflow_get_app_template",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<app_template::Params>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool("tealflow_get_app_template", app_template::run(&ctx, p)).await
                    }
                }
            }),
        )
        .route(
            "/tools/tealflow_generate_module_code",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<module_code::Params>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool("tealflow_generate_module_code", module_code::run(&ctx, p)).await
                    }
                }
            }),
        )
        .route(
            "/tools/tealflow_check_shiny_startup",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<startup_check::Params>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool("tealflow_check_shiny_startup", startup_check::run(&ctx, p)).await
                    }
                }
            }),
        )
        .route(
            "/tools/tealflow_setup_renv_environment",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<renv::SetupParams>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool("tealflow_setup_renv_environment", renv::setup(&ctx, p)).await
                    }
                }
            }),
        )
        .route(
            "/tools/tealflow_snapshot_renv_environment",
            post({
                let ctx = ctx.clone();
                move |AxumJson(p): AxumJson<renv::SnapshotParams>| {
                    let ctx = ctx.clone();
                    async move {
                        run_tool("tealflow_snapshot_renv_environment", renv::snapshot(&ctx, p))
                            .await
                    }
                }
            }),
        )
        .layer(Extension(ctx))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the configured host and port
pub async fn start_server(
    ctx: Arc<AppContext>,
    host: &str,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_server(ctx);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    println!("🚀 TealFlow server running on http://{host}:{port}");
    println!("💚 Health check: http://{host}:{port}/health");
    println!("🔧 Tool calls:   POST http://{host}:{port}/tools/<tool_name>");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
