use anyhow::Context;
use api_boilerplate::config::BoilerplateConfig;
use api_boilerplate::prelude::*;
use axum::routing::get;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

const PROTECTED_FIELDS: &[&str] = &["id", "owner"];

#[derive(Debug, Clone, Serialize)]
struct Widget {
    id: u64,
    name: String,
}

#[derive(Default)]
struct WidgetStore {
    next_id: AtomicU64,
    widgets: RwLock<BTreeMap<u64, Widget>>,
}

type AppState = Arc<WidgetStore>;

async fn list_widgets(State(store): State<AppState>) -> ApiResponse<Vec<Widget>> {
    let widgets = store.widgets.read().await;
    ApiResponse::success(widgets.values().cloned().collect())
}

async fn show_widget(
    State(store): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<ApiResponse<Widget>, Exception> {
    let widgets = store.widgets.read().await;
    let widget = widgets
        .get(&id)
        .cloned()
        .ok_or_else(|| RecordNotFound::new("Widget").with_id(id))?;
    Ok(ApiResponse::success(widget))
}

async fn create_widget(
    State(store): State<AppState>,
    ApiJson(params): ApiJson<Value>,
) -> Result<ApiResponse<Widget>, Exception> {
    let attributes = params["object"].as_object().cloned().unwrap_or_default();

    let protected: Vec<&str> = PROTECTED_FIELDS
        .iter()
        .copied()
        .filter(|field| attributes.contains_key(*field))
        .collect();
    if !protected.is_empty() {
        return Err(MassAssignmentError::new(protected).into());
    }

    let name = attributes
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    let mut errors = FieldErrors::new();
    if name.is_empty() {
        errors.add("name", "can't be blank");
    } else if name.len() > 64 {
        errors.add("name", "is too long (maximum is 64 characters)");
    }
    if !errors.is_empty() {
        return Err(ValidationError::new(errors).into());
    }

    let id = store.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    let widget = Widget {
        id,
        name: name.to_string(),
    };
    store.widgets.write().await.insert(id, widget.clone());

    Ok(respond_success(
        widget,
        RespondOptions::status(StatusCode::CREATED).with_location(format!("/widgets/{id}")),
    ))
}

async fn delete_widget(
    State(store): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> Result<ApiResponse<Value>, Exception> {
    if id == 1 {
        return Err(StatusError::new(StatusCode::FORBIDDEN)
            .with("why", "locked")
            .with_message("the first widget cannot be deleted")
            .into());
    }
    store
        .widgets
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| RecordNotFound::new("Widget").with_id(id))?;
    Ok(respond_empty(RespondOptions::default()))
}

async fn broken() -> Result<ApiResponse<Value>, Exception> {
    let raw = tokio::fs::read_to_string("/nonexistent/widgets.json").await?;
    Ok(ApiResponse::success(serde_json::from_str(&raw)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = BoilerplateConfig::from_env().context("invalid API configuration")?;
    let mut boilerplate = ApiBoilerplate::from_config(&config)?.enable_cors();
    if boilerplate.wrapping().is_none() {
        boilerplate = boilerplate.dumb_wrapping("object")?;
    }

    let router = Router::new()
        .route("/widgets", get(list_widgets).post(create_widget))
        .route("/widgets/{id}", get(show_widget).delete(delete_widget))
        .route("/broken", get(broken))
        .api_boilerplate(&boilerplate)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(WidgetStore::default()));

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, router).await?;
    Ok(())
}
