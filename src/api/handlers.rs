use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::extractors::ApiQuery;
use crate::error::{InventoryError, InventoryResult};
use crate::logic::CatalogLookup;
use crate::model::{
    CatalogStats, Color, ColorId, PartInfo, SetInfo, SetInventory, SetSuggestion, Theme,
};
use crate::store::traits::Store;

pub type AppState<S> = Arc<S>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Deserialize)]
pub struct SetQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    pub fn new(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

/// Set lookup with the derived required-part count
#[derive(Debug, Serialize)]
pub struct SetInventoryResponse {
    #[serde(flatten)]
    pub inventory: SetInventory,
    pub required_part_count: i64,
}

/// Parse a numeric path segment, reporting bad input as a validation error
pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> InventoryResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| InventoryError::validation(format!("Invalid {} '{}'", what, raw)))
}

pub async fn catalog_stats<S: Store>(
    State(store): State<AppState<S>>,
) -> InventoryResult<Json<CatalogStats>> {
    Ok(Json(CatalogLookup::catalog_stats(&*store).await?))
}

pub async fn search_sets<S: Store>(
    State(store): State<AppState<S>>,
    ApiQuery(query): ApiQuery<SetQuery>,
) -> InventoryResult<Json<ListResponse<SetInfo>>> {
    let sets =
        CatalogLookup::search_sets(&*store, query.q.as_deref().unwrap_or(""), query.limit).await?;
    Ok(Json(ListResponse::new(sets)))
}

pub async fn suggest_sets<S: Store>(
    State(store): State<AppState<S>>,
    ApiQuery(query): ApiQuery<SetQuery>,
) -> InventoryResult<Json<Vec<SetSuggestion>>> {
    let suggestions =
        CatalogLookup::suggest_sets(&*store, query.q.as_deref().unwrap_or(""), query.limit)
            .await?;
    Ok(Json(suggestions))
}

pub async fn get_set<S: Store>(
    State(store): State<AppState<S>>,
    Path(set_num): Path<String>,
) -> InventoryResult<Json<SetInventoryResponse>> {
    let inventory = CatalogLookup::lookup_set(&*store, &set_num).await?;
    let required_part_count = inventory.required_part_count();
    Ok(Json(SetInventoryResponse {
        inventory,
        required_part_count,
    }))
}

pub async fn get_theme<S: Store>(
    State(store): State<AppState<S>>,
    Path(theme_id): Path<String>,
) -> InventoryResult<Json<Theme>> {
    let theme_id: i32 = parse_id(&theme_id, "theme id")?;
    Ok(Json(CatalogLookup::get_theme(&*store, theme_id).await?))
}

pub async fn get_part<S: Store>(
    State(store): State<AppState<S>>,
    Path(part_num): Path<String>,
) -> InventoryResult<Json<PartInfo>> {
    Ok(Json(CatalogLookup::get_part(&*store, part_num.trim()).await?))
}

pub async fn get_color<S: Store>(
    State(store): State<AppState<S>>,
    Path(color_id): Path<String>,
) -> InventoryResult<Json<Color>> {
    let color_id: ColorId = parse_id(&color_id, "color id")?;
    Ok(Json(CatalogLookup::get_color(&*store, color_id).await?))
}
