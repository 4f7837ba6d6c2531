use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::api::handlers::{parse_id, AppState, ListResponse};
use crate::api::extractors::{ApiJson, ApiQuery};
use crate::error::{InventoryError, InventoryResult};
use crate::logic::instances::part_key;
use crate::logic::{AddPartRequest, CreateInstanceRequest, InstanceService, QuantityUpdate, SaveOutcome};
use crate::model::{
    ColorId, InstanceDetail, InstanceId, InstancePartOverride, InstanceSummary,
    InventoryInstance, PartKey, QuantityChange, UserContext, DEFAULT_INSTANCE_NAME,
};
use crate::store::traits::Store;

#[derive(Debug, Deserialize)]
pub struct InstanceListQuery {
    pub set_num: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInstanceBody {
    pub set_num: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
pub struct RenameInstanceBody {
    pub name: String,
}

/// Quantity change for one part row.
///
/// `{"key": "3001_4_regular_normal", "change": {"delta": -1}}`
#[derive(Debug, Deserialize)]
pub struct QuantityChangeBody {
    pub key: String,
    pub change: QuantityChange,
}

#[derive(Debug, Deserialize)]
pub struct AddPartBody {
    pub part_num: String,
    pub color_id: ColorId,
    #[serde(default)]
    pub is_spare: bool,
    #[serde(default)]
    pub is_minifig_part: bool,
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModificationsQuery {
    pub instance_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveModificationsBody {
    pub instance_name: Option<String>,
    #[serde(default)]
    pub modifications: HashMap<String, i32>,
}

#[derive(Debug, Serialize)]
pub struct ModificationsResponse {
    pub set_num: String,
    pub instance_name: String,
    pub modifications: BTreeMap<String, i32>,
}

fn parse_instance_id(raw: &str) -> InventoryResult<InstanceId> {
    parse_id(raw, "instance id")
}

pub async fn list_instances<S: Store>(
    State(store): State<AppState<S>>,
    user: UserContext,
    ApiQuery(query): ApiQuery<InstanceListQuery>,
) -> InventoryResult<Json<ListResponse<InstanceSummary>>> {
    let instances = InstanceService::list_instances(&*store, &user, query.set_num.as_deref()).await?;
    Ok(Json(ListResponse::new(instances)))
}

pub async fn create_instance<S: Store>(
    State(store): State<AppState<S>>,
    user: UserContext,
    ApiJson(body): ApiJson<CreateInstanceBody>,
) -> InventoryResult<(StatusCode, Json<InstanceDetail>)> {
    let detail = InstanceService::create_instance(
        &*store,
        &user,
        CreateInstanceRequest {
            set_num: body.set_num,
            name: body.name.unwrap_or_else(|| DEFAULT_INSTANCE_NAME.to_string()),
            description: body.description,
            is_public: body.is_public,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_instance<S: Store>(
    State(store): State<AppState<S>>,
    user: UserContext,
    Path(instance_id): Path<String>,
) -> InventoryResult<Json<InstanceDetail>> {
    let instance_id = parse_instance_id(&instance_id)?;
    Ok(Json(
        InstanceService::get_instance_detail(&*store, &user, instance_id).await?,
    ))
}

pub async fn delete_instance<S: Store>(
    State(store): State<AppState<S>>,
    user: UserContext,
    Path(instance_id): Path<String>,
) -> InventoryResult<Json<serde_json::Value>> {
    let instance_id = parse_instance_id(&instance_id)?;
    InstanceService::delete_instance(&*store, &user, instance_id).await?;
    Ok(Json(serde_json::json!({
        "deleted": true,
        "instance_id": instance_id,
    })))
}

pub async fn rename_instance<S: Store>(
    State(store): State<AppState<S>>,
    user: UserContext,
    Path(instance_id): Path<String>,
    ApiJson(body): ApiJson<RenameInstanceBody>,
) -> InventoryResult<Json<InventoryInstance>> {
    let instance_id = parse_instance_id(&instance_id)?;
    Ok(Json(
        InstanceService::rename_instance(&*store, &user, instance_id, &body.name).await?,
    ))
}

pub async fn adjust_quantity<S: Store>(
    State(store): State<AppState<S>>,
    user: UserContext,
    Path(instance_id): Path<String>,
    ApiJson(body): ApiJson<QuantityChangeBody>,
) -> InventoryResult<Json<QuantityUpdate>> {
    let instance_id = parse_instance_id(&instance_id)?;
    let key: PartKey = body
        .key
        .parse()
        .map_err(|e: crate::model::PartKeyParseError| InventoryError::validation(e.to_string()))?;
    Ok(Json(
        InstanceService::adjust_quantity(&*store, &user, instance_id, &key, body.change).await?,
    ))
}

pub async fn add_part<S: Store>(
    State(store): State<AppState<S>>,
    user: UserContext,
    Path(instance_id): Path<String>,
    ApiJson(body): ApiJson<AddPartBody>,
) -> InventoryResult<Json<InstancePartOverride>> {
    let instance_id = parse_instance_id(&instance_id)?;
    let request = AddPartRequest {
        key: part_key(&body.part_num, body.color_id, body.is_spare, body.is_minifig_part),
        quantity: body.quantity,
        notes: body.notes,
    };
    Ok(Json(
        InstanceService::add_part(&*store, &user, instance_id, request).await?,
    ))
}

pub async fn get_modifications<S: Store>(
    State(store): State<AppState<S>>,
    user: UserContext,
    Path(set_num): Path<String>,
    ApiQuery(query): ApiQuery<ModificationsQuery>,
) -> InventoryResult<Json<ModificationsResponse>> {
    let instance_name = query
        .instance_name
        .unwrap_or_else(|| DEFAULT_INSTANCE_NAME.to_string());
    let modifications =
        InstanceService::modifications(&*store, &user, &set_num, Some(&instance_name)).await?;
    Ok(Json(ModificationsResponse {
        set_num,
        instance_name,
        modifications,
    }))
}

pub async fn save_modifications<S: Store>(
    State(store): State<AppState<S>>,
    user: UserContext,
    Path(set_num): Path<String>,
    ApiJson(body): ApiJson<SaveModificationsBody>,
) -> InventoryResult<Json<SaveOutcome>> {
    Ok(Json(
        InstanceService::save_modifications(
            &*store,
            &user,
            &set_num,
            body.instance_name.as_deref(),
            &body.modifications,
        )
        .await?,
    ))
}
