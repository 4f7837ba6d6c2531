use axum::{extract::State, http::StatusCode, response::Json};
use serde::Deserialize;

use crate::api::handlers::AppState;
use crate::api::extractors::ApiJson;
use crate::error::InventoryResult;
use crate::logic::AccountService;
use crate::model::User;
use crate::store::traits::Store;

#[derive(Debug, Deserialize)]
pub struct CredentialsBody {
    pub user_name: String,
    pub password: String,
}

pub async fn register<S: Store>(
    State(store): State<AppState<S>>,
    ApiJson(body): ApiJson<CredentialsBody>,
) -> InventoryResult<(StatusCode, Json<User>)> {
    let user = AccountService::register(&*store, &body.user_name, &body.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login<S: Store>(
    State(store): State<AppState<S>>,
    ApiJson(body): ApiJson<CredentialsBody>,
) -> InventoryResult<Json<User>> {
    Ok(Json(
        AccountService::login(&*store, &body.user_name, &body.password).await?,
    ))
}
