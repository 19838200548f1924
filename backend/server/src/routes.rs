use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    cards::{CardUpdate, CardUpdatePayload},
    database::with_store,
    device::{AnyDevice, Device, KnownDevice},
    error::AppError,
    grouping::{group_words, parse_words},
    state::AppState,
    utils::{AppJson, AppPath, message, now, resolve_last_used},
};

type AppResult<T> = Result<T, AppError>;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CreateList {
    name: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct UpdateList {
    name: Option<String>,
    last_used: Option<Value>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CreateCard {
    list_id: Option<i64>,
}

pub async fn lists_handler(
    State(state): State<Arc<AppState>>,
    AnyDevice(device): AnyDevice,
) -> AppResult<impl IntoResponse> {
    let lists = with_store(&state, &device, |store| store.lists()).await?;

    Ok(Json(lists))
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    KnownDevice(device): KnownDevice,
    AppPath(id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    let list = with_store(&state, &device, move |store| store.list(id)).await?;

    Ok(Json(list))
}

pub async fn create_list_handler(
    State(state): State<Arc<AppState>>,
    AnyDevice(device): AnyDevice,
    AppJson(payload): AppJson<CreateList>,
) -> AppResult<impl IntoResponse> {
    let last_used = now();
    let created =
        with_store(&state, &device, move |store| store.create_list(payload.name, last_used))
            .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_list_handler(
    State(state): State<Arc<AppState>>,
    KnownDevice(device): KnownDevice,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<UpdateList>,
) -> AppResult<impl IntoResponse> {
    debug!(
        "PUT /lists/{id} name={:?} last_used={:?}",
        payload.name, payload.last_used
    );

    let last_used = resolve_last_used(payload.last_used.as_ref(), now());
    let name = payload
        .name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::Validation("Name is required".to_string()))?;

    let stored = name.clone();
    with_store(&state, &device, move |store| {
        store.update_list(id, &stored, last_used)
    })
    .await?;

    Ok(Json(json!({ "id": id, "name": name, "last_used": last_used })))
}

pub async fn delete_list_handler(
    State(state): State<Arc<AppState>>,
    KnownDevice(device): KnownDevice,
    AppPath(id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    with_store(&state, &device, move |store| store.delete_list(id)).await?;

    Ok(message("List deleted successfully"))
}

pub async fn list_cards_handler(
    State(state): State<Arc<AppState>>,
    KnownDevice(device): KnownDevice,
    AppPath(list_id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    let cards = with_store(&state, &device, move |store| store.cards(list_id)).await?;

    Ok(Json(cards))
}

pub async fn reset_accuracy_handler(
    State(state): State<Arc<AppState>>,
    KnownDevice(device): KnownDevice,
    AppPath(list_id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    with_store(&state, &device, move |store| store.reset_accuracy(list_id)).await?;

    Ok(message("All card accuracies reset successfully"))
}

pub async fn card_handler(
    State(state): State<Arc<AppState>>,
    KnownDevice(device): KnownDevice,
    AppPath(id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    let card = with_store(&state, &device, move |store| store.card(id)).await?;

    Ok(Json(card))
}

pub async fn create_card_handler(
    State(state): State<Arc<AppState>>,
    device: Device,
    AppJson(payload): AppJson<CreateCard>,
) -> AppResult<impl IntoResponse> {
    let list_id = payload
        .list_id
        .filter(|id| *id != 0)
        .ok_or_else(|| AppError::Validation("List ID is required".to_string()))?;

    // A fresh device has no lists yet, so skip creating its store.
    let Device::Returning(device) = device else {
        return Err(AppError::NotFound("List"));
    };

    let created = with_store(&state, &device, move |store| store.create_card(list_id)).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_card_handler(
    State(state): State<Arc<AppState>>,
    KnownDevice(device): KnownDevice,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<CardUpdatePayload>,
) -> AppResult<impl IntoResponse> {
    debug!("PUT /cards/{id} {payload:?}");

    let update = CardUpdate::try_from(payload)?;
    debug!("Applying {update:?} to card {id}");

    with_store(&state, &device, move |store| store.update_card(id, &update)).await?;

    Ok(message("Card updated successfully"))
}

pub async fn delete_card_handler(
    State(state): State<Arc<AppState>>,
    KnownDevice(device): KnownDevice,
    AppPath(id): AppPath<i64>,
) -> AppResult<impl IntoResponse> {
    with_store(&state, &device, move |store| store.delete_card(id)).await?;

    Ok(message("Card deleted successfully"))
}

pub async fn group_words_handler(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<Value>,
) -> AppResult<impl IntoResponse> {
    let words = parse_words(&payload)?;

    let completions = state
        .completions
        .as_deref()
        .ok_or(AppError::Unavailable("word grouping is not configured"))?;

    let groups = group_words(completions, &words).await?;

    Ok(Json(groups))
}
