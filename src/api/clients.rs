use aide::axum::routing::{get_with, post_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::Path;
use axum::routing::get;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::Json;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::visits::{VisitDto, VisitStatsDto};
use crate::barcode::png::{render_png, PngOptions};
use crate::barcode::svg::{render_svg, SvgOptions};
use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{self, VisitCategory};
use crate::request_state::RequestState;
use crate::telegram;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/clients",
            get_with(list_clients, list_clients_docs).post_with(create_client, create_client_docs),
        )
        .api_route(
            "/client/:id",
            get_with(get_client, get_client_docs).delete_with(delete_client, delete_client_docs),
        )
        // Binary image responses stay out of the OpenAPI document.
        .route("/client/:id/barcode.png", get(get_barcode_png))
        .route("/client/:id/barcode.svg", get(get_barcode_svg))
        .api_route(
            "/client/:id/events",
            get_with(list_client_events, list_client_events_docs),
        )
        .api_route(
            "/client/:id/send-card",
            post_with(send_card, send_card_docs),
        )
        .api_route(
            "/client/by-code/:code",
            get_with(get_client_by_code, get_client_by_code_docs),
        )
        .api_route("/portal/:token", get_with(get_portal, get_portal_docs))
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ClientDto {
    pub id: u64,
    pub name: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub barcode: String,
    pub telegram_chat_id: Option<String>,
    pub history_token: String,
}

impl From<&models::Client> for ClientDto {
    fn from(value: &models::Client) -> Self {
        Self {
            id: value.id,
            name: value.name.to_owned(),
            phone: value.phone.to_owned(),
            notes: value.notes.to_owned(),
            barcode: value.barcode.to_owned(),
            telegram_chat_id: value.telegram_chat_id.to_owned(),
            history_token: value.history_token.to_owned(),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveClientDto {
    pub name: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ClientEventDto {
    pub id: u64,
    pub client_id: u64,
    pub event_type: String,
    pub details: Option<String>,
    pub created_at: String,
}

impl From<&models::ClientEvent> for ClientEventDto {
    fn from(value: &models::ClientEvent) -> Self {
        Self {
            id: value.id,
            client_id: value.client_id,
            event_type: value.event_type.to_owned(),
            details: value.details.to_owned(),
            created_at: value.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ProgramStatusDto {
    pub stats: VisitStatsDto,
    pub visits: Vec<VisitDto>,
}

/// Everything the public client portal page shows, addressed by the
/// client's secret history token.
#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct PortalDto {
    pub client: ClientDto,
    pub breakfast: ProgramStatusDto,
    pub coffee: ProgramStatusDto,
    pub events: Vec<ClientEventDto>,
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SendCardDto {
    /// Telegram chat to deliver to; falls back to the chat already linked
    /// to the client.
    pub telegram_chat_id: Option<String>,
}

async fn list_clients(mut state: RequestState) -> ServiceResult<Json<Vec<ClientDto>>> {
    let clients = state.db.get_all_clients().await?;
    Ok(Json(clients.iter().map(|c| c.into()).collect()))
}

fn list_clients_docs(op: TransformOperation) -> TransformOperation {
    op.description("List all clients.")
        .tag("clients")
        .response::<200, Json<Vec<ClientDto>>>()
}

async fn create_client(
    mut state: RequestState,
    form: Json<SaveClientDto>,
) -> ServiceResult<Json<ClientDto>> {
    let form = form.0;
    let name = form.name.trim();
    if name.is_empty() {
        return Err(ServiceError::BadRequest(
            "client name must not be empty".to_owned(),
        ));
    }

    let client = state
        .db
        .create_client(name, form.phone.as_deref(), form.notes.as_deref())
        .await?;

    Ok(Json(ClientDto::from(&client)))
}

fn create_client_docs(op: TransformOperation) -> TransformOperation {
    op.description(
        "Create a client. The EAN-13 card code and the portal token are \
         assigned on creation and never change.",
    )
    .tag("clients")
    .response::<200, Json<ClientDto>>()
}

async fn get_client(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<Json<ClientDto>> {
    let client = state.db.get_client_by_id(id).await?;

    if let Some(client) = client {
        return Ok(Json(ClientDto::from(&client)));
    }

    Err(ServiceError::NotFound)
}

fn get_client_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get client by id.")
        .tag("clients")
        .response::<200, Json<ClientDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested client does not exist!"))
}

async fn delete_client(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<()> {
    state.db.delete_client(id).await
}

fn delete_client_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete client by id, including visits and events.")
        .tag("clients")
        .response::<200, ()>()
}

async fn get_client_by_code(
    mut state: RequestState,
    Path(code): Path<String>,
) -> ServiceResult<Json<ClientDto>> {
    let client = state.db.get_client_by_barcode(code.trim()).await?;

    if let Some(client) = client {
        return Ok(Json(ClientDto::from(&client)));
    }

    Err(ServiceError::NotFound)
}

fn get_client_by_code_docs(op: TransformOperation) -> TransformOperation {
    op.description("Look up the client that owns a card code (exact match).")
        .tag("clients")
        .response::<200, Json<ClientDto>>()
        .response_with::<404, (), _>(|res| res.description("No client owns this code!"))
}

async fn get_barcode_png(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<(StatusCode, HeaderMap, Vec<u8>)> {
    let client = state.db.get_client_by_id(id).await?;

    if let Some(client) = client {
        let image = render_png(&client.barcode, &PngOptions::default())?;

        let mut header = HeaderMap::new();
        header.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
        return Ok((StatusCode::OK, header, image));
    }

    Err(ServiceError::NotFound)
}

async fn get_barcode_svg(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<(StatusCode, HeaderMap, Vec<u8>)> {
    let client = state.db.get_client_by_id(id).await?;

    if let Some(client) = client {
        let document = render_svg(&client.barcode, &SvgOptions::default())?;

        let mut header = HeaderMap::new();
        header.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("image/svg+xml"),
        );
        return Ok((StatusCode::OK, header, document.into_bytes()));
    }

    Err(ServiceError::NotFound)
}

async fn list_client_events(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<Json<Vec<ClientEventDto>>> {
    if state.db.get_client_by_id(id).await?.is_none() {
        return Err(ServiceError::NotFound);
    }

    let events = state.db.get_client_events(id, 100).await?;
    Ok(Json(events.iter().map(|e| e.into()).collect()))
}

fn list_client_events_docs(op: TransformOperation) -> TransformOperation {
    op.description("Card audit log of a client, most recent first.")
        .tag("clients")
        .response::<200, Json<Vec<ClientEventDto>>>()
        .response_with::<404, (), _>(|res| res.description("The requested client does not exist!"))
}

async fn send_card(
    mut state: RequestState,
    Path(id): Path<u64>,
    form: Json<SendCardDto>,
) -> ServiceResult<()> {
    let client = state
        .db
        .get_client_by_id(id)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let chat_id = form
        .0
        .telegram_chat_id
        .or_else(|| client.telegram_chat_id.clone())
        .map(|chat| chat.trim().to_owned())
        .filter(|chat| !chat.is_empty())
        .ok_or_else(|| {
            ServiceError::BadRequest("a Telegram chat id is required".to_owned())
        })?;

    state.db.set_client_telegram_chat(client.id, &chat_id).await?;
    let client = models::Client {
        telegram_chat_id: Some(chat_id.clone()),
        ..client
    };

    telegram::send_client_card(&client, &chat_id).await?;
    state
        .db
        .append_event(client.id, "sent_to_bot", Some(&format!("chat_id={chat_id}")))
        .await?;

    Ok(())
}

fn send_card_docs(op: TransformOperation) -> TransformOperation {
    op.description("Send the client's card code and barcode image to a Telegram chat.")
        .tag("clients")
        .response::<200, ()>()
        .response_with::<400, (), _>(|res| res.description("No Telegram chat id available!"))
        .response_with::<404, (), _>(|res| res.description("The requested client does not exist!"))
}

async fn program_status(
    state: &mut RequestState,
    client_id: u64,
    category: VisitCategory,
) -> ServiceResult<ProgramStatusDto> {
    let stats = state.db.client_visit_stats(client_id, category).await?;
    let visits = state
        .db
        .get_visits(category, Some(client_id), None, None)
        .await?;

    Ok(ProgramStatusDto {
        stats: VisitStatsDto::from(&stats),
        visits: visits.iter().map(|v| v.into()).collect(),
    })
}

async fn get_portal(
    mut state: RequestState,
    Path(token): Path<String>,
) -> ServiceResult<Json<PortalDto>> {
    let client = state
        .db
        .get_client_by_history_token(&token)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let breakfast = program_status(&mut state, client.id, VisitCategory::Breakfast).await?;
    let coffee = program_status(&mut state, client.id, VisitCategory::Coffee).await?;
    let events = state.db.get_client_events(client.id, 100).await?;

    Ok(Json(PortalDto {
        client: ClientDto::from(&client),
        breakfast,
        coffee,
        events: events.iter().map(|e| e.into()).collect(),
    }))
}

fn get_portal_docs(op: TransformOperation) -> TransformOperation {
    op.description(
        "Public portal payload for a client, addressed by the secret \
         history token: both loyalty programs with history plus the card \
         audit log.",
    )
    .tag("clients")
    .response::<200, Json<PortalDto>>()
    .response_with::<404, (), _>(|res| res.description("Unknown portal token!"))
}
