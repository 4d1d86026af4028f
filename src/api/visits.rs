use aide::axum::routing::{get_with, post_with};
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::{Path, Query};
use axum::Json;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{parse_date_or_today, parse_optional_date};
use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::loyalty::VisitStats;
use crate::models::{self, VisitCategory};
use crate::request_state::RequestState;

use super::clients::ClientDto;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route("/visits/:category", get_with(list_visits, list_visits_docs))
        .api_route(
            "/visits/:category/register",
            post_with(register_visit, register_visit_docs),
        )
        .api_route(
            "/visits/:category/scan",
            post_with(scan_visit, scan_visit_docs),
        )
        .api_route(
            "/visits/:category/overview",
            get_with(loyalty_overview, loyalty_overview_docs),
        )
        .api_route(
            "/client/:id/visits/:category/stats",
            get_with(client_stats, client_stats_docs),
        )
        .with_state(app_state)
}

pub fn parse_category(value: &str) -> ServiceResult<VisitCategory> {
    VisitCategory::parse(value).ok_or_else(|| {
        ServiceError::BadRequest(format!(
            "unknown visit category '{value}', expected 'breakfast' or 'coffee'"
        ))
    })
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct VisitDto {
    pub id: u64,
    pub client_id: u64,
    pub client_name: String,
    pub category: String,
    pub date: String,
    pub is_free: bool,
}

impl From<&models::Visit> for VisitDto {
    fn from(value: &models::Visit) -> Self {
        Self {
            id: value.id,
            client_id: value.client_id,
            client_name: value.client_name.to_owned(),
            category: value.category.as_str().to_owned(),
            date: value.date.to_string(),
            is_free: value.is_free,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct VisitStatsDto {
    pub total: u64,
    pub until_free: u64,
    pub next_is_free: bool,
}

impl From<&VisitStats> for VisitStatsDto {
    fn from(value: &VisitStats) -> Self {
        Self {
            total: value.total,
            until_free: value.until_free,
            next_is_free: value.next_is_free,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct VisitRecordedDto {
    pub visit: VisitDto,
    pub stats: VisitStatsDto,
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ScanResultDto {
    pub client: ClientDto,
    pub visit: VisitDto,
    pub stats: VisitStatsDto,
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ClientLoyaltyDto {
    pub client: ClientDto,
    pub stats: VisitStatsDto,
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct RegisterVisitDto {
    pub client_id: u64,
    pub date: Option<String>,
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct ScanDto {
    pub barcode: String,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct VisitFilterQuery {
    pub client_id: Option<u64>,
    pub start: Option<String>,
    pub end: Option<String>,
}

async fn list_visits(
    mut state: RequestState,
    Path(category): Path<String>,
    Query(filter): Query<VisitFilterQuery>,
) -> ServiceResult<Json<Vec<VisitDto>>> {
    let category = parse_category(&category)?;
    let start = parse_optional_date(filter.start.as_deref())?;
    let end = parse_optional_date(filter.end.as_deref())?;

    let visits = state
        .db
        .get_visits(category, filter.client_id, start, end)
        .await?;
    Ok(Json(visits.iter().map(|v| v.into()).collect()))
}

fn list_visits_docs(op: TransformOperation) -> TransformOperation {
    op.description("Visit history of a loyalty category, filterable by client and date range.")
        .tag("loyalty")
        .response::<200, Json<Vec<VisitDto>>>()
}

async fn register_visit(
    mut state: RequestState,
    Path(category): Path<String>,
    form: Json<RegisterVisitDto>,
) -> ServiceResult<Json<VisitRecordedDto>> {
    let category = parse_category(&category)?;
    let date = parse_date_or_today(form.date.as_deref())?;

    let (visit, stats) = state.db.record_visit(form.client_id, category, date).await?;

    Ok(Json(VisitRecordedDto {
        visit: VisitDto::from(&visit),
        stats: VisitStatsDto::from(&stats),
    }))
}

fn register_visit_docs(op: TransformOperation) -> TransformOperation {
    op.description("Record a visit for a known client. Every 7th visit of a category is free.")
        .tag("loyalty")
        .response::<200, Json<VisitRecordedDto>>()
        .response_with::<404, (), _>(|res| res.description("The client does not exist!"))
}

async fn scan_visit(
    mut state: RequestState,
    Path(category): Path<String>,
    form: Json<ScanDto>,
) -> ServiceResult<Json<ScanResultDto>> {
    let category = parse_category(&category)?;
    let date = parse_date_or_today(form.date.as_deref())?;

    if form.barcode.trim().is_empty() {
        return Err(ServiceError::BadRequest("enter a code to scan".to_owned()));
    }

    let outcome = state.db.scan_visit(&form.barcode, category, date).await?;

    Ok(Json(ScanResultDto {
        client: ClientDto::from(&outcome.client),
        visit: VisitDto::from(&outcome.visit),
        stats: VisitStatsDto::from(&outcome.stats),
    }))
}

fn scan_visit_docs(op: TransformOperation) -> TransformOperation {
    op.description(
        "Record a visit for a scanned card code and append an audit entry. \
         The code must match a client exactly after trimming whitespace.",
    )
    .tag("loyalty")
    .response::<200, Json<ScanResultDto>>()
    .response_with::<404, (), _>(|res| res.description("No client owns the scanned code!"))
}

async fn loyalty_overview(
    mut state: RequestState,
    Path(category): Path<String>,
) -> ServiceResult<Json<Vec<ClientLoyaltyDto>>> {
    let category = parse_category(&category)?;
    let clients = state.db.clients_with_visit_counts(category).await?;

    Ok(Json(
        clients
            .into_iter()
            .map(|(client, count)| ClientLoyaltyDto {
                client: ClientDto::from(&client),
                stats: VisitStatsDto::from(&crate::loyalty::visit_stats(count)),
            })
            .collect(),
    ))
}

fn loyalty_overview_docs(op: TransformOperation) -> TransformOperation {
    op.description("All clients with their progress in one loyalty category.")
        .tag("loyalty")
        .response::<200, Json<Vec<ClientLoyaltyDto>>>()
}

async fn client_stats(
    mut state: RequestState,
    Path((id, category)): Path<(u64, String)>,
) -> ServiceResult<Json<VisitStatsDto>> {
    let category = parse_category(&category)?;
    if state.db.get_client_by_id(id).await?.is_none() {
        return Err(ServiceError::NotFound);
    }

    let stats = state.db.client_visit_stats(id, category).await?;
    Ok(Json(VisitStatsDto::from(&stats)))
}

fn client_stats_docs(op: TransformOperation) -> TransformOperation {
    op.description("Loyalty progress of one client in one category.")
        .tag("loyalty")
        .response::<200, Json<VisitStatsDto>>()
        .response_with::<404, (), _>(|res| res.description("The client does not exist!"))
}
