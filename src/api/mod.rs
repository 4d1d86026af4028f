pub mod clients;
pub mod dishes;
pub mod expenses;
pub mod ingredients;
pub mod report;
pub mod sales;
pub mod telegram;
pub mod visits;

use aide::axum::ApiRouter;
use chrono::{Local, NaiveDate};

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};

/// Assemble the versioned api from the per-resource routers.
pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .merge(ingredients::router(app_state.clone()))
        .merge(dishes::router(app_state.clone()))
        .merge(expenses::router(app_state.clone()))
        .merge(sales::router(app_state.clone()))
        .merge(report::router(app_state.clone()))
        .merge(clients::router(app_state.clone()))
        .merge(visits::router(app_state.clone()))
        .merge(telegram::router(app_state))
}

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn parse_date(value: &str) -> ServiceResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ServiceError::BadRequest(format!("invalid date '{value}', expected YYYY-MM-DD"))
    })
}

/// Dates arrive as optional `YYYY-MM-DD` strings; an absent or empty value
/// means today.
pub(crate) fn parse_date_or_today(value: Option<&str>) -> ServiceResult<NaiveDate> {
    match value {
        Some(value) if !value.is_empty() => parse_date(value),
        _ => Ok(today()),
    }
}

pub(crate) fn parse_optional_date(value: Option<&str>) -> ServiceResult<Option<NaiveDate>> {
    value
        .filter(|value| !value.is_empty())
        .map(parse_date)
        .transpose()
}
