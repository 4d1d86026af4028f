use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::Query;
use axum::Json;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::parse_date_or_today;
use crate::api::expenses::DateRangeQuery;
use crate::database::AppState;
use crate::error::ServiceResult;
use crate::models;
use crate::request_state::RequestState;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/sales",
            get_with(list_sales, list_sales_docs).post_with(create_sale, create_sale_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct SaleDto {
    pub id: u64,
    pub date: String,
    pub dish_id: u64,
    pub dish_name: String,
    pub quantity: i32,
    pub total_amount: f64,
}

impl From<&models::Sale> for SaleDto {
    fn from(value: &models::Sale) -> Self {
        Self {
            id: value.id,
            date: value.date.to_string(),
            dish_id: value.dish_id,
            dish_name: value.dish_name.to_owned(),
            quantity: value.quantity,
            total_amount: value.total_amount,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct SaleListDto {
    pub sales: Vec<SaleDto>,
    pub total: f64,
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveSaleDto {
    pub dish_id: u64,
    pub quantity: i32,
    pub date: Option<String>,
}

async fn list_sales(
    mut state: RequestState,
    Query(range): Query<DateRangeQuery>,
) -> ServiceResult<Json<SaleListDto>> {
    let (start, end) = range.parse()?;
    let sales = state.db.get_sales(start, end).await?;
    let total = sales.iter().map(|s| s.total_amount).sum();

    Ok(Json(SaleListDto {
        sales: sales.iter().map(|s| s.into()).collect(),
        total,
    }))
}

fn list_sales_docs(op: TransformOperation) -> TransformOperation {
    op.description("List sales with their sum, optionally restricted to a date range.")
        .tag("finance")
        .response::<200, Json<SaleListDto>>()
}

async fn create_sale(
    mut state: RequestState,
    form: Json<SaveSaleDto>,
) -> ServiceResult<Json<SaleDto>> {
    let form = form.0;
    let date = parse_date_or_today(form.date.as_deref())?;
    let sale = state.db.store_sale(date, form.dish_id, form.quantity).await?;

    Ok(Json(SaleDto::from(&sale)))
}

fn create_sale_docs(op: TransformOperation) -> TransformOperation {
    op.description("Record a sale; the total is derived from the current dish price.")
        .tag("finance")
        .response::<200, Json<SaleDto>>()
        .response_with::<404, (), _>(|res| res.description("The sold dish does not exist!"))
}
