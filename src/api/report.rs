use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::Query;
use axum::Json;
use schemars::JsonSchema;
use serde::Serialize;

use crate::api::expenses::DateRangeQuery;
use crate::database::AppState;
use crate::error::ServiceResult;
use crate::models;
use crate::request_state::RequestState;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route("/report/profit", get_with(profit_report, profit_report_docs))
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ProfitReportDto {
    pub revenue: f64,
    pub cost_of_goods_sold: f64,
    pub gross_profit: f64,
    pub total_expenses: f64,
    pub net_profit: f64,
}

impl From<&models::ProfitReport> for ProfitReportDto {
    fn from(value: &models::ProfitReport) -> Self {
        Self {
            revenue: value.revenue,
            cost_of_goods_sold: value.cost_of_goods_sold,
            gross_profit: value.gross_profit,
            total_expenses: value.total_expenses,
            net_profit: value.net_profit,
        }
    }
}

async fn profit_report(
    mut state: RequestState,
    Query(range): Query<DateRangeQuery>,
) -> ServiceResult<Json<ProfitReportDto>> {
    let (start, end) = range.parse()?;
    let report = state.db.profit_report(start, end).await?;
    Ok(Json(ProfitReportDto::from(&report)))
}

fn profit_report_docs(op: TransformOperation) -> TransformOperation {
    op.description(
        "Profit summary over a date range: revenue, cost of goods sold, expenses and net profit.",
    )
    .tag("reports")
    .response::<200, Json<ProfitReportDto>>()
}
