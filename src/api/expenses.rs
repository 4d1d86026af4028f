use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::Query;
use axum::Json;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{parse_date_or_today, parse_optional_date};
use crate::database::AppState;
use crate::error::ServiceResult;
use crate::models;
use crate::request_state::RequestState;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/expenses",
            get_with(list_expenses, list_expenses_docs).post_with(create_expense, create_expense_docs),
        )
        .api_route(
            "/expenses/by-category",
            get_with(expenses_by_category, expenses_by_category_docs),
        )
        .with_state(app_state)
}

/// Optional `YYYY-MM-DD` date range shared by the reporting endpoints.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DateRangeQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DateRangeQuery {
    pub fn parse(
        &self,
    ) -> ServiceResult<(Option<chrono::NaiveDate>, Option<chrono::NaiveDate>)> {
        Ok((
            parse_optional_date(self.start.as_deref())?,
            parse_optional_date(self.end.as_deref())?,
        ))
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ExpenseDto {
    pub id: u64,
    pub date: String,
    pub category: String,
    pub amount: f64,
    pub description: Option<String>,
}

impl From<&models::Expense> for ExpenseDto {
    fn from(value: &models::Expense) -> Self {
        Self {
            id: value.id,
            date: value.date.to_string(),
            category: value.category.to_owned(),
            amount: value.amount,
            description: value.description.to_owned(),
        }
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ExpenseListDto {
    pub expenses: Vec<ExpenseDto>,
    pub total: f64,
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveExpenseDto {
    pub date: Option<String>,
    pub category: String,
    pub amount: f64,
    pub description: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct ExpenseCategoryTotalDto {
    pub category: String,
    pub total: f64,
}

async fn list_expenses(
    mut state: RequestState,
    Query(range): Query<DateRangeQuery>,
) -> ServiceResult<Json<ExpenseListDto>> {
    let (start, end) = range.parse()?;
    let expenses = state.db.get_expenses(start, end).await?;
    let total = expenses.iter().map(|e| e.amount).sum();

    Ok(Json(ExpenseListDto {
        expenses: expenses.iter().map(|e| e.into()).collect(),
        total,
    }))
}

fn list_expenses_docs(op: TransformOperation) -> TransformOperation {
    op.description("List expenses, optionally restricted to a date range.")
        .tag("finance")
        .response::<200, Json<ExpenseListDto>>()
}

async fn create_expense(
    mut state: RequestState,
    form: Json<SaveExpenseDto>,
) -> ServiceResult<Json<ExpenseDto>> {
    let form = form.0;
    let date = parse_date_or_today(form.date.as_deref())?;
    let expense = state
        .db
        .store_expense(date, &form.category, form.amount, form.description.as_deref())
        .await?;

    Ok(Json(ExpenseDto::from(&expense)))
}

fn create_expense_docs(op: TransformOperation) -> TransformOperation {
    op.description("Record an expense. An absent date means today.")
        .tag("finance")
        .response::<200, Json<ExpenseDto>>()
}

async fn expenses_by_category(
    mut state: RequestState,
    Query(range): Query<DateRangeQuery>,
) -> ServiceResult<Json<Vec<ExpenseCategoryTotalDto>>> {
    let (start, end) = range.parse()?;
    let totals = state.db.expenses_by_category(start, end).await?;

    Ok(Json(
        totals
            .into_iter()
            .map(|(category, total)| ExpenseCategoryTotalDto { category, total })
            .collect(),
    ))
}

fn expenses_by_category_docs(op: TransformOperation) -> TransformOperation {
    op.description("Expense totals grouped by category.")
        .tag("finance")
        .response::<200, Json<Vec<ExpenseCategoryTotalDto>>>()
}
