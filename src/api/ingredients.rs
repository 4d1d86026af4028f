use aide::axum::routing::get_with;
use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::Path;
use axum::Json;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::database::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::models;
use crate::request_state::RequestState;

pub fn router(app_state: AppState) -> ApiRouter {
    ApiRouter::new()
        .api_route(
            "/ingredients",
            get_with(list_ingredients, list_ingredients_docs)
                .post_with(create_ingredient, create_ingredient_docs),
        )
        .api_route(
            "/ingredient/:id",
            get_with(get_ingredient, get_ingredient_docs)
                .put_with(edit_ingredient, edit_ingredient_docs)
                .delete_with(delete_ingredient, delete_ingredient_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct IngredientDto {
    pub id: u64,
    pub name: String,
    pub unit: String,
    pub price_per_unit: f64,
    pub supplier: Option<String>,
    pub notes: Option<String>,
}

impl From<&models::Ingredient> for IngredientDto {
    fn from(value: &models::Ingredient) -> Self {
        Self {
            id: value.id,
            name: value.name.to_owned(),
            unit: value.unit.to_owned(),
            price_per_unit: value.price_per_unit,
            supplier: value.supplier.to_owned(),
            notes: value.notes.to_owned(),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveIngredientDto {
    pub name: String,
    pub unit: String,
    pub price_per_unit: f64,
    pub supplier: Option<String>,
    pub notes: Option<String>,
}

impl SaveIngredientDto {
    fn into_model(self, id: u64) -> models::Ingredient {
        models::Ingredient {
            id,
            name: self.name,
            unit: self.unit,
            price_per_unit: self.price_per_unit,
            supplier: self.supplier,
            notes: self.notes,
        }
    }
}

async fn list_ingredients(mut state: RequestState) -> ServiceResult<Json<Vec<IngredientDto>>> {
    let ingredients = state.db.get_all_ingredients().await?;
    Ok(Json(ingredients.iter().map(|i| i.into()).collect()))
}

fn list_ingredients_docs(op: TransformOperation) -> TransformOperation {
    op.description("List all ingredients.")
        .tag("menu")
        .response::<200, Json<Vec<IngredientDto>>>()
}

async fn get_ingredient(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<Json<IngredientDto>> {
    let ingredient = state.db.get_ingredient_by_id(id).await?;

    if let Some(ingredient) = ingredient {
        return Ok(Json(IngredientDto::from(&ingredient)));
    }

    Err(ServiceError::NotFound)
}

fn get_ingredient_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get ingredient by id.")
        .tag("menu")
        .response::<200, Json<IngredientDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested ingredient does not exist!"))
}

async fn create_ingredient(
    mut state: RequestState,
    form: Json<SaveIngredientDto>,
) -> ServiceResult<Json<IngredientDto>> {
    let ingredient = state.db.store_ingredient(form.0.into_model(0)).await?;
    Ok(Json(IngredientDto::from(&ingredient)))
}

fn create_ingredient_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new ingredient.")
        .tag("menu")
        .response::<200, Json<IngredientDto>>()
}

async fn edit_ingredient(
    mut state: RequestState,
    Path(id): Path<u64>,
    form: Json<SaveIngredientDto>,
) -> ServiceResult<Json<IngredientDto>> {
    let ingredient = state.db.store_ingredient(form.0.into_model(id)).await?;
    Ok(Json(IngredientDto::from(&ingredient)))
}

fn edit_ingredient_docs(op: TransformOperation) -> TransformOperation {
    op.description("Update an existing ingredient.")
        .tag("menu")
        .response::<200, Json<IngredientDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested ingredient does not exist!"))
}

async fn delete_ingredient(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<()> {
    state.db.delete_ingredient(id).await
}

fn delete_ingredient_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete ingredient by id.")
        .tag("menu")
        .response::<200, ()>()
}
