use aide::axum::routing::{delete_with, get_with};
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
            "/dishes",
            get_with(list_dishes, list_dishes_docs).post_with(create_dish, create_dish_docs),
        )
        .api_route(
            "/dish/:id",
            get_with(get_dish, get_dish_docs)
                .put_with(edit_dish, edit_dish_docs)
                .delete_with(delete_dish, delete_dish_docs),
        )
        .api_route("/dish/:id/margin", get_with(get_margin, get_margin_docs))
        .api_route(
            "/dish/:id/recipe",
            get_with(get_recipe, get_recipe_docs).put_with(put_recipe_item, put_recipe_item_docs),
        )
        .api_route(
            "/recipe-item/:id",
            delete_with(delete_recipe_item, delete_recipe_item_docs),
        )
        .with_state(app_state)
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct DishDto {
    pub id: u64,
    pub name: String,
    pub price: f64,
    pub category: String,
    pub description: Option<String>,
}

impl From<&models::Dish> for DishDto {
    fn from(value: &models::Dish) -> Self {
        Self {
            id: value.id,
            name: value.name.to_owned(),
            price: value.price,
            category: value.category.to_owned(),
            description: value.description.to_owned(),
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveDishDto {
    pub name: String,
    pub price: f64,
    pub category: String,
    pub description: Option<String>,
}

impl SaveDishDto {
    fn into_model(self, id: u64) -> models::Dish {
        models::Dish {
            id,
            name: self.name,
            price: self.price,
            category: self.category,
            description: self.description,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct RecipeItemDto {
    pub id: u64,
    pub dish_id: u64,
    pub ingredient_id: u64,
    pub ingredient_name: String,
    pub quantity: f64,
}

impl From<&models::RecipeItem> for RecipeItemDto {
    fn from(value: &models::RecipeItem) -> Self {
        Self {
            id: value.id,
            dish_id: value.dish_id,
            ingredient_id: value.ingredient_id,
            ingredient_name: value.ingredient_name.to_owned(),
            quantity: value.quantity,
        }
    }
}

#[derive(Debug, PartialEq, Deserialize, JsonSchema)]
pub struct SaveRecipeItemDto {
    pub ingredient_id: u64,
    pub quantity: f64,
}

#[derive(Debug, PartialEq, Serialize, JsonSchema)]
pub struct DishMarginDto {
    pub cost: f64,
    pub price: f64,
    pub margin_amount: f64,
    pub margin_percent: f64,
    pub markup_percent: f64,
}

impl From<&models::DishMargin> for DishMarginDto {
    fn from(value: &models::DishMargin) -> Self {
        Self {
            cost: value.cost,
            price: value.price,
            margin_amount: value.margin_amount,
            margin_percent: value.margin_percent,
            markup_percent: value.markup_percent,
        }
    }
}

async fn list_dishes(mut state: RequestState) -> ServiceResult<Json<Vec<DishDto>>> {
    let dishes = state.db.get_all_dishes().await?;
    Ok(Json(dishes.iter().map(|d| d.into()).collect()))
}

fn list_dishes_docs(op: TransformOperation) -> TransformOperation {
    op.description("List all dishes.")
        .tag("menu")
        .response::<200, Json<Vec<DishDto>>>()
}

async fn get_dish(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<Json<DishDto>> {
    let dish = state.db.get_dish_by_id(id).await?;

    if let Some(dish) = dish {
        return Ok(Json(DishDto::from(&dish)));
    }

    Err(ServiceError::NotFound)
}

fn get_dish_docs(op: TransformOperation) -> TransformOperation {
    op.description("Get dish by id.")
        .tag("menu")
        .response::<200, Json<DishDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested dish does not exist!"))
}

async fn create_dish(
    mut state: RequestState,
    form: Json<SaveDishDto>,
) -> ServiceResult<Json<DishDto>> {
    let dish = state.db.store_dish(form.0.into_model(0)).await?;
    Ok(Json(DishDto::from(&dish)))
}

fn create_dish_docs(op: TransformOperation) -> TransformOperation {
    op.description("Create a new dish.")
        .tag("menu")
        .response::<200, Json<DishDto>>()
}

async fn edit_dish(
    mut state: RequestState,
    Path(id): Path<u64>,
    form: Json<SaveDishDto>,
) -> ServiceResult<Json<DishDto>> {
    let dish = state.db.store_dish(form.0.into_model(id)).await?;
    Ok(Json(DishDto::from(&dish)))
}

fn edit_dish_docs(op: TransformOperation) -> TransformOperation {
    op.description("Update an existing dish.")
        .tag("menu")
        .response::<200, Json<DishDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested dish does not exist!"))
}

async fn delete_dish(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<()> {
    state.db.delete_dish(id).await
}

fn delete_dish_docs(op: TransformOperation) -> TransformOperation {
    op.description("Delete dish by id.")
        .tag("menu")
        .response::<200, ()>()
}

async fn get_margin(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<Json<DishMarginDto>> {
    let margin = state.db.dish_margin(id).await?;
    Ok(Json(DishMarginDto::from(&margin)))
}

fn get_margin_docs(op: TransformOperation) -> TransformOperation {
    op.description("Cost and margin breakdown of a dish, derived from its recipe.")
        .tag("menu")
        .response::<200, Json<DishMarginDto>>()
        .response_with::<404, (), _>(|res| res.description("The requested dish does not exist!"))
}

async fn get_recipe(
    mut state: RequestState,
    Path(id): Path<u64>,
) -> ServiceResult<Json<Vec<RecipeItemDto>>> {
    let recipe = state.db.get_recipe(id).await?;
    Ok(Json(recipe.iter().map(|item| item.into()).collect()))
}

fn get_recipe_docs(op: TransformOperation) -> TransformOperation {
    op.description("List the recipe (bill of materials) of a dish.")
        .tag("menu")
        .response::<200, Json<Vec<RecipeItemDto>>>()
}

async fn put_recipe_item(
    mut state: RequestState,
    Path(id): Path<u64>,
    form: Json<SaveRecipeItemDto>,
) -> ServiceResult<Json<Vec<RecipeItemDto>>> {
    if state.db.get_dish_by_id(id).await?.is_none() {
        return Err(ServiceError::NotFound);
    }
    if state
        .db
        .get_ingredient_by_id(form.ingredient_id)
        .await?
        .is_none()
    {
        return Err(ServiceError::NotFound);
    }

    state
        .db
        .put_recipe_item(id, form.ingredient_id, form.quantity)
        .await?;

    let recipe = state.db.get_recipe(id).await?;
    Ok(Json(recipe.iter().map(|item| item.into()).collect()))
}

fn put_recipe_item_docs(op: TransformOperation) -> TransformOperation {
    op.description("Add an ingredient to a dish's recipe or overwrite its quantity.")
        .tag("menu")
        .response::<200, Json<Vec<RecipeItemDto>>>()
        .response_with::<404, (), _>(|res| res.description("Dish or ingredient does not exist!"))
}

async fn delete_recipe_item(mut state: RequestState, Path(id): Path<u64>) -> ServiceResult<()> {
    state.db.delete_recipe_item(id).await
}

fn delete_recipe_item_docs(op: TransformOperation) -> TransformOperation {
    op.description("Remove a recipe line by id.")
        .tag("menu")
        .response::<200, ()>()
}
