//! Demo dataset for local development, seeded on startup when the
//! `DEMO_DATA` environment flag is set and the database is still empty.

use chrono::Duration;

use crate::api;
use crate::database::{AppState, DatabaseConnection};
use crate::error::ServiceResult;
use crate::models::{Dish, Ingredient, VisitCategory};

async fn add_ingredient(
    db: &mut DatabaseConnection,
    name: &str,
    unit: &str,
    price_per_unit: f64,
) -> ServiceResult<Ingredient> {
    db.store_ingredient(Ingredient {
        id: 0,
        name: name.to_owned(),
        unit: unit.to_owned(),
        price_per_unit,
        supplier: None,
        notes: None,
    })
    .await
}

async fn add_dish(
    db: &mut DatabaseConnection,
    name: &str,
    price: f64,
    category: &str,
) -> ServiceResult<Dish> {
    db.store_dish(Dish {
        id: 0,
        name: name.to_owned(),
        price,
        category: category.to_owned(),
        description: None,
    })
    .await
}

pub async fn seed(state: &AppState) -> ServiceResult<()> {
    let mut db = state.connection().await?;

    if !db.get_all_clients().await?.is_empty() || !db.get_all_dishes().await?.is_empty() {
        log::info!("Database is not empty, skipping demo data");
        return Ok(());
    }

    let today = api::today();

    let beans = add_ingredient(&mut db, "Espresso beans", "kg", 28.0).await?;
    let milk = add_ingredient(&mut db, "Milk", "l", 1.6).await?;
    let eggs = add_ingredient(&mut db, "Eggs", "pc", 0.25).await?;
    let flour = add_ingredient(&mut db, "Flour", "kg", 1.1).await?;
    let butter = add_ingredient(&mut db, "Butter", "kg", 9.5).await?;

    let cappuccino = add_dish(&mut db, "Cappuccino", 4.5, "drinks").await?;
    db.put_recipe_item(cappuccino.id, beans.id, 0.018).await?;
    db.put_recipe_item(cappuccino.id, milk.id, 0.15).await?;

    let omelette = add_dish(&mut db, "Omelette", 7.0, "breakfast").await?;
    db.put_recipe_item(omelette.id, eggs.id, 3.0).await?;
    db.put_recipe_item(omelette.id, butter.id, 0.02).await?;

    let pancakes = add_dish(&mut db, "Pancakes", 6.5, "breakfast").await?;
    db.put_recipe_item(pancakes.id, flour.id, 0.12).await?;
    db.put_recipe_item(pancakes.id, milk.id, 0.2).await?;
    db.put_recipe_item(pancakes.id, eggs.id, 1.0).await?;

    db.store_expense(today - Duration::days(7), "rent", 400.0, None)
        .await?;
    db.store_expense(today - Duration::days(2), "groceries", 86.4, Some("weekly market run"))
        .await?;

    db.store_sale(today - Duration::days(1), cappuccino.id, 14).await?;
    db.store_sale(today - Duration::days(1), omelette.id, 5).await?;
    db.store_sale(today, pancakes.id, 3).await?;

    let anna = db.create_client("Anna", Some("+995551112233"), None).await?;
    let giorgi = db
        .create_client("Giorgi", None, Some("prefers oat milk"))
        .await?;

    // Anna is one breakfast away from a free one.
    for offset in 0..6 {
        db.record_visit(
            anna.id,
            VisitCategory::Breakfast,
            today - Duration::days(12 - 2 * offset),
        )
        .await?;
    }
    db.record_visit(anna.id, VisitCategory::Coffee, today - Duration::days(1))
        .await?;
    db.record_visit(giorgi.id, VisitCategory::Coffee, today).await?;

    log::info!("Seeded demo data");
    Ok(())
}
