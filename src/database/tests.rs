use chrono::{Duration, NaiveDate};
use sqlx::PgPool;

use super::AppState;
use crate::barcode;
use crate::error::ServiceError;
use crate::models::{Dish, Ingredient, VisitCategory};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

#[sqlx::test(migrations = false)]
async fn test_client_card_codes(pool: PgPool) {
    let _ = env_logger::builder().is_test(true).try_init();
    let app_state = AppState::from_pool(pool).await;
    let mut db = app_state.connection().await.unwrap();

    let anna = db.create_client("Anna", None, None).await.unwrap();
    let ben = db
        .create_client("Ben", Some("+995599000001"), None)
        .await
        .unwrap();

    assert!(barcode::is_valid(&anna.barcode));
    assert!(barcode::is_valid(&ben.barcode));
    assert_ne!(anna.barcode, ben.barcode);
    assert_eq!(anna.barcode, barcode::generate(anna.id).unwrap());
    assert!(!anna.history_token.is_empty());
    assert_ne!(anna.history_token, ben.history_token);

    assert_eq!(
        db.get_client_by_barcode(&anna.barcode).await.unwrap(),
        Some(anna.clone())
    );
    assert_eq!(
        db.get_client_by_barcode("0000000000000").await.unwrap(),
        None
    );
    assert_eq!(
        db.get_client_by_history_token(&ben.history_token)
            .await
            .unwrap(),
        Some(ben.clone())
    );

    let mut all = db.get_all_clients().await.unwrap();
    all.sort_by_key(|client| client.id);
    assert_eq!(all, vec![anna, ben]);
}

#[sqlx::test(migrations = false)]
async fn test_repair_pass_fixes_broken_codes(pool: PgPool) {
    let _ = env_logger::builder().is_test(true).try_init();
    let app_state = AppState::from_pool(pool).await;
    let mut db = app_state.connection().await.unwrap();

    let anna = db.create_client("Anna", None, None).await.unwrap();
    let ben = db.create_client("Ben", None, None).await.unwrap();

    sqlx::query("UPDATE clients SET barcode = '1234', history_token = NULL WHERE id = $1")
        .bind(anna.id as i64)
        .execute(&mut *db.connection)
        .await
        .unwrap();

    let repaired = db.repair_client_codes().await.unwrap();
    assert_eq!(repaired, 1);

    let fixed = db.get_client_by_id(anna.id).await.unwrap().unwrap();
    assert_eq!(fixed.barcode, barcode::generate(anna.id).unwrap());
    assert!(!fixed.history_token.is_empty());

    // An intact client is left alone.
    assert_eq!(db.get_client_by_id(ben.id).await.unwrap().unwrap(), ben);
}

#[sqlx::test(migrations = false)]
async fn test_scan_counts_and_frees(pool: PgPool) {
    let _ = env_logger::builder().is_test(true).try_init();
    let app_state = AppState::from_pool(pool).await;
    let mut db = app_state.connection().await.unwrap();

    let anna = db.create_client("Anna", None, None).await.unwrap();
    let start = date(2026, 1, 5);

    // Unknown code: NotFound and no partial side effects.
    let result = db
        .scan_visit("4006381333931", VisitCategory::Breakfast, start)
        .await;
    assert_eq!(result.unwrap_err(), ServiceError::NotFound);
    assert_eq!(
        db.count_visits(anna.id, VisitCategory::Breakfast)
            .await
            .unwrap(),
        0
    );
    assert!(db.get_client_events(anna.id, 100).await.unwrap().is_empty());

    // Seven scans; the code may arrive with surrounding whitespace.
    let mut free_flags = Vec::new();
    for day in 0..7 {
        let outcome = db
            .scan_visit(
                &format!("  {}  ", anna.barcode),
                VisitCategory::Breakfast,
                start + Duration::days(day),
            )
            .await
            .unwrap();
        free_flags.push(outcome.visit.is_free);

        if day == 5 {
            assert!(outcome.stats.next_is_free);
            assert_eq!(outcome.stats.until_free, 1);
        }
    }
    assert_eq!(
        free_flags,
        vec![false, false, false, false, false, false, true]
    );

    // After the free visit the cycle starts over.
    let stats = db
        .client_visit_stats(anna.id, VisitCategory::Breakfast)
        .await
        .unwrap();
    assert_eq!(stats.total, 7);
    assert_eq!(stats.until_free, 7);
    assert!(!stats.next_is_free);

    // The coffee counter is independent of the breakfast one.
    assert_eq!(
        db.count_visits(anna.id, VisitCategory::Coffee).await.unwrap(),
        0
    );
    let outcome = db
        .scan_visit(&anna.barcode, VisitCategory::Coffee, start)
        .await
        .unwrap();
    assert!(!outcome.visit.is_free);
    assert_eq!(outcome.stats.until_free, 6);

    // Every successful scan left an audit entry.
    let events = db.get_client_events(anna.id, 100).await.unwrap();
    assert_eq!(events.len(), 8);
    assert!(events.iter().any(|event| event.event_type == "coffee_scanned"));
    assert_eq!(
        events
            .iter()
            .filter(|event| event.event_type == "scanned")
            .count(),
        7
    );
}

#[sqlx::test(migrations = false)]
async fn test_registered_visits_and_listing(pool: PgPool) {
    let _ = env_logger::builder().is_test(true).try_init();
    let app_state = AppState::from_pool(pool).await;
    let mut db = app_state.connection().await.unwrap();

    let anna = db.create_client("Anna", None, None).await.unwrap();
    let ben = db.create_client("Ben", None, None).await.unwrap();

    let (visit, stats) = db
        .record_visit(anna.id, VisitCategory::Breakfast, date(2026, 2, 1))
        .await
        .unwrap();
    assert!(!visit.is_free);
    assert_eq!(visit.client_name, "Anna");
    assert_eq!(stats.total, 1);

    db.record_visit(ben.id, VisitCategory::Breakfast, date(2026, 2, 2))
        .await
        .unwrap();
    db.record_visit(anna.id, VisitCategory::Breakfast, date(2026, 2, 3))
        .await
        .unwrap();

    // Registering a visit for a missing client fails.
    let result = db
        .record_visit(4242, VisitCategory::Breakfast, date(2026, 2, 3))
        .await;
    assert_eq!(result.unwrap_err(), ServiceError::NotFound);

    let all = db
        .get_visits(VisitCategory::Breakfast, None, None, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
    // Most recent first.
    assert_eq!(all[0].date, date(2026, 2, 3));

    let annas = db
        .get_visits(VisitCategory::Breakfast, Some(anna.id), None, None)
        .await
        .unwrap();
    assert_eq!(annas.len(), 2);

    let ranged = db
        .get_visits(
            VisitCategory::Breakfast,
            None,
            Some(date(2026, 2, 2)),
            Some(date(2026, 2, 2)),
        )
        .await
        .unwrap();
    assert_eq!(ranged.len(), 1);
    assert_eq!(ranged[0].client_name, "Ben");

    let overview = db
        .clients_with_visit_counts(VisitCategory::Breakfast)
        .await
        .unwrap();
    assert_eq!(overview.len(), 2);
    let anna_count = overview
        .iter()
        .find(|(client, _)| client.id == anna.id)
        .map(|(_, count)| *count);
    assert_eq!(anna_count, Some(2));
}

#[sqlx::test(migrations = false)]
async fn test_menu_costing(pool: PgPool) {
    let _ = env_logger::builder().is_test(true).try_init();
    let app_state = AppState::from_pool(pool).await;
    let mut db = app_state.connection().await.unwrap();

    let flour = db
        .store_ingredient(Ingredient {
            id: 0,
            name: "Flour".to_owned(),
            unit: "kg".to_owned(),
            price_per_unit: 20.0,
            supplier: None,
            notes: None,
        })
        .await
        .unwrap();
    assert!(flour.id != 0);

    let eggs = db
        .store_ingredient(Ingredient {
            id: 0,
            name: "Eggs".to_owned(),
            unit: "pc".to_owned(),
            price_per_unit: 0.25,
            supplier: Some("market".to_owned()),
            notes: None,
        })
        .await
        .unwrap();

    let pancakes = db
        .store_dish(Dish {
            id: 0,
            name: "Pancakes".to_owned(),
            price: 10.0,
            category: "breakfast".to_owned(),
            description: None,
        })
        .await
        .unwrap();

    db.put_recipe_item(pancakes.id, flour.id, 0.1).await.unwrap();
    db.put_recipe_item(pancakes.id, eggs.id, 2.0).await.unwrap();

    assert_eq!(db.dish_cost(pancakes.id).await.unwrap(), 2.5);

    let margin = db.dish_margin(pancakes.id).await.unwrap();
    assert_eq!(margin.cost, 2.5);
    assert_eq!(margin.price, 10.0);
    assert_eq!(margin.margin_amount, 7.5);
    assert_eq!(margin.margin_percent, 75.0);
    assert_eq!(margin.markup_percent, 300.0);

    // Upserting a recipe line overwrites the quantity.
    db.put_recipe_item(pancakes.id, flour.id, 0.2).await.unwrap();
    assert_eq!(db.dish_cost(pancakes.id).await.unwrap(), 4.5);
    let recipe = db.get_recipe(pancakes.id).await.unwrap();
    assert_eq!(recipe.len(), 2);

    // A dish without a recipe costs nothing.
    let tea = db
        .store_dish(Dish {
            id: 0,
            name: "Tea".to_owned(),
            price: 2.0,
            category: "drinks".to_owned(),
            description: None,
        })
        .await
        .unwrap();
    assert_eq!(db.dish_cost(tea.id).await.unwrap(), 0.0);

    // Updating a missing dish fails.
    let result = db
        .store_dish(Dish {
            id: 4242,
            name: "Ghost".to_owned(),
            price: 1.0,
            category: "none".to_owned(),
            description: None,
        })
        .await;
    assert_eq!(result.unwrap_err(), ServiceError::NotFound);
}

#[sqlx::test(migrations = false)]
async fn test_profit_report(pool: PgPool) {
    let _ = env_logger::builder().is_test(true).try_init();
    let app_state = AppState::from_pool(pool).await;
    let mut db = app_state.connection().await.unwrap();

    let flour = db
        .store_ingredient(Ingredient {
            id: 0,
            name: "Flour".to_owned(),
            unit: "kg".to_owned(),
            price_per_unit: 20.0,
            supplier: None,
            notes: None,
        })
        .await
        .unwrap();

    let pancakes = db
        .store_dish(Dish {
            id: 0,
            name: "Pancakes".to_owned(),
            price: 10.0,
            category: "breakfast".to_owned(),
            description: None,
        })
        .await
        .unwrap();
    db.put_recipe_item(pancakes.id, flour.id, 0.125).await.unwrap();

    let sale = db
        .store_sale(date(2026, 3, 10), pancakes.id, 3)
        .await
        .unwrap();
    assert_eq!(sale.total_amount, 30.0);
    assert_eq!(sale.dish_name, "Pancakes");

    db.store_expense(date(2026, 3, 11), "rent", 12.5, None)
        .await
        .unwrap();
    // Outside the reporting range below.
    db.store_expense(date(2026, 4, 1), "rent", 99.0, None)
        .await
        .unwrap();

    let report = db
        .profit_report(Some(date(2026, 3, 1)), Some(date(2026, 3, 31)))
        .await
        .unwrap();
    assert_eq!(report.revenue, 30.0);
    assert_eq!(report.cost_of_goods_sold, 7.5);
    assert_eq!(report.gross_profit, 22.5);
    assert_eq!(report.total_expenses, 12.5);
    assert_eq!(report.net_profit, 10.0);

    // Selling a missing dish fails before anything is written.
    let result = db.store_sale(date(2026, 3, 12), 4242, 1).await;
    assert_eq!(result.unwrap_err(), ServiceError::NotFound);
    assert_eq!(db.revenue(None, None).await.unwrap(), 30.0);
}

#[sqlx::test(migrations = false)]
async fn test_expense_summary(pool: PgPool) {
    let _ = env_logger::builder().is_test(true).try_init();
    let app_state = AppState::from_pool(pool).await;
    let mut db = app_state.connection().await.unwrap();

    db.store_expense(date(2026, 5, 1), "rent", 400.0, None)
        .await
        .unwrap();
    db.store_expense(date(2026, 5, 3), "groceries", 55.5, Some("market"))
        .await
        .unwrap();
    db.store_expense(date(2026, 5, 20), "groceries", 44.5, None)
        .await
        .unwrap();

    let all = db.get_expenses(None, None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].date, date(2026, 5, 20));

    let by_category = db.expenses_by_category(None, None).await.unwrap();
    assert_eq!(
        by_category,
        vec![("rent".to_owned(), 400.0), ("groceries".to_owned(), 100.0)]
    );

    let ranged = db
        .expenses_by_category(Some(date(2026, 5, 2)), Some(date(2026, 5, 31)))
        .await
        .unwrap();
    assert_eq!(ranged, vec![("groceries".to_owned(), 100.0)]);
}
