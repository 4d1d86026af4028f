use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::migrate::Migrator;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Acquire, PgPool, Postgres, Row, Transaction};

use crate::barcode;
use crate::error::{ServiceError, ServiceResult};
use crate::loyalty::{self, VisitStats};
use crate::models::{
    Client, ClientEvent, Dish, DishMargin, Expense, Ingredient, ProfitReport, RecipeItem, Sale,
    ScanOutcome, Visit, VisitCategory,
};

mod migration;
#[cfg(test)]
mod tests;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

impl AppState {
    pub async fn connect(url: &str) -> AppState {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .expect("connect to database");

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: PgPool) -> AppState {
        let migrator = Migrator::new(migration::postgresql_migrations())
            .await
            .expect("load migrations");
        migrator.run(&pool).await.expect("run migrations");

        let state = AppState { pool };

        let mut db = state.connection().await.expect("acquire connection");
        let repaired = db
            .repair_client_codes()
            .await
            .expect("repair client card codes");
        if repaired > 0 {
            log::info!("Repaired {repaired} client card codes");
        }

        state
    }

    pub async fn connection(&self) -> ServiceResult<DatabaseConnection> {
        let connection = self.pool.acquire().await?;
        Ok(DatabaseConnection { connection })
    }
}

pub struct DatabaseConnection {
    pub connection: PoolConnection<Postgres>,
}

const CLIENT_COLUMNS: &str = "id, name, phone, notes, barcode, telegram_chat_id, history_token";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn new_history_token() -> String {
    let bytes: [u8; 18] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

fn ingredient_from_row(row: &PgRow) -> ServiceResult<Ingredient> {
    Ok(Ingredient {
        id: row.try_get::<i64, _>("id")? as u64,
        name: row.try_get("name")?,
        unit: row.try_get("unit")?,
        price_per_unit: row.try_get("price_per_unit")?,
        supplier: row.try_get("supplier")?,
        notes: row.try_get("notes")?,
    })
}

fn dish_from_row(row: &PgRow) -> ServiceResult<Dish> {
    Ok(Dish {
        id: row.try_get::<i64, _>("id")? as u64,
        name: row.try_get("name")?,
        price: row.try_get("price")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
    })
}

fn client_from_row(row: &PgRow) -> ServiceResult<Client> {
    Ok(Client {
        id: row.try_get::<i64, _>("id")? as u64,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        notes: row.try_get("notes")?,
        barcode: row
            .try_get::<Option<String>, _>("barcode")?
            .unwrap_or_default(),
        telegram_chat_id: row.try_get("telegram_chat_id")?,
        history_token: row
            .try_get::<Option<String>, _>("history_token")?
            .unwrap_or_default(),
    })
}

fn visit_from_row(row: &PgRow) -> ServiceResult<Visit> {
    let category: String = row.try_get("category")?;
    let category = VisitCategory::parse(&category).ok_or_else(|| {
        ServiceError::InternalServerError(format!("unknown visit category '{category}'"))
    })?;

    Ok(Visit {
        id: row.try_get::<i64, _>("id")? as u64,
        client_id: row.try_get::<i64, _>("client_id")? as u64,
        client_name: row.try_get("client_name")?,
        category,
        date: row.try_get("visit_date")?,
        is_free: row.try_get("is_free")?,
    })
}

fn event_from_row(row: &PgRow) -> ServiceResult<ClientEvent> {
    Ok(ClientEvent {
        id: row.try_get::<i64, _>("id")? as u64,
        client_id: row.try_get::<i64, _>("client_id")? as u64,
        event_type: row.try_get("event_type")?,
        details: row.try_get("details")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

/// Count the prior visits of a client in one category and insert the next
/// one. Runs inside the caller's transaction; the client row is locked
/// first so concurrent scans cannot observe the same prior count and the
/// assigned ordinals stay a gapless 1..N sequence.
async fn insert_visit(
    tx: &mut Transaction<'_, Postgres>,
    client_id: u64,
    category: VisitCategory,
    date: NaiveDate,
) -> ServiceResult<(Visit, VisitStats)> {
    let row = sqlx::query("SELECT name FROM clients WHERE id = $1 FOR UPDATE")
        .bind(client_id as i64)
        .fetch_optional(&mut **tx)
        .await?;
    let Some(row) = row else {
        return Err(ServiceError::NotFound);
    };
    let client_name: String = row.try_get("name")?;

    let prior: i64 =
        sqlx::query("SELECT COUNT(*) AS count FROM visits WHERE client_id = $1 AND category = $2")
            .bind(client_id as i64)
            .bind(category.as_str())
            .fetch_one(&mut **tx)
            .await?
            .try_get("count")?;

    let (ordinal, is_free) = loyalty::classify_visit(prior as u64);

    let id: i64 = sqlx::query(
        "INSERT INTO visits (client_id, category, visit_date, is_free) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(client_id as i64)
    .bind(category.as_str())
    .bind(date)
    .bind(is_free)
    .fetch_one(&mut **tx)
    .await?
    .try_get("id")?;

    let visit = Visit {
        id: id as u64,
        client_id,
        client_name,
        category,
        date,
        is_free,
    };
    Ok((visit, loyalty::visit_stats(ordinal)))
}

async fn insert_event(
    executor: impl sqlx::PgExecutor<'_>,
    client_id: u64,
    event_type: &str,
    details: Option<&str>,
) -> ServiceResult<ClientEvent> {
    let created_at = Utc::now();
    let id: i64 = sqlx::query(
        "INSERT INTO client_events (client_id, event_type, details, created_at) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(client_id as i64)
    .bind(event_type)
    .bind(details)
    .bind(created_at)
    .fetch_one(executor)
    .await?
    .try_get("id")?;

    Ok(ClientEvent {
        id: id as u64,
        client_id,
        event_type: event_type.to_owned(),
        details: details.map(str::to_owned),
        created_at,
    })
}

impl DatabaseConnection {
    // ===== Ingredients =====

    pub async fn get_all_ingredients(&mut self) -> ServiceResult<Vec<Ingredient>> {
        let rows = sqlx::query(
            "SELECT id, name, unit, price_per_unit, supplier, notes \
             FROM ingredients ORDER BY name",
        )
        .fetch_all(&mut *self.connection)
        .await?;

        rows.iter().map(ingredient_from_row).collect()
    }

    pub async fn get_ingredient_by_id(&mut self, id: u64) -> ServiceResult<Option<Ingredient>> {
        let row = sqlx::query(
            "SELECT id, name, unit, price_per_unit, supplier, notes \
             FROM ingredients WHERE id = $1",
        )
        .bind(id as i64)
        .fetch_optional(&mut *self.connection)
        .await?;

        row.as_ref().map(ingredient_from_row).transpose()
    }

    /// Insert the ingredient if its id is still zero, update it otherwise.
    pub async fn store_ingredient(&mut self, ingredient: Ingredient) -> ServiceResult<Ingredient> {
        let mut ingredient = ingredient;

        if ingredient.id == 0 {
            let id: i64 = sqlx::query(
                "INSERT INTO ingredients (name, unit, price_per_unit, supplier, notes) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
            )
            .bind(&ingredient.name)
            .bind(&ingredient.unit)
            .bind(ingredient.price_per_unit)
            .bind(&ingredient.supplier)
            .bind(&ingredient.notes)
            .fetch_one(&mut *self.connection)
            .await?
            .try_get("id")?;
            ingredient.id = id as u64;
        } else {
            let result = sqlx::query(
                "UPDATE ingredients SET name = $1, unit = $2, price_per_unit = $3, \
                 supplier = $4, notes = $5 WHERE id = $6",
            )
            .bind(&ingredient.name)
            .bind(&ingredient.unit)
            .bind(ingredient.price_per_unit)
            .bind(&ingredient.supplier)
            .bind(&ingredient.notes)
            .bind(ingredient.id as i64)
            .execute(&mut *self.connection)
            .await?;

            if result.rows_affected() == 0 {
                return Err(ServiceError::NotFound);
            }
        }

        Ok(ingredient)
    }

    pub async fn delete_ingredient(&mut self, id: u64) -> ServiceResult<()> {
        sqlx::query("DELETE FROM ingredients WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *self.connection)
            .await?;
        Ok(())
    }

    // ===== Dishes =====

    pub async fn get_all_dishes(&mut self) -> ServiceResult<Vec<Dish>> {
        let rows = sqlx::query(
            "SELECT id, name, price, category, description \
             FROM dishes ORDER BY category, name",
        )
        .fetch_all(&mut *self.connection)
        .await?;

        rows.iter().map(dish_from_row).collect()
    }

    pub async fn get_dish_by_id(&mut self, id: u64) -> ServiceResult<Option<Dish>> {
        let row = sqlx::query("SELECT id, name, price, category, description FROM dishes WHERE id = $1")
            .bind(id as i64)
            .fetch_optional(&mut *self.connection)
            .await?;

        row.as_ref().map(dish_from_row).transpose()
    }

    /// Insert the dish if its id is still zero, update it otherwise.
    pub async fn store_dish(&mut self, dish: Dish) -> ServiceResult<Dish> {
        let mut dish = dish;

        if dish.id == 0 {
            let id: i64 = sqlx::query(
                "INSERT INTO dishes (name, price, category, description) \
                 VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(&dish.name)
            .bind(dish.price)
            .bind(&dish.category)
            .bind(&dish.description)
            .fetch_one(&mut *self.connection)
            .await?
            .try_get("id")?;
            dish.id = id as u64;
        } else {
            let result = sqlx::query(
                "UPDATE dishes SET name = $1, price = $2, category = $3, description = $4 \
                 WHERE id = $5",
            )
            .bind(&dish.name)
            .bind(dish.price)
            .bind(&dish.category)
            .bind(&dish.description)
            .bind(dish.id as i64)
            .execute(&mut *self.connection)
            .await?;

            if result.rows_affected() == 0 {
                return Err(ServiceError::NotFound);
            }
        }

        Ok(dish)
    }

    pub async fn delete_dish(&mut self, id: u64) -> ServiceResult<()> {
        sqlx::query("DELETE FROM dishes WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *self.connection)
            .await?;
        Ok(())
    }

    // ===== Recipes =====

    pub async fn get_recipe(&mut self, dish_id: u64) -> ServiceResult<Vec<RecipeItem>> {
        let rows = sqlx::query(
            "SELECT ri.id, ri.dish_id, ri.ingredient_id, ri.quantity, i.name AS ingredient_name \
             FROM recipe_items ri \
             JOIN ingredients i ON i.id = ri.ingredient_id \
             WHERE ri.dish_id = $1 ORDER BY i.name",
        )
        .bind(dish_id as i64)
        .fetch_all(&mut *self.connection)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RecipeItem {
                    id: row.try_get::<i64, _>("id")? as u64,
                    dish_id: row.try_get::<i64, _>("dish_id")? as u64,
                    ingredient_id: row.try_get::<i64, _>("ingredient_id")? as u64,
                    ingredient_name: row.try_get("ingredient_name")?,
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect()
    }

    /// Add an ingredient to a dish's recipe or overwrite its quantity.
    pub async fn put_recipe_item(
        &mut self,
        dish_id: u64,
        ingredient_id: u64,
        quantity: f64,
    ) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO recipe_items (dish_id, ingredient_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (dish_id, ingredient_id) DO UPDATE SET quantity = EXCLUDED.quantity",
        )
        .bind(dish_id as i64)
        .bind(ingredient_id as i64)
        .bind(quantity)
        .execute(&mut *self.connection)
        .await?;
        Ok(())
    }

    pub async fn delete_recipe_item(&mut self, id: u64) -> ServiceResult<()> {
        sqlx::query("DELETE FROM recipe_items WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *self.connection)
            .await?;
        Ok(())
    }

    /// Cost of one serving, derived from the recipe and current ingredient
    /// prices. Dishes without a recipe cost zero.
    pub async fn dish_cost(&mut self, dish_id: u64) -> ServiceResult<f64> {
        let cost: f64 = sqlx::query(
            "SELECT COALESCE(SUM(i.price_per_unit * ri.quantity), 0) AS cost \
             FROM recipe_items ri \
             JOIN ingredients i ON i.id = ri.ingredient_id \
             WHERE ri.dish_id = $1",
        )
        .bind(dish_id as i64)
        .fetch_one(&mut *self.connection)
        .await?
        .try_get("cost")?;

        Ok(round2(cost))
    }

    pub async fn dish_margin(&mut self, dish_id: u64) -> ServiceResult<DishMargin> {
        let dish = self
            .get_dish_by_id(dish_id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        let cost = self.dish_cost(dish_id).await?;

        let margin_amount = dish.price - cost;
        let margin_percent = if dish.price > 0.0 {
            margin_amount / dish.price * 100.0
        } else {
            0.0
        };
        let markup_percent = if cost > 0.0 {
            margin_amount / cost * 100.0
        } else {
            0.0
        };

        Ok(DishMargin {
            cost,
            price: dish.price,
            margin_amount: round2(margin_amount),
            margin_percent: round2(margin_percent),
            markup_percent: round2(markup_percent),
        })
    }

    // ===== Expenses =====

    pub async fn store_expense(
        &mut self,
        date: NaiveDate,
        category: &str,
        amount: f64,
        description: Option<&str>,
    ) -> ServiceResult<Expense> {
        let id: i64 = sqlx::query(
            "INSERT INTO expenses (expense_date, category, amount, description) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(date)
        .bind(category)
        .bind(amount)
        .bind(description)
        .fetch_one(&mut *self.connection)
        .await?
        .try_get("id")?;

        Ok(Expense {
            id: id as u64,
            date,
            category: category.to_owned(),
            amount,
            description: description.map(str::to_owned),
        })
    }

    pub async fn get_expenses(
        &mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> ServiceResult<Vec<Expense>> {
        let rows = sqlx::query(
            "SELECT id, expense_date, category, amount, description FROM expenses \
             WHERE ($1::date IS NULL OR expense_date >= $1) \
               AND ($2::date IS NULL OR expense_date <= $2) \
             ORDER BY expense_date DESC, id DESC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&mut *self.connection)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Expense {
                    id: row.try_get::<i64, _>("id")? as u64,
                    date: row.try_get("expense_date")?,
                    category: row.try_get("category")?,
                    amount: row.try_get("amount")?,
                    description: row.try_get("description")?,
                })
            })
            .collect()
    }

    pub async fn expenses_by_category(
        &mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> ServiceResult<Vec<(String, f64)>> {
        let rows = sqlx::query(
            "SELECT category, SUM(amount) AS total FROM expenses \
             WHERE ($1::date IS NULL OR expense_date >= $1) \
               AND ($2::date IS NULL OR expense_date <= $2) \
             GROUP BY category ORDER BY total DESC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&mut *self.connection)
        .await?;

        rows.iter()
            .map(|row| Ok((row.try_get("category")?, round2(row.try_get("total")?))))
            .collect()
    }

    // ===== Sales =====

    /// Record a sale; the total is derived from the current dish price.
    pub async fn store_sale(
        &mut self,
        date: NaiveDate,
        dish_id: u64,
        quantity: i32,
    ) -> ServiceResult<Sale> {
        let dish = self
            .get_dish_by_id(dish_id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        let total_amount = round2(dish.price * f64::from(quantity));

        let id: i64 = sqlx::query(
            "INSERT INTO sales (sale_date, dish_id, quantity, total_amount) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(date)
        .bind(dish_id as i64)
        .bind(quantity)
        .bind(total_amount)
        .fetch_one(&mut *self.connection)
        .await?
        .try_get("id")?;

        Ok(Sale {
            id: id as u64,
            date,
            dish_id,
            dish_name: dish.name,
            quantity,
            total_amount,
        })
    }

    pub async fn get_sales(
        &mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> ServiceResult<Vec<Sale>> {
        let rows = sqlx::query(
            "SELECT s.id, s.sale_date, s.dish_id, s.quantity, s.total_amount, d.name AS dish_name \
             FROM sales s JOIN dishes d ON d.id = s.dish_id \
             WHERE ($1::date IS NULL OR s.sale_date >= $1) \
               AND ($2::date IS NULL OR s.sale_date <= $2) \
             ORDER BY s.sale_date DESC, s.id DESC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&mut *self.connection)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Sale {
                    id: row.try_get::<i64, _>("id")? as u64,
                    date: row.try_get("sale_date")?,
                    dish_id: row.try_get::<i64, _>("dish_id")? as u64,
                    dish_name: row.try_get("dish_name")?,
                    quantity: row.try_get("quantity")?,
                    total_amount: row.try_get("total_amount")?,
                })
            })
            .collect()
    }

    pub async fn revenue(
        &mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> ServiceResult<f64> {
        let revenue: f64 = sqlx::query(
            "SELECT COALESCE(SUM(total_amount), 0) AS revenue FROM sales \
             WHERE ($1::date IS NULL OR sale_date >= $1) \
               AND ($2::date IS NULL OR sale_date <= $2)",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&mut *self.connection)
        .await?
        .try_get("revenue")?;

        Ok(round2(revenue))
    }

    pub async fn profit_report(
        &mut self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> ServiceResult<ProfitReport> {
        let revenue = self.revenue(start, end).await?;

        let total_expenses: f64 = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS total FROM expenses \
             WHERE ($1::date IS NULL OR expense_date >= $1) \
               AND ($2::date IS NULL OR expense_date <= $2)",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&mut *self.connection)
        .await?
        .try_get("total")?;

        // Dishes without a recipe are sold at zero cost, like dish_cost
        // reports them.
        let cost_of_goods_sold: f64 = sqlx::query(
            "SELECT COALESCE(SUM(s.quantity * dc.cost), 0) AS cogs \
             FROM sales s \
             LEFT JOIN ( \
                 SELECT ri.dish_id, SUM(i.price_per_unit * ri.quantity) AS cost \
                 FROM recipe_items ri \
                 JOIN ingredients i ON i.id = ri.ingredient_id \
                 GROUP BY ri.dish_id \
             ) dc ON dc.dish_id = s.dish_id \
             WHERE ($1::date IS NULL OR s.sale_date >= $1) \
               AND ($2::date IS NULL OR s.sale_date <= $2)",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&mut *self.connection)
        .await?
        .try_get("cogs")?;

        let cost_of_goods_sold = round2(cost_of_goods_sold);
        Ok(ProfitReport {
            revenue,
            cost_of_goods_sold,
            gross_profit: round2(revenue - cost_of_goods_sold),
            total_expenses: round2(total_expenses),
            net_profit: round2(revenue - total_expenses - cost_of_goods_sold),
        })
    }

    // ===== Clients =====

    pub async fn get_all_clients(&mut self) -> ServiceResult<Vec<Client>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY name"
        ))
        .fetch_all(&mut *self.connection)
        .await?;

        rows.iter().map(client_from_row).collect()
    }

    pub async fn get_client_by_id(&mut self, id: u64) -> ServiceResult<Option<Client>> {
        let row = sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"))
            .bind(id as i64)
            .fetch_optional(&mut *self.connection)
            .await?;

        row.as_ref().map(client_from_row).transpose()
    }

    pub async fn get_client_by_barcode(&mut self, code: &str) -> ServiceResult<Option<Client>> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE barcode = $1"
        ))
        .bind(code)
        .fetch_optional(&mut *self.connection)
        .await?;

        row.as_ref().map(client_from_row).transpose()
    }

    pub async fn get_client_by_history_token(
        &mut self,
        token: &str,
    ) -> ServiceResult<Option<Client>> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE history_token = $1"
        ))
        .bind(token)
        .fetch_optional(&mut *self.connection)
        .await?;

        row.as_ref().map(client_from_row).transpose()
    }

    pub async fn get_client_by_telegram_chat(
        &mut self,
        chat_id: &str,
    ) -> ServiceResult<Option<Client>> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE telegram_chat_id = $1"
        ))
        .bind(chat_id)
        .fetch_optional(&mut *self.connection)
        .await?;

        row.as_ref().map(client_from_row).transpose()
    }

    /// Most recently created client with a matching name that is not yet
    /// linked to a Telegram chat.
    pub async fn find_unlinked_client_by_name(
        &mut self,
        name: &str,
    ) -> ServiceResult<Option<Client>> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients \
             WHERE lower(name) = lower($1) \
               AND (telegram_chat_id IS NULL OR telegram_chat_id = '') \
             ORDER BY id DESC LIMIT 1"
        ))
        .bind(name)
        .fetch_optional(&mut *self.connection)
        .await?;

        row.as_ref().map(client_from_row).transpose()
    }

    /// Create a client and assign the card code derived from the fresh id,
    /// both within one transaction.
    pub async fn create_client(
        &mut self,
        name: &str,
        phone: Option<&str>,
        notes: Option<&str>,
    ) -> ServiceResult<Client> {
        let history_token = new_history_token();
        let mut tx = self.connection.begin().await?;

        let id: i64 = sqlx::query(
            "INSERT INTO clients (name, phone, notes, history_token) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(name)
        .bind(phone)
        .bind(notes)
        .bind(&history_token)
        .fetch_one(&mut *tx)
        .await?
        .try_get("id")?;

        let code = barcode::generate(id as u64)?;
        sqlx::query("UPDATE clients SET barcode = $1 WHERE id = $2")
            .bind(&code)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Client {
            id: id as u64,
            name: name.to_owned(),
            phone: phone.map(str::to_owned),
            notes: notes.map(str::to_owned),
            barcode: code,
            telegram_chat_id: None,
            history_token,
        })
    }

    pub async fn set_client_telegram_chat(
        &mut self,
        client_id: u64,
        chat_id: &str,
    ) -> ServiceResult<()> {
        let result = sqlx::query("UPDATE clients SET telegram_chat_id = $1 WHERE id = $2")
            .bind(chat_id)
            .bind(client_id as i64)
            .execute(&mut *self.connection)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn delete_client(&mut self, id: u64) -> ServiceResult<()> {
        sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id as i64)
            .execute(&mut *self.connection)
            .await?;
        Ok(())
    }

    /// Regenerate the card code of every client whose stored code fails
    /// validation and fill in missing history tokens. Returns the number
    /// of repaired codes.
    pub async fn repair_client_codes(&mut self) -> ServiceResult<u64> {
        let rows = sqlx::query("SELECT id, barcode, history_token FROM clients")
            .fetch_all(&mut *self.connection)
            .await?;

        let mut repaired = 0;
        for row in rows {
            let id = row.try_get::<i64, _>("id")? as u64;

            let code: Option<String> = row.try_get("barcode")?;
            if !code.as_deref().map(barcode::is_valid).unwrap_or(false) {
                sqlx::query("UPDATE clients SET barcode = $1 WHERE id = $2")
                    .bind(barcode::generate(id)?)
                    .bind(id as i64)
                    .execute(&mut *self.connection)
                    .await?;
                repaired += 1;
            }

            let token: Option<String> = row.try_get("history_token")?;
            if token.map(|t| t.is_empty()).unwrap_or(true) {
                sqlx::query("UPDATE clients SET history_token = $1 WHERE id = $2")
                    .bind(new_history_token())
                    .bind(id as i64)
                    .execute(&mut *self.connection)
                    .await?;
            }
        }

        Ok(repaired)
    }

    // ===== Visits =====

    pub async fn count_visits(
        &mut self,
        client_id: u64,
        category: VisitCategory,
    ) -> ServiceResult<u64> {
        let count: i64 =
            sqlx::query("SELECT COUNT(*) AS count FROM visits WHERE client_id = $1 AND category = $2")
                .bind(client_id as i64)
                .bind(category.as_str())
                .fetch_one(&mut *self.connection)
                .await?
                .try_get("count")?;

        Ok(count as u64)
    }

    pub async fn client_visit_stats(
        &mut self,
        client_id: u64,
        category: VisitCategory,
    ) -> ServiceResult<VisitStats> {
        let count = self.count_visits(client_id, category).await?;
        Ok(loyalty::visit_stats(count))
    }

    /// Record a visit for a known client id.
    pub async fn record_visit(
        &mut self,
        client_id: u64,
        category: VisitCategory,
        date: NaiveDate,
    ) -> ServiceResult<(Visit, VisitStats)> {
        let mut tx = self.connection.begin().await?;
        let outcome = insert_visit(&mut tx, client_id, category, date).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Record a visit for a scanned card code and append the audit entry.
    ///
    /// The code is matched exactly after trimming surrounding whitespace.
    /// An unknown code fails with `NotFound` before anything is written;
    /// visit and audit entry are committed together or not at all.
    pub async fn scan_visit(
        &mut self,
        raw_code: &str,
        category: VisitCategory,
        date: NaiveDate,
    ) -> ServiceResult<ScanOutcome> {
        let code = raw_code.trim();

        let mut tx = self.connection.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE barcode = $1"
        ))
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Err(ServiceError::NotFound);
        };
        let client = client_from_row(&row)?;

        let (visit, stats) = insert_visit(&mut tx, client.id, category, date).await?;
        let details = format!("{} visit registered for {date}", category.as_str());
        insert_event(
            &mut *tx,
            client.id,
            category.scan_event_type(),
            Some(&details),
        )
        .await?;

        tx.commit().await?;

        Ok(ScanOutcome {
            client,
            visit,
            stats,
        })
    }

    pub async fn get_visits(
        &mut self,
        category: VisitCategory,
        client_id: Option<u64>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> ServiceResult<Vec<Visit>> {
        let rows = sqlx::query(
            "SELECT v.id, v.client_id, c.name AS client_name, v.category, v.visit_date, v.is_free \
             FROM visits v JOIN clients c ON c.id = v.client_id \
             WHERE v.category = $1 \
               AND ($2::bigint IS NULL OR v.client_id = $2) \
               AND ($3::date IS NULL OR v.visit_date >= $3) \
               AND ($4::date IS NULL OR v.visit_date <= $4) \
             ORDER BY v.visit_date DESC, v.id DESC",
        )
        .bind(category.as_str())
        .bind(client_id.map(|id| id as i64))
        .bind(start)
        .bind(end)
        .fetch_all(&mut *self.connection)
        .await?;

        rows.iter().map(visit_from_row).collect()
    }

    /// All clients with their visit count in one category, for the
    /// per-program overview.
    pub async fn clients_with_visit_counts(
        &mut self,
        category: VisitCategory,
    ) -> ServiceResult<Vec<(Client, u64)>> {
        let rows = sqlx::query(&format!(
            "SELECT c.{}, COUNT(v.id) AS visit_count \
             FROM clients c \
             LEFT JOIN visits v ON v.client_id = c.id AND v.category = $1 \
             GROUP BY c.id ORDER BY c.name",
            CLIENT_COLUMNS.replace(", ", ", c.")
        ))
        .bind(category.as_str())
        .fetch_all(&mut *self.connection)
        .await?;

        rows.iter()
            .map(|row| {
                let client = client_from_row(row)?;
                let count: i64 = row.try_get("visit_count")?;
                Ok((client, count as u64))
            })
            .collect()
    }

    // ===== Client events =====

    pub async fn append_event(
        &mut self,
        client_id: u64,
        event_type: &str,
        details: Option<&str>,
    ) -> ServiceResult<ClientEvent> {
        insert_event(&mut *self.connection, client_id, event_type, details).await
    }

    pub async fn get_client_events(
        &mut self,
        client_id: u64,
        limit: i64,
    ) -> ServiceResult<Vec<ClientEvent>> {
        let rows = sqlx::query(
            "SELECT id, client_id, event_type, details, created_at FROM client_events \
             WHERE client_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(client_id as i64)
        .bind(limit)
        .fetch_all(&mut *self.connection)
        .await?;

        rows.iter().map(event_from_row).collect()
    }
}
