use chrono::{DateTime, NaiveDate, Utc};

/// The two loyalty programs a client can collect visits in. Counters are
/// tracked per category and are never combined.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum VisitCategory {
    Breakfast,
    Coffee,
}

impl VisitCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            VisitCategory::Breakfast => "breakfast",
            VisitCategory::Coffee => "coffee",
        }
    }

    pub fn parse(value: &str) -> Option<VisitCategory> {
        match value {
            "breakfast" => Some(VisitCategory::Breakfast),
            "coffee" => Some(VisitCategory::Coffee),
            _ => None,
        }
    }

    /// Event type written to the client event log when a card is scanned
    /// for this category.
    pub fn scan_event_type(self) -> &'static str {
        match self {
            VisitCategory::Breakfast => "scanned",
            VisitCategory::Coffee => "coffee_scanned",
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Ingredient {
    pub id: u64,
    pub name: String,
    pub unit: String,
    pub price_per_unit: f64,
    pub supplier: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Dish {
    pub id: u64,
    pub name: String,
    pub price: f64,
    pub category: String,
    pub description: Option<String>,
}

/// One line of a dish's bill of materials.
#[derive(Debug, PartialEq, Clone)]
pub struct RecipeItem {
    pub id: u64,
    pub dish_id: u64,
    pub ingredient_id: u64,
    pub ingredient_name: String,
    pub quantity: f64,
}

/// Cost and margin breakdown of a single dish, derived from its recipe.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct DishMargin {
    pub cost: f64,
    pub price: f64,
    pub margin_amount: f64,
    pub margin_percent: f64,
    pub markup_percent: f64,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Expense {
    pub id: u64,
    pub date: NaiveDate,
    pub category: String,
    pub amount: f64,
    pub description: Option<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Sale {
    pub id: u64,
    pub date: NaiveDate,
    pub dish_id: u64,
    pub dish_name: String,
    pub quantity: i32,
    pub total_amount: f64,
}

/// Profit summary over a date range. All amounts are rounded to cents.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct ProfitReport {
    pub revenue: f64,
    pub cost_of_goods_sold: f64,
    pub gross_profit: f64,
    pub total_expenses: f64,
    pub net_profit: f64,
}

/// A loyalty program member.
///
/// `barcode` is the EAN-13 card code derived from the client id at creation
/// time; it never changes afterwards. `history_token` is the secret path
/// segment of the public client portal.
#[derive(Debug, PartialEq, Clone)]
pub struct Client {
    pub id: u64,
    pub name: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub barcode: String,
    pub telegram_chat_id: Option<String>,
    pub history_token: String,
}

/// A registered loyalty visit. `is_free` is decided once when the visit is
/// recorded and never recomputed.
#[derive(Debug, PartialEq, Clone)]
pub struct Visit {
    pub id: u64,
    pub client_id: u64,
    pub client_name: String,
    pub category: VisitCategory,
    pub date: NaiveDate,
    pub is_free: bool,
}

/// Audit log entry for a client's card (scans, deliveries, bot linking).
#[derive(Debug, PartialEq, Clone)]
pub struct ClientEvent {
    pub id: u64,
    pub client_id: u64,
    pub event_type: String,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful card scan.
#[derive(Debug, PartialEq, Clone)]
pub struct ScanOutcome {
    pub client: Client,
    pub visit: Visit,
    pub stats: crate::loyalty::VisitStats,
}
