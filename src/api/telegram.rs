use aide::axum::ApiRouter;
use axum::routing::post;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::database::AppState;
use crate::error::ServiceResult;
use crate::loyalty::VisitStats;
use crate::models::{Client, VisitCategory};
use crate::request_state::RequestState;
use crate::telegram;

pub fn router(app_state: AppState) -> ApiRouter {
    // Kept out of the OpenAPI document, Telegram is the only caller.
    ApiRouter::new()
        .route("/telegram/webhook", post(webhook))
        .with_state(app_state)
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    chat: Option<TelegramChat>,
    text: Option<String>,
    from: Option<TelegramUser>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    first_name: Option<String>,
    username: Option<String>,
}

/// Telegram expects a fast 200 on every delivery; anything else makes it
/// retry the same update in a loop. Errors are therefore logged and
/// swallowed.
async fn webhook(state: RequestState, update: Json<TelegramUpdate>) -> Json<Value> {
    if let Err(error) = handle_update(state, update.0).await {
        log::error!("Telegram webhook handler failed: {error}");
    }
    Json(json!({ "ok": true }))
}

fn stats_text(category: VisitCategory, stats: &VisitStats) -> String {
    let label = match category {
        VisitCategory::Breakfast => "Breakfast",
        VisitCategory::Coffee => "Coffee",
    };
    format!(
        "{label}: {} of 7 in the current cycle.\nVisits until a free one: {}.",
        stats.total % crate::loyalty::FREE_VISIT_INTERVAL,
        stats.until_free
    )
}

async fn send_card_and_menu(client: &Client, chat_id: &str) -> ServiceResult<()> {
    telegram::send_client_card(client, chat_id).await?;
    telegram::send_menu(chat_id).await
}

async fn handle_start(mut state: RequestState, chat_id: &str, from: Option<TelegramUser>) -> ServiceResult<()> {
    if let Some(existing) = state.db.get_client_by_telegram_chat(chat_id).await? {
        return send_card_and_menu(&existing, chat_id).await;
    }

    let client_name = match from {
        Some(TelegramUser {
            first_name: Some(name),
            ..
        }) if !name.trim().is_empty() => name.trim().to_owned(),
        Some(TelegramUser {
            username: Some(username),
            ..
        }) if !username.trim().is_empty() => format!("@{}", username.trim()),
        _ => format!("Client {chat_id}"),
    };

    let client = match state.db.find_unlinked_client_by_name(&client_name).await? {
        Some(candidate) => {
            state.db.set_client_telegram_chat(candidate.id, chat_id).await?;
            state
                .db
                .append_event(
                    candidate.id,
                    "bot_linked",
                    Some(&format!("matched_by_name chat_id={chat_id}")),
                )
                .await?;
            Client {
                telegram_chat_id: Some(chat_id.to_owned()),
                ..candidate
            }
        }
        None => {
            let created = state
                .db
                .create_client(&client_name, None, Some("Created via Telegram /start"))
                .await?;
            state.db.set_client_telegram_chat(created.id, chat_id).await?;
            state
                .db
                .append_event(created.id, "bot_linked", Some(&format!("auto chat_id={chat_id}")))
                .await?;
            Client {
                telegram_chat_id: Some(chat_id.to_owned()),
                ..created
            }
        }
    };

    telegram::send_client_card(&client, chat_id).await?;
    telegram::send_message(chat_id, "Done. Your profile was created automatically.").await?;
    telegram::send_menu(chat_id).await
}

async fn handle_update(mut state: RequestState, update: TelegramUpdate) -> ServiceResult<()> {
    let Some(message) = update.message else {
        return Ok(());
    };
    let Some(chat_id) = message.chat.and_then(|chat| chat.id) else {
        return Ok(());
    };
    let chat_id = chat_id.to_string();
    let text = message.text.unwrap_or_default().trim().to_owned();

    if text.to_lowercase().starts_with("/start") {
        return handle_start(state, &chat_id, message.from).await;
    }

    let Some(client) = state.db.get_client_by_telegram_chat(&chat_id).await? else {
        return telegram::send_message(
            &chat_id,
            "Send /start to register and receive your barcode.",
        )
        .await;
    };

    match text.to_lowercase().as_str() {
        "/menu" | "menu" => telegram::send_menu(&chat_id).await,
        "my barcode" | "barcode" | "/barcode" => send_card_and_menu(&client, &chat_id).await,
        "my history" | "history" | "/history" => {
            telegram::send_message(
                &chat_id,
                &format!("Your history: {}", telegram::portal_url(&client)),
            )
            .await?;
            telegram::send_menu(&chat_id).await
        }
        "my breakfast" | "/breakfast" => {
            let stats = state
                .db
                .client_visit_stats(client.id, VisitCategory::Breakfast)
                .await?;
            telegram::send_message(&chat_id, &stats_text(VisitCategory::Breakfast, &stats)).await?;
            telegram::send_menu(&chat_id).await
        }
        "my coffee" | "/coffee" => {
            let stats = state
                .db
                .client_visit_stats(client.id, VisitCategory::Coffee)
                .await?;
            telegram::send_message(&chat_id, &stats_text(VisitCategory::Coffee, &stats)).await?;
            telegram::send_menu(&chat_id).await
        }
        _ => {
            telegram::send_message(
                &chat_id,
                &format!(
                    "Your client profile: {}\nSend /start to receive your barcode again.",
                    telegram::portal_url(&client)
                ),
            )
            .await?;
            telegram::send_menu(&chat_id).await
        }
    }
}
