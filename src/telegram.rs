//! Thin client for the Telegram Bot API.
//!
//! Used to deliver card codes and loyalty status to clients. The
//! integration is optional: without a configured bot token every call
//! fails with a `Configuration` error, which callers downgrade to a log
//! line. Delivery is a side channel, losing a message never loses data.

use std::time::Duration;

use serde_json::{json, Value};

use crate::barcode::png::{render_png, PngOptions};
use crate::env;
use crate::error::{ServiceError, ServiceResult};
use crate::models::Client;

pub fn is_enabled() -> bool {
    !env::TELEGRAM_BOT_TOKEN.trim().is_empty()
}

/// Link to the client's public portal page.
pub fn portal_url(client: &Client) -> String {
    format!(
        "{}/api/v1/portal/{}",
        env::DOMAIN_NAME.as_str(),
        client.history_token
    )
}

fn method_url(method: &str) -> ServiceResult<String> {
    let token = env::TELEGRAM_BOT_TOKEN.trim();
    if token.is_empty() {
        return Err(ServiceError::Configuration(
            "TELEGRAM_BOT_TOKEN is not set".to_owned(),
        ));
    }
    Ok(format!("https://api.telegram.org/bot{token}/{method}"))
}

fn http_client() -> ServiceResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|err| ServiceError::InternalServerError(err.to_string()))
}

fn check_response(parsed: &Value) -> ServiceResult<()> {
    if parsed.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }

    let description = parsed
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("Telegram API error");
    Err(ServiceError::InternalServerError(description.to_owned()))
}

async fn call(method: &str, payload: Value) -> ServiceResult<()> {
    let response = http_client()?
        .post(method_url(method)?)
        .json(&payload)
        .send()
        .await
        .map_err(|err| ServiceError::InternalServerError(err.to_string()))?;

    let parsed: Value = response
        .json()
        .await
        .map_err(|err| ServiceError::InternalServerError(err.to_string()))?;
    check_response(&parsed)
}

pub async fn send_message(chat_id: &str, text: &str) -> ServiceResult<()> {
    call(
        "sendMessage",
        json!({
            "chat_id": chat_id,
            "text": text,
        }),
    )
    .await
}

/// Show the persistent reply keyboard with the self service commands.
pub async fn send_menu(chat_id: &str) -> ServiceResult<()> {
    call(
        "sendMessage",
        json!({
            "chat_id": chat_id,
            "text": "Choose an action:",
            "reply_markup": {
                "keyboard": [
                    ["My barcode", "My history"],
                    ["My breakfast", "My coffee"],
                ],
                "resize_keyboard": true,
                "one_time_keyboard": false,
                "input_field_placeholder": "Pick a menu button",
            },
        }),
    )
    .await
}

pub async fn send_photo(
    chat_id: &str,
    filename: String,
    image: Vec<u8>,
    caption: &str,
) -> ServiceResult<()> {
    let photo = reqwest::multipart::Part::bytes(image)
        .file_name(filename)
        .mime_str("image/png")
        .map_err(|err| ServiceError::InternalServerError(err.to_string()))?;
    let form = reqwest::multipart::Form::new()
        .text("chat_id", chat_id.to_owned())
        .text("caption", caption.to_owned())
        .part("photo", photo);

    let response = http_client()?
        .post(method_url("sendPhoto")?)
        .multipart(form)
        .send()
        .await
        .map_err(|err| ServiceError::InternalServerError(err.to_string()))?;

    let parsed: Value = response
        .json()
        .await
        .map_err(|err| ServiceError::InternalServerError(err.to_string()))?;
    check_response(&parsed)
}

/// Deliver the full client card: code, portal link and the rendered
/// barcode image.
pub async fn send_client_card(client: &Client, chat_id: &str) -> ServiceResult<()> {
    let image = render_png(&client.barcode, &PngOptions::default())?;

    let text = format!(
        "Your barcode: {}\nHistory and status: {}\nShow this barcode in the cafe on every visit.",
        client.barcode,
        portal_url(client)
    );
    send_message(chat_id, &text).await?;

    send_photo(
        chat_id,
        format!("barcode_{}.png", client.id),
        image,
        &format!("Your barcode: {}", client.barcode),
    )
    .await
}
