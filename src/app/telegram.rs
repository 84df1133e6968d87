use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::utils::Error;

// ================================================================================================
// Models (subset of the Bot API we actually consume)
// ================================================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub my_chat_member: Option<ChatMemberUpdated>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
}

impl Message {
    pub fn is_group(&self) -> bool {
        matches!(self.chat.kind.as_str(), "group" | "supergroup")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    pub old_chat_member: ChatMember,
    pub new_chat_member: ChatMember,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

// ================================================================================================
// Client
// ================================================================================================

#[derive(Debug, Clone)]
pub struct Bot {
    token: String,
    client: reqwest::Client,
}

impl Bot {
    pub fn new(token: String, client: reqwest::Client) -> Self {
        Self { token, client }
    }

    fn method_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.token)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, Error> {
        let resp = self
            .client
            .post(self.method_url(method))
            .json(&params)
            .timeout(Duration::from_secs(65))
            .send()
            .await?;
        let status = resp.status();
        let body: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| Error::TelegramError(format!("{method}: unreadable body ({e})")))?;
        if !body.ok {
            return Err(Error::TelegramError(format!(
                "{method}: HTTP {status} {}",
                body.description.unwrap_or_default()
            )));
        }
        body.result
            .ok_or_else(|| Error::TelegramError(format!("{method}: empty result")))
    }

    /// Long poll for updates; `offset` is the next expected update id.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, Error> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": 50,
                "allowed_updates": ["message", "my_chat_member"],
            }),
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        html: bool,
        reply_to: Option<i64>,
    ) -> Result<Message, Error> {
        let mut params = json!({ "chat_id": chat_id, "text": text });
        if html {
            params["parse_mode"] = json!("HTML");
        }
        if let Some(id) = reply_to {
            params["reply_to_message_id"] = json!(id);
        }
        self.call("sendMessage", params).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        html: bool,
    ) -> Result<Message, Error> {
        let mut params = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        if html {
            params["parse_mode"] = json!("HTML");
        }
        self.call("editMessageText", params).await
    }

    /// Best effort; a vanished status message is not an error worth surfacing.
    pub async fn delete_message(&self, chat_id: i64, message_id: i64) {
        let _ = self
            .call::<bool>(
                "deleteMessage",
                json!({ "chat_id": chat_id, "message_id": message_id }),
            )
            .await;
    }

    /// `photo` accepts a public URL or a Telegram file id.
    pub async fn send_photo_ref(
        &self,
        chat_id: i64,
        photo: &str,
        caption: &str,
        reply_to: Option<i64>,
    ) -> Result<Message, Error> {
        let mut params = json!({
            "chat_id": chat_id,
            "photo": photo,
            "caption": caption,
            "parse_mode": "HTML",
        });
        if let Some(id) = reply_to {
            params["reply_to_message_id"] = json!(id);
        }
        self.call("sendPhoto", params).await
    }

    pub async fn send_photo_bytes(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
        reply_to: Option<i64>,
    ) -> Result<Message, Error> {
        let photo_part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("image/jpeg")
            .map_err(|e| Error::Other(format!("Failed to set photo mime: {e}")))?;
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", "HTML")
            .part("photo", photo_part);
        if let Some(id) = reply_to {
            form = form.text("reply_to_message_id", id.to_string());
        }

        let resp = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;
        let status = resp.status();
        let body: ApiResponse<Message> = resp
            .json()
            .await
            .map_err(|e| Error::TelegramError(format!("sendPhoto: unreadable body ({e})")))?;
        debug!(status = %status, "sendPhoto multipart response");
        if !body.ok {
            return Err(Error::TelegramError(format!(
                "sendPhoto: HTTP {status} {}",
                body.description.unwrap_or_default()
            )));
        }
        body.result
            .ok_or_else(|| Error::TelegramError("sendPhoto: empty result".to_string()))
    }

    /// Fetch the raw bytes of an uploaded file (largest photo size etc).
    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, Error> {
        let file: File = self
            .call("getFile", json!({ "file_id": file_id }))
            .await?;
        let path = file
            .file_path
            .ok_or_else(|| Error::TelegramError("getFile: no file_path".to_string()))?;
        let url = format!("https://api.telegram.org/file/bot{}/{path}", self.token);
        let bytes = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(30))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}
