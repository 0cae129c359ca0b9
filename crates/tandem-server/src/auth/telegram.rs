//! Telegram Bot API delivery.
//!
//! The claimed identity is a Telegram chat id. The code goes out as a bot
//! message; delivery counts as successful only when the API answers
//! `"ok": true`.

use std::{fs, io::ErrorKind, path::Path, time::Duration};

use serde::Deserialize;

use super::{Authenticator, CodeBook};
use crate::error::ServerError;

const API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Authenticator delivering codes through a Telegram bot.
///
/// Uses a blocking HTTP client: construct and drop it outside any async
/// runtime context.
pub struct TelegramAuthenticator {
    client: reqwest::blocking::Client,
    endpoint: String,
    book: CodeBook,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramAuthenticator {
    /// Authenticator for the bot identified by `token`.
    ///
    /// # Errors
    ///
    /// `ServerError::Config` if the HTTP client cannot be built (TLS backend
    /// initialisation failed).
    pub fn new(token: &str) -> Result<Self, ServerError> {
        Self::with_api_base(API_BASE, token)
    }

    /// Same as [`TelegramAuthenticator::new`] against a different API host.
    pub fn with_api_base(api_base: &str, token: &str) -> Result<Self, ServerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServerError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, endpoint: send_message_url(api_base, token), book: CodeBook::new() })
    }
}

fn send_message_url(api_base: &str, token: &str) -> String {
    format!("{}/bot{token}/sendMessage", api_base.trim_end_matches('/'))
}

impl Authenticator for TelegramAuthenticator {
    fn send_code(&self, identity: &str, code: &str) -> bool {
        let text = format!("Your code is: {code}");
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("chat_id", identity), ("text", text.as_str())])
            .send()
            .and_then(reqwest::blocking::Response::json::<SendMessageResponse>);

        match response {
            Ok(body) if body.ok => {
                self.book.issue(identity, code);
                true
            },
            Ok(body) => {
                tracing::warn!(
                    identity,
                    reason = body.description.as_deref().unwrap_or("unknown"),
                    "telegram refused code delivery"
                );
                false
            },
            Err(e) => {
                tracing::warn!(identity, error = %e, "telegram request failed");
                false
            },
        }
    }

    fn verify_code(&self, identity: &str, code: &str) -> bool {
        self.book.verify(identity, code)
    }

    fn revoke_code(&self, identity: &str) {
        self.book.revoke(identity);
    }
}

/// Read the bot token from the first line of `path`.
///
/// A missing file is created empty (parent directories included) so the
/// operator knows where to put the token.
///
/// # Errors
///
/// `ServerError::Config` if the file cannot be read or created, or if the
/// first line is empty.
pub fn load_bot_token(path: &Path) -> Result<String, ServerError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    ServerError::Config(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
            fs::write(path, "")
                .map_err(|e| ServerError::Config(format!("cannot create {}: {e}", path.display())))?;
            String::new()
        },
        Err(e) => {
            return Err(ServerError::Config(format!("cannot read {}: {e}", path.display())));
        },
    };

    let token = contents.lines().next().unwrap_or_default().trim();
    if token.is_empty() {
        return Err(ServerError::Config(format!(
            "{} does not contain a bot token; put it on the first line and restart",
            path.display()
        )));
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_embeds_token() {
        assert_eq!(
            send_message_url("https://api.telegram.org/", "123:abc"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn response_parsing() {
        let ok: SendMessageResponse =
            serde_json::from_str(r#"{"ok":true,"result":{"message_id":1}}"#).unwrap();
        assert!(ok.ok);

        let refused: SendMessageResponse =
            serde_json::from_str(r#"{"ok":false,"error_code":400,"description":"chat not found"}"#)
                .unwrap();
        assert!(!refused.ok);
        assert_eq!(refused.description.as_deref(), Some("chat not found"));
    }

    #[test]
    fn token_is_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BOT_TOKEN.txt");
        fs::write(&path, "  123:abc  \nignored\n").unwrap();

        assert_eq!(load_bot_token(&path).unwrap(), "123:abc");
    }

    #[test]
    fn missing_token_file_is_created_and_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SERVER_SETTINGS").join("BOT_TOKEN.txt");

        let err = load_bot_token(&path).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn unreachable_api_fails_delivery() {
        // Port 9 on loopback: nothing listens, the connect fails fast.
        let auth = TelegramAuthenticator::with_api_base("http://127.0.0.1:9", "t").unwrap();
        assert!(!auth.send_code("42", "123456"));
        assert!(!auth.verify_code("42", "123456"));
    }
}
