use log::info;
use serde_json::json;

use super::{require_text, Notice, Outcome};
use crate::api::{BackendClient, Endpoint, Method};
use crate::session::{timestamp_now, ChatEntry, ChatReply, SessionState, Tab};

/// Send one chat message without touching any session.
///
/// Blank input is refused without a request. Otherwise the outcome always
/// carries exactly one entry, holding either the reply or the error.
pub async fn send(client: &BackendClient, message: &str) -> Outcome<ChatEntry> {
    let message = match require_text("message", message, "Please enter a message") {
        Ok(m) => m,
        Err(e) => return Outcome::without_entry(Notice::rejected(&e)),
    };

    let body = json!({ "content": message });
    let result = client
        .call(Method::Post, Endpoint::Chat, Some(&body), None)
        .await;

    let (response, notice) = match &result {
        Ok(value) => {
            info!("chat reply received");
            (
                ChatReply::from_result(value),
                Notice::success("Received response!"),
            )
        }
        Err(e) => (ChatReply::from_error(e), Notice::error(e.to_string())),
    };

    Outcome::recorded(
        ChatEntry {
            message,
            response,
            timestamp: timestamp_now(),
        },
        notice,
    )
}

/// [`send`], then append to the session's chat log.
pub async fn submit(client: &BackendClient, state: &mut SessionState, message: &str) -> Notice {
    send(client, message).await.apply_to(&mut state.chat)
}

pub fn clear(state: &mut SessionState) {
    state.clear(Tab::Chat);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::KeyScope;
    use crate::tabs::NoticeLevel;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_submit_success_appends_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .match_body(Matcher::Json(json!({ "content": "What is Rust?" })))
            .with_status(200)
            .with_body(r#"{"response":"A systems language."}"#)
            .expect(1)
            .create_async()
            .await;
        let client = BackendClient::new(server.url());
        let mut state = SessionState::new();

        let notice = submit(&client, &mut state, "What is Rust?").await;

        assert_eq!(notice, Notice::success("Received response!"));
        assert_eq!(state.chat.len(), 1);
        let entry = state.chat.last().unwrap();
        assert_eq!(entry.message, "What is Rust?");
        assert_eq!(
            entry.response,
            ChatReply::Reply {
                response: "A systems language.".to_string()
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_failure_still_appends() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let client = BackendClient::new(server.url());
        let mut state = SessionState::new();

        let notice = submit(&client, &mut state, "hello").await;

        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(state.chat.len(), 1);
        assert!(state.chat.last().unwrap().response.error().is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_401_surfaces_key_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat")
            .with_status(401)
            .create_async()
            .await;
        let client = BackendClient::new(server.url());
        let mut state = SessionState::new();

        let notice = submit(&client, &mut state, "hello").await;

        let expected = KeyScope::ChatAnalysis.missing_key_message();
        assert_eq!(notice.text, expected);
        assert_eq!(state.chat.last().unwrap().response.error(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_blank_message_issues_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat")
            .expect(0)
            .create_async()
            .await;
        let client = BackendClient::new(server.url());
        let mut state = SessionState::new();

        for blank in ["", "   ", "\n\t "] {
            let notice = submit(&client, &mut state, blank).await;
            assert_eq!(notice, Notice::warning("Please enter a message"));
        }

        assert!(state.chat.is_empty());
        mock.assert_async().await;
    }

    #[test]
    fn test_clear_empties_chat_only() {
        let mut state = SessionState::new();
        state.chat.push(ChatEntry {
            message: "m".to_string(),
            response: ChatReply::Reply {
                response: "r".to_string(),
            },
            timestamp: timestamp_now(),
        });
        clear(&mut state);
        assert!(state.chat.is_empty());
    }
}
