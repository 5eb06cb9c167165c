// service/push.rs
//
// Thin FCM legacy HTTP client. Delivery is best effort; callers only log.
use serde::Serialize;

const FCM_SEND_URL: &str = "https://fcm.googleapis.com/fcm/send";

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct FcmMessage<'a> {
    to: &'a str,
    notification: FcmNotification<'a>,
    data: &'a serde_json::Value,
}

/// Outcome for a single device token.
#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// The token is dead and should be forgotten.
    Unregistered,
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone)]
pub struct PushClient {
    http: reqwest::Client,
    server_key: Option<String>,
}

impl PushClient {
    pub fn new(server_key: Option<String>) -> Self {
        if server_key.is_none() {
            tracing::warn!("FCM_SERVER_KEY not set, push notifications are disabled");
        }

        Self {
            http: reqwest::Client::new(),
            server_key,
        }
    }

    pub async fn send(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> PushOutcome {
        let Some(key) = &self.server_key else {
            return PushOutcome::Skipped;
        };

        let message = FcmMessage {
            to: device_token,
            notification: FcmNotification { title, body },
            data,
        };

        let response = match self
            .http
            .post(FCM_SEND_URL)
            .header("Authorization", format!("key={}", key))
            .header("Content-Type", "application/json")
            .json(&message)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return PushOutcome::Failed(e.to_string()),
        };

        if !response.status().is_success() {
            return PushOutcome::Failed(format!("FCM returned {}", response.status()));
        }

        match response.json::<serde_json::Value>().await {
            Ok(body) => classify_fcm_response(&body),
            Err(e) => PushOutcome::Failed(e.to_string()),
        }
    }
}

fn classify_fcm_response(body: &serde_json::Value) -> PushOutcome {
    if body["success"].as_i64().unwrap_or(0) > 0 {
        return PushOutcome::Delivered;
    }

    match body["results"][0]["error"].as_str() {
        Some("NotRegistered") | Some("InvalidRegistration") => PushOutcome::Unregistered,
        Some(other) => PushOutcome::Failed(other.to_string()),
        None => PushOutcome::Failed("unknown FCM response".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fcm_responses_are_classified() {
        assert_eq!(
            classify_fcm_response(&json!({ "success": 1, "failure": 0 })),
            PushOutcome::Delivered
        );
        assert_eq!(
            classify_fcm_response(&json!({ "success": 0, "results": [{ "error": "NotRegistered" }] })),
            PushOutcome::Unregistered
        );
        assert!(matches!(
            classify_fcm_response(&json!({ "success": 0, "results": [{ "error": "Unavailable" }] })),
            PushOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn without_key_nothing_is_sent() {
        let client = PushClient::new(None);
        let outcome = client.send("token", "t", "b", &json!({})).await;
        assert_eq!(outcome, PushOutcome::Skipped);
    }
}
