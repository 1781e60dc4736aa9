use serde::Deserialize;
use signage_core::state::DesiredState;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Asks the server what should be on screen.
///
/// Fails soft: any transport error, timeout, unexpected status, or malformed
/// body degrades to `DesiredState::Idle`. The reconciliation loop's periodic
/// re-invocation is the retry mechanism; there is no retry in here.
pub struct Poller {
    client: reqwest::Client,
    endpoint: String,
}

impl Poller {
    pub fn new(server_url: &str, player_id: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let endpoint = format!(
            "{}/api/signage/current?player_id={}",
            server_url.trim_end_matches('/'),
            player_id
        );
        Ok(Self { client, endpoint })
    }

    pub async fn poll(&self) -> DesiredState {
        let response = match self.client.get(&self.endpoint).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!("poll failed: {}", e);
                return DesiredState::Idle;
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return DesiredState::Idle;
        }
        if status != reqwest::StatusCode::OK {
            debug!("poll returned unexpected status {}", status);
            return DesiredState::Idle;
        }

        match response.text().await {
            Ok(body) => interpret_body(&body),
            Err(e) => {
                debug!("poll body read failed: {}", e);
                DesiredState::Idle
            }
        }
    }
}

#[derive(Deserialize)]
struct CurrentMedia {
    url: Option<String>,
}

/// A 200 body with a non-empty `url` field means media; anything else,
/// including JSON without the field, means nothing to show.
fn interpret_body(body: &str) -> DesiredState {
    match serde_json::from_str::<CurrentMedia>(body) {
        Ok(CurrentMedia { url: Some(url) }) if !url.is_empty() => DesiredState::Media(url),
        Ok(_) => DesiredState::Idle,
        Err(e) => {
            debug!("poll body not valid JSON: {}", e);
            DesiredState::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_with_url() {
        assert_eq!(
            interpret_body(r#"{"url": "http://server/media/promo.mp4"}"#),
            DesiredState::Media("http://server/media/promo.mp4".to_string())
        );
    }

    #[test]
    fn test_body_extra_fields_ignored() {
        assert_eq!(
            interpret_body(r#"{"url": "http://s/a.mp4", "title": "A", "duration": 30}"#),
            DesiredState::Media("http://s/a.mp4".to_string())
        );
    }

    #[test]
    fn test_body_missing_url() {
        assert_eq!(interpret_body(r#"{"title": "no media"}"#), DesiredState::Idle);
        assert_eq!(interpret_body(r#"{"url": null}"#), DesiredState::Idle);
    }

    #[test]
    fn test_body_empty_url() {
        assert_eq!(interpret_body(r#"{"url": ""}"#), DesiredState::Idle);
    }

    #[test]
    fn test_body_malformed() {
        assert_eq!(interpret_body("<html>502</html>"), DesiredState::Idle);
        assert_eq!(interpret_body(""), DesiredState::Idle);
    }

    #[test]
    fn test_endpoint_shape() {
        let poller = Poller::new("http://pi-server:3000/", "lite_1").unwrap();
        assert_eq!(
            poller.endpoint,
            "http://pi-server:3000/api/signage/current?player_id=lite_1"
        );
    }
}
