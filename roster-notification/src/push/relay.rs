use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use super::{PushFailure, PushTransport};
use crate::models::{PushPayload, PushSubscription};

/// Push transport that hands each message to an HTTP push relay, which owns
/// the VAPID signing and payload encryption for the browser push services.
#[derive(Clone)]
pub struct RelayTransport {
    client: Client,
    relay_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    subscription: RelaySubscription<'a>,
    payload: &'a PushPayload,
}

#[derive(Debug, Serialize)]
struct RelaySubscription<'a> {
    endpoint: &'a str,
    keys: RelayKeys<'a>,
}

#[derive(Debug, Serialize)]
struct RelayKeys<'a> {
    auth: &'a str,
    p256dh: &'a str,
}

impl RelayTransport {
    pub fn new(client: Client, relay_url: &str, api_key: &str) -> Self {
        Self {
            client,
            relay_url: relay_url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl PushTransport for RelayTransport {
    async fn send(&self, subscription: &PushSubscription, payload: &PushPayload) -> Result<(), PushFailure> {
        let body = RelayRequest {
            subscription: RelaySubscription {
                endpoint: &subscription.endpoint,
                keys: RelayKeys {
                    auth: &subscription.auth_key,
                    p256dh: &subscription.p256dh_key,
                },
            },
            payload,
        };

        let mut request = self.client.post(&self.relay_url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PushFailure::Transient(format!("push relay unreachable: {e}")))?;

        classify_status(response.status())
    }
}

/// Map the relay's answer onto the delivery outcome.
fn classify_status(status: StatusCode) -> Result<(), PushFailure> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(PushFailure::PermanentlyInvalidEndpoint {
            status: status.as_u16(),
        }),
        other => Err(PushFailure::Transient(format!("push relay answered {other}"))),
    }
}
