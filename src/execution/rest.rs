//! HMAC-signed REST order executor.
//!
//! Places market orders against a venue's private order endpoint. Requests
//! are signed with HMAC-SHA256 over `timestamp + method + path + body`,
//! hex-encoded - the usual shape for venue order APIs. Venues that need a
//! different signing scheme get their own executor behind the same trait.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use async_trait::async_trait;

use crate::models::{Side, TradeIntent, VenueId};

use super::{ExecError, ExecutionReceipt, TradeExecutor};

type HmacSha256 = Hmac<Sha256>;

pub struct RestExecutor {
    venue: VenueId,
    base_url: String,
    order_path: String,
    api_key: String,
    api_secret: String,
    client: reqwest::Client,
}

impl RestExecutor {
    pub fn new(
        venue: VenueId,
        base_url: impl Into<String>,
        order_path: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            venue,
            base_url: base_url.into(),
            order_path: order_path.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            client: reqwest::Client::builder()
                .user_agent("MirrorBot/0.1")
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap(),
        }
    }

    fn sign(&self, timestamp_ms: i64, body: &str) -> Result<String, ExecError> {
        let payload = format!("{}POST{}{}", timestamp_ms, self.order_path, body);
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| ExecError::new(self.venue, format!("bad api secret: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn order_body(intent: &TradeIntent) -> String {
        serde_json::json!({
            "symbol": intent.symbol,
            "side": match intent.direction {
                Side::Long => "BUY",
                Side::Short => "SELL",
            },
            "size": intent.size.to_string(),
            "type": "MARKET",
            "clientOrderId": intent.correlation_id.to_string(),
        })
        .to_string()
    }
}

#[async_trait]
impl TradeExecutor for RestExecutor {
    async fn execute(&self, intent: &TradeIntent) -> Result<ExecutionReceipt, ExecError> {
        let timestamp_ms = Utc::now().timestamp_millis();
        let body = Self::order_body(intent);
        let signature = self.sign(timestamp_ms, &body)?;
        let url = format!("{}{}", self.base_url, self.order_path);

        debug!(venue = ?self.venue, symbol = %intent.symbol, "placing order");

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .header("X-TIMESTAMP", timestamp_ms.to_string())
            .header("X-SIGNATURE", signature)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ExecError::new(self.venue, format!("order request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExecError::new(
                self.venue,
                format!("order rejected: HTTP {status} {detail}"),
            ));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExecError::new(self.venue, format!("order response unreadable: {e}")))?;

        let order_id = json
            .get("orderId")
            .or_else(|| json.get("id"))
            .map(|v| v.to_string().trim_matches('"').to_string())
            .unwrap_or_else(|| intent.correlation_id.to_string());

        Ok(ExecutionReceipt {
            venue: self.venue,
            order_id,
            filled_size: intent.size,
        })
    }
}
