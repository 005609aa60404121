//! Payment provider bridge
//!
//! The core talks to the payment provider through `PaymentGateway`. The
//! HTTP implementation posts signed JSON to a bridge service and bounds
//! every call by the upstream timeout. Callbacks are verified with the
//! same HMAC-SHA256 scheme.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use shared::error::AppError;
use std::time::Duration;
use thiserror::Error;

/// Signature header on requests and callbacks: `t=<unix>,v1=<hex>`
pub const SIGNATURE_HEADER: &str = "x-pay-signature";

/// Callbacks older than this are rejected
const MAX_CALLBACK_AGE_SECS: i64 = 300;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("payment provider error: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Upstream(e.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Timeout(_) => AppError::upstream_timeout(e.to_string()),
            GatewayError::Upstream(_) => AppError::upstream(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepayRequest {
    pub out_trade_no: String,
    pub amount: Decimal,
    pub description: String,
    pub payer_id: i64,
}

/// Data the client needs to open the provider's pay sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepayHandshake {
    pub prepay_id: String,
    #[serde(default)]
    pub pay_params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub out_trade_no: String,
    pub out_refund_no: String,
    pub refund_amount: Decimal,
    pub total_amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundAccepted {
    pub refund_id: String,
}

/// Payment callback body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayNotify {
    pub out_trade_no: String,
    pub transaction_id: String,
    /// `SUCCESS` when money was captured
    pub trade_state: String,
    pub amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PayNotify {
    pub fn is_success(&self) -> bool {
        self.trade_state.eq_ignore_ascii_case("SUCCESS")
    }
}

/// Refund callback body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundNotify {
    pub out_trade_no: String,
    pub refund_id: String,
    /// `SUCCESS`, `PROCESSING` or a failure state
    pub refund_status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn prepay(&self, req: &PrepayRequest) -> Result<PrepayHandshake, GatewayError>;
    async fn refund(&self, req: &RefundRequest) -> Result<RefundAccepted, GatewayError>;
}

/// HTTP bridge to the payment provider
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    notify_url: String,
    secret: String,
    timeout: Duration,
}

impl HttpGateway {
    pub fn new(base_url: &str, notify_url: &str, secret: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            notify_url: notify_url.to_string(),
            secret: secret.to_string(),
            timeout,
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, GatewayError> {
        let payload =
            serde_json::to_vec(body).map_err(|e| GatewayError::Upstream(e.to_string()))?;
        let signature = sign(&payload, &self.secret, Utc::now().timestamp())
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;
        let url = format!("{}{path}", self.base_url);

        let call = async {
            let resp = self
                .client
                .post(&url)
                .header(SIGNATURE_HEADER, signature)
                .header("x-notify-url", &self.notify_url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(payload)
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(GatewayError::Upstream(format!("{status}: {text}")));
            }
            Ok(resp.json::<R>().await?)
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn prepay(&self, req: &PrepayRequest) -> Result<PrepayHandshake, GatewayError> {
        tracing::info!(out_trade_no = %req.out_trade_no, amount = %req.amount, "Requesting prepay");
        self.post("/v1/prepay", req).await
    }

    async fn refund(&self, req: &RefundRequest) -> Result<RefundAccepted, GatewayError> {
        tracing::info!(
            out_trade_no = %req.out_trade_no,
            out_refund_no = %req.out_refund_no,
            amount = %req.refund_amount,
            "Requesting refund"
        );
        self.post("/v1/refunds", req).await
    }
}

/// `t=<unix>,v1=<hex hmac of "{t}.{payload}">`
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, &'static str> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a callback signature header
pub fn verify_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now: i64,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        if let Some(t) = part.trim().strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.trim().strip_prefix("v1=") {
            signature = v;
        }
    }
    if timestamp.is_empty() || signature.is_empty() {
        return Err("invalid signature header");
    }

    let ts: i64 = timestamp.parse().map_err(|_| "invalid timestamp")?;
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let sig_bytes = hex::decode(signature).map_err(|_| "invalid signature hex")?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "signature mismatch")?;

    if (now - ts).abs() > MAX_CALLBACK_AGE_SECS {
        return Err("callback timestamp too old");
    }
    Ok(())
}

/// Refund request number derived from the order number
pub fn refund_number(out_trade_no: &str) -> String {
    format!("R{}", out_trade_no.trim_start_matches('P'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn signature_round_trip() {
        let body = br#"{"out_trade_no":"P1"}"#;
        let header = sign(body, "secret", 1_700_000_000).unwrap();
        assert_eq!(verify_signature(body, &header, "secret", 1_700_000_100), Ok(()));
        assert_eq!(
            verify_signature(body, &header, "other", 1_700_000_100),
            Err("signature mismatch")
        );
        assert_eq!(
            verify_signature(b"{}", &header, "secret", 1_700_000_100),
            Err("signature mismatch")
        );
        assert_eq!(
            verify_signature(body, &header, "secret", 1_700_001_000),
            Err("callback timestamp too old")
        );
        assert_eq!(
            verify_signature(body, "garbage", "secret", 1_700_000_000),
            Err("invalid signature header")
        );
    }

    #[test]
    fn refund_numbers() {
        assert_eq!(refund_number("P2025"), "R2025");
    }

    #[test]
    fn notify_state() {
        let n = PayNotify {
            out_trade_no: "P1".into(),
            transaction_id: "wx1".into(),
            trade_state: "success".into(),
            amount: dec!(25),
            paid_at: None,
        };
        assert!(n.is_success());
    }

    #[tokio::test]
    async fn silent_provider_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // accept and hold the connection without answering
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let gw = HttpGateway::new(
            &format!("http://{addr}"),
            "http://localhost/pay/notify",
            "secret",
            Duration::from_millis(200),
        );
        let req = PrepayRequest {
            out_trade_no: "P1".into(),
            amount: dec!(25),
            description: "order".into(),
            payer_id: 1,
        };
        let err = gw.prepay(&req).await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)));
        let app: AppError = err.into();
        assert_eq!(app.code, shared::error::ErrorCode::UpstreamTimeout);
        server.abort();
    }
}
