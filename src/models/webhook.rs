use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Subscriber lifecycle events a webhook can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEvent {
    Subscribe,
    Unsubscribe,
    Deactivate,
}

impl WebhookEvent {
    pub const ALL: [WebhookEvent; 3] = [
        WebhookEvent::Subscribe,
        WebhookEvent::Unsubscribe,
        WebhookEvent::Deactivate,
    ];

    /// Exact-case match against the wire names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Subscribe" => Some(WebhookEvent::Subscribe),
            "Unsubscribe" => Some(WebhookEvent::Unsubscribe),
            "Deactivate" => Some(WebhookEvent::Deactivate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::Subscribe => "Subscribe",
            WebhookEvent::Unsubscribe => "Unsubscribe",
            WebhookEvent::Deactivate => "Deactivate",
        }
    }
}

/// Wire format of webhook payload deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    Json,
    Xml,
}

impl PayloadFormat {
    /// Case-insensitive parse, matching how the upstream API accepts it.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Some(PayloadFormat::Json),
            "xml" => Some(PayloadFormat::Xml),
            _ => None,
        }
    }
}

/// A webhook subscription as returned by `lists/{id}/webhooks.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    #[serde(rename = "WebhookID")]
    pub webhook_id: String,
    #[serde(rename = "Url")]
    pub url: String,
    #[serde(rename = "Events")]
    pub events: Vec<String>,
    #[serde(rename = "PayloadFormat", default)]
    pub payload_format: Option<String>,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
    /// Temp marker for an entry inserted ahead of server confirmation.
    #[serde(skip)]
    pub provisional: Option<u64>,
}

impl Webhook {
    pub fn is_provisional(&self) -> bool {
        self.provisional.is_some()
    }
}

/// Outbound payload for webhook creation. Fields stay as the caller typed
/// them so validation can report every problem, not just the first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewWebhook {
    #[serde(rename = "Url")]
    pub url: String,
    #[serde(rename = "Events")]
    pub events: Vec<String>,
    #[serde(rename = "PayloadFormat")]
    pub payload_format: String,
}

impl NewWebhook {
    /// Pre-flight validation. Returns every violated rule; empty means good
    /// to send.
    pub fn validate(&self) -> Vec<String> {
        validate_webhook_parts(
            Some(self.url.as_str()),
            Some(&self.events),
            Some(self.payload_format.as_str()),
        )
    }
}

/// Validate a raw webhook creation body, as the proxy gateway sees it.
pub fn validate_webhook_payload(payload: &Value) -> Vec<String> {
    let url = payload.get("Url").and_then(Value::as_str);
    let events: Option<Vec<String>> = payload.get("Events").and_then(Value::as_array).map(|a| {
        a.iter()
            .map(|e| e.as_str().unwrap_or_default().to_string())
            .collect()
    });
    let format = payload.get("PayloadFormat").and_then(Value::as_str);
    validate_webhook_parts(url, events.as_deref(), format)
}

fn validate_webhook_parts(
    url: Option<&str>,
    events: Option<&[String]>,
    payload_format: Option<&str>,
) -> Vec<String> {
    let mut violations = Vec::new();

    match url {
        None | Some("") => violations.push("URL is required".to_string()),
        Some(raw) => match Url::parse(raw) {
            Ok(parsed) if parsed.scheme() == "https" => {}
            Ok(_) => violations.push("URL must be HTTPS".to_string()),
            Err(_) => violations.push("URL must be a valid absolute URL".to_string()),
        },
    }

    match events {
        None | Some([]) => violations.push("At least one event type is required".to_string()),
        Some(events) => {
            for event in events {
                if WebhookEvent::parse(event).is_none() {
                    violations.push(format!("Invalid event type: {event}"));
                }
            }
        }
    }

    match payload_format {
        None | Some("") => violations.push("Payload format must be json or xml".to_string()),
        Some(format) => {
            if PayloadFormat::parse(format).is_none() {
                violations.push("Payload format must be json or xml".to_string());
            }
        }
    }

    violations
}
