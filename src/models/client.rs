use serde::{Deserialize, Serialize};

/// A client account as listed by `clients.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    #[serde(rename = "ClientID")]
    pub client_id: String,
    #[serde(rename = "Name")]
    pub name: String,
}

/// Detail payload from `clients/{id}.json`.
///
/// Billing details are only present when the authenticated key can see
/// billing, which is what makes them usable as a scope signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDetails {
    #[serde(rename = "BasicDetails")]
    pub basic_details: BasicDetails,
    #[serde(rename = "BillingDetails", default)]
    pub billing_details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicDetails {
    #[serde(rename = "ClientID")]
    pub client_id: String,
    #[serde(rename = "CompanyName")]
    pub company_name: Option<String>,
}

impl ClientDetails {
    pub fn billing_reachable(&self) -> bool {
        self.billing_details.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_details() {
        let json = r#"{
            "ApiKey": "abc",
            "BasicDetails": { "ClientID": "4a397ccaaa55eb4e6aa1221e1e2d7122", "CompanyName": "Acme" },
            "BillingDetails": { "CurrentTier": "Unlimited" }
        }"#;
        let details: ClientDetails = serde_json::from_str(json).expect("valid details JSON");
        assert_eq!(details.basic_details.client_id, "4a397ccaaa55eb4e6aa1221e1e2d7122");
        assert!(details.billing_reachable());
    }

    #[test]
    fn test_billing_absent_for_restricted_key() {
        let json = r#"{ "BasicDetails": { "ClientID": "x", "CompanyName": null } }"#;
        let details: ClientDetails = serde_json::from_str(json).expect("valid details JSON");
        assert!(!details.billing_reachable());
    }
}
