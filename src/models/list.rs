use serde::{Deserialize, Serialize};

/// A subscriber list as returned by `clients/{id}/lists.json`.
///
/// Subscriber statistics live on a separate endpoint and are merged in by
/// the coordinator after the list fetch, so `stats` is never populated
/// straight off the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    #[serde(rename = "ListID")]
    pub list_id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Stats", default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ListStats>,
}

/// Per-list subscriber counters from `lists/{id}/stats.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListStats {
    #[serde(rename = "TotalActiveSubscribers", default)]
    pub total_active_subscribers: u64,
    #[serde(rename = "TotalUnsubscribes", default)]
    pub total_unsubscribes: u64,
    #[serde(rename = "TotalDeleted", default)]
    pub total_deleted: u64,
    #[serde(rename = "TotalBounces", default)]
    pub total_bounces: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_without_stats() {
        let json = r#"{ "ListID": "a58ee1d3039b8bec838e6d1482a8a965", "Name": "Newsletter" }"#;
        let list: List = serde_json::from_str(json).expect("valid list JSON");
        assert_eq!(list.name, "Newsletter");
        assert!(list.stats.is_none());
    }

    #[test]
    fn test_stats_fields_default_when_missing() {
        let json = r#"{ "TotalActiveSubscribers": 6 }"#;
        let stats: ListStats = serde_json::from_str(json).expect("valid stats JSON");
        assert_eq!(stats.total_active_subscribers, 6);
        assert_eq!(stats.total_bounces, 0);
    }
}
