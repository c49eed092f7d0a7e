use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, de};
use std::collections::BTreeMap;
use url::Url;

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampRepr {
    Rfc3339(DateTime<Utc>),
    EpochMillis(i64),
    EpochMillisFloat(f64),
}

/// Accepts RFC 3339 strings or epoch milliseconds (as capture layers built on
/// `Date.now()` emit them).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = match Option::<TimestampRepr>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(TimestampRepr::Rfc3339(ts)) => return Ok(Some(ts)),
        Some(TimestampRepr::EpochMillis(ms)) => ms,
        Some(TimestampRepr::EpochMillisFloat(ms)) if ms.is_finite() => ms.trunc() as i64,
        Some(TimestampRepr::EpochMillisFloat(ms)) => {
            return Err(de::Error::custom(format!("timestamp is not finite: {}", ms)));
        }
    };
    DateTime::from_timestamp_millis(millis)
        .map(Some)
        .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", millis)))
}

/// One captured request/response summary, as handed over by the capture layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response_size: Option<u64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Explicit query parameters, kept in the order the capture layer sent them.
    #[serde(default)]
    pub query_params: IndexMap<String, String>,
}

impl Observation {
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            status: None,
            content_type: None,
            timestamp: None,
            response_size: None,
            headers: BTreeMap::new(),
            query_params: IndexMap::new(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    /// Parsed URL, or `None` when the capture layer handed us something unparseable
    /// or host-less (`about:blank`, `data:` URLs).
    pub fn parsed_url(&self) -> Option<Url> {
        Url::parse(&self.url).ok().filter(Url::has_host)
    }

    /// Status code if the request completed with a plausible HTTP status.
    pub fn status_code(&self) -> Option<u16> {
        self.status.filter(|s| (100..=599).contains(s))
    }

    /// Upper-cased method token; blank methods count as GET.
    pub fn normalized_method(&self) -> String {
        let method = self.method.trim();
        if method.is_empty() {
            default_method()
        } else {
            method.to_ascii_uppercase()
        }
    }

    /// Query pairs in URL order, followed by explicit `queryParams` not already seen.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .parsed_url()
            .map(|url| {
                url.query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        for (name, value) in &self.query_params {
            if !pairs.iter().any(|(k, _)| k == name) {
                pairs.push((name.clone(), value.clone()));
            }
        }
        pairs
    }

    /// Whether any header name looks like it carries credentials.
    pub fn carries_credentials(&self) -> bool {
        self.headers.keys().any(|name| {
            let name = name.to_ascii_lowercase();
            name.contains("authorization") || name.contains("api-key") || name.contains("token")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let obs: Observation = serde_json::from_str(r#"{"url": "https://a.com/x"}"#).unwrap();
        assert_eq!(obs.method, "GET");
        assert!(obs.status.is_none());
        assert!(obs.headers.is_empty());
    }

    #[test]
    fn test_parsed_url_rejects_hostless_urls() {
        assert!(Observation::new("not a url", "GET").parsed_url().is_none());
        assert!(Observation::new("about:blank", "GET").parsed_url().is_none());
        assert!(Observation::new("https://a.com/x", "GET").parsed_url().is_some());
    }

    #[test]
    fn test_status_code_filters_incomplete_requests() {
        let obs = Observation::new("https://a.com/", "GET").with_status(0);
        assert_eq!(obs.status_code(), None);
        assert_eq!(obs.with_status(204).status_code(), Some(204));
    }

    #[test]
    fn test_query_pairs_merge_url_and_explicit_params() {
        let obs = Observation::new("https://a.com/items?page=2&sort=asc", "GET")
            .with_query_param("page", "9")
            .with_query_param("limit", "10");
        let pairs = obs.query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("page".to_string(), "2".to_string()),
                ("sort".to_string(), "asc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_explicit_query_params_keep_wire_order() {
        let obs: Observation = serde_json::from_str(
            r#"{"url": "https://a.com/x", "queryParams": {"zeta": "1", "alpha": "2"}}"#,
        )
        .unwrap();
        let names: Vec<String> = obs.query_pairs().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_timestamp_accepts_rfc3339_and_epoch_millis() {
        let iso: Observation = serde_json::from_str(
            r#"{"url": "https://a.com/x", "timestamp": "2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        let millis: Observation =
            serde_json::from_str(r#"{"url": "https://a.com/x", "timestamp": 1709287200000}"#)
                .unwrap();
        assert!(iso.timestamp.is_some());
        assert_eq!(iso.timestamp, millis.timestamp);

        let fractional: Observation =
            serde_json::from_str(r#"{"url": "https://a.com/x", "timestamp": 1709287200000.5}"#)
                .unwrap();
        assert_eq!(fractional.timestamp, iso.timestamp);

        let null: Observation =
            serde_json::from_str(r#"{"url": "https://a.com/x", "timestamp": null}"#).unwrap();
        assert!(null.timestamp.is_none());
    }

    #[test]
    fn test_credentials_detection_is_case_insensitive() {
        let obs = Observation::new("https://a.com/", "GET").with_header("X-API-Key", "k");
        assert!(obs.carries_credentials());
        let plain = Observation::new("https://a.com/", "GET").with_header("Accept", "*/*");
        assert!(!plain.carries_credentials());
    }
}
