//! HAR 1.2 archives, as exported by browser devtools, mapped onto [`Observation`]s.

use super::Observation;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HarArchive {
    pub log: HarLog,
}

#[derive(Debug, Deserialize)]
pub struct HarLog {
    #[serde(default)]
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    #[serde(default)]
    pub started_date_time: Option<DateTime<Utc>>,
    pub request: HarRequest,
    #[serde(default)]
    pub response: Option<HarResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<HarNameValue>,
    #[serde(default)]
    pub query_string: Vec<HarNameValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub body_size: Option<i64>,
    #[serde(default)]
    pub content: Option<HarContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HarNameValue {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl From<HarEntry> for Observation {
    fn from(entry: HarEntry) -> Self {
        let mut obs = Observation::new(entry.request.url, entry.request.method);
        obs.timestamp = entry.started_date_time;

        if let Some(response) = entry.response {
            obs.status = Some(response.status).filter(|s| *s != 0);
            if let Some(content) = &response.content {
                obs.content_type = content.mime_type.clone().filter(|m| !m.is_empty());
            }
            // HAR uses -1 for "unknown"
            obs.response_size = response
                .content
                .as_ref()
                .and_then(|c| c.size)
                .filter(|size| *size >= 0)
                .or(response.body_size)
                .and_then(|size| u64::try_from(size).ok());
        }

        for header in entry.request.headers {
            obs.headers.insert(header.name, header.value);
        }
        for pair in entry.request.query_string {
            obs.query_params.entry(pair.name).or_insert(pair.value);
        }
        obs
    }
}

impl HarArchive {
    pub fn into_observations(self) -> Vec<Observation> {
        self.log.entries.into_iter().map(Observation::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_maps_to_observation() {
        let json = r#"{
            "log": {"entries": [{
                "startedDateTime": "2024-03-01T10:00:00.000Z",
                "request": {
                    "method": "GET",
                    "url": "https://api.x.com/users/42?expand=true",
                    "headers": [{"name": "Authorization", "value": "Bearer t"}],
                    "queryString": [{"name": "expand", "value": "true"}]
                },
                "response": {
                    "status": 200,
                    "bodySize": -1,
                    "content": {"size": 512, "mimeType": "application/json"}
                }
            }]}
        }"#;

        let archive: HarArchive = serde_json::from_str(json).unwrap();
        let observations = archive.into_observations();
        assert_eq!(observations.len(), 1);

        let obs = &observations[0];
        assert_eq!(obs.method, "GET");
        assert_eq!(obs.status, Some(200));
        assert_eq!(obs.content_type.as_deref(), Some("application/json"));
        assert_eq!(obs.response_size, Some(512));
        assert!(obs.timestamp.is_some());
        assert!(obs.carries_credentials());
        assert_eq!(obs.query_params.get("expand").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_aborted_entry_has_no_status() {
        let json = r#"{"log": {"entries": [{
            "request": {"method": "POST", "url": "https://api.x.com/upload"},
            "response": {"status": 0, "bodySize": -1, "content": {"mimeType": ""}}
        }]}}"#;
        let archive: HarArchive = serde_json::from_str(json).unwrap();
        let obs = &archive.into_observations()[0];
        assert_eq!(obs.status, None);
        assert_eq!(obs.content_type, None);
        assert_eq!(obs.response_size, None);
    }
}
