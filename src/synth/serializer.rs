use crate::error::{ApiscopeError, Result};
use crate::models::{HarArchive, Observation, SpecificationDocument};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl OutputFormat {
    /// Guess from a file extension; anything unrecognised is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Yaml => "application/yaml",
        }
    }

    pub fn render(self, document: &SpecificationDocument) -> Result<String> {
        match self {
            Self::Json => to_json(document),
            Self::Yaml => to_yaml(document),
        }
    }
}

pub fn to_json(document: &SpecificationDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}

pub fn to_yaml(document: &SpecificationDocument) -> Result<String> {
    Ok(serde_yaml::to_string(document)?)
}

pub fn from_json(text: &str) -> Result<SpecificationDocument> {
    Ok(serde_json::from_str(text)?)
}

pub fn from_yaml(text: &str) -> Result<SpecificationDocument> {
    Ok(serde_yaml::from_str(text)?)
}

/// Parse an observation snapshot: a JSON array of observations or a HAR archive.
pub fn load_observations(text: &str) -> Result<Vec<Observation>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if value.is_array() {
        return Ok(serde_json::from_value(value)?);
    }
    if value.get("log").is_some() {
        let archive: HarArchive = serde_json::from_value(value)?;
        return Ok(archive.into_observations());
    }
    Err(ApiscopeError::InvalidInput(
        "expected a JSON array of observations or a HAR archive".to_string(),
    ))
}

pub fn load_observations_file(path: &Path) -> Result<Vec<Observation>> {
    let content = std::fs::read_to_string(path)?;
    load_observations(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(OutputFormat::from_path(&PathBuf::from("spec.json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(&PathBuf::from("spec.JSON")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(&PathBuf::from("spec.yml")), OutputFormat::Yaml);
        assert_eq!(OutputFormat::from_path(&PathBuf::from("spec")), OutputFormat::Yaml);
    }

    #[test]
    fn test_load_rejects_unknown_shapes() {
        assert!(matches!(
            load_observations(r#"{"entries": []}"#),
            Err(ApiscopeError::InvalidInput(_))
        ));
        assert!(matches!(load_observations("not json"), Err(ApiscopeError::Json(_))));
    }

    #[test]
    fn test_load_observation_array() {
        let observations = load_observations(
            r#"[{"url": "https://a.com/users/1", "method": "DELETE", "status": 204}]"#,
        )
        .unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].status, Some(204));
    }
}
