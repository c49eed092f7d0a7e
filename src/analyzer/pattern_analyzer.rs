use crate::analyzer::templating::{
    PathTemplate, detect_resource_type, grouping_key, media_type,
};
use crate::models::Observation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// Distinct values retained per query parameter name.
const MAX_PARAMETER_SAMPLES: usize = 20;
/// Examples kept when samples disagree on type.
const MAX_MIXED_EXAMPLES: usize = 3;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub groups: Vec<ResourceGroup>,
    pub patterns: Vec<PathPattern>,
    pub statistics: TrafficStatistics,
}

/// Template assignment for one observation. URL-derived fields are `None`
/// when the observation's URL could not be parsed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathPattern {
    pub url: String,
    pub method: String,
    pub template: Option<String>,
    pub group_key: Option<String>,
    pub resource_type: String,
}

/// Observations sharing a host plus short path prefix.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    pub key: String,
    pub base_url: String,
    pub resource_type: String,
    pub observation_count: usize,
    pub templates: BTreeSet<String>,
    pub methods: BTreeSet<String>,
    pub status_codes: BTreeSet<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyEntry {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficStatistics {
    pub total_observations: usize,
    pub methods: Vec<FrequencyEntry>,
    pub status_codes: Vec<FrequencyEntry>,
    pub content_types: Vec<FrequencyEntry>,
    pub query_parameters: Vec<FrequencyEntry>,
    pub headers: Vec<FrequencyEntry>,
    pub average_response_size: f64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub parameter_samples: Vec<ParameterSamples>,
}

/// Distinct observed values of one query parameter and their inferred type.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSamples {
    pub name: String,
    pub values: Vec<String>,
    pub inference: TypeInference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Number,
    String,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
        }
    }
}

/// Result of classifying the sample values of one parameter.
///
/// When samples disagree the type falls back to `string`, `any_of` lists
/// every distinct type seen and `examples` keeps up to three values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeInference {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<ValueType>,
    pub examples: Vec<String>,
}

impl TypeInference {
    pub fn is_mixed(&self) -> bool {
        !self.any_of.is_empty()
    }
}

pub fn infer_value_type(value: &str) -> ValueType {
    if value == "true" || value == "false" {
        return ValueType::Boolean;
    }
    let trimmed = value.trim();
    if !trimmed.is_empty() && trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
        ValueType::Number
    } else {
        ValueType::String
    }
}

pub fn infer_parameter_types<S: AsRef<str>>(samples: &[S]) -> TypeInference {
    let mut types: Vec<ValueType> = Vec::new();
    for sample in samples {
        let t = infer_value_type(sample.as_ref());
        if !types.contains(&t) {
            types.push(t);
        }
    }

    match types.as_slice() {
        [] => TypeInference {
            value_type: ValueType::String,
            any_of: Vec::new(),
            examples: Vec::new(),
        },
        [single] => TypeInference {
            value_type: *single,
            any_of: Vec::new(),
            examples: vec![samples[0].as_ref().to_string()],
        },
        _ => {
            let mut examples: Vec<String> = Vec::new();
            for sample in samples {
                let sample = sample.as_ref();
                if examples.len() == MAX_MIXED_EXAMPLES {
                    break;
                }
                if !examples.iter().any(|e| e == sample) {
                    examples.push(sample.to_string());
                }
            }
            TypeInference {
                value_type: ValueType::String,
                any_of: types,
                examples,
            }
        }
    }
}

/// Counts keys in first-seen order; sorting is stable so ties keep that order.
#[derive(Default)]
struct FrequencyCounter {
    index: HashMap<String, usize>,
    entries: Vec<FrequencyEntry>,
}

impl FrequencyCounter {
    fn add(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].count += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push(FrequencyEntry {
                    value: key.to_string(),
                    count: 1,
                });
            }
        }
    }

    fn into_sorted(mut self) -> Vec<FrequencyEntry> {
        self.entries.sort_by(|a, b| b.count.cmp(&a.count));
        self.entries
    }
}

#[derive(Default)]
struct StatisticsBuilder {
    total: usize,
    methods: FrequencyCounter,
    status_codes: FrequencyCounter,
    content_types: FrequencyCounter,
    query_parameters: FrequencyCounter,
    headers: FrequencyCounter,
    size_sum: u128,
    size_count: u64,
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
    samples: Vec<(String, Vec<String>)>,
    sample_index: HashMap<String, usize>,
}

impl StatisticsBuilder {
    fn observe(&mut self, obs: &Observation) {
        self.total += 1;
        self.methods.add(&obs.normalized_method());
        if let Some(status) = obs.status_code() {
            self.status_codes.add(&status.to_string());
        }
        if let Some(ct) = obs.content_type.as_deref().filter(|c| !c.trim().is_empty()) {
            self.content_types.add(&media_type(ct));
        }
        for name in obs.headers.keys() {
            self.headers.add(&name.to_ascii_lowercase());
        }
        for (name, value) in obs.query_pairs() {
            self.query_parameters.add(&name);
            self.record_sample(name, value);
        }
        if let Some(size) = obs.response_size {
            self.size_sum += u128::from(size);
            self.size_count += 1;
        }
        if let Some(ts) = obs.timestamp {
            self.earliest = Some(self.earliest.map_or(ts, |e| e.min(ts)));
            self.latest = Some(self.latest.map_or(ts, |l| l.max(ts)));
        }
    }

    fn record_sample(&mut self, name: String, value: String) {
        let i = match self.sample_index.get(&name) {
            Some(&i) => i,
            None => {
                self.sample_index.insert(name.clone(), self.samples.len());
                self.samples.push((name, Vec::new()));
                self.samples.len() - 1
            }
        };
        let values = &mut self.samples[i].1;
        if values.len() < MAX_PARAMETER_SAMPLES && !values.contains(&value) {
            values.push(value);
        }
    }

    fn finish(self) -> TrafficStatistics {
        let average_response_size = if self.size_count == 0 {
            0.0
        } else {
            self.size_sum as f64 / self.size_count as f64
        };
        TrafficStatistics {
            total_observations: self.total,
            methods: self.methods.into_sorted(),
            status_codes: self.status_codes.into_sorted(),
            content_types: self.content_types.into_sorted(),
            query_parameters: self.query_parameters.into_sorted(),
            headers: self.headers.into_sorted(),
            average_response_size,
            earliest: self.earliest,
            latest: self.latest,
            parameter_samples: self
                .samples
                .into_iter()
                .map(|(name, values)| ParameterSamples {
                    inference: infer_parameter_types(&values),
                    name,
                    values,
                })
                .collect(),
        }
    }
}

/// Single pass over the observations: templates, resource groups and statistics.
pub fn analyze(observations: &[Observation]) -> AnalysisResult {
    let mut stats = StatisticsBuilder::default();
    let mut patterns = Vec::with_capacity(observations.len());
    let mut groups: Vec<ResourceGroup> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for obs in observations {
        stats.observe(obs);

        let method = obs.normalized_method();
        let resource_type = detect_resource_type(&obs.url).to_string();

        let Some(url) = obs.parsed_url() else {
            warn!(url = %obs.url, "unparseable URL; counted in statistics only");
            patterns.push(PathPattern {
                url: obs.url.clone(),
                method,
                template: None,
                group_key: None,
                resource_type,
            });
            continue;
        };

        let template = PathTemplate::from_path(url.path());
        let key = grouping_key(&url, &template);

        let i = *group_index.entry(key.clone()).or_insert_with(|| {
            groups.push(ResourceGroup {
                key: key.clone(),
                base_url: url.origin().ascii_serialization(),
                resource_type: resource_type.clone(),
                observation_count: 0,
                templates: BTreeSet::new(),
                methods: BTreeSet::new(),
                status_codes: BTreeSet::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[i];
        group.observation_count += 1;
        group.templates.insert(template.as_str().to_string());
        group.methods.insert(method.clone());
        if let Some(status) = obs.status_code() {
            group.status_codes.insert(status);
        }

        patterns.push(PathPattern {
            url: obs.url.clone(),
            method,
            template: Some(template.as_str().to_string()),
            group_key: Some(key),
            resource_type,
        });
    }

    debug!(
        observations = observations.len(),
        groups = groups.len(),
        "pattern analysis complete"
    );

    AnalysisResult {
        groups,
        patterns,
        statistics: stats.finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_single_type() {
        let inference = infer_parameter_types(&["1", "2.5", "-3"]);
        assert_eq!(inference.value_type, ValueType::Number);
        assert!(!inference.is_mixed());
        assert_eq!(inference.examples, vec!["1"]);

        assert_eq!(infer_parameter_types(&["true", "false"]).value_type, ValueType::Boolean);
    }

    #[test]
    fn test_infer_mixed_types_falls_back_to_string() {
        let inference = infer_parameter_types(&["5", "abc"]);
        assert_eq!(inference.value_type, ValueType::String);
        assert_eq!(inference.any_of, vec![ValueType::Number, ValueType::String]);
        assert_eq!(inference.examples, vec!["5", "abc"]);
    }

    #[test]
    fn test_mixed_examples_capped_at_three() {
        let inference = infer_parameter_types(&["1", "a", "true", "b", "c"]);
        assert_eq!(inference.any_of.len(), 3);
        assert_eq!(inference.examples, vec!["1", "a", "true"]);
    }

    #[test]
    fn test_value_type_edge_cases() {
        assert_eq!(infer_value_type(""), ValueType::String);
        assert_eq!(infer_value_type("  "), ValueType::String);
        assert_eq!(infer_value_type("NaN"), ValueType::String);
        assert_eq!(infer_value_type("TRUE"), ValueType::String);
        assert_eq!(infer_value_type("1e3"), ValueType::Number);
        assert_eq!(infer_value_type("0x1F"), ValueType::String);
        assert_eq!(infer_value_type("Infinity"), ValueType::String);
    }

    #[test]
    fn test_empty_input_yields_empty_result() {
        let result = analyze(&[]);
        assert!(result.groups.is_empty());
        assert!(result.patterns.is_empty());
        assert_eq!(result.statistics.total_observations, 0);
        assert_eq!(result.statistics.average_response_size, 0.0);
        assert!(result.statistics.earliest.is_none());
    }

    #[test]
    fn test_frequency_tables_sorted_descending() {
        let observations = vec![
            Observation::new("https://a.com/x", "POST").with_status(201),
            Observation::new("https://a.com/x", "GET").with_status(200),
            Observation::new("https://a.com/y", "get").with_status(200),
        ];
        let stats = analyze(&observations).statistics;
        assert_eq!(
            stats.methods,
            vec![
                FrequencyEntry { value: "GET".into(), count: 2 },
                FrequencyEntry { value: "POST".into(), count: 1 },
            ]
        );
        assert_eq!(stats.status_codes[0].value, "200");
    }

    #[test]
    fn test_average_size_survives_huge_responses() {
        let mut big = Observation::new("https://a.com/blob", "GET");
        big.response_size = Some(u64::MAX);
        let stats = analyze(&[big.clone(), big]).statistics;
        assert_eq!(stats.average_response_size, u64::MAX as f64);
    }
}
