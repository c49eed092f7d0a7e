use crate::analyzer::templating::{PathTemplate, PlaceholderKind, camel_case, media_type};
use crate::analyzer::{TypeInference, ValueType, infer_parameter_types};
use crate::config::SynthesisOptions;
use crate::models::{
    Components, Info, MediaType, OPENAPI_VERSION, Observation, Operation, Parameter,
    ParameterLocation, RequestBody, Response, Schema, SecurityScheme, Server,
    SpecificationDocument, Tag,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

pub const BEARER_AUTH: &str = "bearerAuth";
pub const FALLBACK_SERVER: &str = "https://example.com";
const DEFAULT_TAG: &str = "default";
const JSON_MEDIA_TYPE: &str = "application/json";

/// Operation id prefix for a lower-cased method.
fn method_prefix(method: &str) -> &str {
    match method {
        "get" => "get",
        "post" => "create",
        "put" => "update",
        "patch" => "patch",
        "delete" => "delete",
        other => other,
    }
}

fn takes_body(method: &str) -> bool {
    matches!(method, "post" | "put" | "patch")
}

fn status_description(status: u16) -> String {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Observed response")
        .to_string()
}

/// Naive singular form used for schema names (`users` -> `user`, `categories` -> `category`).
fn singularize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    if lower.ends_with("ies") && word.len() > 3 {
        format!("{}y", &word[..word.len() - 3])
    } else if lower.ends_with('s')
        && !lower.ends_with("ss")
        && !lower.ends_with("us")
        && !lower.ends_with("is")
        && word.len() > 1
    {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

fn placeholder_schema(kind: PlaceholderKind) -> Schema {
    match kind {
        PlaceholderKind::Id => Schema::of_type("integer"),
        PlaceholderKind::Uuid => Schema {
            format: Some("uuid".to_string()),
            ..Schema::of_type("string")
        },
        PlaceholderKind::ObjectId => Schema {
            pattern: Some("^[0-9a-f]{24}$".to_string()),
            ..Schema::of_type("string")
        },
    }
}

fn example_value(value_type: ValueType, sample: &str) -> Value {
    match value_type {
        ValueType::Boolean => Value::Bool(sample == "true"),
        ValueType::Number => sample
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .ok()
            .or_else(|| {
                sample
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            })
            .unwrap_or_else(|| Value::String(sample.to_string())),
        ValueType::String => Value::String(sample.to_string()),
    }
}

/// Schema for a query parameter from its inferred type.
pub fn inference_schema(inference: &TypeInference) -> Schema {
    let mut schema = Schema::of_type(inference.value_type.as_str());
    if inference.is_mixed() {
        schema.any_of = inference
            .any_of
            .iter()
            .map(|t| Schema::of_type(t.as_str()))
            .collect();
        schema.x_examples = inference
            .examples
            .iter()
            .map(|e| Value::String(e.clone()))
            .collect();
    } else if let Some(sample) = inference.examples.first() {
        schema.example = Some(example_value(inference.value_type, sample));
    }
    schema
}

/// Accumulates everything known about one (template, method) pair.
struct OperationBuilder {
    template: PathTemplate,
    method: String,
    operation_id: String,
    tag: String,
    query: Vec<(String, Vec<String>)>,
    responses: BTreeMap<String, Response>,
    request_body: Option<RequestBody>,
    secured: bool,
}

impl OperationBuilder {
    fn record_query(&mut self, name: String, value: String) {
        match self.query.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            None => self.query.push((name, vec![value])),
        }
    }

    fn record_response(&mut self, status: u16, content: Option<(String, Schema)>) {
        let response = self
            .responses
            .entry(status.to_string())
            .or_insert_with(|| Response {
                description: status_description(status),
                content: BTreeMap::new(),
            });
        if let Some((media, schema)) = content {
            response.content.entry(media).or_insert(MediaType { schema });
        }

        let bucket = match status {
            400..=499 => Some(("4xx", "Client error")),
            500..=599 => Some(("5xx", "Server error")),
            _ => None,
        };
        if let Some((key, description)) = bucket {
            self.responses
                .entry(key.to_string())
                .or_insert_with(|| Response {
                    description: description.to_string(),
                    content: BTreeMap::new(),
                });
        }
    }

    fn build(self) -> Operation {
        let mut parameters: Vec<Parameter> = self
            .template
            .placeholders()
            .map(|p| Parameter {
                name: p.name.clone(),
                location: ParameterLocation::Path,
                required: true,
                schema: placeholder_schema(p.kind),
            })
            .collect();
        for (name, values) in &self.query {
            if parameters.iter().any(|p| p.name == *name) {
                continue;
            }
            parameters.push(Parameter {
                name: name.clone(),
                location: ParameterLocation::Query,
                required: false,
                schema: inference_schema(&infer_parameter_types(values)),
            });
        }

        let mut responses = self.responses;
        if responses.is_empty() {
            responses.insert(
                "default".to_string(),
                Response {
                    description: "Response not observed".to_string(),
                    content: BTreeMap::new(),
                },
            );
        }

        let security = if self.secured {
            vec![BTreeMap::from([(BEARER_AUTH.to_string(), Vec::new())])]
        } else {
            Vec::new()
        };

        Operation {
            operation_id: self.operation_id,
            tags: vec![self.tag],
            summary: format!("{} {}", self.method.to_ascii_uppercase(), self.template.as_str()),
            parameters,
            request_body: self.request_body,
            responses,
            security,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SchemaRole {
    Resource,
    Input,
}

/// Per-call synthesis state. Created fresh by every [`synthesize`] call so
/// the operation-id and schema registries never leak between calls.
#[derive(Default)]
pub struct SynthesisContext {
    operation_ids: HashSet<String>,
    /// (derived resource name, role) -> registered schema name
    schema_names: HashMap<(String, SchemaRole), String>,
    /// schemas whose `id` type came from an observed placeholder
    typed_ids: HashSet<String>,
    schemas: BTreeMap<String, Schema>,
    servers: Vec<Server>,
    tags: Vec<Tag>,
    operations: Vec<OperationBuilder>,
    operation_index: HashMap<(String, String), usize>,
    skipped: usize,
}

impl SynthesisContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation into the context. Unparseable URLs are skipped.
    pub fn record(&mut self, obs: &Observation) {
        let Some(url) = obs.parsed_url() else {
            warn!(url = %obs.url, "skipping URL-derived synthesis for unparseable URL");
            self.skipped += 1;
            return;
        };

        let origin = url.origin().ascii_serialization();
        if !self.servers.iter().any(|s| s.url == origin) {
            self.servers.push(Server { url: origin });
        }

        let template = PathTemplate::from_path(url.path());
        let method = obs.normalized_method().to_ascii_lowercase();
        let index = self.operation_for(template, method);

        let content = match obs.status_code() {
            Some(status) if (200..300).contains(&status) => obs
                .content_type
                .as_deref()
                .map(media_type)
                .filter(|m| !m.is_empty())
                .map(|media| {
                    let schema = self.response_schema(index, &media);
                    (media, schema)
                }),
            _ => None,
        };

        let op = &mut self.operations[index];
        op.secured |= obs.carries_credentials();
        for (name, value) in obs.query_pairs() {
            op.record_query(name, value);
        }
        if let Some(status) = obs.status_code() {
            op.record_response(status, content);
        }
    }

    fn operation_for(&mut self, template: PathTemplate, method: String) -> usize {
        let key = (template.as_str().to_string(), method);
        if let Some(&index) = self.operation_index.get(&key) {
            return index;
        }
        let method = key.1.clone();

        let base = format!(
            "{}{}",
            method_prefix(&method),
            template
                .naming_segment()
                .map(|s| camel_case(s, true))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Root".to_string())
        );
        let operation_id = self.unique_operation_id(base);

        let tag = template.tag_segment().unwrap_or(DEFAULT_TAG).to_string();
        if !self.tags.iter().any(|t| t.name == tag) {
            self.tags.push(Tag {
                description: format!("Operations on {}", tag),
                name: tag.clone(),
            });
        }

        let resource_name = template
            .resource_segment()
            .map(|resource| self.resource_schema(resource, &template));

        let request_body = takes_body(&method).then(|| {
            let schema = match &resource_name {
                Some(name) => Schema::reference(&self.input_schema(name)),
                None => Schema::of_type("object"),
            };
            RequestBody {
                required: true,
                content: BTreeMap::from([(JSON_MEDIA_TYPE.to_string(), MediaType { schema })]),
            }
        });

        let index = self.operations.len();
        self.operations.push(OperationBuilder {
            template,
            method,
            operation_id,
            tag,
            query: Vec::new(),
            responses: BTreeMap::new(),
            request_body,
            secured: false,
        });
        self.operation_index.insert(key, index);
        index
    }

    /// Lowest unused numeric suffix, starting at 2.
    fn unique_operation_id(&mut self, base: String) -> String {
        if self.operation_ids.insert(base.clone()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}{}", base, n);
            if self.operation_ids.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    fn response_schema(&mut self, index: usize, media: &str) -> Schema {
        if !media.contains("json") {
            return Schema::of_type("string");
        }
        let template = self.operations[index].template.clone();
        let is_list = self.operations[index].method == "get" && template.is_collection();
        match template.resource_segment() {
            Some(resource) => {
                let name = self.resource_schema(resource, &template);
                if is_list {
                    Schema::array_of(Schema::reference(&name))
                } else {
                    Schema::reference(&name)
                }
            }
            None => Schema::of_type("object"),
        }
    }

    /// Lowest unused schema name for `base`, suffixing from 2 like operation ids.
    fn unique_schema_name(&self, base: &str) -> String {
        if !self.schemas.contains_key(base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}{}", base, n);
            if !self.schemas.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Register (once) the placeholder object schema for a resource segment.
    ///
    /// The `id` property takes the type of the placeholder directly after the
    /// resource segment; a later template can refine a defaulted `integer`.
    fn resource_schema(&mut self, resource: &str, template: &PathTemplate) -> String {
        let mut base = camel_case(&singularize(resource), true);
        if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) {
            base = format!("Resource{}", base);
        }
        let observed_id = template
            .placeholder_after_resource()
            .map(|p| placeholder_schema(p.kind));

        let key = (base, SchemaRole::Resource);
        if let Some(name) = self.schema_names.get(&key).cloned() {
            if let Some(id_schema) = observed_id {
                if self.typed_ids.insert(name.clone()) {
                    if let Some(schema) = self.schemas.get_mut(&name) {
                        schema.properties.insert("id".to_string(), id_schema);
                    }
                }
            }
            return name;
        }

        let name = self.unique_schema_name(&key.0);
        if observed_id.is_some() {
            self.typed_ids.insert(name.clone());
        }
        let id_schema = observed_id.unwrap_or_else(|| Schema::of_type("integer"));
        self.schemas.insert(
            name.clone(),
            Schema {
                properties: BTreeMap::from([
                    ("id".to_string(), id_schema),
                    ("name".to_string(), Schema::of_type("string")),
                ]),
                ..Schema::of_type("object")
            },
        );
        self.schema_names.insert(key, name.clone());
        name
    }

    fn input_schema(&mut self, resource_name: &str) -> String {
        let key = (resource_name.to_string(), SchemaRole::Input);
        if let Some(name) = self.schema_names.get(&key) {
            return name.clone();
        }
        let name = self.unique_schema_name(&format!("{}Input", resource_name));
        self.schemas.insert(
            name.clone(),
            Schema {
                properties: BTreeMap::from([("name".to_string(), Schema::of_type("string"))]),
                ..Schema::of_type("object")
            },
        );
        self.schema_names.insert(key, name.clone());
        name
    }

    pub fn into_document(self, options: &SynthesisOptions) -> SpecificationDocument {
        let mut servers = self.servers;
        if servers.is_empty() {
            servers.push(Server {
                url: FALLBACK_SERVER.to_string(),
            });
        }

        let mut requires_auth = false;
        let mut paths: BTreeMap<String, BTreeMap<String, Operation>> = BTreeMap::new();
        for builder in self.operations {
            requires_auth |= builder.secured;
            let template = builder.template.as_str().to_string();
            let method = builder.method.clone();
            paths.entry(template).or_default().insert(method, builder.build());
        }

        let mut security_schemes = BTreeMap::new();
        if requires_auth {
            security_schemes.insert(BEARER_AUTH.to_string(), SecurityScheme::bearer());
        }

        info!(
            paths = paths.len(),
            schemas = self.schemas.len(),
            skipped = self.skipped,
            "synthesized specification"
        );

        SpecificationDocument {
            openapi: OPENAPI_VERSION.to_string(),
            info: Info {
                title: options.resolved_title().to_string(),
                version: options.resolved_version().to_string(),
                description: options.resolved_description().to_string(),
            },
            servers,
            paths,
            components: Components {
                schemas: self.schemas,
                security_schemes,
            },
            tags: self.tags,
        }
    }
}

/// Build an API document from observations, processed in the order given.
pub fn synthesize(observations: &[Observation], options: &SynthesisOptions) -> SpecificationDocument {
    debug!(observations = observations.len(), "starting synthesis");
    let mut context = SynthesisContext::new();
    for obs in observations {
        context.record(obs);
    }
    context.into_document(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_prefixes() {
        assert_eq!(method_prefix("get"), "get");
        assert_eq!(method_prefix("post"), "create");
        assert_eq!(method_prefix("put"), "update");
        assert_eq!(method_prefix("patch"), "patch");
        assert_eq!(method_prefix("delete"), "delete");
        assert_eq!(method_prefix("options"), "options");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("address"), "address");
        assert_eq!(singularize("profile"), "profile");
    }

    #[test]
    fn test_operation_id_suffixes_are_per_context() {
        let mut ctx = SynthesisContext::new();
        assert_eq!(ctx.unique_operation_id("getUsers".into()), "getUsers");
        assert_eq!(ctx.unique_operation_id("getUsers".into()), "getUsers2");
        assert_eq!(ctx.unique_operation_id("getUsers".into()), "getUsers3");

        let mut fresh = SynthesisContext::new();
        assert_eq!(fresh.unique_operation_id("getUsers".into()), "getUsers");
    }

    #[test]
    fn test_status_descriptions() {
        assert_eq!(status_description(404), "Not Found");
        assert_eq!(status_description(299), "Observed response");
    }

    #[test]
    fn test_number_example_keeps_integer_form() {
        assert_eq!(example_value(ValueType::Number, "5"), Value::from(5));
        assert_eq!(example_value(ValueType::Number, "2.5"), Value::from(2.5));
        assert_eq!(example_value(ValueType::Boolean, "false"), Value::Bool(false));
    }
}
