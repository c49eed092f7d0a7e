use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const OPENAPI_VERSION: &str = "3.0.3";

/// The complete generated API description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationDocument {
    pub openapi: String,
    pub info: Info,
    pub servers: Vec<Server>,
    /// template -> lower-cased method -> operation
    pub paths: BTreeMap<String, BTreeMap<String, Operation>>,
    pub components: Components,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl SpecificationDocument {
    /// Every `$ref` target used anywhere under `paths`.
    pub fn referenced_schemas(&self) -> Vec<String> {
        let mut refs = Vec::new();
        for operation in self.paths.values().flat_map(|methods| methods.values()) {
            for param in &operation.parameters {
                param.schema.collect_refs(&mut refs);
            }
            if let Some(body) = &operation.request_body {
                for media in body.content.values() {
                    media.schema.collect_refs(&mut refs);
                }
            }
            for response in operation.responses.values() {
                for media in response.content.values() {
                    media.schema.collect_refs(&mut refs);
                }
            }
        }
        refs
    }

    /// Refs that do not point at an entry in `components.schemas`.
    pub fn dangling_refs(&self) -> Vec<String> {
        self.referenced_schemas()
            .into_iter()
            .filter(|r| {
                r.strip_prefix(Schema::REF_PREFIX)
                    .is_none_or(|name| !self.components.schemas.contains_key(name))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    pub scheme: String,
}

impl SecurityScheme {
    pub fn bearer() -> Self {
        Self {
            scheme_type: "http".to_string(),
            scheme: "bearer".to_string(),
        }
    }
}

/// Synthesized description of one template + method pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: String,
    pub tags: Vec<String>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Schema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub content: BTreeMap<String, MediaType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// Subset of the OpenAPI schema object that synthesis produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(rename = "x-examples", default, skip_serializing_if = "Vec::is_empty")]
    pub x_examples: Vec<Value>,
}

impl Schema {
    pub const REF_PREFIX: &'static str = "#/components/schemas/";

    pub fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }

    pub fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", Self::REF_PREFIX, name)),
            ..Self::default()
        }
    }

    pub fn array_of(items: Schema) -> Self {
        Self {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    fn collect_refs(&self, out: &mut Vec<String>) {
        if let Some(r) = &self.reference {
            out.push(r.clone());
        }
        if let Some(items) = &self.items {
            items.collect_refs(out);
        }
        for schema in self.properties.values().chain(self.any_of.iter()) {
            schema.collect_refs(out);
        }
    }
}
