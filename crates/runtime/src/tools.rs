//! Tool registry: provider tool descriptions normalized into one shape.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::mcp;
use crate::{Error, Result};

/// Property injected into schemas that declare no parameters.
///
/// Some function-calling schemas reject an object with no properties, so
/// zero-argument tools get this single optional string instead.
pub const PLACEHOLDER_PROPERTY: &str = "_unused";

/// Parameter schema in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: Map<String, Value>,
    pub required: BTreeSet<String>,
}

impl ParameterSchema {
    /// Normalize a provider's input schema.
    ///
    /// Returns the schema and whether the placeholder property was injected.
    fn normalize(input_schema: &Map<String, Value>) -> (Self, bool) {
        let kind = input_schema
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("object")
            .to_string();

        let properties = input_schema
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        if properties.is_empty() {
            let mut placeholder = Map::new();
            placeholder.insert(
                PLACEHOLDER_PROPERTY.to_string(),
                json!({ "type": "string", "description": "Unused parameter" }),
            );
            let schema = Self {
                kind,
                properties: placeholder,
                required: BTreeSet::new(),
            };
            return (schema, true);
        }

        let required = input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let schema = Self {
            kind,
            properties,
            required,
        };
        (schema, false)
    }

    /// The schema as a JSON object.
    pub fn to_value(&self) -> Value {
        json!({
            "type": self.kind,
            "properties": self.properties,
            "required": self.required,
        })
    }
}

/// A callable tool as seen by the rest of the system.
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: ParameterSchema,
    placeholder: bool,
}

impl Tool {
    /// Normalize a provider's raw tool description.
    pub fn from_raw(raw: &mcp::Tool) -> Self {
        let (parameters, placeholder) = ParameterSchema::normalize(&raw.input_schema);
        Self {
            name: raw.name.to_string(),
            description: raw.description.as_deref().unwrap_or_default().to_string(),
            parameters,
            placeholder,
        }
    }

    /// Whether [`PLACEHOLDER_PROPERTY`] was injected into the schema.
    pub fn has_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Required parameters absent from `arguments`, in name order.
    ///
    /// Only presence is checked; values are not validated against the schema.
    pub fn missing_arguments<'a>(
        &'a self,
        arguments: &'a Map<String, Value>,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.parameters
            .required
            .iter()
            .filter(|name| !arguments.contains_key(name.as_str()))
            .map(String::as_str)
    }

    /// Render as a function declaration.
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.to_value(),
        }
    }
}

/// A tool definition handed to a function-calling model adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tools keyed by name.
///
/// Not synchronized; callers that mutate a shared registry must guard it.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and insert a batch of raw tools.
    ///
    /// Fails with [`Error::DuplicateTool`] if any name is already registered or
    /// repeats within the batch; nothing is inserted in that case.
    pub fn add<'a>(&mut self, raw: impl IntoIterator<Item = &'a mcp::Tool>) -> Result<()> {
        let batch: Vec<Tool> = raw.into_iter().map(Tool::from_raw).collect();

        let mut seen = BTreeSet::new();
        for tool in &batch {
            if self.tools.contains_key(&tool.name) || !seen.insert(tool.name.as_str()) {
                return Err(Error::DuplicateTool(tool.name.clone()));
            }
        }

        for tool in batch {
            self.tools.insert(tool.name.clone(), tool);
        }
        Ok(())
    }

    /// Look up a tool by exact name.
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tools, sorted by name.
    pub fn list(&self) -> Vec<&Tool> {
        let mut tools: Vec<_> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Specs for every tool, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.list().into_iter().map(Tool::spec).collect()
    }

    /// Remove a tool, returning it if it was registered.
    pub fn remove(&mut self, name: &str) -> Option<Tool> {
        self.tools.remove(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
