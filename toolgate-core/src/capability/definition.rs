//! Static capability metadata
//!
//! A [`CapabilityDefinition`] describes one capability: identity, category,
//! declared parameters and search tags. It is immutable once registered.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::str::FromStr;

/// Category tag used for the registry's secondary index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityCategory {
    /// File system access
    FileSystem,

    /// Shell command execution
    Shell,

    /// Version control operations
    Git,

    /// Code and text search
    Search,

    /// Language server queries
    Lsp,

    /// Network requests
    Network,

    /// Ticket and feature tracking
    Ticket,

    /// Retrieval index operations
    Rag,

    /// Anything else
    #[default]
    Custom,
}

impl CapabilityCategory {
    /// Get all defined categories
    pub fn all() -> &'static [CapabilityCategory] {
        &[
            CapabilityCategory::FileSystem,
            CapabilityCategory::Shell,
            CapabilityCategory::Git,
            CapabilityCategory::Search,
            CapabilityCategory::Lsp,
            CapabilityCategory::Network,
            CapabilityCategory::Ticket,
            CapabilityCategory::Rag,
            CapabilityCategory::Custom,
        ]
    }

    /// Get the string name of this category
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityCategory::FileSystem => "file-system",
            CapabilityCategory::Shell => "shell",
            CapabilityCategory::Git => "git",
            CapabilityCategory::Search => "search",
            CapabilityCategory::Lsp => "lsp",
            CapabilityCategory::Network => "network",
            CapabilityCategory::Ticket => "ticket",
            CapabilityCategory::Rag => "rag",
            CapabilityCategory::Custom => "custom",
        }
    }
}

impl std::fmt::Display for CapabilityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        CapabilityCategory::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| format!("Unknown capability category: {}", s))
    }
}

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParameterType {
    /// JSON-Schema type name
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Object => "object",
            ParameterType::Array => "array",
        }
    }

    /// Check whether a JSON value carries this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Object => value.is_object(),
            ParameterType::Array => value.is_array(),
        }
    }
}

/// One declared input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name
    pub name: String,

    /// Declared type
    #[serde(rename = "type")]
    pub param_type: ParameterType,

    /// Whether the parameter must be present
    pub required: bool,

    /// Human-readable description
    #[serde(default)]
    pub description: String,
}

impl ParameterSpec {
    /// A required parameter
    pub fn required(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            description: description.into(),
        }
    }

    /// An optional parameter
    pub fn optional(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Static metadata for one capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDefinition {
    /// Unique, stable identifier
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Category for the registry index
    #[serde(default)]
    pub category: CapabilityCategory,

    /// Capability version
    pub version: String,

    /// Declared inputs, in order
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,

    /// What the capability returns
    pub returns: String,

    /// Free-form search tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CapabilityDefinition {
    /// Create a definition with required fields
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: CapabilityCategory::Custom,
            version: "1.0.0".to_string(),
            parameters: Vec::new(),
            returns: "Capability-specific result".to_string(),
            tags: Vec::new(),
        }
    }

    /// Set category
    pub fn with_category(mut self, category: CapabilityCategory) -> Self {
        self.category = category;
        self
    }

    /// Set version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add a parameter
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Set return description
    pub fn with_returns(mut self, returns: impl Into<String>) -> Self {
        self.returns = returns.into();
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Names of required parameters absent from `params`
    ///
    /// A `null` value counts as absent. Non-object params satisfy nothing.
    pub fn missing_required(&self, params: &Value) -> Vec<String> {
        let object = params.as_object();
        self.parameters
            .iter()
            .filter(|p| p.required)
            .filter(|p| {
                object
                    .and_then(|o| o.get(&p.name))
                    .is_none_or(Value::is_null)
            })
            .map(|p| p.name.clone())
            .collect()
    }

    /// Names of present parameters whose value does not match the declared type
    pub fn type_mismatches(&self, params: &Value) -> Vec<String> {
        let Some(object) = params.as_object() else {
            return Vec::new();
        };
        self.parameters
            .iter()
            .filter(|p| {
                object
                    .get(&p.name)
                    .is_some_and(|v| !v.is_null() && !p.param_type.matches(v))
            })
            .map(|p| p.name.clone())
            .collect()
    }

    /// Render the parameter list as a JSON-Schema object
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(
                param.name.clone(),
                json!({
                    "type": param.param_type.as_str(),
                    "description": param.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
