//! Compiled parameter shapes and their host wire encodings.
//!
//! Field names here are a compatibility contract with the host's persistence
//! API and are emitted exactly as the host expects them, including its mixed
//! `camelCase`, `kebab-case` and `snake_case` keys.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::classify::TagKind;
use crate::params::{DefaultValue, FieldRef, ParameterType, Scope, SectionId, TemporalUnit};
use crate::values_source::ValuesQueryType;

// ============================================================================
// Target
// ============================================================================

/// What a parameter binds to inside a query.
///
/// Encoded as `["variable" | "dimension", ["template-tag", name]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterTarget {
    Variable(String),
    Dimension(String),
}

impl ParameterTarget {
    pub fn variable(name: impl Into<String>) -> Self {
        ParameterTarget::Variable(name.into())
    }

    pub fn dimension(name: impl Into<String>) -> Self {
        ParameterTarget::Dimension(name.into())
    }

    /// Template-tag name the target points at.
    pub fn tag_name(&self) -> &str {
        match self {
            ParameterTarget::Variable(name) | ParameterTarget::Dimension(name) => name,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ParameterTarget::Variable(_) => "variable",
            ParameterTarget::Dimension(_) => "dimension",
        }
    }
}

impl Serialize for ParameterTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.kind(), ("template-tag", self.tag_name())).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ParameterTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let (kind, (tag, name)): (String, (String, String)) = Deserialize::deserialize(deserializer)?;
        if tag != "template-tag" {
            return Err(D::Error::custom(format!(
                "expected a template-tag target, got '{}'",
                tag
            )));
        }
        match kind.as_str() {
            "variable" => Ok(ParameterTarget::Variable(name)),
            "dimension" => Ok(ParameterTarget::Dimension(name)),
            other => Err(D::Error::unknown_variant(other, &["variable", "dimension"])),
        }
    }
}

// ============================================================================
// CompiledParameter
// ============================================================================

/// A fully resolved, id-addressed parameter.
///
/// Query- and dashboard-scoped parameters share this type; [`Serialize`]
/// emits the shape the host expects for `scope`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledParameter {
    pub scope: Scope,
    /// Name of the spec this was compiled from (not emitted).
    pub key: String,
    pub id: String,
    /// Wire type (geography types already collapsed onto `string/*`).
    pub param_type: ParameterType,
    /// Query scope only.
    pub target: Option<ParameterTarget>,
    /// Display name.
    pub name: String,
    pub slug: String,
    pub section_id: SectionId,
    pub required: bool,
    pub default: Option<DefaultValue>,
    /// Emitted only when the caller set it explicitly, and only on dashboards.
    pub is_multi_select: Option<bool>,
    pub temporal_units: Option<Vec<TemporalUnit>>,
    pub values_query_type: ValuesQueryType,
    pub values_source_type: Option<&'static str>,
    pub values_source_config: Option<Value>,
}

impl Serialize for CompiledParameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;

        match self.scope {
            Scope::Query => {
                map.serialize_entry("type", &self.param_type)?;
                if let Some(target) = &self.target {
                    map.serialize_entry("target", target)?;
                }
                map.serialize_entry("name", &self.name)?;
                map.serialize_entry("slug", &self.slug)?;
            }
            Scope::Dashboard => {
                map.serialize_entry("name", &self.name)?;
                map.serialize_entry("slug", &self.slug)?;
                map.serialize_entry("type", &self.param_type)?;
                map.serialize_entry("sectionId", &self.section_id)?;
            }
        }

        if self.required {
            map.serialize_entry("required", &true)?;
        }
        if let Some(default) = &self.default {
            map.serialize_entry("default", default)?;
        }
        if let (Scope::Dashboard, Some(multi)) = (self.scope, self.is_multi_select) {
            map.serialize_entry("isMultiSelect", &multi)?;
        }
        if let Some(units) = &self.temporal_units {
            map.serialize_entry("temporal_units", units)?;
        }
        map.serialize_entry("values_query_type", &self.values_query_type)?;
        if let Some(source_type) = self.values_source_type {
            map.serialize_entry("values_source_type", source_type)?;
        }
        if let Some(config) = &self.values_source_config {
            map.serialize_entry("values_source_config", config)?;
        }
        map.end()
    }
}

// ============================================================================
// BindingTag
// ============================================================================

/// Query-text-side declaration of a query-scoped parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingTag {
    /// Literal token used in the query text.
    pub name: String,
    /// Always equal to the paired [`CompiledParameter::id`].
    pub id: String,
    pub display_name: String,
    pub kind: TagKind,
    /// Dimension tags only.
    pub field_ref: Option<FieldRef>,
    /// Dimension tags only.
    pub widget_type: Option<ParameterType>,
    pub default: Option<DefaultValue>,
    pub required: bool,
}

impl Serialize for BindingTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tag = serializer.serialize_struct("BindingTag", 8)?;
        tag.serialize_field("type", &self.kind)?;
        tag.serialize_field("name", &self.name)?;
        tag.serialize_field("id", &self.id)?;
        tag.serialize_field("display-name", &self.display_name)?;
        match &self.field_ref {
            Some(field) => tag.serialize_field("dimension", &("field", field.field_id, ()))?,
            None => tag.skip_field("dimension")?,
        }
        match &self.widget_type {
            Some(widget) => tag.serialize_field("widget-type", widget)?,
            None => tag.skip_field("widget-type")?,
        }
        match &self.default {
            Some(default) => tag.serialize_field("default", default)?,
            None => tag.skip_field("default")?,
        }
        if self.required {
            tag.serialize_field("required", &true)?;
        } else {
            tag.skip_field("required")?;
        }
        tag.end()
    }
}

// ============================================================================
// QueryParameters
// ============================================================================

/// Output of the query compiler: parameters plus their binding tags, paired
/// by position and by id.
///
/// Serializes as `{"parameters": [...], "template-tags": {name: tag, ...}}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryParameters {
    pub parameters: Vec<CompiledParameter>,
    pub binding_tags: Vec<BindingTag>,
}

impl QueryParameters {
    pub fn tag(&self, name: &str) -> Option<&BindingTag> {
        self.binding_tags.iter().find(|t| t.name == name)
    }

    pub fn parameter(&self, name: &str) -> Option<&CompiledParameter> {
        self.parameters.iter().find(|p| p.key == name)
    }
}

struct TemplateTags<'a>(&'a [BindingTag]);

impl Serialize for TemplateTags<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for tag in self.0 {
            map.serialize_entry(&tag.name, tag)?;
        }
        map.end()
    }
}

impl Serialize for QueryParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_struct("QueryParameters", 2)?;
        out.serialize_field("parameters", &self.parameters)?;
        out.serialize_field("template-tags", &TemplateTags(&self.binding_tags))?;
        out.end()
    }
}
