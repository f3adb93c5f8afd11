//! Schema stage: raw JSON items into typed specs.
//!
//! Each item is read through a [`SpecReader`] that records every structural
//! problem it meets instead of stopping at the first one, so a caller sees
//! the complete set of schema violations for a batch in one answer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::{
    DashCardSpec, DefaultValue, FieldRef, ParameterSpec, ParameterType, Scalar, Scope, SectionId,
    UiWidget, ValuesSource,
};
use crate::validation::{CompileResult, Diagnostics, ErrorKind, Location, ParameterError, Stage};

/// Query parameter names are literal template-tag tokens.
static TAG_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid tag name regex"));

const COMMON_KEYS: &[&str] = &[
    "name",
    "type",
    "display_name",
    "required",
    "default",
    "isMultiSelect",
    "field_ref",
    "field",
    "values_source",
    "temporal_units",
    "section_override",
];

/// Parse a whole batch of parameter specs for `scope`.
pub fn parse_parameters(raw: &[Value], scope: Scope) -> CompileResult<Vec<ParameterSpec>> {
    let mut diags = Diagnostics::new();
    let mut specs = Vec::with_capacity(raw.len());

    for (index, item) in raw.iter().enumerate() {
        match parse_parameter(index, item, scope) {
            Ok(spec) => specs.push(spec),
            Err(errors) => diags.extend(errors),
        }
    }

    diags.finish(Stage::Schema)?;
    Ok(specs)
}

/// Parse one parameter spec, returning every schema violation found in it.
pub fn parse_parameter(
    index: usize,
    item: &Value,
    scope: Scope,
) -> Result<ParameterSpec, Vec<ParameterError>> {
    let Some(object) = item.as_object() else {
        return Err(vec![ParameterError::schema(
            index,
            None,
            format!("expected an object, got {}", json_kind(item)),
        )]);
    };

    let mut reader = SpecReader::new(index, object);
    reader.check_keys(scope);

    let name = reader.name(scope);
    let param_type = reader.param_type(scope);
    let id = match scope {
        Scope::Dashboard => reader.non_empty_string("id"),
        Scope::Query => None,
    };
    let display_name = reader.string("display_name");
    let required = reader.boolean("required").unwrap_or(false);
    let default = reader.default_value();
    let is_multi_select = reader.boolean("isMultiSelect");
    let field_ref = reader.field_ref();
    let values_source = reader.values_source();
    let ui_widget = match scope {
        Scope::Query => reader.ui_widget(),
        Scope::Dashboard => None,
    };
    let temporal_units = reader.string_list("temporal_units");
    let section_override = reader.section_override();

    if !reader.errors.is_empty() {
        return Err(reader.errors);
    }

    // Both are only `None` after an error was recorded.
    let (Some(name), Some(param_type)) = (name, param_type) else {
        return Err(reader.errors);
    };

    Ok(ParameterSpec {
        name,
        param_type,
        id,
        display_name,
        required,
        default,
        is_multi_select,
        field_ref,
        values_source,
        ui_widget,
        temporal_units,
        section_override,
    })
}

/// Parse a batch of dashcards; serde errors become schema violations.
pub fn parse_dashcards(raw: &[Value]) -> CompileResult<Vec<DashCardSpec>> {
    let mut diags = Diagnostics::new();
    let mut cards = Vec::with_capacity(raw.len());

    for (index, item) in raw.iter().enumerate() {
        match serde_json::from_value::<DashCardSpec>(item.clone()) {
            Ok(card) => cards.push(card),
            Err(e) => diags.push(ParameterError::new(
                ErrorKind::SchemaViolation,
                Location::Dashcard { index },
                None,
                e.to_string(),
            )),
        }
    }

    diags.finish(Stage::Schema)?;
    Ok(cards)
}

struct SpecReader<'a> {
    index: usize,
    object: &'a Map<String, Value>,
    /// Best-effort name for error messages, read up front.
    label: Option<&'a str>,
    errors: Vec<ParameterError>,
}

impl<'a> SpecReader<'a> {
    fn new(index: usize, object: &'a Map<String, Value>) -> Self {
        let label = object.get("name").and_then(Value::as_str);
        Self {
            index,
            object,
            label,
            errors: Vec::new(),
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors
            .push(ParameterError::schema(self.index, self.label, message));
    }

    fn check_keys(&mut self, scope: Scope) {
        let scoped: &[&str] = match scope {
            Scope::Query => &["ui_widget"],
            Scope::Dashboard => &["id"],
        };

        let mut unknown = Vec::new();
        for key in self.object.keys() {
            if COMMON_KEYS.contains(&key.as_str()) || scoped.contains(&key.as_str()) {
                continue;
            }
            match (key.as_str(), scope) {
                ("ui_widget", Scope::Dashboard) => {
                    unknown.push("'ui_widget' is only valid for query parameters".to_string())
                }
                ("id", Scope::Query) => unknown
                    .push("'id' cannot be set on query parameters; ids are generated".to_string()),
                _ => unknown.push(format!("unknown key '{}'", key)),
            }
        }

        if self.object.contains_key("field_ref") && self.object.contains_key("field") {
            unknown.push("'field' and 'field_ref' are aliases; give only one".to_string());
        }

        for message in unknown {
            self.error(message);
        }
    }

    // ========================================================================
    // Primitive readers
    // ========================================================================

    /// Value at `key`, treating JSON null as absent.
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.object.get(key).filter(|v| !v.is_null())
    }

    fn string(&mut self, key: &str) -> Option<String> {
        let value = self.get(key)?;
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.error(format!("'{}' must be a string, got {}", key, json_kind(value)));
                None
            }
        }
    }

    fn non_empty_string(&mut self, key: &str) -> Option<String> {
        let s = self.string(key)?;
        if s.trim().is_empty() {
            self.error(format!("'{}' must not be empty", key));
            return None;
        }
        Some(s)
    }

    fn boolean(&mut self, key: &str) -> Option<bool> {
        let value = self.get(key)?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.error(format!("'{}' must be a boolean, got {}", key, json_kind(value)));
                None
            }
        }
    }

    fn string_list(&mut self, key: &str) -> Option<Vec<String>> {
        let value = self.get(key)?;
        let Some(items) = value.as_array() else {
            self.error(format!("'{}' must be a list of strings, got {}", key, json_kind(value)));
            return None;
        };

        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => self.error(format!(
                    "'{}[{}]' must be a string, got {}",
                    key,
                    i,
                    json_kind(item)
                )),
            }
        }
        Some(out)
    }

    // ========================================================================
    // Structured readers
    // ========================================================================

    fn name(&mut self, scope: Scope) -> Option<String> {
        if self.get("name").is_none() {
            self.error("missing required key 'name'");
            return None;
        }
        let name = self.non_empty_string("name")?;

        if scope == Scope::Query && !TAG_NAME.is_match(&name) {
            self.error(format!(
                "query parameter name '{}' must start with a letter and contain only letters, digits and underscores",
                name
            ));
            return None;
        }
        Some(name)
    }

    fn param_type(&mut self, scope: Scope) -> Option<ParameterType> {
        if self.get("type").is_none() {
            self.error("missing required key 'type'");
            return None;
        }
        let raw = self.string("type")?;

        match ParameterType::parse(&raw) {
            Some(ty) if ty.allowed_in(scope) => Some(ty),
            _ => {
                let allowed: Vec<String> = ParameterType::vocabulary(scope)
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                self.error(format!(
                    "unknown {} parameter type '{}'; expected one of: {}",
                    scope,
                    raw,
                    allowed.join(", ")
                ));
                None
            }
        }
    }

    fn default_value(&mut self) -> Option<DefaultValue> {
        let value = self.get("default")?;
        if let Some(items) = value.as_array() {
            let mut scalars = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match scalar(item) {
                    Some(s) => scalars.push(s),
                    None => self.error(format!(
                        "'default[{}]' must be a string or number, got {}",
                        i,
                        json_kind(item)
                    )),
                }
            }
            return Some(DefaultValue::List(scalars));
        }

        match scalar(value) {
            Some(s) => Some(DefaultValue::Single(s)),
            None => {
                self.error(format!(
                    "'default' must be a string, number or list, got {}",
                    json_kind(value)
                ));
                None
            }
        }
    }

    fn field_ref(&mut self) -> Option<FieldRef> {
        let key = if self.object.contains_key("field_ref") {
            "field_ref"
        } else {
            "field"
        };
        let value = self.get(key)?;
        let Some(object) = value.as_object() else {
            self.error(format!("'{}' must be an object, got {}", key, json_kind(value)));
            return None;
        };

        for k in object.keys() {
            if !matches!(k.as_str(), "database_id" | "table_id" | "field_id") {
                self.error(format!("unknown key '{}.{}'", key, k));
            }
        }

        let database_id = self.positive_id(object, key, "database_id");
        let table_id = self.positive_id(object, key, "table_id");
        let field_id = self.positive_id(object, key, "field_id");

        Some(FieldRef {
            database_id: database_id?,
            table_id: table_id?,
            field_id: field_id?,
        })
    }

    fn positive_id(&mut self, object: &Map<String, Value>, parent: &str, key: &str) -> Option<u64> {
        match object.get(key) {
            None | Some(Value::Null) => {
                self.error(format!("'{}.{}' is required", parent, key));
                None
            }
            Some(value) => match value.as_u64().filter(|id| *id > 0) {
                Some(id) => Some(id),
                None => {
                    self.error(format!("'{}.{}' must be a positive integer", parent, key));
                    None
                }
            },
        }
    }

    fn values_source(&mut self) -> Option<ValuesSource> {
        let value = self.get("values_source")?;
        let Some(object) = value.as_object() else {
            self.error(format!(
                "'values_source' must be an object, got {}",
                json_kind(value)
            ));
            return None;
        };

        let Some(kind) = object.get("type").and_then(Value::as_str) else {
            self.error("'values_source.type' is required and must be a string");
            return None;
        };

        match kind {
            "static" => {
                self.only_keys(object, &["type", "values"]);
                let Some(items) = object.get("values").and_then(Value::as_array) else {
                    self.error("'values_source.values' must be a list");
                    return None;
                };
                let mut values = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match scalar(item) {
                        Some(s) => values.push(s),
                        None => self.error(format!(
                            "'values_source.values[{}]' must be a string or number, got {}",
                            i,
                            json_kind(item)
                        )),
                    }
                }
                Some(ValuesSource::Static { values })
            }
            "cross_query" | "card" => {
                self.only_keys(
                    object,
                    &["type", "query_id", "card_id", "value_field", "label_field"],
                );
                let query_id = object
                    .get("query_id")
                    .or_else(|| object.get("card_id"))
                    .and_then(Value::as_u64)
                    .filter(|id| *id > 0);
                if query_id.is_none() {
                    self.error("'values_source.query_id' is required and must be a positive integer");
                }

                let value_field = object.get("value_field").and_then(Value::as_str);
                if value_field.is_none() {
                    self.error("'values_source.value_field' is required and must be a string");
                }

                let label_field = match object.get("label_field") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => {
                        self.error(format!(
                            "'values_source.label_field' must be a string, got {}",
                            json_kind(other)
                        ));
                        None
                    }
                };

                Some(ValuesSource::CrossQuery {
                    query_id: query_id?,
                    value_field: value_field?.to_string(),
                    label_field,
                })
            }
            "connected" => {
                self.only_keys(object, &["type"]);
                Some(ValuesSource::Connected)
            }
            other => {
                self.error(format!(
                    "unknown values_source type '{}'; expected static, cross_query or connected",
                    other
                ));
                None
            }
        }
    }

    fn only_keys(&mut self, object: &Map<String, Value>, allowed: &[&str]) {
        for k in object.keys() {
            if !allowed.contains(&k.as_str()) {
                self.error(format!("unknown key 'values_source.{}'", k));
            }
        }
    }

    fn ui_widget(&mut self) -> Option<UiWidget> {
        let raw = self.string("ui_widget")?;
        let widget = UiWidget::parse(&raw);
        if widget.is_none() {
            self.error(format!(
                "unknown ui_widget '{}'; expected input, dropdown or search",
                raw
            ));
        }
        widget
    }

    fn section_override(&mut self) -> Option<SectionId> {
        let raw = self.string("section_override")?;
        let section = SectionId::parse(&raw);
        if section.is_none() {
            let allowed: Vec<&str> = SectionId::ALL.iter().map(SectionId::as_str).collect();
            self.error(format!(
                "unknown section_override '{}'; expected one of: {}",
                raw,
                allowed.join(", ")
            ));
        }
        section
    }
}

fn scalar(value: &Value) -> Option<Scalar> {
    match value {
        Value::String(s) => Some(Scalar::Text(s.clone())),
        Value::Number(n) => Some(Scalar::Number(n.clone())),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
