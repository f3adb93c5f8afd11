//! Resolution of declarative value sources into the host's binding shape.

use serde::Serialize;
use serde_json::{json, Value};

use crate::classify::Classification;
use crate::params::{ParameterSpec, ParameterType, UiWidget, ValuesSource};

/// How the host offers values for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValuesQueryType {
    None,
    List,
    Search,
}

impl From<UiWidget> for ValuesQueryType {
    fn from(widget: UiWidget) -> Self {
        match widget {
            UiWidget::Input => ValuesQueryType::None,
            UiWidget::Dropdown => ValuesQueryType::List,
            UiWidget::Search => ValuesQueryType::Search,
        }
    }
}

/// A value source in host terms.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedSource {
    /// Options as singleton lists of strings.
    StaticList { values: Vec<Vec<String>> },
    /// Options read from another query's result columns.
    Card {
        card_id: u64,
        value_field: String,
        label_field: Option<String>,
    },
    /// Options inferred by the host from the bound field.
    Connected,
}

impl ResolvedSource {
    /// `values_source_type` on the wire; `None` for connected sources.
    pub fn source_type(&self) -> Option<&'static str> {
        match self {
            ResolvedSource::StaticList { .. } => Some("static-list"),
            ResolvedSource::Card { .. } => Some("card"),
            ResolvedSource::Connected => None,
        }
    }

    /// `values_source_config` on the wire.
    pub fn config(&self) -> Value {
        match self {
            ResolvedSource::StaticList { values } => json!({ "values": values }),
            ResolvedSource::Card {
                card_id,
                value_field,
                label_field,
            } => {
                let mut config = json!({
                    "card_id": card_id,
                    "value_field": field_clause(value_field),
                });
                if let Some(label) = label_field {
                    config["label_field"] = field_clause(label);
                }
                config
            }
            ResolvedSource::Connected => json!({}),
        }
    }
}

/// Column reference into a saved query's result metadata.
fn field_clause(name: &str) -> Value {
    json!(["field", name, {"base-type": "type/Text"}])
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValues {
    pub values_query_type: ValuesQueryType,
    pub source: Option<ResolvedSource>,
}

impl ResolvedValues {
    pub fn none() -> Self {
        Self {
            values_query_type: ValuesQueryType::None,
            source: None,
        }
    }

    pub fn values_source_type(&self) -> Option<&'static str> {
        self.source.as_ref().and_then(ResolvedSource::source_type)
    }

    pub fn values_source_config(&self) -> Option<Value> {
        self.source.as_ref().map(ResolvedSource::config)
    }

    pub fn is_static(&self) -> bool {
        matches!(self.source, Some(ResolvedSource::StaticList { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValuesSourceError {
    #[error("static values source requires a non-empty 'values' list")]
    EmptyStatic,

    #[error("connected values source is only valid for field filters, not '{0}'")]
    ConnectedRequiresFieldFilter(ParameterType),

    #[error("'input' widget takes free text and cannot have a values_source")]
    InputWithSource,
}

/// Resolve `spec.values_source` (and, in query scope, `spec.ui_widget`).
///
/// Without a widget the query type follows the source: static and connected
/// sources list values, cross-query sources search them.
pub fn resolve(
    spec: &ParameterSpec,
    class: &Classification,
) -> Result<ResolvedValues, ValuesSourceError> {
    let source = match &spec.values_source {
        None => None,
        Some(ValuesSource::Static { values }) => {
            if values.is_empty() {
                return Err(ValuesSourceError::EmptyStatic);
            }
            Some(ResolvedSource::StaticList {
                values: values.iter().map(|v| vec![v.to_option_string()]).collect(),
            })
        }
        Some(ValuesSource::CrossQuery {
            query_id,
            value_field,
            label_field,
        }) => Some(ResolvedSource::Card {
            card_id: *query_id,
            value_field: value_field.clone(),
            label_field: label_field.clone(),
        }),
        Some(ValuesSource::Connected) => {
            if !class.is_field_filter() {
                return Err(ValuesSourceError::ConnectedRequiresFieldFilter(
                    spec.param_type,
                ));
            }
            Some(ResolvedSource::Connected)
        }
    };

    let values_query_type = match (spec.ui_widget, &source) {
        (Some(UiWidget::Input), Some(_)) => return Err(ValuesSourceError::InputWithSource),
        (Some(widget), _) => widget.into(),
        (None, None) => ValuesQueryType::None,
        (None, Some(ResolvedSource::Card { .. })) => ValuesQueryType::Search,
        (None, Some(_)) => ValuesQueryType::List,
    };

    Ok(ResolvedValues {
        values_query_type,
        source,
    })
}
