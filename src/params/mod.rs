//! Caller-facing parameter descriptions.
//!
//! A [`ParameterSpec`] is the name-addressed, human-authored description of a
//! single filter. Specs are never built by hand from JSON maps; they come out
//! of the validating constructors in [`schema`], which reject anything outside
//! the closed vocabularies defined here.
//!
//! ```text
//! raw JSON ──[schema]──▶ ParameterSpec ──[rules]──▶ ──[references]──▶ compiled
//! ```

pub mod schema;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which compilation unit a parameter belongs to.
///
/// Query-scoped parameters are embedded in a native query's text as
/// template tags; dashboard-scoped parameters live on a dashboard and reach
/// queries only through dashcard mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Query,
    Dashboard,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Query => write!(f, "query"),
            Scope::Dashboard => write!(f, "dashboard"),
        }
    }
}

// ============================================================================
// Parameter types
// ============================================================================

/// Text comparison operators shared by `string/*` and `location/*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringOp {
    Equals,
    NotEquals,
    Contains,
    DoesNotContain,
    StartsWith,
    EndsWith,
}

impl StringOp {
    pub const ALL: [StringOp; 6] = [
        StringOp::Equals,
        StringOp::NotEquals,
        StringOp::Contains,
        StringOp::DoesNotContain,
        StringOp::StartsWith,
        StringOp::EndsWith,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StringOp::Equals => "=",
            StringOp::NotEquals => "!=",
            StringOp::Contains => "contains",
            StringOp::DoesNotContain => "does-not-contain",
            StringOp::StartsWith => "starts-with",
            StringOp::EndsWith => "ends-with",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberOp {
    Equals,
    NotEquals,
    Between,
    GreaterOrEqual,
    LessOrEqual,
}

impl NumberOp {
    pub const ALL: [NumberOp; 5] = [
        NumberOp::Equals,
        NumberOp::NotEquals,
        NumberOp::Between,
        NumberOp::GreaterOrEqual,
        NumberOp::LessOrEqual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NumberOp::Equals => "=",
            NumberOp::NotEquals => "!=",
            NumberOp::Between => "between",
            NumberOp::GreaterOrEqual => ">=",
            NumberOp::LessOrEqual => "<=",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateOp {
    Single,
    Range,
    Relative,
    AllOptions,
    MonthYear,
    QuarterYear,
}

impl DateOp {
    pub const ALL: [DateOp; 6] = [
        DateOp::Single,
        DateOp::Range,
        DateOp::Relative,
        DateOp::AllOptions,
        DateOp::MonthYear,
        DateOp::QuarterYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DateOp::Single => "single",
            DateOp::Range => "range",
            DateOp::Relative => "relative",
            DateOp::AllOptions => "all-options",
            DateOp::MonthYear => "month-year",
            DateOp::QuarterYear => "quarter-year",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == s)
    }
}

/// Declared parameter type, spanning both scopes.
///
/// Not every variant is legal in every scope; see [`ParameterType::allowed_in`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    /// Free text variable (`category`). Query scope only.
    Category,
    String(StringOp),
    /// Geography filters. Dashboard scope only; compiled onto `string/*`.
    Location(StringOp),
    Number(NumberOp),
    Date(DateOp),
    /// Temporal grouping (`temporal-unit`). Dashboard scope only.
    TemporalUnit,
    /// Entity identifier (`id`). Dashboard scope only.
    Id,
}

impl ParameterType {
    /// Parse a host type string such as `"string/contains"`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "category" => return Some(ParameterType::Category),
            "temporal-unit" => return Some(ParameterType::TemporalUnit),
            "id" => return Some(ParameterType::Id),
            _ => {}
        }

        let (family, op) = s.split_once('/')?;
        match family {
            "string" => StringOp::parse(op).map(ParameterType::String),
            "location" => StringOp::parse(op).map(ParameterType::Location),
            "number" => NumberOp::parse(op).map(ParameterType::Number),
            "date" => DateOp::parse(op).map(ParameterType::Date),
            _ => None,
        }
    }

    /// Whether this type may be declared in the given scope.
    pub fn allowed_in(&self, scope: Scope) -> bool {
        match (self, scope) {
            (ParameterType::Category, Scope::Query) => true,
            (ParameterType::Category, Scope::Dashboard) => false,
            (ParameterType::Location(_), Scope::Query) => false,
            (ParameterType::TemporalUnit, Scope::Query) => false,
            (ParameterType::Id, Scope::Query) => false,
            _ => true,
        }
    }

    /// Every type legal in `scope`, in documentation order.
    pub fn vocabulary(scope: Scope) -> Vec<ParameterType> {
        let mut all = vec![ParameterType::Category];
        all.extend(StringOp::ALL.into_iter().map(ParameterType::String));
        all.extend(StringOp::ALL.into_iter().map(ParameterType::Location));
        all.extend(NumberOp::ALL.into_iter().map(ParameterType::Number));
        all.extend(DateOp::ALL.into_iter().map(ParameterType::Date));
        all.push(ParameterType::TemporalUnit);
        all.push(ParameterType::Id);
        all.retain(|t| t.allowed_in(scope));
        all
    }

    pub fn is_date(&self) -> bool {
        matches!(self, ParameterType::Date(_))
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterType::Category => write!(f, "category"),
            ParameterType::String(op) => write!(f, "string/{}", op.as_str()),
            ParameterType::Location(op) => write!(f, "location/{}", op.as_str()),
            ParameterType::Number(op) => write!(f, "number/{}", op.as_str()),
            ParameterType::Date(op) => write!(f, "date/{}", op.as_str()),
            ParameterType::TemporalUnit => write!(f, "temporal-unit"),
            ParameterType::Id => write!(f, "id"),
        }
    }
}

impl Serialize for ParameterType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// Temporal units
// ============================================================================

/// Grouping units accepted by `temporal-unit` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
    MinuteOfHour,
    HourOfDay,
    DayOfWeek,
    DayOfMonth,
    DayOfYear,
    WeekOfYear,
    MonthOfYear,
    QuarterOfYear,
}

impl TemporalUnit {
    pub const ALL: [TemporalUnit; 15] = [
        TemporalUnit::Minute,
        TemporalUnit::Hour,
        TemporalUnit::Day,
        TemporalUnit::Week,
        TemporalUnit::Month,
        TemporalUnit::Quarter,
        TemporalUnit::Year,
        TemporalUnit::MinuteOfHour,
        TemporalUnit::HourOfDay,
        TemporalUnit::DayOfWeek,
        TemporalUnit::DayOfMonth,
        TemporalUnit::DayOfYear,
        TemporalUnit::WeekOfYear,
        TemporalUnit::MonthOfYear,
        TemporalUnit::QuarterOfYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemporalUnit::Minute => "minute",
            TemporalUnit::Hour => "hour",
            TemporalUnit::Day => "day",
            TemporalUnit::Week => "week",
            TemporalUnit::Month => "month",
            TemporalUnit::Quarter => "quarter",
            TemporalUnit::Year => "year",
            TemporalUnit::MinuteOfHour => "minute-of-hour",
            TemporalUnit::HourOfDay => "hour-of-day",
            TemporalUnit::DayOfWeek => "day-of-week",
            TemporalUnit::DayOfMonth => "day-of-month",
            TemporalUnit::DayOfYear => "day-of-year",
            TemporalUnit::WeekOfYear => "week-of-year",
            TemporalUnit::MonthOfYear => "month-of-year",
            TemporalUnit::QuarterOfYear => "quarter-of-year",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.as_str() == s)
    }
}

impl Serialize for TemporalUnit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Sections and widgets
// ============================================================================

/// UI grouping a parameter is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionId {
    String,
    Location,
    Number,
    Date,
    TemporalUnit,
    Id,
}

impl SectionId {
    pub const ALL: [SectionId; 6] = [
        SectionId::String,
        SectionId::Location,
        SectionId::Number,
        SectionId::Date,
        SectionId::TemporalUnit,
        SectionId::Id,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionId::String => "string",
            SectionId::Location => "location",
            SectionId::Number => "number",
            SectionId::Date => "date",
            SectionId::TemporalUnit => "temporal-unit",
            SectionId::Id => "id",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.as_str() == s)
    }
}

impl Serialize for SectionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Input widget for a query-scoped parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiWidget {
    Input,
    Dropdown,
    Search,
}

impl UiWidget {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "input" => Some(UiWidget::Input),
            "dropdown" => Some(UiWidget::Dropdown),
            "search" => Some(UiWidget::Search),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UiWidget::Input => "input",
            UiWidget::Dropdown => "dropdown",
            UiWidget::Search => "search",
        }
    }
}

// ============================================================================
// References and values
// ============================================================================

/// Column a field-filter parameter is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub database_id: u64,
    pub table_id: u64,
    pub field_id: u64,
}

/// A single scalar accepted in defaults and static value lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl Scalar {
    /// String form used by the host for list options.
    pub fn to_option_string(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Number(n) => n.to_string(),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Scalar::Number(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Scalar::Text(_))
    }
}

/// Default value as declared; its shape is checked against the resolved
/// multiplicity by the business-rule stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Single(Scalar),
    List(Vec<Scalar>),
}

impl DefaultValue {
    /// Empty text or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            DefaultValue::Single(Scalar::Text(s)) => s.is_empty(),
            DefaultValue::Single(Scalar::Number(_)) => false,
            DefaultValue::List(items) => items.is_empty(),
        }
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            DefaultValue::Single(Scalar::Text(_)) => "string",
            DefaultValue::Single(Scalar::Number(_)) => "number",
            DefaultValue::List(_) => "list",
        }
    }
}

/// Where the selectable values of a parameter come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ValuesSource {
    Static {
        values: Vec<Scalar>,
    },
    /// Values read from another saved query's output columns.
    CrossQuery {
        query_id: u64,
        value_field: String,
        label_field: Option<String>,
    },
    /// Values inferred by the host from the bound field.
    Connected,
}

impl ValuesSource {
    pub fn kind(&self) -> &'static str {
        match self {
            ValuesSource::Static { .. } => "static",
            ValuesSource::CrossQuery { .. } => "cross_query",
            ValuesSource::Connected => "connected",
        }
    }
}

// ============================================================================
// ParameterSpec
// ============================================================================

/// A validated, name-addressed parameter description.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    /// Identity within a compilation unit. For query scope this is also the
    /// literal token used in the query text.
    pub name: String,
    pub param_type: ParameterType,
    /// Caller-chosen id (dashboard scope only).
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub is_multi_select: Option<bool>,
    pub field_ref: Option<FieldRef>,
    pub values_source: Option<ValuesSource>,
    pub ui_widget: Option<UiWidget>,
    /// Unit names as written; checked against [`TemporalUnit`] by the rules stage.
    pub temporal_units: Option<Vec<String>>,
    pub section_override: Option<SectionId>,
}

impl ParameterSpec {
    /// Bare spec with every optional attribute unset.
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            id: None,
            display_name: None,
            required: false,
            default: None,
            is_multi_select: None,
            field_ref: None,
            values_source: None,
            ui_widget: None,
            temporal_units: None,
            section_override: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

// ============================================================================
// Dashcards
// ============================================================================

/// A dashboard-parameter to query-parameter pair, both addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingSpec {
    pub dashboard_parameter_name: String,
    pub query_parameter_name: String,
}

/// Placement of one query on the dashboard grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashCardSpec {
    /// Existing dashcard id; absent for new placements.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(alias = "card_id")]
    pub query_id: u64,
    pub col: i64,
    pub row: i64,
    pub size_x: i64,
    pub size_y: i64,
    #[serde(default)]
    pub dashboard_tab_id: Option<i64>,
    #[serde(default)]
    pub parameter_mappings: Vec<MappingSpec>,
}
