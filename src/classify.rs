//! Structural classification of parameter types.
//!
//! Classification is a fixed table keyed by the declared type and scope. It
//! decides whether a parameter is a plain value substituted into the query
//! (simple) or a boolean condition on a column (field filter), what its
//! binding looks like, which UI section it belongs to, and how multi-select
//! behaves for it.

use serde::Serialize;

use crate::params::{NumberOp, ParameterSpec, ParameterType, Scope, SectionId, StringOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Simple,
    FieldFilter,
}

/// Kind of template-tag target a parameter points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Variable,
    Dimension,
}

/// Template-tag `type` of a query binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Text,
    Number,
    Date,
    Dimension,
}

/// Shape of the values a parameter accepts; drives default checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueDomain {
    Text,
    Number,
    /// Exactly two numbers (`number/between`).
    NumberRange,
    Date,
    TemporalUnit,
    /// Strings or numbers.
    Identifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub target_kind: TargetKind,
    pub tag_kind: TagKind,
    pub section_id: SectionId,
    /// Type string emitted on the wire; geography types collapse onto `string/*`.
    pub wire_type: ParameterType,
    pub multi_select_allowed: bool,
    /// Multiplicity used when the spec leaves `isMultiSelect` unset.
    pub multi_select_default: bool,
    pub domain: ValueDomain,
}

impl Classification {
    pub fn is_field_filter(&self) -> bool {
        self.category == Category::FieldFilter
    }

    /// Resolved multiplicity for an explicit (or absent) `isMultiSelect`.
    pub fn resolve_multi_select(&self, explicit: Option<bool>) -> bool {
        explicit.unwrap_or(self.multi_select_default)
    }
}

/// `field_ref` presence disagrees with the parameter's category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("field_ref required: '{0}' is a field filter and must name the column it filters")]
    FieldRefRequired(ParameterType),

    #[error("field_ref forbidden: '{0}' is a simple parameter and binds no column")]
    FieldRefForbidden(ParameterType),

    #[error("field_ref forbidden: dashboard parameters bind to columns through dashcard mappings")]
    FieldRefOnDashboard,
}

/// Classify a spec and check its `field_ref` against the result.
pub fn classify(spec: &ParameterSpec, scope: Scope) -> Result<Classification, ClassifyError> {
    let class = classify_type(spec.param_type, scope);

    match (scope, class.category, spec.field_ref.is_some()) {
        (Scope::Dashboard, _, true) => Err(ClassifyError::FieldRefOnDashboard),
        (Scope::Query, Category::FieldFilter, false) => {
            Err(ClassifyError::FieldRefRequired(spec.param_type))
        }
        (Scope::Query, Category::Simple, true) => {
            Err(ClassifyError::FieldRefForbidden(spec.param_type))
        }
        _ => Ok(class),
    }
}

/// Pure table lookup, no spec-level checks.
pub fn classify_type(ty: ParameterType, scope: Scope) -> Classification {
    match scope {
        Scope::Query => query_table(ty),
        Scope::Dashboard => dashboard_table(ty),
    }
}

fn simple(tag_kind: TagKind, section_id: SectionId, ty: ParameterType, domain: ValueDomain) -> Classification {
    Classification {
        category: Category::Simple,
        target_kind: TargetKind::Variable,
        tag_kind,
        section_id,
        wire_type: ty,
        multi_select_allowed: false,
        multi_select_default: false,
        domain,
    }
}

fn field_filter(section_id: SectionId, ty: ParameterType, domain: ValueDomain) -> Classification {
    Classification {
        category: Category::FieldFilter,
        target_kind: TargetKind::Dimension,
        tag_kind: TagKind::Dimension,
        section_id,
        wire_type: ty,
        multi_select_allowed: false,
        multi_select_default: false,
        domain,
    }
}

fn number_domain(op: NumberOp) -> ValueDomain {
    match op {
        NumberOp::Between => ValueDomain::NumberRange,
        _ => ValueDomain::Number,
    }
}

/// Query scope: `category`, `number/=` and `date/single` are plain variables;
/// everything else filters a column. Nothing is multi-select unless asked.
fn query_table(ty: ParameterType) -> Classification {
    match ty {
        ParameterType::Category => simple(TagKind::Text, SectionId::String, ty, ValueDomain::Text),
        ParameterType::Number(NumberOp::Equals) => {
            simple(TagKind::Number, SectionId::Number, ty, ValueDomain::Number)
        }
        ParameterType::Date(crate::params::DateOp::Single) => {
            simple(TagKind::Date, SectionId::Date, ty, ValueDomain::Date)
        }
        // Pattern matches take a single term.
        ParameterType::String(op) => Classification {
            multi_select_allowed: matches!(op, StringOp::Equals | StringOp::NotEquals),
            ..field_filter(SectionId::String, ty, ValueDomain::Text)
        },
        ParameterType::Number(op) => Classification {
            multi_select_allowed: op == NumberOp::NotEquals,
            ..field_filter(SectionId::Number, ty, number_domain(op))
        },
        ParameterType::Date(_) => field_filter(SectionId::Date, ty, ValueDomain::Date),
        // Not in the query vocabulary; the schema stage rejects these first.
        ParameterType::Location(op) => Classification {
            wire_type: ParameterType::String(op),
            ..field_filter(SectionId::Location, ty, ValueDomain::Text)
        },
        ParameterType::TemporalUnit => simple(
            TagKind::Text,
            SectionId::TemporalUnit,
            ty,
            ValueDomain::TemporalUnit,
        ),
        ParameterType::Id => field_filter(SectionId::Id, ty, ValueDomain::Identifier),
    }
}

/// Dashboard scope: every filter type is multi-select by default where the
/// host supports it; dates, ranges and temporal grouping never are.
fn dashboard_table(ty: ParameterType) -> Classification {
    let multi = |class: Classification| Classification {
        multi_select_allowed: true,
        multi_select_default: true,
        ..class
    };

    match ty {
        ParameterType::String(_) => multi(field_filter(SectionId::String, ty, ValueDomain::Text)),
        ParameterType::Location(op) => multi(Classification {
            wire_type: ParameterType::String(op),
            ..field_filter(SectionId::Location, ty, ValueDomain::Text)
        }),
        ParameterType::Number(op @ (NumberOp::Equals | NumberOp::NotEquals)) => {
            multi(field_filter(SectionId::Number, ty, number_domain(op)))
        }
        ParameterType::Number(op) => field_filter(SectionId::Number, ty, number_domain(op)),
        ParameterType::Date(_) => field_filter(SectionId::Date, ty, ValueDomain::Date),
        ParameterType::Id => multi(field_filter(SectionId::Id, ty, ValueDomain::Identifier)),
        ParameterType::TemporalUnit => simple(
            TagKind::Text,
            SectionId::TemporalUnit,
            ty,
            ValueDomain::TemporalUnit,
        ),
        // Not in the dashboard vocabulary; the schema stage rejects it first.
        ParameterType::Category => simple(TagKind::Text, SectionId::String, ty, ValueDomain::Text),
    }
}

/// Whether `ty` is one of the text filters a search widget can drive.
pub fn supports_search(ty: ParameterType) -> bool {
    matches!(
        ty,
        ParameterType::Category
            | ParameterType::String(StringOp::Contains)
            | ParameterType::String(StringOp::StartsWith)
            | ParameterType::String(StringOp::EndsWith)
    )
}
