//! Business-rule stage.
//!
//! Runs over a whole batch of schema-valid specs and records every rule
//! violation before failing. A spec that passes produces a [`Plan`]: the
//! classification and resolved attributes the emit step builds from.

use std::collections::{HashMap, HashSet};

use super::{CompileResult, Diagnostics, ParameterError, Stage};
use crate::classify::{self, supports_search, Classification, ValueDomain};
use crate::params::{
    DateOp, DefaultValue, ParameterSpec, ParameterType, Scalar, Scope, SectionId, TemporalUnit,
    UiWidget,
};
use crate::slug::base_slug;
use crate::values_source::{self, ResolvedValues};

/// Names whose slug would shadow the dashboard's own `tab` URL parameter.
pub const RESERVED_SLUG: &str = "tab";

/// Everything later stages need to know about one spec.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub classification: Classification,
    /// Resolved multiplicity.
    pub multi_select: bool,
    pub section_id: SectionId,
    pub values: ResolvedValues,
    /// Declared units, deduplicated in order (temporal-unit parameters only).
    pub temporal_units: Option<Vec<TemporalUnit>>,
}

/// Check every spec in `specs`; on success return one plan per spec, in order.
pub fn check_business_rules(specs: &[ParameterSpec], scope: Scope) -> CompileResult<Vec<Plan>> {
    tracing::debug!(%scope, count = specs.len(), "business rules stage");

    let mut diags = Diagnostics::new();
    check_unique_names(specs, &mut diags);
    if scope == Scope::Dashboard {
        check_unique_ids(specs, &mut diags);
    }

    let mut plans = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        let mut checker = RuleChecker {
            index,
            spec,
            scope,
            diags: &mut diags,
        };
        plans.push(checker.check());
    }

    diags.finish(Stage::BusinessRules)?;
    Ok(plans)
}

fn check_unique_names(specs: &[ParameterSpec], diags: &mut Diagnostics) {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for (index, spec) in specs.iter().enumerate() {
        if let Some(first) = first_seen.get(spec.name.as_str()) {
            diags.push(ParameterError::business(
                index,
                &spec.name,
                format!("duplicate parameter name '{}' (first used by parameter {})", spec.name, first),
            ));
        } else {
            first_seen.insert(&spec.name, index);
        }
    }
}

fn check_unique_ids(specs: &[ParameterSpec], diags: &mut Diagnostics) {
    let mut seen = HashSet::new();
    for (index, spec) in specs.iter().enumerate() {
        if let Some(id) = &spec.id {
            if !seen.insert(id.as_str()) {
                diags.push(ParameterError::business(
                    index,
                    &spec.name,
                    format!("duplicate parameter id '{}'", id),
                ));
            }
        }
    }
}

struct RuleChecker<'a> {
    index: usize,
    spec: &'a ParameterSpec,
    scope: Scope,
    diags: &'a mut Diagnostics,
}

impl RuleChecker<'_> {
    fn error(&mut self, message: impl Into<String>) {
        self.diags
            .push(ParameterError::business(self.index, &self.spec.name, message));
    }

    /// Runs every rule. The returned plan is only used if the stage passes.
    fn check(&mut self) -> Plan {
        let spec = self.spec;

        if base_slug(&spec.name) == RESERVED_SLUG {
            self.error(format!(
                "name '{}' is reserved: slug '{}' is used by dashboard tabs",
                spec.name, RESERVED_SLUG
            ));
        }

        // Table lookup never fails; the field_ref check is reported but the
        // remaining rules still run against the looked-up classification.
        let classification = match classify::classify(spec, self.scope) {
            Ok(class) => class,
            Err(e) => {
                self.error(e.to_string());
                classify::classify_type(spec.param_type, self.scope)
            }
        };

        let multi_select = self.check_multi_select(&classification);
        let temporal_units = self.check_temporal_units();
        self.check_default(&classification, multi_select, temporal_units.as_deref());
        self.check_required(multi_select);
        if self.scope == Scope::Query {
            self.check_widget();
        }

        let values = match values_source::resolve(spec, &classification) {
            Ok(values) => values,
            Err(e) => {
                self.error(e.to_string());
                ResolvedValues::none()
            }
        };

        Plan {
            classification,
            multi_select,
            section_id: spec.section_override.unwrap_or(classification.section_id),
            values,
            temporal_units,
        }
    }

    fn check_multi_select(&mut self, class: &Classification) -> bool {
        if self.spec.is_multi_select == Some(true) && !class.multi_select_allowed {
            self.error(format!(
                "isMultiSelect is not supported for '{}' parameters",
                self.spec.param_type
            ));
            return false;
        }
        class.resolve_multi_select(self.spec.is_multi_select)
    }

    fn check_temporal_units(&mut self) -> Option<Vec<TemporalUnit>> {
        let spec = self.spec;
        let declared = spec.temporal_units.as_ref();

        if spec.param_type != ParameterType::TemporalUnit {
            if declared.is_some() {
                self.error("'temporal_units' is only valid for temporal-unit parameters");
            }
            return None;
        }

        let Some(declared) = declared.filter(|units| !units.is_empty()) else {
            self.error("temporal-unit parameter requires a non-empty 'temporal_units' list");
            return None;
        };

        let mut units = Vec::with_capacity(declared.len());
        let mut invalid = Vec::new();
        for raw in declared {
            match TemporalUnit::parse(raw) {
                Some(unit) if !units.contains(&unit) => units.push(unit),
                Some(_) => {}
                None => invalid.push(raw.as_str()),
            }
        }

        if !invalid.is_empty() {
            let valid: Vec<&str> = TemporalUnit::ALL.iter().map(TemporalUnit::as_str).collect();
            self.error(format!(
                "invalid temporal unit(s) {}; valid units: {}",
                invalid.iter().map(|u| format!("'{}'", u)).collect::<Vec<_>>().join(", "),
                valid.join(", ")
            ));
            return None;
        }
        Some(units)
    }

    fn check_default(
        &mut self,
        class: &Classification,
        multi_select: bool,
        units: Option<&[TemporalUnit]>,
    ) {
        let spec = self.spec;
        let Some(default) = &spec.default else {
            return;
        };
        let ty = spec.param_type;

        if multi_select {
            let DefaultValue::List(items) = default else {
                self.error(format!(
                    "multi-select parameter default must be a list, got {}",
                    default.shape_name()
                ));
                return;
            };
            if !items.iter().all(|item| scalar_fits(class.domain, item)) {
                self.error(format!(
                    "multi-select '{}' parameter default must be a list of {}",
                    ty,
                    domain_noun(class.domain)
                ));
            }
            return;
        }

        match (class.domain, default) {
            (ValueDomain::NumberRange, DefaultValue::List(items))
                if items.len() == 2 && items.iter().all(Scalar::is_number) => {}
            (ValueDomain::NumberRange, _) => {
                self.error(format!("'{}' parameter default must be a list of two numbers", ty));
            }
            (ValueDomain::TemporalUnit, DefaultValue::Single(Scalar::Text(unit))) => {
                match TemporalUnit::parse(unit) {
                    None => self.error(format!("default '{}' is not a valid temporal unit", unit)),
                    Some(parsed) => {
                        if units.is_some_and(|declared| !declared.contains(&parsed)) {
                            self.error(format!(
                                "default '{}' is not one of the declared temporal_units",
                                unit
                            ));
                        }
                    }
                }
            }
            (domain, DefaultValue::Single(item)) if scalar_fits(domain, item) => {}
            (domain, _) => {
                self.error(format!(
                    "'{}' parameter default must be a single {}, got {}",
                    ty,
                    domain_noun_singular(domain),
                    default.shape_name()
                ));
            }
        }
    }

    fn check_required(&mut self, multi_select: bool) {
        let spec = self.spec;
        if !spec.required {
            return;
        }
        match &spec.default {
            None => self.error("required parameter must have a default value"),
            Some(default) if default.is_empty() => {
                let shape = if multi_select { "list" } else { "value" };
                self.error(format!("required parameter must have a non-empty default {}", shape));
            }
            Some(_) => {}
        }
    }

    fn check_widget(&mut self) {
        let ty = self.spec.param_type;
        let widget = self.spec.ui_widget;
        match widget {
            Some(UiWidget::Search) if !supports_search(ty) => self.error(format!(
                "'search' widget is only available for category, string/contains, string/starts-with and string/ends-with, not '{}'",
                ty
            )),
            Some(UiWidget::Dropdown) if ty.is_date() && ty != ParameterType::Date(DateOp::Single) => {
                self.error(format!("'dropdown' widget is not available for '{}'", ty))
            }
            _ => {}
        }
    }
}

fn scalar_fits(domain: ValueDomain, item: &Scalar) -> bool {
    match domain {
        ValueDomain::Number | ValueDomain::NumberRange => item.is_number(),
        ValueDomain::Identifier => true,
        ValueDomain::Text | ValueDomain::Date | ValueDomain::TemporalUnit => item.is_text(),
    }
}

fn domain_noun(domain: ValueDomain) -> &'static str {
    match domain {
        ValueDomain::Number | ValueDomain::NumberRange => "numbers",
        ValueDomain::Identifier => "strings or numbers",
        ValueDomain::Text | ValueDomain::Date | ValueDomain::TemporalUnit => "strings",
    }
}

fn domain_noun_singular(domain: ValueDomain) -> &'static str {
    match domain {
        ValueDomain::Number | ValueDomain::NumberRange => "number",
        ValueDomain::Identifier => "string or number",
        ValueDomain::Date => "date string",
        ValueDomain::Text | ValueDomain::TemporalUnit => "string",
    }
}
