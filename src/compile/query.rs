//! Query-scoped parameter compilation.

use serde_json::Value;

use super::output::{BindingTag, CompiledParameter, ParameterTarget, QueryParameters};
use super::CompileOptions;
use crate::classify::{TargetKind, TagKind};
use crate::ids::IdAllocator;
use crate::metadata::MetadataProvider;
use crate::params::{
    schema, DefaultValue, NumberOp, ParameterSpec, ParameterType, Scalar, Scope, UiWidget,
};
use crate::slug::SlugSet;
use crate::validation::{check_business_rules, CompileResult, Plan, ReferenceValidator};

/// Compiles the parameters of one native query.
///
/// # Example
///
/// ```ignore
/// use trellis::compile::{CompileOptions, QueryParameterCompiler};
///
/// let compiler = QueryParameterCompiler::new(&provider, CompileOptions::default());
/// let compiled = compiler.compile(&raw_specs).await?;
/// assert_eq!(compiled.parameters[0].id, compiled.binding_tags[0].id);
/// ```
pub struct QueryParameterCompiler<'a, P: MetadataProvider + ?Sized> {
    provider: &'a P,
    options: CompileOptions,
}

impl<'a, P: MetadataProvider + ?Sized> QueryParameterCompiler<'a, P> {
    pub fn new(provider: &'a P, options: CompileOptions) -> Self {
        Self { provider, options }
    }

    /// Run every stage, starting from raw JSON specs.
    pub async fn compile(&self, raw: &[Value]) -> CompileResult<QueryParameters> {
        let specs = schema::parse_parameters(raw, Scope::Query)?;
        self.compile_specs(&specs).await
    }

    /// Run the business, reference and emit stages over already-parsed specs.
    pub async fn compile_specs(&self, specs: &[ParameterSpec]) -> CompileResult<QueryParameters> {
        let plans = check_business_rules(specs, Scope::Query)?;
        ReferenceValidator::new(self.provider, self.options.max_concurrent_lookups)
            .validate(specs)
            .await?;

        let compiled = emit(specs, &plans, &mut IdAllocator::new(Scope::Query));
        tracing::info!(parameters = compiled.parameters.len(), "compiled query parameters");
        Ok(compiled)
    }
}

/// Convenience wrapper over [`QueryParameterCompiler::compile`].
pub async fn compile_query_parameters<P: MetadataProvider + ?Sized>(
    raw: &[Value],
    provider: &P,
    options: CompileOptions,
) -> CompileResult<QueryParameters> {
    QueryParameterCompiler::new(provider, options).compile(raw).await
}

/// Build parameters and binding tags for validated specs.
///
/// Each pair shares one allocated id.
pub(crate) fn emit(specs: &[ParameterSpec], plans: &[Plan], ids: &mut IdAllocator) -> QueryParameters {
    let mut slugs = SlugSet::new();
    let mut out = QueryParameters::default();

    for (spec, plan) in specs.iter().zip(plans) {
        let class = &plan.classification;
        let id = ids.allocate();
        let default = wire_default(spec, plan);

        let target = match class.target_kind {
            TargetKind::Variable => ParameterTarget::variable(&spec.name),
            TargetKind::Dimension => ParameterTarget::dimension(&spec.name),
        };
        let is_dimension = class.tag_kind == TagKind::Dimension;

        out.binding_tags.push(BindingTag {
            name: spec.name.clone(),
            id: id.clone(),
            display_name: spec.display_name().to_string(),
            kind: class.tag_kind,
            field_ref: spec.field_ref.filter(|_| is_dimension),
            widget_type: is_dimension.then_some(class.wire_type),
            default: default.clone(),
            required: spec.required,
        });

        out.parameters.push(CompiledParameter {
            scope: Scope::Query,
            key: spec.name.clone(),
            id,
            param_type: class.wire_type,
            target: Some(target),
            name: spec.display_name().to_string(),
            slug: slugs.allocate(&spec.name),
            section_id: plan.section_id,
            required: spec.required,
            default,
            is_multi_select: spec.is_multi_select,
            temporal_units: None,
            values_query_type: plan.values.values_query_type,
            values_source_type: plan.values.values_source_type(),
            values_source_config: plan.values.values_source_config(),
        });
    }

    out
}

/// Numeric dropdowns over a static list select among string options, so a
/// scalar default is emitted as a one-element list of its string form.
fn wire_default(spec: &ParameterSpec, plan: &Plan) -> Option<DefaultValue> {
    let default = spec.default.clone()?;
    let number_dropdown = spec.param_type == ParameterType::Number(NumberOp::Equals)
        && spec.ui_widget == Some(UiWidget::Dropdown)
        && plan.values.is_static();

    match default {
        DefaultValue::Single(scalar) if number_dropdown => Some(DefaultValue::List(vec![
            Scalar::Text(scalar.to_option_string()),
        ])),
        other => Some(other),
    }
}
