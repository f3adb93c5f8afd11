//! Dashboard-scoped parameter compilation.

use serde_json::Value;

use super::output::CompiledParameter;
use super::CompileOptions;
use crate::ids::IdAllocator;
use crate::metadata::MetadataProvider;
use crate::params::{schema, ParameterSpec, Scope};
use crate::slug::SlugSet;
use crate::validation::{check_business_rules, CompileResult, Plan, ReferenceValidator};

/// Compiles the parameters of one dashboard.
///
/// Dashboard parameters are not embedded in query text, so no binding tags
/// are produced; they reach queries through dashcard mappings instead.
pub struct DashboardParameterCompiler<'a, P: MetadataProvider + ?Sized> {
    provider: &'a P,
    options: CompileOptions,
}

impl<'a, P: MetadataProvider + ?Sized> DashboardParameterCompiler<'a, P> {
    pub fn new(provider: &'a P, options: CompileOptions) -> Self {
        Self { provider, options }
    }

    pub async fn compile(&self, raw: &[Value]) -> CompileResult<Vec<CompiledParameter>> {
        let specs = schema::parse_parameters(raw, Scope::Dashboard)?;
        self.compile_specs(&specs).await
    }

    pub async fn compile_specs(&self, specs: &[ParameterSpec]) -> CompileResult<Vec<CompiledParameter>> {
        let plans = check_business_rules(specs, Scope::Dashboard)?;
        ReferenceValidator::new(self.provider, self.options.max_concurrent_lookups)
            .validate(specs)
            .await?;

        let compiled = emit(specs, &plans, &mut IdAllocator::new(Scope::Dashboard));
        tracing::info!(parameters = compiled.len(), "compiled dashboard parameters");
        Ok(compiled)
    }
}

/// Convenience wrapper over [`DashboardParameterCompiler::compile`].
pub async fn compile_dashboard_parameters<P: MetadataProvider + ?Sized>(
    raw: &[Value],
    provider: &P,
    options: CompileOptions,
) -> CompileResult<Vec<CompiledParameter>> {
    DashboardParameterCompiler::new(provider, options)
        .compile(raw)
        .await
}

/// Build dashboard parameters for validated specs.
///
/// Caller-supplied ids are kept and reserved before any id is generated.
pub(crate) fn emit(specs: &[ParameterSpec], plans: &[Plan], ids: &mut IdAllocator) -> Vec<CompiledParameter> {
    for id in specs.iter().filter_map(|s| s.id.as_deref()) {
        ids.reserve(id);
    }

    let mut slugs = SlugSet::new();
    specs
        .iter()
        .zip(plans)
        .map(|(spec, plan)| CompiledParameter {
            scope: Scope::Dashboard,
            key: spec.name.clone(),
            id: spec.id.clone().unwrap_or_else(|| ids.allocate()),
            param_type: plan.classification.wire_type,
            target: None,
            name: spec.display_name().to_string(),
            slug: slugs.allocate(&spec.name),
            section_id: plan.section_id,
            required: spec.required,
            default: spec.default.clone(),
            is_multi_select: spec.is_multi_select,
            temporal_units: plan.temporal_units.clone(),
            values_query_type: plan.values.values_query_type,
            values_source_type: plan.values.values_source_type(),
            values_source_config: plan.values.values_source_config(),
        })
        .collect()
}
