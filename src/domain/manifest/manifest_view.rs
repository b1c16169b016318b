use reqwest::Url;

use crate::api::orchestrator_dto::manifest_dto::{DeviceDeploymentDto, EndpointDto, ManifestDto, ParameterDto};
use crate::domain::manifest::step::{OutputMount, ResolvedStep};
use crate::domain::utils::id::{DeviceId, ModuleId};

/// Read-only lookups over a manifest's `fullManifest` description.
///
/// Every lookup is total: a missing key at any depth yields the documented default
/// (`"module:<id>"`, `None` or an empty list) instead of an error, because the
/// orchestrator does not guarantee the description is complete.
#[derive(Debug, Clone, Copy)]
pub struct ManifestView<'a> {
    manifest: &'a ManifestDto,
}

impl<'a> ManifestView<'a> {
    pub fn new(manifest: &'a ManifestDto) -> Self {
        ManifestView { manifest }
    }

    pub fn manifest(&self) -> &'a ManifestDto {
        self.manifest
    }

    pub fn step_count(&self) -> usize {
        self.manifest.sequence.len()
    }

    fn deployment(&self, device_id: &DeviceId) -> Option<&'a DeviceDeploymentDto> {
        self.manifest.full_manifest.get(device_id.as_str())
    }

    fn endpoint(&self, device_id: &DeviceId, module_name: &str, func: &str) -> Option<&'a EndpointDto> {
        self.deployment(device_id)?.endpoints.get(module_name)?.get(func)
    }

    /// Name of the module with `module_id`, searched across every device of the deployment.
    ///
    /// # Returns
    /// The module name, or `"module:<module_id>"` when no device lists the module.
    pub fn module_name(&self, module_id: &ModuleId) -> String {
        self.manifest
            .full_manifest
            .values()
            .flat_map(|deployment| deployment.modules.iter())
            .find(|module| &module.id == module_id)
            .map(|module| module.name.clone())
            .unwrap_or_else(|| format!("module:{}", module_id))
    }

    /// Endpoint URL of `module_name.func` on `device_id`. Empty URLs count as missing.
    pub fn supervisor_url(&self, device_id: &DeviceId, module_name: &str, func: &str) -> Option<String> {
        self.endpoint(device_id, module_name, func)?.url.clone().filter(|url| !url.is_empty())
    }

    /// Origin (`scheme://host:port`) of the step's endpoint URL; the supervisor serves its
    /// request history from there.
    pub fn supervisor_base(&self, device_id: &DeviceId, module_name: &str, func: &str) -> Option<String> {
        let url = self.supervisor_url(device_id, module_name, func)?;
        let parsed = Url::parse(&url).ok()?;
        if !parsed.has_host() {
            return None;
        }
        Some(parsed.origin().ascii_serialization())
    }

    /// Output mounts declared for `module_name.func` on `device_id`.
    pub fn output_mounts(&self, device_id: &DeviceId, module_name: &str, func: &str) -> Vec<OutputMount> {
        self.deployment(device_id)
            .and_then(|deployment| deployment.mounts.get(module_name))
            .and_then(|functions| functions.get(func))
            .map(|mounts| mounts.output.iter().map(OutputMount::from).collect())
            .unwrap_or_default()
    }

    /// Resolves step `index` of the sequence. `None` only when the index is out of range.
    pub fn resolve_step(&self, index: usize) -> Option<ResolvedStep> {
        let step = self.manifest.sequence.get(index)?;
        let module_name = self.module_name(&step.module);

        Some(ResolvedStep {
            index,
            device_id: step.device.clone(),
            module_id: step.module.clone(),
            supervisor_base: self.supervisor_base(&step.device, &module_name, &step.func),
            output_mounts: self.output_mounts(&step.device, &module_name, &step.func),
            function_name: step.func.clone(),
            module_name,
        })
    }

    pub fn resolved_steps(&self) -> Vec<ResolvedStep> {
        (0..self.step_count()).filter_map(|index| self.resolve_step(index)).collect()
    }

    /// Input parameters of the whole manifest, i.e. those of its first step's function.
    ///
    /// Falls back to the first function the first device describes for that module when the
    /// step's own function has no endpoint entry.
    pub fn execution_parameters(&self) -> Vec<ParameterDto> {
        let Some(first) = self.manifest.sequence.first() else {
            return Vec::new();
        };
        let module_name = self.module_name(&first.module);

        if let Some(endpoint) = self.endpoint(&first.device, &module_name, &first.func) {
            return endpoint.request.parameters.clone();
        }

        self.manifest
            .full_manifest
            .values()
            .find_map(|deployment| deployment.endpoints.get(&module_name))
            .and_then(|functions| functions.get(&first.func))
            .map(|endpoint| endpoint.request.parameters.clone())
            .unwrap_or_default()
    }
}

/// Free-function form of [`ManifestView::module_name`].
pub fn resolve_module_name(manifest: &ManifestDto, module_id: &ModuleId) -> String {
    ManifestView::new(manifest).module_name(module_id)
}

/// Free-function form of [`ManifestView::supervisor_url`].
pub fn resolve_supervisor_url(manifest: &ManifestDto, device_id: &DeviceId, module_name: &str, func: &str) -> Option<String> {
    ManifestView::new(manifest).supervisor_url(device_id, module_name, func)
}

/// Free-function form of [`ManifestView::output_mounts`].
pub fn resolve_output_mounts(manifest: &ManifestDto, device_id: &DeviceId, module_name: &str, func: &str) -> Vec<OutputMount> {
    ManifestView::new(manifest).output_mounts(device_id, module_name, func)
}
