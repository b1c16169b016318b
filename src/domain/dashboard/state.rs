use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::api::orchestrator_dto::{certificate_dto::DeploymentCertificateDto, device_dto::DeviceDto, manifest_dto::ManifestDto, module_dto::ModuleDto};
use crate::config::DashboardConfig;
use crate::domain::graph::device_graph::{DeviceGraph, GraphUpdate};
use crate::domain::graph::layout::CircleLayout;
use crate::domain::utils::id::ManifestId;

/// Reconciles `current` with `fresh` by set difference on the key.
///
/// Entries whose key is gone are dropped, entries that are still present keep their position
/// and take the fresh value, new keys are appended in the order of `fresh`.
///
/// # Returns
/// `true` if membership changed.
pub fn reconcile_by_id<T, K, F>(current: &mut Vec<T>, fresh: Vec<T>, key: F) -> bool
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let fresh_keys: HashSet<K> = fresh.iter().map(&key).collect();
    let before = current.len();
    current.retain(|item| fresh_keys.contains(&key(item)));
    let mut membership_changed = current.len() != before;

    let mut fresh_by_key: HashMap<K, T> = HashMap::with_capacity(fresh.len());
    let mut order: Vec<K> = Vec::with_capacity(fresh.len());
    for item in fresh {
        let k = key(&item);
        if !fresh_by_key.contains_key(&k) {
            order.push(key(&item));
        }
        fresh_by_key.insert(k, item);
    }

    for item in current.iter_mut() {
        if let Some(updated) = fresh_by_key.remove(&key(item)) {
            *item = updated;
        }
    }
    for k in order {
        if let Some(item) = fresh_by_key.remove(&k) {
            current.push(item);
            membership_changed = true;
        }
    }
    membership_changed
}

/// Everything one dashboard view knows. Lives exactly as long as its session.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub devices: Vec<DeviceDto>,
    pub modules: Vec<ModuleDto>,
    pub manifests: Vec<ManifestDto>,

    /// One certificate per manifest; a newer certificate replaces the older one.
    pub certificates: HashMap<ManifestId, DeploymentCertificateDto>,

    pub selected: Option<ManifestId>,
    pub graph: DeviceGraph,
}

impl DashboardState {
    pub fn new(config: &DashboardConfig) -> Self {
        DashboardState {
            devices: Vec::new(),
            modules: Vec::new(),
            manifests: Vec::new(),
            certificates: HashMap::new(),
            selected: None,
            graph: DeviceGraph::new(CircleLayout::from(config.layout), config.orchestrator_device_name.clone()),
        }
    }

    pub fn apply_devices(&mut self, fresh: Vec<DeviceDto>) -> GraphUpdate {
        reconcile_by_id(&mut self.devices, fresh, |device| device.id.clone());
        self.graph.apply_devices(&self.devices)
    }

    pub fn apply_modules(&mut self, fresh: Vec<ModuleDto>) -> bool {
        reconcile_by_id(&mut self.modules, fresh, |module| module.id.clone())
    }

    /// # Returns
    /// `true` if the selected manifest disappeared from the list.
    pub fn apply_manifests(&mut self, fresh: Vec<ManifestDto>) -> bool {
        reconcile_by_id(&mut self.manifests, fresh, |manifest| manifest.id.clone());
        match &self.selected {
            Some(id) => !self.manifests.iter().any(|manifest| &manifest.id == id),
            None => false,
        }
    }

    pub fn apply_certificates(&mut self, certificates: Vec<DeploymentCertificateDto>) {
        for certificate in certificates {
            self.certificates.insert(certificate.deployment_id.clone(), certificate);
        }
    }

    pub fn manifest(&self, id: &ManifestId) -> Option<&ManifestDto> {
        self.manifests.iter().find(|manifest| &manifest.id == id)
    }

    pub fn selected_manifest(&self) -> Option<&ManifestDto> {
        self.selected.as_ref().and_then(|id| self.manifest(id))
    }
}

pub type SharedState = Arc<RwLock<DashboardState>>;

pub fn read_state(state: &SharedState) -> RwLockReadGuard<'_, DashboardState> {
    state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn write_state(state: &SharedState) -> RwLockWriteGuard<'_, DashboardState> {
    state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
