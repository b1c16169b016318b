
use serde::Serialize;

use crate::api::orchestrator_dto::device_dto::DeviceDto;
use crate::domain::graph::layout::{CircleLayout, Position};
use crate::domain::manifest::manifest_view::ManifestView;
use crate::domain::manifest::step::ResolvedStep;
use crate::domain::utils::id::{DeviceId, EdgeId};
use crate::error::{Error, Result};

/// Human readable hardware summary shown next to a device.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub cpu_name: String,
    pub cpu_speed: String,
    pub cpu_usage: String,
    pub memory: String,
}

impl DeviceSummary {
    pub fn from_device(device: &DeviceDto) -> Option<Self> {
        let description = device.description.as_ref()?;
        let cpu = &description.platform.cpu;
        let cpu_usage = device.health.as_ref().map(|health| health.report.cpu_usage).unwrap_or_default();

        Some(DeviceSummary {
            cpu_name: cpu.human_readable_name.clone(),
            cpu_speed: format!("{:.2} GHz", cpu.clock_speed.hz / 1_000_000_000.0),
            cpu_usage: format!("{:.2}", cpu_usage),
            memory: format!("{:.2} GB", description.platform.memory.bytes / 1_000_000_000.0),
        })
    }
}

/// Where a step of the visualized manifest runs on this node.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepAnnotation {
    pub position_in_sequence: usize,
    pub current_module: String,
    pub current_function: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: DeviceId,
    pub label: String,
    pub position: Position,
    pub is_orchestrator: bool,
    pub address: Option<String>,
    pub port: u16,

    /// `None` for the orchestrator and for devices that report no description.
    pub summary: Option<DeviceSummary>,

    /// Steps of the visualized manifest that run here. Empty when the node is not part of it.
    pub execution: Vec<StepAnnotation>,
    pub highlighted: bool,
}

impl GraphNode {
    /// `"<positions> <module>.<function>"` of the first step here, or an empty string.
    pub fn annotation_label(&self) -> String {
        let Some(first) = self.execution.first() else {
            return String::new();
        };
        let positions: Vec<String> = self.execution.iter().map(|a| a.position_in_sequence.to_string()).collect();
        format!("[{}] {}.{}", positions.join(", "), first.current_module, first.current_function)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Derived from the sequence of the visualized manifest.
    Execution,
    /// Drawn by the operator.
    Manual,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: DeviceId,
    pub target: DeviceId,
    pub label: String,
    pub kind: EdgeKind,
    pub animated: bool,
}

/// Outcome of feeding a device list into the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphUpdate {
    /// Membership or names changed; every node got a fresh position.
    Relayout,
    /// Same devices, but some details (health, addresses) changed. Positions were kept.
    Refreshed,
    Unchanged,
}

/// Node/edge graph of the device fleet with an optional execution overlay.
///
/// Three independent inputs mutate it: device polls ([`DeviceGraph::apply_devices`]), manifest
/// selection ([`DeviceGraph::show_manifest`]) and operator edits ([`DeviceGraph::move_node`],
/// [`DeviceGraph::connect`]). Device polls only move nodes when the device set changed, so
/// dragged positions survive polling.
#[derive(Serialize, Debug, Clone)]
pub struct DeviceGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,

    #[serde(skip)]
    layout: CircleLayout,
    #[serde(skip)]
    orchestrator_name: String,

    /// Steps of the manifest currently drawn, kept to re-annotate nodes after a relayout.
    overlay: Vec<ResolvedStep>,
    highlighted_step: Option<usize>,
}

impl DeviceGraph {
    pub fn new(layout: CircleLayout, orchestrator_name: impl Into<String>) -> Self {
        DeviceGraph { nodes: Vec::new(), edges: Vec::new(), layout, orchestrator_name: orchestrator_name.into(), overlay: Vec::new(), highlighted_step: None }
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node(&self, id: &DeviceId) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    pub fn execution_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(|edge| edge.kind == EdgeKind::Execution)
    }

    pub fn overlay(&self) -> &[ResolvedStep] {
        &self.overlay
    }

    pub fn highlighted_step(&self) -> Option<usize> {
        self.highlighted_step
    }

    pub fn orchestrator_id(&self) -> Option<&DeviceId> {
        self.nodes.iter().find(|node| node.is_orchestrator).map(|node| &node.id)
    }

    fn is_orchestrator(&self, device: &DeviceDto) -> bool {
        device.name == self.orchestrator_name
    }

    /// Devices alphabetically (case-insensitive, ties broken by exact name and id), with the
    /// orchestrator moved to the front. If several devices carry the orchestrator name, only
    /// the one with the smallest id is the orchestrator; the others stay in the ring order.
    ///
    /// # Returns
    /// The sorted devices and whether the first one is the orchestrator.
    fn sorted_devices<'a>(&self, devices: &'a [DeviceDto]) -> (Vec<&'a DeviceDto>, bool) {
        let mut sorted: Vec<&DeviceDto> = devices.iter().collect();
        sorted.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then_with(|| a.name.cmp(&b.name)).then_with(|| a.id.cmp(&b.id)));

        match sorted.iter().position(|device| self.is_orchestrator(device)) {
            Some(index) => {
                let orchestrator = sorted.remove(index);
                sorted.insert(0, orchestrator);
                (sorted, true)
            }
            None => (sorted, false),
        }
    }

    fn build_node(&self, device: &DeviceDto, position: Position, is_orchestrator: bool) -> GraphNode {
        GraphNode {
            id: device.id.clone(),
            label: device.name.clone(),
            position,
            is_orchestrator,
            address: device.address().map(str::to_string),
            port: device.communication.port,
            summary: if is_orchestrator { None } else { DeviceSummary::from_device(device) },
            execution: Vec::new(),
            highlighted: false,
        }
    }

    /// Reconciles the nodes with a fresh device list.
    ///
    /// A relayout happens only when the number of nodes changed or any node at the same
    /// sorted position has a different label or id. Otherwise the current positions are kept
    /// and only the device details are refreshed.
    pub fn apply_devices(&mut self, devices: &[DeviceDto]) -> GraphUpdate {
        let (sorted, centered) = self.sorted_devices(devices);

        let needs_layout = sorted.len() != self.nodes.len() || sorted.iter().zip(self.nodes.iter()).any(|(device, node)| device.name != node.label || device.id != node.id);

        let update = if needs_layout {
            let ring_size = sorted.len() - usize::from(centered);
            let mut nodes = Vec::with_capacity(sorted.len());
            for (index, device) in sorted.iter().enumerate() {
                let is_orchestrator = centered && index == 0;
                let position = if is_orchestrator { self.layout.center } else { self.layout.ring_position(index - usize::from(centered), ring_size) };
                nodes.push(self.build_node(device, position, is_orchestrator));
            }
            self.nodes = nodes;

            // Operator edges may not dangle; execution edges follow the manifest and stay.
            let nodes = &self.nodes;
            self.edges.retain(|edge| edge.kind == EdgeKind::Execution || (nodes.iter().any(|n| n.id == edge.source) && nodes.iter().any(|n| n.id == edge.target)));
            GraphUpdate::Relayout
        } else {
            let mut changed = false;
            for (device, index) in sorted.iter().zip(0..) {
                let refreshed = self.build_node(device, self.nodes[index].position, self.nodes[index].is_orchestrator);
                let node = &mut self.nodes[index];
                if node.address != refreshed.address || node.port != refreshed.port || node.summary != refreshed.summary {
                    node.address = refreshed.address;
                    node.port = refreshed.port;
                    node.summary = refreshed.summary;
                    changed = true;
                }
            }
            if changed { GraphUpdate::Refreshed } else { GraphUpdate::Unchanged }
        };

        if update == GraphUpdate::Relayout {
            self.annotate();
        }
        log::debug!("Applied {} device(s) to graph: {:?}", devices.len(), update);
        update
    }

    /// Draws the execution path of `manifest`: one edge per consecutive pair of steps
    /// labeled `Step <i>`, and step annotations on every node taking part.
    /// Previous execution edges are replaced; operator edges are kept.
    pub fn show_manifest(&mut self, view: &ManifestView<'_>) {
        self.overlay = view.resolved_steps();
        self.highlighted_step = None;

        self.edges.retain(|edge| edge.kind == EdgeKind::Manual);
        for i in 1..self.overlay.len() {
            let source = self.overlay[i - 1].device_id.clone();
            let target = self.overlay[i].device_id.clone();
            self.edges.push(GraphEdge {
                id: EdgeId::new(format!("{}-{}-step{}", source, target, i)),
                label: format!("Step {}", i),
                source,
                target,
                kind: EdgeKind::Execution,
                animated: true,
            });
        }

        self.annotate();
        log::info!("Showing manifest '{}' with {} step(s) on the device graph.", view.manifest().name, self.overlay.len());
    }

    /// Removes the execution overlay. Operator edges and positions are untouched.
    pub fn clear_overlay(&mut self) {
        self.overlay.clear();
        self.highlighted_step = None;
        self.edges.retain(|edge| edge.kind == EdgeKind::Manual);
        self.annotate();
    }

    fn annotate(&mut self) {
        for node in &mut self.nodes {
            node.execution = self
                .overlay
                .iter()
                .filter(|step| step.device_id == node.id)
                .map(|step| StepAnnotation { position_in_sequence: step.index, current_module: step.module_name.clone(), current_function: step.function_name.clone() })
                .collect();
            node.highlighted = self.highlighted_step.is_some_and(|current| node.execution.iter().any(|a| a.position_in_sequence == current));
        }
    }

    /// Marks the node(s) running step `index` as the current step. `None` clears the highlight.
    /// Indices outside the overlay clear it as well.
    pub fn highlight_step(&mut self, index: Option<usize>) {
        self.highlighted_step = index.filter(|i| *i < self.overlay.len());
        self.annotate();
    }

    /// Moves a node (operator drag).
    ///
    /// # Returns
    /// `false` if there is no node with `id`.
    pub fn move_node(&mut self, id: &DeviceId, position: Position) -> bool {
        match self.nodes.iter_mut().find(|node| &node.id == id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Adds an operator drawn edge between two existing nodes. Drawing the same edge twice
    /// returns the id of the existing one.
    pub fn connect(&mut self, source: &DeviceId, target: &DeviceId) -> Result<EdgeId> {
        for id in [source, target] {
            if self.node(id).is_none() {
                return Err(Error::ValidationError(format!("No device '{}' on the graph.", id)));
            }
        }

        if let Some(existing) = self.edges.iter().find(|edge| edge.kind == EdgeKind::Manual && &edge.source == source && &edge.target == target) {
            return Ok(existing.id.clone());
        }

        let id = EdgeId::new(uuid::Uuid::new_v4().to_string());
        self.edges.push(GraphEdge { id: id.clone(), source: source.clone(), target: target.clone(), label: String::new(), kind: EdgeKind::Manual, animated: false });
        Ok(id)
    }
}
