use std::fmt::Write;

use crate::domain::execution::aggregator::StepResults;
use crate::domain::graph::device_graph::{DeviceGraph, EdgeKind};
use crate::domain::utils::id::DeviceId;

/// Plain-text picture of the graph: one line per node, then one line per edge, then the
/// step results if there are any. Markers: `*` orchestrator, `>` highlighted step.
pub fn render_graph(graph: &DeviceGraph, results: Option<&StepResults>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Devices ({}):", graph.nodes().len());
    for node in graph.nodes() {
        let marker = if node.highlighted {
            '>'
        } else if node.is_orchestrator {
            '*'
        } else {
            ' '
        };
        let _ = write!(out, " {} {:<20} ({:>7.1}, {:>7.1})", marker, node.label, node.position.x, node.position.y);
        if let Some(summary) = &node.summary {
            let _ = write!(out, "  {} @ {}, cpu {}, {}", summary.cpu_name, summary.cpu_speed, summary.cpu_usage, summary.memory);
        }
        let annotation = node.annotation_label();
        if !annotation.is_empty() {
            let _ = write!(out, "  {}", annotation);
        }
        out.push('\n');
    }

    if !graph.edges().is_empty() {
        let _ = writeln!(out, "Edges ({}):", graph.edges().len());
        for edge in graph.edges() {
            let label_of = |id: &DeviceId| graph.node(id).map(|n| n.label.clone()).unwrap_or_else(|| format!("<{}>", id));
            let kind = match edge.kind {
                EdgeKind::Execution => edge.label.as_str(),
                EdgeKind::Manual => "manual",
            };
            let _ = writeln!(out, "   {} -> {}  [{}]", label_of(&edge.source), label_of(&edge.target), kind);
        }
    }

    if let Some(results) = results {
        let _ = writeln!(out, "Step results for '{}':", results.manifest_id);
        for (index, entry) in results.steps.0.iter().enumerate() {
            match entry {
                Some(step) => {
                    let _ = writeln!(out, "   {}: {} (request {}, {})", index, step.result, step.request_id, step.url);
                }
                None => {
                    let _ = writeln!(out, "   {}: -", index);
                }
            }
        }
    }

    out
}
