//! Turns an SWC point tree into a cell of cylindrical compartments.
//!
//! The soma becomes a single compartment `soma[0]`. Every other run of
//! same-type points without branches becomes one compartment, named
//! `dend[i]` or `axon[i]` in breadth-first order. A run's path starts at the
//! point it hangs from, so its length includes the gap to its parent.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::{debug, info};

use crate::cell::{Cell, Group, Label};
use crate::compartments::{CompartmentId, Point3d};
use crate::error::{CellError, CellResult};
use crate::swc_reader::{parse_swc, read_swc, Node, StructureIdentifier, SwcOptions, SwcTree};

/// Where neurites leave the soma.
pub const SOMA_ATTACH_X: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// x, y, z shift added to every point
    pub offset: [f64; 3],
    pub use_axon: bool,
    pub strict: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            offset: [0.0; 3],
            use_axon: true,
            strict: false,
        }
    }
}

impl LoadOptions {
    fn swc(&self) -> SwcOptions {
        SwcOptions {
            shift: self.offset,
            strict: self.strict,
            ..SwcOptions::default()
        }
    }
}

pub fn load_swc(path: &Path, options: &LoadOptions) -> CellResult<Cell> {
    let tree = read_swc(path, &options.swc())?;
    cell_from_tree(&tree, options.use_axon)
}

pub fn load_swc_str(text: &str, options: &LoadOptions) -> CellResult<Cell> {
    let tree = parse_swc(text.as_bytes(), &options.swc())?;
    cell_from_tree(&tree, options.use_axon)
}

fn point(node: &Node) -> Point3d {
    Point3d {
        x: node.x_pos,
        y: node.y_pos,
        z: node.z_pos,
        diam: 2.0 * node.radius,
    }
}

fn is_soma(node: &Node) -> bool {
    node.structured_identifier == StructureIdentifier::Soma
}

/// A cylinder along x centred on the first soma point. A lone point gives
/// L = diam = 2r; several points give their summed soma-to-soma distances
/// and mean diameter.
fn soma_points(soma: &[&Node], tree: &SwcTree) -> Vec<Point3d> {
    let centre = point(soma[0]);
    let diam = soma.iter().map(|n| 2.0 * n.radius).sum::<f64>() / soma.len() as f64;
    let path: f64 = soma
        .iter()
        .filter_map(|n| {
            let parent = tree.get(n.parent_id?)?;
            is_soma(parent).then(|| point(n).distance(&point(parent)))
        })
        .sum();
    let length = if path > 0.0 { path } else { diam };
    let half = length / 2.0;
    vec![
        Point3d { x: centre.x - half, diam, ..centre },
        Point3d { x: centre.x + half, diam, ..centre },
    ]
}

struct Run {
    label: Label,
    parent: Option<u64>,
    nodes: Vec<Node>,
}

pub fn cell_from_tree(tree: &SwcTree, use_axon: bool) -> CellResult<Cell> {
    // Breadth-first order guarantees parents are decided before children
    let mut skipped: HashSet<u64> = HashSet::new();
    let mut kept: Vec<&Node> = Vec::with_capacity(tree.len());
    for node in &tree.nodes {
        let orphaned = node.parent_id.is_some_and(|p| skipped.contains(&p));
        if orphaned || (!use_axon && node.structured_identifier == StructureIdentifier::Axon) {
            skipped.insert(node.node_id);
        } else {
            kept.push(node);
        }
    }
    if !skipped.is_empty() {
        info!("Skipping {} axon points", skipped.len());
    }

    let soma: Vec<&Node> = kept.iter().copied().filter(|n| is_soma(n)).collect();
    if soma.is_empty() {
        return Err(CellError::NoSoma);
    }

    let kept_children = |id: u64| -> usize {
        tree.children(id)
            .iter()
            .filter(|c| !skipped.contains(*c))
            .count()
    };

    let mut runs: Vec<Run> = Vec::new();
    let mut run_of: HashMap<u64, usize> = HashMap::new();
    for node in kept.iter().copied().filter(|n| !is_soma(n)) {
        let label = if node.structured_identifier == StructureIdentifier::Axon {
            Label::Axon
        } else {
            Label::Dend
        };
        let parent = node.parent_id.and_then(|p| tree.get(p));
        let continues = parent.filter(|p| {
            !is_soma(p)
                && p.structured_identifier == node.structured_identifier
                && kept_children(p.node_id) == 1
        });
        match continues.and_then(|p| run_of.get(&p.node_id).copied()) {
            Some(run) => {
                runs[run].nodes.push(*node);
                run_of.insert(node.node_id, run);
            }
            None => {
                run_of.insert(node.node_id, runs.len());
                runs.push(Run {
                    label,
                    parent: node.parent_id,
                    nodes: vec![*node],
                });
            }
        }
    }

    let mut cell = Cell::new();
    let soma_id = cell.add(Label::Soma, "soma[0]");
    cell.get_mut(soma_id).set_points(soma_points(&soma, tree))?;

    let mut counters: HashMap<Label, usize> = HashMap::new();
    let mut ids: Vec<CompartmentId> = Vec::with_capacity(runs.len());
    for run in &runs {
        let counter = counters.entry(run.label).or_default();
        let name = format!("{}[{}]", run.label.name(), *counter);
        *counter += 1;

        let mut points: Vec<Point3d> = Vec::with_capacity(run.nodes.len() + 1);
        if let Some(parent) = run.parent.and_then(|p| tree.get(p)) {
            points.push(Point3d {
                diam: 2.0 * run.nodes[0].radius,
                ..point(parent)
            });
        }
        points.extend(run.nodes.iter().map(point));

        let id = cell.add(run.label, name);
        cell.get_mut(id).set_points(points)?;
        ids.push(id);
    }

    for (run, &id) in runs.iter().zip(&ids) {
        let attach = run
            .parent
            .and_then(|p| run_of.get(&p))
            .map(|&parent_run| (ids[parent_run], 1.0))
            .unwrap_or((soma_id, SOMA_ATTACH_X));
        cell.connect(id, attach.0, attach.1)?;
        let comp = cell.get(id);
        debug!(
            "{} -> {}({}) L = {:.3}",
            comp.name(),
            cell.get(attach.0).name(),
            attach.1,
            comp.length()
        );
    }

    info!(
        "Built {} compartments: {} soma, {} dend, {} axon",
        cell.group(Group::All).len(),
        cell.group(Group::Soma).len(),
        cell.group(Group::Dend).len(),
        cell.group(Group::Axon).len()
    );
    Ok(cell)
}
