use itertools::Itertools;
use log::{info, warn};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{CellError, CellResult};

/// We use the CNIC spec, as per: http://www.neuronland.org/NLMorphologyConverter/MorphologyFormats/SWC/Spec.html
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone)]
pub enum StructureIdentifier {
    Undefined,
    Soma,
    Axon,
    BasalDendrite,
    ApicalDendrite,
    ForkPoint,
    EndPoint,
    Custom,
}

impl From<u8> for StructureIdentifier {
    fn from(v: u8) -> Self {
        match v {
            0 => StructureIdentifier::Undefined,
            1 => StructureIdentifier::Soma,
            2 => StructureIdentifier::Axon,
            3 => StructureIdentifier::BasalDendrite,
            4 => StructureIdentifier::ApicalDendrite,
            5 => StructureIdentifier::ForkPoint,
            6 => StructureIdentifier::EndPoint,
            _ => StructureIdentifier::Custom,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Node {
    pub node_id: u64,
    pub structured_identifier: StructureIdentifier,
    pub x_pos: f64,
    pub y_pos: f64,
    pub z_pos: f64,
    pub radius: f64,
    /// `None` for roots (parent `-1` in the file)
    pub parent_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwcOptions {
    /// Added to every point's coordinates.
    pub shift: [f64; 3],
    pub emit_warnings: bool,
    /// Zero radii on non-endpoints become errors instead of being replaced.
    pub strict: bool,
}

impl Default for SwcOptions {
    fn default() -> Self {
        SwcOptions {
            shift: [0.0; 3],
            emit_warnings: true,
            strict: false,
        }
    }
}

/// Points of one reconstruction in breadth-first order: every parent comes
/// before its children.
#[derive(Debug, Clone)]
pub struct SwcTree {
    pub nodes: Vec<Node>,
    index: HashMap<u64, usize>,
    children: HashMap<u64, Vec<u64>>,
}

impl SwcTree {
    pub fn get(&self, node_id: u64) -> Option<&Node> {
        self.index.get(&node_id).map(|&idx| &self.nodes[idx])
    }

    pub fn children(&self, node_id: u64) -> &[u64] {
        self.children
            .get(&node_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn field<T: std::str::FromStr>(
    fields: &mut std::str::SplitWhitespace<'_>,
    line: usize,
    what: &str,
) -> CellResult<T> {
    let raw = fields.next().ok_or_else(|| CellError::SwcParse {
        line,
        reason: format!("missing {}", what),
    })?;
    raw.parse::<T>().map_err(|_| CellError::SwcParse {
        line,
        reason: format!("bad {} {:?}", what, raw),
    })
}

fn parse_line(text: &str, line: usize, options: &SwcOptions) -> CellResult<Node> {
    let mut v = text.split_whitespace();
    let node_id = field::<u64>(&mut v, line, "id")?;
    let structured_identifier: StructureIdentifier = field::<u8>(&mut v, line, "type")?.into();
    let x_pos = field::<f64>(&mut v, line, "x")? + options.shift[0];
    let y_pos = field::<f64>(&mut v, line, "y")? + options.shift[1];
    let z_pos = field::<f64>(&mut v, line, "z")? + options.shift[2];
    let mut radius = field::<f64>(&mut v, line, "radius")?;
    let parent_raw = field::<i64>(&mut v, line, "parent")?;
    let parent_id = if parent_raw < 0 {
        None
    } else {
        Some(parent_raw as u64)
    };

    if radius == 0.0 {
        if options.strict && structured_identifier != StructureIdentifier::EndPoint {
            return Err(CellError::ZeroRadius { node_id });
        }
        if options.emit_warnings {
            warn!(
                "Zero-radius for section ID: {} of type: {:?}",
                node_id, structured_identifier
            );
        }
        radius = 1.0;
    }

    Ok(Node {
        node_id,
        structured_identifier,
        x_pos,
        y_pos,
        z_pos,
        radius,
        parent_id,
    })
}

/// Reads the SWC at `read_path`.
pub fn read_swc(read_path: &Path, options: &SwcOptions) -> CellResult<SwcTree> {
    let f = File::open(read_path).map_err(|source| CellError::Io {
        path: read_path.to_path_buf(),
        source,
    })?;
    info!("Reading morphology from {}", read_path.display());
    parse_swc(BufReader::new(f), options).map_err(|err| match err {
        CellError::Io { source, .. } => CellError::Io {
            path: read_path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Parses SWC text and orders it breadth-first from the roots.
///
/// Based on https://en.wikipedia.org/wiki/Breadth-first_search
pub fn parse_swc<R: BufRead>(reader: R, options: &SwcOptions) -> CellResult<SwcTree> {
    let mut nodes_vec: Vec<Node> = Vec::new();
    let mut seen: HashSet<u64> = HashSet::new();
    for (line_idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| CellError::Io {
            path: Default::default(),
            source,
        })?;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let node = parse_line(text, line_idx + 1, options)?;
        if !seen.insert(node.node_id) {
            return Err(CellError::SwcParse {
                line: line_idx + 1,
                reason: format!("duplicate id {}", node.node_id),
            });
        }
        nodes_vec.push(node);
    }

    if nodes_vec.is_empty() {
        return Err(CellError::EmptyMorphology);
    }

    // Quick debug logs for the count of the types
    let accum_types: HashMap<StructureIdentifier, usize> = nodes_vec
        .iter()
        .map(|node| node.structured_identifier)
        .counts();
    for (kind, count) in accum_types.iter().sorted() {
        info!("{:?} - #{:?}", kind, count);
    }

    // Construct mapping from parent to children for the BFS
    let mut children: HashMap<u64, Vec<u64>> = HashMap::new();
    for n in &nodes_vec {
        if let Some(parent_id) = n.parent_id {
            if !seen.contains(&parent_id) {
                return Err(CellError::MissingParent {
                    node_id: n.node_id,
                    parent_id,
                });
            }
            children.entry(parent_id).or_default().push(n.node_id);
        }
    }

    let by_id: HashMap<u64, Node> = nodes_vec.iter().map(|n| (n.node_id, *n)).collect();
    let mut queue: VecDeque<u64> = nodes_vec
        .iter()
        .filter(|n| n.parent_id.is_none())
        .map(|n| n.node_id)
        .collect();
    let mut visited: HashSet<u64> = HashSet::new();
    let mut sorted: Vec<Node> = Vec::with_capacity(nodes_vec.len());

    while let Some(node_id) = queue.pop_front() {
        if !visited.insert(node_id) {
            continue;
        }
        sorted.push(by_id[&node_id]);
        if let Some(child_ids) = children.get(&node_id) {
            queue.extend(child_ids.iter().filter(|id| !visited.contains(*id)));
        }
    }

    if let Some(stray) = nodes_vec.iter().find(|n| !visited.contains(&n.node_id)) {
        return Err(CellError::Unreachable(stray.node_id));
    }

    info!("Processed {} nodes", sorted.len());

    let index = sorted
        .iter()
        .enumerate()
        .map(|(idx, n)| (n.node_id, idx))
        .collect();
    Ok(SwcTree {
        nodes: sorted,
        index,
        children,
    })
}
