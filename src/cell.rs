use std::collections::HashSet;
use std::fmt;

use crate::compartments::{Compartment, CompartmentId, Compartments};
use crate::error::CellResult;

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum Group {
    Soma,
    Dend,
    Axon,
    All,
}

impl Group {
    pub fn name(self) -> &'static str {
        match self {
            Group::Soma => "soma",
            Group::Dend => "dend",
            Group::Axon => "axon",
            Group::All => "all",
        }
    }

    pub fn from_name(name: &str) -> Option<Group> {
        [Group::Soma, Group::Dend, Group::Axon, Group::All]
            .into_iter()
            .find(|g| g.name() == name)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The group a new compartment is filed under. Every label also implies `all`.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum Label {
    Soma,
    Dend,
    Axon,
}

impl Label {
    pub fn name(self) -> &'static str {
        Group::from(self).name()
    }
}

impl From<Label> for Group {
    fn from(label: Label) -> Group {
        match label {
            Label::Soma => Group::Soma,
            Label::Dend => Group::Dend,
            Label::Axon => Group::Axon,
        }
    }
}

/// A cell: its compartments plus the labelled groups over them.
///
/// `all` always holds every member of `soma`, `dend` and `axon` exactly once.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    name: Option<String>,
    compartments: Compartments,
    soma: Vec<CompartmentId>,
    dend: Vec<CompartmentId>,
    axon: Vec<CompartmentId>,
    all: Vec<CompartmentId>,
}

impl Cell {
    pub fn new() -> Cell {
        Cell::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn compartments(&self) -> &Compartments {
        &self.compartments
    }

    pub fn group(&self, group: Group) -> &[CompartmentId] {
        match group {
            Group::Soma => &self.soma,
            Group::Dend => &self.dend,
            Group::Axon => &self.axon,
            Group::All => &self.all,
        }
    }

    /// Creates a compartment and files it under `label` and `all`.
    pub fn add(&mut self, label: Label, name: impl Into<String>) -> CompartmentId {
        let id = self.compartments.create(name);
        match label {
            Label::Soma => self.soma.push(id),
            Label::Dend => self.dend.push(id),
            Label::Axon => self.axon.push(id),
        }
        self.all.push(id);
        id
    }

    pub fn get(&self, id: CompartmentId) -> &Compartment {
        self.compartments.get(id)
    }

    pub fn get_mut(&mut self, id: CompartmentId) -> &mut Compartment {
        self.compartments.get_mut(id)
    }

    pub fn find(&self, name: &str) -> Option<&Compartment> {
        self.compartments.iter().find(|c| c.name() == name)
    }

    pub fn connect(
        &mut self,
        child: CompartmentId,
        parent: CompartmentId,
        parent_x: f64,
    ) -> CellResult<()> {
        self.compartments.connect(child, parent, parent_x)
    }

    /// Runs `f` on every compartment of `group`, stopping at the first error.
    pub fn for_each_in<F>(&mut self, group: Group, mut f: F) -> CellResult<()>
    where
        F: FnMut(&mut Compartment) -> CellResult<()>,
    {
        let ids = self.group(group).to_vec();
        for id in ids {
            f(self.compartments.get_mut(id))?;
        }
        Ok(())
    }

    /// Drops every axon compartment along with anything attached below it.
    pub fn discard_axon(&mut self) {
        if self.axon.is_empty() {
            return;
        }
        let axon: HashSet<CompartmentId> = self.axon.iter().copied().collect();
        let doomed: HashSet<CompartmentId> = self
            .compartments
            .iter()
            .map(|c| c.id())
            .filter(|id| self.compartments.ancestors(*id).any(|a| axon.contains(&a)))
            .collect();
        let remap = self.compartments.retain(|id| !doomed.contains(&id));
        let renumber = |ids: &[CompartmentId]| -> Vec<CompartmentId> {
            ids.iter().filter_map(|id| remap.get(id).copied()).collect()
        };
        self.soma = renumber(&self.soma);
        self.dend = renumber(&self.dend);
        self.axon = Vec::new();
        self.all = renumber(&self.all);
    }

    /// One line per compartment, children indented below their parent.
    pub fn topology(&self) -> String {
        Topology(self).to_string()
    }
}

struct Topology<'a>(&'a Cell);

impl Topology<'_> {
    fn write_subtree(
        &self,
        f: &mut fmt::Formatter<'_>,
        id: CompartmentId,
        depth: usize,
    ) -> fmt::Result {
        let cell = self.0;
        let comp = cell.get(id);
        write!(f, "{}{}", "  ".repeat(depth), comp.name())?;
        if let Some(conn) = comp.parent() {
            write!(f, " @ {}({})", cell.get(conn.parent).name(), conn.parent_x)?;
        }
        writeln!(f, " L={:.2} diam={:.2} nseg={}", comp.length(), comp.diam(), comp.nseg())?;
        for child in comp.children() {
            self.write_subtree(f, *child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Topology<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for root in self.0.compartments.roots() {
            self.write_subtree(f, root, 0)?;
        }
        Ok(())
    }
}
