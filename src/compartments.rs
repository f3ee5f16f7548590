use std::collections::{BTreeMap, HashMap};
use std::fmt;

use itertools::Itertools;
use log::debug;

use crate::channels::{split_range_name, Ion, Mechanism, MechanismKind};
use crate::error::{CellError, CellResult};

/// Length (um) covered by each pair of extra segments.
pub const SEGMENT_LENGTH: f64 = 40.0;

/// Odd segment count that grows with length: 1 + 2 * floor(L / 40).
pub fn segments_for_length(length: f64) -> u32 {
    if !length.is_finite() || length <= 0.0 {
        return 1;
    }
    1 + 2 * (length / SEGMENT_LENGTH).floor() as u32
}

#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone)]
pub struct CompartmentId(pub(crate) usize);

impl CompartmentId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Point3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub diam: f64,
}

impl Point3d {
    pub fn distance(&self, other: &Point3d) -> f64 {
        let x_diff = square(self.x - other.x);
        let y_diff = square(self.y - other.y);
        let z_diff = square(self.z - other.z);
        (x_diff + y_diff + z_diff).sqrt()
    }
}

fn square(x: f64) -> f64 {
    x * x
}

/// Where a compartment's 0 end attaches to its parent.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Connection {
    pub parent: CompartmentId,
    pub parent_x: f64,
}

/// A cylindrical piece of neurite.
#[derive(Debug, Clone)]
pub struct Compartment {
    pub(crate) name: String,
    idx: CompartmentId,
    parent: Option<Connection>,
    children: Vec<CompartmentId>,
    points: Vec<Point3d>,

    length: f64,
    diam: f64,
    nseg: u32,
    ra: f64,
    cm: f64,

    mechanisms: Vec<Mechanism>,
    reversal: BTreeMap<Ion, f64>,
}

impl Compartment {
    fn new(name: String, idx: CompartmentId) -> Compartment {
        Compartment {
            name,
            idx,
            parent: None,
            children: Vec::new(),
            points: Vec::new(),
            length: 100.0,
            diam: 500.0,
            nseg: 1,
            ra: 35.4,
            cm: 1.0,
            mechanisms: Vec::new(),
            reversal: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> CompartmentId {
        self.idx
    }

    pub fn parent(&self) -> Option<Connection> {
        self.parent
    }

    pub fn children(&self) -> &[CompartmentId] {
        &self.children
    }

    pub fn points(&self) -> &[Point3d] {
        &self.points
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn diam(&self) -> f64 {
        self.diam
    }

    pub fn nseg(&self) -> u32 {
        self.nseg
    }

    pub fn ra(&self) -> f64 {
        self.ra
    }

    pub fn cm(&self) -> f64 {
        self.cm
    }

    fn positive(&self, attribute: &'static str, value: f64) -> CellResult<f64> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(CellError::InvalidGeometry {
                compartment: self.name.clone(),
                attribute,
                value,
            })
        }
    }

    pub fn set_length(&mut self, length: f64) -> CellResult<()> {
        self.length = self.positive("L", length)?;
        Ok(())
    }

    pub fn set_diam(&mut self, diam: f64) -> CellResult<()> {
        self.diam = self.positive("diam", diam)?;
        Ok(())
    }

    pub fn set_nseg(&mut self, nseg: u32) -> CellResult<()> {
        if nseg == 0 {
            return Err(CellError::InvalidGeometry {
                compartment: self.name.clone(),
                attribute: "nseg",
                value: 0.0,
            });
        }
        self.nseg = nseg;
        Ok(())
    }

    pub fn set_ra(&mut self, ra: f64) -> CellResult<()> {
        self.ra = self.positive("Ra", ra)?;
        Ok(())
    }

    pub fn set_cm(&mut self, cm: f64) -> CellResult<()> {
        self.cm = self.positive("cm", cm)?;
        Ok(())
    }

    /// Replaces the 3-D path; `L` becomes the path length and `diam` the
    /// mean point diameter. A path of coincident points gives `L = 0`.
    pub fn set_points(&mut self, points: Vec<Point3d>) -> CellResult<()> {
        if points.is_empty() {
            self.points = points;
            return Ok(());
        }
        let length: f64 = points
            .iter()
            .tuple_windows()
            .map(|(a, b)| a.distance(b))
            .sum();
        if !length.is_finite() {
            return Err(CellError::InvalidGeometry {
                compartment: self.name.clone(),
                attribute: "L",
                value: length,
            });
        }
        let diam = points.iter().map(|p| p.diam).sum::<f64>() / points.len() as f64;
        self.set_diam(diam)?;
        self.length = if length > 0.0 { length } else { 0.0 };
        self.points = points;
        Ok(())
    }

    /// Sets nseg from the current length.
    pub fn discretize(&mut self) {
        self.nseg = segments_for_length(self.length);
        debug!("{}: L = {:.3}, nseg = {}", self.name, self.length, self.nseg);
    }

    /// Normalized centre of each segment.
    pub fn segment_centers(&self) -> Vec<f64> {
        let n = self.nseg as f64;
        (0..self.nseg).map(|i| (i as f64 + 0.5) / n).collect()
    }

    pub fn insert(&mut self, kind: MechanismKind) {
        if self.has_mechanism(kind) {
            return;
        }
        for ion in kind.ions() {
            self.reversal
                .entry(*ion)
                .or_insert_with(|| ion.default_reversal());
        }
        self.mechanisms.push(Mechanism::new(kind));
    }

    pub fn insert_named(&mut self, name: &str) -> CellResult<()> {
        self.insert(name.parse()?);
        Ok(())
    }

    pub fn has_mechanism(&self, kind: MechanismKind) -> bool {
        self.mechanism(kind).is_some()
    }

    pub fn mechanism(&self, kind: MechanismKind) -> Option<&Mechanism> {
        self.mechanisms.iter().find(|m| m.kind() == kind)
    }

    pub fn mechanisms(&self) -> &[Mechanism] {
        &self.mechanisms
    }

    pub fn reversal(&self, ion: Ion) -> Option<f64> {
        self.reversal.get(&ion).copied()
    }

    /// Reads a range variable: `cm`, an ion reversal (`ena`, `ek`, `eca`) or
    /// a mechanism parameter (`gbar_NaV`).
    pub fn get(&self, name: &str) -> CellResult<f64> {
        if name == "cm" {
            return Ok(self.cm);
        }
        if let Some(ion) = Ion::from_reversal_name(name) {
            return self.reversal(ion).ok_or_else(|| self.ion_missing(ion));
        }
        let (param, kind) = self.resolve(name)?;
        let mechanism = self
            .mechanism(kind)
            .ok_or_else(|| self.not_inserted(kind))?;
        mechanism
            .get(param)
            .ok_or_else(|| self.unknown_range(name))
    }

    /// Writes a range variable, uniformly across all segments.
    pub fn set(&mut self, name: &str, value: f64) -> CellResult<()> {
        if name == "cm" {
            return self.set_cm(value);
        }
        if let Some(ion) = Ion::from_reversal_name(name) {
            let err = self.ion_missing(ion);
            let slot = self.reversal.get_mut(&ion).ok_or(err)?;
            *slot = value;
            return Ok(());
        }
        let (param, kind) = self.resolve(name)?;
        let not_inserted = self.not_inserted(kind);
        let unknown = self.unknown_range(name);
        let mechanism = self
            .mechanisms
            .iter_mut()
            .find(|m| m.kind() == kind)
            .ok_or(not_inserted)?;
        if mechanism.set(param, value) {
            Ok(())
        } else {
            Err(unknown)
        }
    }

    fn resolve<'a>(&self, name: &'a str) -> CellResult<(&'a str, MechanismKind)> {
        split_range_name(name).ok_or_else(|| self.unknown_range(name))
    }

    fn ion_missing(&self, ion: Ion) -> CellError {
        CellError::IonNotPresent {
            compartment: self.name.clone(),
            ion: ion.name().to_owned(),
        }
    }

    fn not_inserted(&self, kind: MechanismKind) -> CellError {
        CellError::MechanismNotInserted {
            compartment: self.name.clone(),
            mechanism: kind.name().to_owned(),
        }
    }

    fn unknown_range(&self, name: &str) -> CellError {
        CellError::UnknownRangeVariable {
            compartment: self.name.clone(),
            name: name.to_owned(),
        }
    }
}

impl fmt::Display for Compartment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Owns every compartment of a cell; compartments refer to each other by id.
#[derive(Debug, Clone, Default)]
pub struct Compartments {
    components: Vec<Compartment>,
}

impl Compartments {
    pub fn new() -> Compartments {
        Compartments::default()
    }

    pub fn create(&mut self, name: impl Into<String>) -> CompartmentId {
        let idx = CompartmentId(self.components.len());
        self.components.push(Compartment::new(name.into(), idx));
        idx
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, id: CompartmentId) -> &Compartment {
        &self.components[id.0]
    }

    pub fn get_mut(&mut self, id: CompartmentId) -> &mut Compartment {
        &mut self.components[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Compartment> {
        self.components.iter()
    }

    /// Attaches the 0 end of `child` to `parent` at `parent_x`.
    pub fn connect(
        &mut self,
        child: CompartmentId,
        parent: CompartmentId,
        parent_x: f64,
    ) -> CellResult<()> {
        if !(0.0..=1.0).contains(&parent_x) {
            return Err(CellError::InvalidPosition(parent_x));
        }
        let refuse = |reason| CellError::Connection {
            child: self.get(child).name.clone(),
            parent: self.get(parent).name.clone(),
            reason,
        };
        if child == parent {
            return Err(refuse("a compartment cannot be its own parent"));
        }
        if self.get(child).parent.is_some() {
            return Err(refuse("child is already connected"));
        }
        if self.ancestors(parent).any(|id| id == child) {
            return Err(refuse("connection would form a loop"));
        }

        self.get_mut(child).parent = Some(Connection { parent, parent_x });
        self.get_mut(parent).children.push(child);
        Ok(())
    }

    /// Keeps the compartments `keep` accepts and renumbers them densely.
    /// Returns the old -> new id mapping. Children of dropped compartments
    /// become roots.
    pub fn retain<F>(&mut self, keep: F) -> HashMap<CompartmentId, CompartmentId>
    where
        F: Fn(CompartmentId) -> bool,
    {
        let remap: HashMap<CompartmentId, CompartmentId> = self
            .components
            .iter()
            .map(|c| c.idx)
            .filter(|id| keep(*id))
            .enumerate()
            .map(|(new, old)| (old, CompartmentId(new)))
            .collect();

        let old = std::mem::take(&mut self.components);
        for mut comp in old {
            let Some(&idx) = remap.get(&comp.idx) else {
                continue;
            };
            comp.idx = idx;
            comp.parent = comp.parent.and_then(|conn| {
                remap.get(&conn.parent).map(|&parent| Connection {
                    parent,
                    parent_x: conn.parent_x,
                })
            });
            comp.children = comp
                .children
                .iter()
                .filter_map(|child| remap.get(child).copied())
                .collect();
            self.components.push(comp);
        }
        remap
    }

    /// Walks from `id` up to its root, `id` included.
    pub fn ancestors(&self, id: CompartmentId) -> impl Iterator<Item = CompartmentId> + '_ {
        std::iter::successors(Some(id), move |curr| {
            self.get(*curr).parent.map(|conn| conn.parent)
        })
    }

    pub fn roots(&self) -> impl Iterator<Item = CompartmentId> + '_ {
        self.components
            .iter()
            .filter(|c| c.parent.is_none())
            .map(|c| c.idx)
    }
}
