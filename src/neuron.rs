//! Allen Cell Types model 471085845, a fast-spiking Pvalb-IRES-Cre
//! interneuron fitted on an all-active soma with passive dendrites.

use std::fmt;
use std::path::{Path, PathBuf};

use log::info;

use crate::cell::{Cell, Group, Label};
use crate::channels::MechanismKind;
use crate::error::{CellError, CellResult};
use crate::morphology::{self, LoadOptions, SOMA_ATTACH_X};
use crate::parameters::Biophysics;

pub const DEFAULT_NAME: &str = "Neuron471085845";
/// Shown when the cell was built without a name.
pub const UNNAMED: &str = "Neuron471085845_instance";
pub const MORPHOLOGY_FILE: &str = "Pvalb-IRES-Cre_Ai14_IVSCC_-165874.04.02.01_464113242_m.swc";

pub const AXON_STUB_LENGTH: f64 = 30.0;
pub const AXON_STUB_DIAM: f64 = 1.0;

/// Active mechanisms inserted on the soma, in insertion order.
pub const SOMATIC_MECHANISMS: [&str; 11] = [
    "CaDynamics",
    "Ca_HVA",
    "Ca_LVA",
    "Ih",
    "Im_v2",
    "K_T",
    "Kd",
    "Kv2like",
    "Kv3_1",
    "NaV",
    "SK",
];

#[derive(Debug, Clone)]
pub struct CellOptions {
    pub name: Option<String>,
    /// x, y, z position offset
    pub offset: [f64; 3],
    pub morphology: PathBuf,
    pub biophysics: Biophysics,
}

impl Default for CellOptions {
    fn default() -> Self {
        CellOptions {
            name: Some(DEFAULT_NAME.to_owned()),
            offset: [0.0; 3],
            morphology: PathBuf::from(MORPHOLOGY_FILE),
            biophysics: Biophysics::default(),
        }
    }
}

impl CellOptions {
    /// Looks for the reconstruction file in `dir`.
    pub fn in_dir(dir: &Path) -> CellOptions {
        CellOptions {
            morphology: dir.join(MORPHOLOGY_FILE),
            ..CellOptions::default()
        }
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            offset: self.offset,
            use_axon: false,
            strict: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Neuron471085845 {
    cell: Cell,
}

impl Neuron471085845 {
    pub fn new(options: CellOptions) -> CellResult<Neuron471085845> {
        let cell = morphology::load_swc(&options.morphology, &options.load_options())?;
        Neuron471085845::build(cell, options)
    }

    /// Same as [`Neuron471085845::new`] with the reconstruction given as SWC
    /// text; `options.morphology` is ignored.
    pub fn from_swc_str(text: &str, options: CellOptions) -> CellResult<Neuron471085845> {
        let cell = morphology::load_swc_str(text, &options.load_options())?;
        Neuron471085845::build(cell, options)
    }

    fn build(mut cell: Cell, options: CellOptions) -> CellResult<Neuron471085845> {
        attach_axon_stub(&mut cell)?;
        cell.set_name(options.name);
        insert_mechanisms(&mut cell)?;
        discretize(&mut cell);
        options.biophysics.apply(&mut cell)?;
        info!(
            "{} ready with {} compartments",
            cell.name().unwrap_or(UNNAMED),
            cell.group(Group::All).len()
        );
        Ok(Neuron471085845 { cell })
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn into_cell(self) -> Cell {
        self.cell
    }

    pub fn name(&self) -> Option<&str> {
        self.cell.name()
    }
}

impl fmt::Display for Neuron471085845 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cell.name().unwrap_or(UNNAMED))
    }
}

/// Replaces whatever axon was loaded with two 30 um x 1 um compartments in
/// series off the middle of the soma.
pub fn attach_axon_stub(cell: &mut Cell) -> CellResult<()> {
    cell.discard_axon();
    let soma = cell.group(Group::Soma).first().copied().ok_or(CellError::NoSoma)?;

    let axon = [cell.add(Label::Axon, "axon[0]"), cell.add(Label::Axon, "axon[1]")];
    for id in axon {
        let comp = cell.get_mut(id);
        comp.set_length(AXON_STUB_LENGTH)?;
        comp.set_diam(AXON_STUB_DIAM)?;
        comp.set_nseg(1)?;
    }
    cell.connect(axon[0], soma, SOMA_ATTACH_X)?;
    cell.connect(axon[1], axon[0], 1.0)?;
    Ok(())
}

/// `pas` everywhere, the active set on the soma only.
pub fn insert_mechanisms(cell: &mut Cell) -> CellResult<()> {
    cell.for_each_in(Group::All, |comp| {
        comp.insert(MechanismKind::Passive);
        Ok(())
    })?;
    cell.for_each_in(Group::Soma, |comp| {
        SOMATIC_MECHANISMS
            .iter()
            .try_for_each(|name| comp.insert_named(name))
    })
}

pub fn discretize(cell: &mut Cell) {
    let ids = cell.group(Group::All).to_vec();
    for id in ids {
        cell.get_mut(id).discretize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compartments::segments_for_length;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // soma, a 90 um basal trunk forking into two 45 um tips, a 20 um
    // apical stub and a two-point axon
    const SWC: &str = "\
1 1 0 0 0 10 -1
2 3 0 30 0 2 1
3 3 0 60 0 2 2
4 3 0 90 0 2 3
5 3 45 90 0 1 4
6 3 -45 90 0 1 4
7 4 0 -20 0 1.5 1
8 2 10 0 0 0.5 1
9 2 200 0 0 0.5 8
";

    fn neuron() -> Neuron471085845 {
        init();
        Neuron471085845::from_swc_str(SWC, CellOptions::default()).unwrap()
    }

    #[test]
    fn test_display_name() {
        let named = neuron();
        assert_eq!(named.to_string(), DEFAULT_NAME);

        let custom = Neuron471085845::from_swc_str(
            SWC,
            CellOptions {
                name: Some("pv_cell_3".to_owned()),
                ..CellOptions::default()
            },
        )
        .unwrap();
        assert_eq!(custom.to_string(), "pv_cell_3");

        let unnamed = Neuron471085845::from_swc_str(
            SWC,
            CellOptions {
                name: None,
                ..CellOptions::default()
            },
        )
        .unwrap();
        assert_eq!(unnamed.to_string(), UNNAMED);
        assert_eq!(unnamed.name(), None);
    }

    #[test]
    fn test_axon_stub_replaces_reconstruction() {
        let n = neuron();
        let cell = n.cell();
        let axon = cell.group(Group::Axon);
        assert_eq!(axon.len(), 2);

        let soma = cell.group(Group::Soma)[0];
        let a0 = cell.get(axon[0]);
        let a1 = cell.get(axon[1]);
        assert_eq!((a0.name(), a1.name()), ("axon[0]", "axon[1]"));
        for comp in [a0, a1] {
            assert_eq!(comp.length(), 30.0);
            assert_eq!(comp.diam(), 1.0);
            assert_eq!(comp.nseg(), 1);
            assert!(comp.points().is_empty());
        }
        let c0 = a0.parent().unwrap();
        assert_eq!((c0.parent, c0.parent_x), (soma, 0.5));
        let c1 = a1.parent().unwrap();
        assert_eq!((c1.parent, c1.parent_x), (a0.id(), 1.0));
    }

    #[test]
    fn test_stub_discards_loaded_axon() {
        let mut cell = morphology::load_swc_str(SWC, &LoadOptions::default()).unwrap();
        assert_eq!(cell.group(Group::Axon).len(), 1);
        assert!((cell.find("axon[0]").unwrap().length() - 200.0).abs() < 1e-9);

        attach_axon_stub(&mut cell).unwrap();
        assert_eq!(cell.group(Group::Axon).len(), 2);
        assert_eq!(cell.find("axon[0]").unwrap().length(), 30.0);
        assert_eq!(cell.group(Group::All).len(), 7);
        assert_eq!(cell.compartments().len(), 7);
    }

    #[test]
    fn test_all_is_union_of_groups() {
        let n = neuron();
        let cell = n.cell();
        let mut union: Vec<_> = [Group::Soma, Group::Dend, Group::Axon]
            .iter()
            .flat_map(|g| cell.group(*g).iter().copied())
            .collect();
        let mut all = cell.group(Group::All).to_vec();
        union.sort();
        all.sort();
        assert_eq!(union, all);
        assert_eq!(all.len(), cell.compartments().len());
        assert_eq!(cell.group(Group::Dend).len(), 4);
    }

    #[test]
    fn test_mechanism_placement() {
        let n = neuron();
        let cell = n.cell();
        let soma = cell.group(Group::Soma)[0];
        for id in cell.group(Group::All) {
            let comp = cell.get(*id);
            assert!(comp.has_mechanism(MechanismKind::Passive));
            let expected = if *id == soma { 12 } else { 1 };
            assert_eq!(comp.mechanisms().len(), expected, "{}", comp.name());
        }
        let names: Vec<&str> = cell
            .get(soma)
            .mechanisms()
            .iter()
            .skip(1)
            .map(|m| m.kind().name())
            .collect();
        assert_eq!(names, SOMATIC_MECHANISMS);
    }

    #[test]
    fn test_parameters_match_table() {
        let n = neuron();
        let cell = n.cell();
        let soma = cell.get(cell.group(Group::Soma)[0]);
        assert_eq!(soma.cm(), 1.15);
        assert_eq!(soma.get("ena").unwrap(), 53.0);
        assert_eq!(soma.get("ek").unwrap(), -107.0);
        assert_eq!(soma.get("gbar_Kd").unwrap(), 0.0);
        assert_eq!(soma.get("gbar_NaV").unwrap(), 0.0503524);
        assert_eq!(soma.get("gbar_Kv3_1").unwrap(), 0.8032);
        assert_eq!(soma.get("gamma_CaDynamics").unwrap(), 9.24734e-09);
        assert_eq!(soma.get("decay_CaDynamics").unwrap(), 233.08);
        assert_eq!(soma.get("g_pas").unwrap(), 6.41992e-05);

        for id in cell.group(Group::All) {
            let comp = cell.get(*id);
            assert_eq!(comp.ra(), 192.6);
            assert_eq!(comp.cm(), 1.15);
            assert_eq!(comp.get("e_pas").unwrap(), -88.530632019);
        }
        for id in cell.group(Group::Axon) {
            let comp = cell.get(*id);
            assert_eq!(comp.get("g_pas").unwrap(), 0.000853481534938);
            assert!(matches!(
                comp.get("gbar_Kd"),
                Err(CellError::MechanismNotInserted { .. })
            ));
        }
        for id in cell.group(Group::Dend) {
            assert_eq!(cell.get(*id).get("g_pas").unwrap(), 5.3397118226e-06);
        }
    }

    #[test]
    fn test_discretization() {
        let n = neuron();
        let cell = n.cell();
        for comp in cell.compartments().iter() {
            assert_eq!(comp.nseg(), segments_for_length(comp.length()));
        }
        // trunk is 90 um
        assert_eq!(cell.find("dend[0]").unwrap().nseg(), 5);
        // tips are 45 um
        assert_eq!(cell.find("dend[2]").unwrap().nseg(), 3);
        // apical stub is 20 um
        assert_eq!(cell.find("dend[1]").unwrap().nseg(), 1);
    }

    #[test]
    fn test_zero_length_dendrites() {
        init();
        // dend[0] sits exactly on the soma point
        let coincident = "1 1 0 0 0 5 -1\n2 3 0 0 0 1 1\n3 3 0 50 0 1 1\n";
        let n = Neuron471085845::from_swc_str(coincident, CellOptions::default()).unwrap();
        let cell = n.cell();
        let stub = cell.find("dend[0]").unwrap();
        assert_eq!(stub.length(), 0.0);
        assert_eq!(stub.nseg(), 1);
        assert_eq!(stub.get("g_pas").unwrap(), 5.3397118226e-06);
        assert_eq!(cell.find("dend[1]").unwrap().nseg(), 3);

        // a lone dendritic point with no parent in the file
        let rootless = "1 1 0 0 0 5 -1\n2 3 0 20 0 1 -1\n";
        let n = Neuron471085845::from_swc_str(rootless, CellOptions::default()).unwrap();
        let cell = n.cell();
        let lone = cell.find("dend[0]").unwrap();
        assert_eq!(lone.length(), 0.0);
        assert_eq!(lone.nseg(), 1);
        let soma = cell.group(Group::Soma)[0];
        assert_eq!(lone.parent().unwrap().parent, soma);
        assert_eq!(cell.group(Group::All).len(), 4);
    }

    #[test]
    fn test_partial_range_override_keeps_reversals() {
        let biophysics = Biophysics::from_toml_str("[soma.range]\ngbar_NaV = 0.06\n").unwrap();
        let n = Neuron471085845::from_swc_str(
            SWC,
            CellOptions {
                biophysics,
                ..CellOptions::default()
            },
        )
        .unwrap();
        let soma = n.cell().get(n.cell().group(Group::Soma)[0]);
        assert_eq!(soma.get("gbar_NaV").unwrap(), 0.06);
        assert_eq!(soma.get("ena").unwrap(), 53.0);
        assert_eq!(soma.get("ek").unwrap(), -107.0);
        assert_eq!(soma.get("gbar_Kv3_1").unwrap(), 0.8032);
        assert_eq!(soma.get("g_pas").unwrap(), 6.41992e-05);
    }

    #[test]
    fn test_offset_moves_points() {
        let shifted = Neuron471085845::from_swc_str(
            SWC,
            CellOptions {
                offset: [5.0, 6.0, 7.0],
                ..CellOptions::default()
            },
        )
        .unwrap();
        let trunk = shifted.cell().find("dend[0]").unwrap();
        let p = trunk.points()[1];
        assert_eq!((p.x, p.y, p.z), (5.0, 36.0, 7.0));
    }

    #[test]
    fn test_missing_morphology() {
        let dir = tempfile::tempdir().unwrap();
        let err = Neuron471085845::new(CellOptions::in_dir(dir.path())).unwrap_err();
        match err {
            CellError::Io { path, .. } => assert!(path.ends_with(MORPHOLOGY_FILE)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_morphology_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MORPHOLOGY_FILE), SWC).unwrap();
        let n = Neuron471085845::new(CellOptions::in_dir(dir.path())).unwrap();
        assert_eq!(n.cell().group(Group::All).len(), 7);
    }
}
