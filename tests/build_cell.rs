use std::fs;
use std::path::Path;

use cell_template_rs::neuron::{DEFAULT_NAME, MORPHOLOGY_FILE};
use cell_template_rs::{
    segments_for_length, Biophysics, CellError, CellOptions, Group, MechanismKind, Neuron471085845,
};

fn fixture_dir() -> tempfile::TempDir {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let basic = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/basic.swc");
    fs::copy(basic, dir.path().join(MORPHOLOGY_FILE)).unwrap();
    dir
}

#[test]
fn builds_from_reconstruction_file() {
    let dir = fixture_dir();
    let neuron = Neuron471085845::new(CellOptions::in_dir(dir.path())).unwrap();
    let cell = neuron.cell();

    assert_eq!(neuron.to_string(), DEFAULT_NAME);
    assert_eq!(cell.group(Group::Soma).len(), 1);
    assert_eq!(cell.group(Group::Dend).len(), 3);
    assert_eq!(cell.group(Group::Axon).len(), 2);
    assert_eq!(cell.group(Group::All).len(), 6);

    for comp in cell.compartments().iter() {
        assert_eq!(comp.nseg(), segments_for_length(comp.length()));
        assert!(comp.has_mechanism(MechanismKind::Passive));
        assert_eq!(comp.has_mechanism(MechanismKind::NaV), comp.name() == "soma[0]");
    }
    // 60 um apical dendrite
    assert_eq!(cell.find("dend[2]").unwrap().nseg(), 3);

    let topology = cell.topology();
    assert!(topology.contains("  axon[0] @ soma[0](0.5)"));
    assert!(topology.contains("    axon[1] @ axon[0](1)"));
}

#[test]
fn custom_biophysics_from_toml() {
    let dir = fixture_dir();
    let toml_path = dir.path().join("biophysics.toml");
    fs::write(&toml_path, "ra = 100.0\n\n[axon]\ng_pas = 0.002\n").unwrap();

    let options = CellOptions {
        biophysics: Biophysics::from_path(&toml_path).unwrap(),
        ..CellOptions::in_dir(dir.path())
    };
    let neuron = Neuron471085845::new(options).unwrap();
    let cell = neuron.cell();
    let soma = cell.find("soma[0]").unwrap();
    assert_eq!(soma.ra(), 100.0);
    assert_eq!(soma.get("gbar_NaV").unwrap(), 0.0503524);
    assert_eq!(cell.find("axon[1]").unwrap().get("g_pas").unwrap(), 0.002);
}

#[test]
fn misspelled_range_variable_is_reported() {
    let dir = fixture_dir();
    let mut biophysics = Biophysics::default();
    biophysics.soma.range.insert("gbar_Nav".to_owned(), 0.1);
    let options = CellOptions {
        biophysics,
        ..CellOptions::in_dir(dir.path())
    };
    assert!(matches!(
        Neuron471085845::new(options),
        Err(CellError::UnknownRangeVariable { .. })
    ));
}
