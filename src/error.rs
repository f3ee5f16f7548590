use std::path::PathBuf;

/// Everything that can go wrong while building a cell.
#[derive(Debug, thiserror::Error)]
pub enum CellError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed SWC at line {line}: {reason}")]
    SwcParse { line: usize, reason: String },

    #[error("Morphology contains no points")]
    EmptyMorphology,

    #[error("Morphology has no soma points")]
    NoSoma,

    #[error("SWC point {node_id} references missing parent {parent_id}")]
    MissingParent { node_id: u64, parent_id: u64 },

    #[error("SWC point {0} is not reachable from any root")]
    Unreachable(u64),

    #[error("Zero radius for non-endpoint SWC point {node_id}")]
    ZeroRadius { node_id: u64 },

    #[error("Unknown mechanism: {0}")]
    UnknownMechanism(String),

    #[error("Mechanism {mechanism} is not inserted in {compartment}")]
    MechanismNotInserted {
        compartment: String,
        mechanism: String,
    },

    #[error("{name} is not a range variable of {compartment}")]
    UnknownRangeVariable { compartment: String, name: String },

    #[error("No mechanism in {compartment} uses the {ion} ion")]
    IonNotPresent { compartment: String, ion: String },

    #[error("Position {0} is outside [0, 1]")]
    InvalidPosition(f64),

    #[error("Invalid {attribute} = {value} for {compartment}")]
    InvalidGeometry {
        compartment: String,
        attribute: &'static str,
        value: f64,
    },

    #[error("Cannot connect {child} to {parent}: {reason}")]
    Connection {
        child: String,
        parent: String,
        reason: &'static str,
    },

    #[error("Invalid biophysics config: {0}")]
    Config(#[from] toml::de::Error),
}

pub type CellResult<T> = Result<T, CellError>;
