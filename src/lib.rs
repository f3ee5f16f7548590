//! Builds the Allen Cell Types biophysical model 471085845: an SWC
//! reconstruction with its axon swapped for a two-compartment stub, passive
//! membrane everywhere, an active soma and length-based discretization.

pub mod cell;
pub mod channels;
pub mod compartments;
pub mod error;
pub mod morphology;
pub mod neuron;
pub mod parameters;
pub mod swc_reader;

pub use cell::{Cell, Group, Label};
pub use channels::{Ion, Mechanism, MechanismKind};
pub use compartments::{segments_for_length, Compartment, CompartmentId, Compartments, Connection, Point3d};
pub use error::{CellError, CellResult};
pub use morphology::{load_swc, load_swc_str, LoadOptions};
pub use neuron::{CellOptions, Neuron471085845};
pub use parameters::{Biophysics, GroupBiophysics};

/// A Python module implemented in Rust.
#[cfg(feature = "python")]
#[pyo3::pymodule]
mod cell_template_rs {
    use pyo3::exceptions::{PyIOError, PyValueError};
    use pyo3::prelude::*;
    use std::path::PathBuf;

    use crate::cell::Group;
    use crate::error::CellError;
    use crate::neuron::{self, CellOptions, Neuron471085845};

    fn to_py(err: CellError) -> PyErr {
        match err {
            CellError::Io { .. } => PyIOError::new_err(err.to_string()),
            other => PyValueError::new_err(other.to_string()),
        }
    }

    #[pyclass(name = "Neuron471085845", frozen)]
    struct PyNeuron {
        inner: Neuron471085845,
    }

    #[pymethods]
    impl PyNeuron {
        #[new]
        #[pyo3(signature = (name = Some(neuron::DEFAULT_NAME.to_owned()), x = 0.0, y = 0.0, z = 0.0, morphology = None))]
        fn new(
            name: Option<String>,
            x: f64,
            y: f64,
            z: f64,
            morphology: Option<PathBuf>,
        ) -> PyResult<Self> {
            let mut options = CellOptions {
                name,
                offset: [x, y, z],
                ..CellOptions::default()
            };
            if let Some(path) = morphology {
                options.morphology = path;
            }
            let inner = Neuron471085845::new(options).map_err(to_py)?;
            Ok(PyNeuron { inner })
        }

        fn __str__(&self) -> String {
            self.inner.to_string()
        }

        /// Compartment names in `soma`, `dend`, `axon` or `all`.
        fn group(&self, group: &str) -> PyResult<Vec<String>> {
            let group = Group::from_name(group)
                .ok_or_else(|| PyValueError::new_err(format!("Unknown group: {}", group)))?;
            let cell = self.inner.cell();
            Ok(cell
                .group(group)
                .iter()
                .map(|id| cell.get(*id).name().to_owned())
                .collect())
        }

        /// (name, L, diam, nseg) for every compartment.
        fn geometry(&self) -> Vec<(String, f64, f64, u32)> {
            self.inner
                .cell()
                .compartments()
                .iter()
                .map(|c| (c.name().to_owned(), c.length(), c.diam(), c.nseg()))
                .collect()
        }

        /// Reads a range variable such as `gbar_NaV` from one compartment.
        fn get(&self, compartment: &str, name: &str) -> PyResult<f64> {
            let comp = self
                .inner
                .cell()
                .find(compartment)
                .ok_or_else(|| PyValueError::new_err(format!("No compartment {}", compartment)))?;
            comp.get(name).map_err(to_py)
        }

        fn topology(&self) -> String {
            self.inner.cell().topology()
        }
    }
}
