//! Biophysical parameter table for model 471085845.
//!
//! The defaults are the fitted values. A TOML file can override any of them:
//!
//! ```toml
//! ra = 150.0
//!
//! [soma]
//! cm = 1.0
//!
//! [soma.range]
//! gbar_NaV = 0.06
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Group};
use crate::error::{CellError, CellResult};

/// Capacitance (uF/cm2) shared by every group.
pub const CM: f64 = 1.15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BiophysicsOverlay")]
pub struct Biophysics {
    /// Axial resistance (ohm cm), every compartment
    pub ra: f64,
    /// Leak reversal potential (mV), every compartment
    pub e_pas: f64,
    pub axon: GroupBiophysics,
    pub dend: GroupBiophysics,
    pub soma: GroupBiophysics,
}

/// Values written to every compartment of one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupBiophysics {
    pub cm: f64,
    pub g_pas: f64,
    /// Any other range variable, e.g. `ena` or `gbar_NaV`
    pub range: BTreeMap<String, f64>,
}

/// What a TOML file may set. Every key is optional and lands on top of the
/// fitted table; `range` entries are merged key by key.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BiophysicsOverlay {
    ra: Option<f64>,
    e_pas: Option<f64>,
    axon: Option<GroupOverlay>,
    dend: Option<GroupOverlay>,
    soma: Option<GroupOverlay>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupOverlay {
    cm: Option<f64>,
    g_pas: Option<f64>,
    #[serde(default)]
    range: BTreeMap<String, f64>,
}

impl GroupOverlay {
    fn merge_into(self, base: &mut GroupBiophysics) {
        if let Some(cm) = self.cm {
            base.cm = cm;
        }
        if let Some(g_pas) = self.g_pas {
            base.g_pas = g_pas;
        }
        base.range.extend(self.range);
    }
}

impl From<BiophysicsOverlay> for Biophysics {
    fn from(overlay: BiophysicsOverlay) -> Self {
        let mut table = Biophysics::default();
        if let Some(ra) = overlay.ra {
            table.ra = ra;
        }
        if let Some(e_pas) = overlay.e_pas {
            table.e_pas = e_pas;
        }
        for (group, base) in [
            (overlay.axon, &mut table.axon),
            (overlay.dend, &mut table.dend),
            (overlay.soma, &mut table.soma),
        ] {
            if let Some(group) = group {
                group.merge_into(base);
            }
        }
        table
    }
}

impl Default for Biophysics {
    fn default() -> Self {
        let soma_range = [
            ("ena", 53.0),
            ("ek", -107.0),
            ("gbar_Ih", 0.000203079),
            ("gbar_NaV", 0.0503524),
            ("gbar_Kd", 0.0),
            ("gbar_Kv2like", 0.00859707),
            ("gbar_Kv3_1", 0.8032),
            ("gbar_K_T", 0.0185335),
            ("gbar_Im_v2", 0.00745333),
            ("gbar_SK", 0.0166183),
            ("gbar_Ca_HVA", 0.000511448),
            ("gbar_Ca_LVA", 0.00976219),
            ("gamma_CaDynamics", 9.24734e-09),
            ("decay_CaDynamics", 233.08),
        ];
        Biophysics {
            ra: 192.6,
            e_pas: -88.530632019,
            axon: GroupBiophysics {
                cm: CM,
                g_pas: 0.000853481534938,
                range: BTreeMap::new(),
            },
            dend: GroupBiophysics {
                cm: CM,
                g_pas: 5.3397118226e-06,
                range: BTreeMap::new(),
            },
            soma: GroupBiophysics {
                cm: CM,
                g_pas: 6.41992e-05,
                range: soma_range
                    .into_iter()
                    .map(|(name, value)| (name.to_owned(), value))
                    .collect(),
            },
        }
    }
}

impl Biophysics {
    /// Missing keys keep the fitted values. Unknown keys are an error.
    pub fn from_toml_str(text: &str) -> CellResult<Biophysics> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> CellResult<Biophysics> {
        let text = fs::read_to_string(path).map_err(|source| CellError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let biophysics = Biophysics::from_toml_str(&text)?;
        info!("Loaded biophysics from {}", path.display());
        Ok(biophysics)
    }

    pub fn group(&self, group: Group) -> Option<&GroupBiophysics> {
        match group {
            Group::Soma => Some(&self.soma),
            Group::Dend => Some(&self.dend),
            Group::Axon => Some(&self.axon),
            Group::All => None,
        }
    }

    /// Writes the table onto the cell. Needs `pas` (and whatever the range
    /// entries name) already inserted.
    pub fn apply(&self, cell: &mut Cell) -> CellResult<()> {
        let (ra, e_pas) = (self.ra, self.e_pas);
        cell.for_each_in(Group::All, |comp| {
            comp.set_ra(ra)?;
            comp.set("e_pas", e_pas)
        })?;

        for group in [Group::Axon, Group::Dend, Group::Soma] {
            let Some(values) = self.group(group) else {
                continue;
            };
            cell.for_each_in(group, |comp| {
                comp.set_cm(values.cm)?;
                comp.set("g_pas", values.g_pas)?;
                for (name, value) in &values.range {
                    comp.set(name, *value)?;
                }
                Ok(())
            })?;
        }
        info!("Assigned biophysics to {} compartments", cell.group(Group::All).len());
        Ok(())
    }
}
