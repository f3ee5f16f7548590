//!
//! The mechanisms define the membrane currents that can be placed in a compartment.
//! Names and range parameters follow the Allen Cell Types biophysical models, e.g.
//! https://nrn.readthedocs.io/en/9.0.0/tutorials/scripting-neuron-basics.html#Biophysical-mechanisms
//!

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CellError;

/// Ions whose reversal potential becomes a compartment attribute once a
/// mechanism using them is inserted.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone)]
pub enum Ion {
    Na,
    K,
    Ca,
}

impl Ion {
    pub fn name(self) -> &'static str {
        match self {
            Ion::Na => "na",
            Ion::K => "k",
            Ion::Ca => "ca",
        }
    }

    /// Reversal potential (mV) a compartment starts with.
    pub fn default_reversal(self) -> f64 {
        match self {
            Ion::Na => 50.0,
            Ion::K => -77.0,
            Ion::Ca => 132.457_934_582_335_9,
        }
    }

    /// Parses `ena`, `ek` and `eca`.
    pub fn from_reversal_name(name: &str) -> Option<Ion> {
        match name {
            "ena" => Some(Ion::Na),
            "ek" => Some(Ion::K),
            "eca" => Some(Ion::Ca),
            _ => None,
        }
    }
}

impl fmt::Display for Ion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone)]
pub enum MechanismKind {
    Passive,
    CaDynamics,
    CaHva,
    CaLva,
    Ih,
    ImV2,
    KT,
    Kd,
    Kv2like,
    Kv31,
    NaV,
    SK,
}

impl MechanismKind {
    pub const ALL: [MechanismKind; 12] = [
        MechanismKind::Passive,
        MechanismKind::CaDynamics,
        MechanismKind::CaHva,
        MechanismKind::CaLva,
        MechanismKind::Ih,
        MechanismKind::ImV2,
        MechanismKind::KT,
        MechanismKind::Kd,
        MechanismKind::Kv2like,
        MechanismKind::Kv31,
        MechanismKind::NaV,
        MechanismKind::SK,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MechanismKind::Passive => "pas",
            MechanismKind::CaDynamics => "CaDynamics",
            MechanismKind::CaHva => "Ca_HVA",
            MechanismKind::CaLva => "Ca_LVA",
            MechanismKind::Ih => "Ih",
            MechanismKind::ImV2 => "Im_v2",
            MechanismKind::KT => "K_T",
            MechanismKind::Kd => "Kd",
            MechanismKind::Kv2like => "Kv2like",
            MechanismKind::Kv31 => "Kv3_1",
            MechanismKind::NaV => "NaV",
            MechanismKind::SK => "SK",
        }
    }

    /// Range parameters and their values right after insertion.
    pub fn parameters(self) -> &'static [(&'static str, f64)] {
        match self {
            MechanismKind::Passive => &[("g", 0.001), ("e", -70.0)],
            MechanismKind::CaDynamics => &[
                ("gamma", 0.05),
                ("decay", 80.0),
                ("depth", 0.1),
                ("minCai", 1e-4),
            ],
            MechanismKind::Ih => &[("gbar", 1e-5), ("ehcn", -45.0)],
            _ => &[("gbar", 1e-5)],
        }
    }

    pub fn ions(self) -> &'static [Ion] {
        match self {
            MechanismKind::Passive | MechanismKind::Ih => &[],
            MechanismKind::CaDynamics | MechanismKind::CaHva | MechanismKind::CaLva => &[Ion::Ca],
            MechanismKind::ImV2
            | MechanismKind::KT
            | MechanismKind::Kd
            | MechanismKind::Kv2like
            | MechanismKind::Kv31 => &[Ion::K],
            MechanismKind::NaV => &[Ion::Na],
            // SK reads internal calcium and carries potassium
            MechanismKind::SK => &[Ion::K, Ion::Ca],
        }
    }
}

impl FromStr for MechanismKind {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MechanismKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| CellError::UnknownMechanism(s.to_owned()))
    }
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A mechanism instance living in one compartment.
#[derive(Debug, Clone, PartialEq)]
pub struct Mechanism {
    kind: MechanismKind,
    params: BTreeMap<&'static str, f64>,
}

impl Mechanism {
    pub fn new(kind: MechanismKind) -> Mechanism {
        Mechanism {
            kind,
            params: kind.parameters().iter().copied().collect(),
        }
    }

    pub fn kind(&self) -> MechanismKind {
        self.kind
    }

    pub fn get(&self, param: &str) -> Option<f64> {
        self.params.get(param).copied()
    }

    /// Returns false if the mechanism has no such parameter.
    pub(crate) fn set(&mut self, param: &str, value: f64) -> bool {
        match self.params.get_mut(param) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn params(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.params.iter().map(|(k, v)| (*k, *v))
    }
}

/// Splits `gbar_Kv3_1` into (`gbar`, Kv3_1). The longest matching mechanism
/// suffix wins.
pub fn split_range_name(name: &str) -> Option<(&str, MechanismKind)> {
    MechanismKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let param = name.strip_suffix(kind.name())?.strip_suffix('_')?;
            (!param.is_empty()).then_some((param, kind))
        })
        .max_by_key(|(_, kind)| kind.name().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names() {
        for kind in MechanismKind::ALL {
            assert_eq!(kind.name().parse::<MechanismKind>().unwrap(), kind);
        }
        assert!(matches!(
            "hh".parse::<MechanismKind>(),
            Err(CellError::UnknownMechanism(name)) if name == "hh"
        ));
    }

    #[test]
    fn test_split_range_name() {
        assert_eq!(split_range_name("gbar_Kv3_1"), Some(("gbar", MechanismKind::Kv31)));
        assert_eq!(split_range_name("gbar_K_T"), Some(("gbar", MechanismKind::KT)));
        assert_eq!(split_range_name("g_pas"), Some(("g", MechanismKind::Passive)));
        assert_eq!(
            split_range_name("decay_CaDynamics"),
            Some(("decay", MechanismKind::CaDynamics))
        );
        assert_eq!(split_range_name("gbar_Im_v2"), Some(("gbar", MechanismKind::ImV2)));
        assert_eq!(split_range_name("_pas"), None);
        assert_eq!(split_range_name("cm"), None);
    }

    #[test]
    fn test_mechanism_params() {
        let mut nav = Mechanism::new(MechanismKind::NaV);
        assert_eq!(nav.get("gbar"), Some(1e-5));
        assert!(nav.set("gbar", 0.05));
        assert_eq!(nav.get("gbar"), Some(0.05));
        assert!(!nav.set("gamma", 1.0));
        assert_eq!(nav.params().count(), 1);
    }
}
