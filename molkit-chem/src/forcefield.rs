//! Force field energy calculations and minimization.
//!
//! Implements UFF (Universal Force Field) and MMFF94 energy terms:
//! bond stretching, angle bending, torsion, van der Waals, and electrostatic.
//! Provides steepest descent and conjugate gradient minimization.
//!
//! Terms are collected once per molecule into an energy model, so the
//! minimiser's numerical gradient only re-evaluates geometry.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use log::debug;
use molkit_core::{MolkitError, Result};

use crate::conformer::Conformer;
use crate::gasteiger::gasteiger_charges;
use crate::linalg::{cross, dot, norm, sub, Vec3};
use crate::molecule::{BondOrder, Molecule};
use crate::ring::RingInfo;
use crate::valence::{hybridization, Hybridization};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Force field selector.
///
/// Parses from the keys `MMF`, `MMFF`, `MMFF94` and `UFF`, ignoring case;
/// anything else is [`MolkitError::InvalidSelector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ForceField {
    Mmff94,
    Uff,
}

impl FromStr for ForceField {
    type Err = MolkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MMF" | "MMFF" | "MMFF94" => Ok(ForceField::Mmff94),
            "UFF" => Ok(ForceField::Uff),
            _ => Err(MolkitError::InvalidSelector(s.to_string())),
        }
    }
}

impl fmt::Display for ForceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForceField::Mmff94 => f.write_str("MMFF94"),
            ForceField::Uff => f.write_str("UFF"),
        }
    }
}

/// Energy contributions from each force field term, in kcal/mol.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnergyComponents {
    pub bond_stretch: f64,
    pub angle_bend: f64,
    pub torsion: f64,
    pub van_der_waals: f64,
    pub electrostatic: f64,
    pub out_of_plane: f64,
    pub total: f64,
}

/// Result of energy minimization.
#[derive(Debug, Clone)]
pub struct MinimizeResult {
    pub conformer: Conformer,
    pub initial_energy: f64,
    pub final_energy: f64,
    pub n_steps: usize,
    pub converged: bool,
    pub energy_components: EnergyComponents,
}

/// Minimization method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MinimizeMethod {
    SteepestDescent,
    ConjugateGradient,
}

/// Minimization configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MinimizeConfig {
    pub max_steps: usize,
    /// Stop once the gradient norm (kcal/mol/Å) drops below this.
    pub gradient_threshold: f64,
    pub method: MinimizeMethod,
}

impl Default for MinimizeConfig {
    fn default() -> Self {
        MinimizeConfig {
            max_steps: 500,
            gradient_threshold: 0.1,
            method: MinimizeMethod::ConjugateGradient,
        }
    }
}

// ---------------------------------------------------------------------------
// UFF atom types
// ---------------------------------------------------------------------------

/// UFF atom type determined by element and hybridization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UffAtomType {
    H,
    C3, C2, CR, C1,
    N3, N2, NR, N1,
    O3, O2, OR,
    S3, S2,
    P3,
    F, Cl, Br, I,
    Si3, Se3,
}

/// UFF parameters for an atom type.
struct UffParams {
    r_cov: f64,      // covalent radius (Å)
    theta0: f64,     // ideal bond angle (degrees)
    x_vdw: f64,      // vdW distance (Å)
    d_vdw: f64,      // vdW well depth (kcal/mol)
    chi: f64,        // electronegativity (Rappé)
}

#[rustfmt::skip]
fn uff_params(at: UffAtomType) -> UffParams {
    match at {
        UffAtomType::H   => UffParams { r_cov: 0.354, theta0: 180.0,  x_vdw: 2.886, d_vdw: 0.044, chi: 2.20 },
        UffAtomType::C3  => UffParams { r_cov: 0.757, theta0: 109.47, x_vdw: 3.851, d_vdw: 0.105, chi: 2.55 },
        UffAtomType::C2  => UffParams { r_cov: 0.732, theta0: 120.0,  x_vdw: 3.851, d_vdw: 0.105, chi: 2.55 },
        UffAtomType::CR  => UffParams { r_cov: 0.729, theta0: 120.0,  x_vdw: 3.851, d_vdw: 0.105, chi: 2.55 },
        UffAtomType::C1  => UffParams { r_cov: 0.706, theta0: 180.0,  x_vdw: 3.851, d_vdw: 0.105, chi: 2.55 },
        UffAtomType::N3  => UffParams { r_cov: 0.700, theta0: 106.7,  x_vdw: 3.660, d_vdw: 0.069, chi: 3.04 },
        UffAtomType::N2  => UffParams { r_cov: 0.685, theta0: 120.0,  x_vdw: 3.660, d_vdw: 0.069, chi: 3.04 },
        UffAtomType::NR  => UffParams { r_cov: 0.683, theta0: 120.0,  x_vdw: 3.660, d_vdw: 0.069, chi: 3.04 },
        UffAtomType::N1  => UffParams { r_cov: 0.656, theta0: 180.0,  x_vdw: 3.660, d_vdw: 0.069, chi: 3.04 },
        UffAtomType::O3  => UffParams { r_cov: 0.658, theta0: 104.51, x_vdw: 3.500, d_vdw: 0.060, chi: 3.44 },
        UffAtomType::O2  => UffParams { r_cov: 0.634, theta0: 120.0,  x_vdw: 3.500, d_vdw: 0.060, chi: 3.44 },
        UffAtomType::OR  => UffParams { r_cov: 0.639, theta0: 120.0,  x_vdw: 3.500, d_vdw: 0.060, chi: 3.44 },
        UffAtomType::S3  => UffParams { r_cov: 1.016, theta0: 92.2,   x_vdw: 4.035, d_vdw: 0.274, chi: 2.58 },
        UffAtomType::S2  => UffParams { r_cov: 0.992, theta0: 120.0,  x_vdw: 4.035, d_vdw: 0.274, chi: 2.58 },
        UffAtomType::P3  => UffParams { r_cov: 1.018, theta0: 93.8,   x_vdw: 4.147, d_vdw: 0.305, chi: 2.19 },
        UffAtomType::F   => UffParams { r_cov: 0.668, theta0: 180.0,  x_vdw: 3.364, d_vdw: 0.050, chi: 3.98 },
        UffAtomType::Cl  => UffParams { r_cov: 1.033, theta0: 180.0,  x_vdw: 3.947, d_vdw: 0.227, chi: 3.16 },
        UffAtomType::Br  => UffParams { r_cov: 1.176, theta0: 180.0,  x_vdw: 4.189, d_vdw: 0.251, chi: 2.96 },
        UffAtomType::I   => UffParams { r_cov: 1.333, theta0: 180.0,  x_vdw: 4.500, d_vdw: 0.339, chi: 2.66 },
        UffAtomType::Si3 => UffParams { r_cov: 1.116, theta0: 109.47, x_vdw: 4.295, d_vdw: 0.402, chi: 1.90 },
        UffAtomType::Se3 => UffParams { r_cov: 1.170, theta0: 90.6,   x_vdw: 4.205, d_vdw: 0.291, chi: 2.55 },
    }
}

/// Assign UFF atom types to each atom in the molecule.
pub fn assign_uff_types(mol: &Molecule) -> Vec<UffAtomType> {
    (0..mol.atom_count())
        .map(|i| {
            let atom = &mol.atoms[i];
            let hyb = hybridization(mol, i);
            match atom.atomic_number {
                1 => UffAtomType::H,
                6 if atom.is_aromatic => UffAtomType::CR,
                6 => match hyb {
                    Hybridization::Sp => UffAtomType::C1,
                    Hybridization::Sp2 => UffAtomType::C2,
                    Hybridization::Sp3 => UffAtomType::C3,
                },
                7 if atom.is_aromatic => UffAtomType::NR,
                7 => match hyb {
                    Hybridization::Sp => UffAtomType::N1,
                    Hybridization::Sp2 => UffAtomType::N2,
                    Hybridization::Sp3 => UffAtomType::N3,
                },
                8 if atom.is_aromatic => UffAtomType::OR,
                8 if hyb == Hybridization::Sp3 => UffAtomType::O3,
                8 => UffAtomType::O2,
                16 if hyb == Hybridization::Sp3 => UffAtomType::S3,
                16 => UffAtomType::S2,
                15 => UffAtomType::P3,
                9 => UffAtomType::F,
                17 => UffAtomType::Cl,
                35 => UffAtomType::Br,
                53 => UffAtomType::I,
                14 => UffAtomType::Si3,
                34 => UffAtomType::Se3,
                _ => UffAtomType::C3,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// MMFF94 atom types
// ---------------------------------------------------------------------------

/// Simplified MMFF94 atom type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mmff94AtomType {
    CR,   // Alkyl carbon sp3
    C2,   // Vinylic carbon sp2
    C3,   // Carbonyl carbon sp2
    CAR,  // Aromatic carbon
    C1,   // Acetylenic carbon sp
    NR,   // Amine nitrogen sp3
    N2,   // Imine nitrogen sp2
    NAR,  // Aromatic nitrogen
    N1,   // Nitrile nitrogen sp
    OR,   // Ether/alcohol oxygen sp3
    O2,   // Carbonyl oxygen sp2
    OAR,  // Aromatic oxygen (furan)
    SR,   // Thiol/thioether sulfur
    S2,   // Thione sulfur
    SAR,  // Aromatic sulfur (thiophene)
    PR,   // Phosphorus sp3
    F,
    Cl,
    Br,
    I,
    H,
    HO,   // Hydrogen on oxygen
    HN,   // Hydrogen on nitrogen
    Si,
    Se,
    DU,   // Generic fallback
}

/// MMFF94 vdW parameters: minimum-energy separation `r_star` (Å) and well
/// depth factor `g`.
struct Mmff94VdwParams {
    r_star: f64,
    g: f64,
}

#[rustfmt::skip]
fn mmff94_vdw_params(at: Mmff94AtomType) -> Mmff94VdwParams {
    use Mmff94AtomType::*;
    match at {
        CR | C2 | C3 | CAR | C1 | DU => Mmff94VdwParams { r_star: 3.890, g: 1.282 },
        NR | N2 | NAR | N1           => Mmff94VdwParams { r_star: 3.890, g: 1.282 },
        OR | O2 | OAR                => Mmff94VdwParams { r_star: 3.890, g: 1.282 },
        SR | S2 | SAR                => Mmff94VdwParams { r_star: 4.250, g: 1.345 },
        PR                           => Mmff94VdwParams { r_star: 4.150, g: 1.345 },
        F                            => Mmff94VdwParams { r_star: 3.480, g: 1.282 },
        Cl                           => Mmff94VdwParams { r_star: 3.947, g: 1.345 },
        Br                           => Mmff94VdwParams { r_star: 4.189, g: 1.359 },
        I                            => Mmff94VdwParams { r_star: 4.500, g: 1.404 },
        H | HO | HN                  => Mmff94VdwParams { r_star: 3.340, g: 1.112 },
        Si                           => Mmff94VdwParams { r_star: 4.295, g: 1.345 },
        Se                           => Mmff94VdwParams { r_star: 4.205, g: 1.359 },
    }
}

/// Assign MMFF94 atom types to each atom in the molecule.
pub fn assign_mmff94_types(mol: &Molecule) -> Vec<Mmff94AtomType> {
    (0..mol.atom_count())
        .map(|i| {
            let atom = &mol.atoms[i];
            let hyb = hybridization(mol, i);
            match atom.atomic_number {
                1 => {
                    let parent = mol.adjacency[i].first().map(|&(nb, _)| mol.atoms[nb].atomic_number);
                    match parent {
                        Some(8) => Mmff94AtomType::HO,
                        Some(7) => Mmff94AtomType::HN,
                        _ => Mmff94AtomType::H,
                    }
                }
                6 if atom.is_aromatic => Mmff94AtomType::CAR,
                6 => {
                    let has_double_o = mol.adjacency[i].iter().any(|&(nb, bi)| {
                        mol.atoms[nb].atomic_number == 8 && mol.bonds[bi].order == BondOrder::Double
                    });
                    match hyb {
                        Hybridization::Sp => Mmff94AtomType::C1,
                        _ if has_double_o => Mmff94AtomType::C3,
                        Hybridization::Sp2 => Mmff94AtomType::C2,
                        Hybridization::Sp3 => Mmff94AtomType::CR,
                    }
                }
                7 if atom.is_aromatic => Mmff94AtomType::NAR,
                7 => match hyb {
                    Hybridization::Sp => Mmff94AtomType::N1,
                    Hybridization::Sp2 => Mmff94AtomType::N2,
                    Hybridization::Sp3 => Mmff94AtomType::NR,
                },
                8 if atom.is_aromatic => Mmff94AtomType::OAR,
                8 if hyb == Hybridization::Sp3 => Mmff94AtomType::OR,
                8 => Mmff94AtomType::O2,
                16 if atom.is_aromatic => Mmff94AtomType::SAR,
                16 if hyb == Hybridization::Sp3 => Mmff94AtomType::SR,
                16 => Mmff94AtomType::S2,
                15 => Mmff94AtomType::PR,
                9 => Mmff94AtomType::F,
                17 => Mmff94AtomType::Cl,
                35 => Mmff94AtomType::Br,
                53 => Mmff94AtomType::I,
                14 => Mmff94AtomType::Si,
                34 => Mmff94AtomType::Se,
                _ => Mmff94AtomType::DU,
            }
        })
        .collect()
}

#[rustfmt::skip]
fn mmff94_cov_radius(at: Mmff94AtomType) -> f64 {
    use Mmff94AtomType::*;
    match at {
        H | HO | HN => 0.33,
        CR | C2 | C3 | CAR | C1 | DU => 0.77,
        NR | N2 | NAR | N1 => 0.70,
        OR | O2 | OAR => 0.66,
        F => 0.64,
        SR | S2 | SAR => 1.04,
        Cl => 0.99,
        Br => 1.14,
        I => 1.33,
        PR => 1.10,
        Si | Se => 1.17,
    }
}

/// Heavier atoms have softer bonds.
fn mmff94_bond_scale(at: Mmff94AtomType) -> f64 {
    use Mmff94AtomType::*;
    match at {
        H | HO | HN => 0.8,
        CR | C2 | C3 | CAR | C1 => 1.0,
        NR | N2 | NAR | N1 => 1.1,
        OR | O2 | OAR => 1.2,
        F => 1.3,
        _ => 0.9,
    }
}

// ---------------------------------------------------------------------------
// Energy model
// ---------------------------------------------------------------------------

struct BondTerm {
    i: usize,
    j: usize,
    r0: f64,
    k: f64,
}

struct AngleTerm {
    i: usize,
    j: usize,
    k: usize,
    theta0: f64,
}

struct TorsionTerm {
    i: usize,
    j: usize,
    k: usize,
    l: usize,
    v: f64,
    n: f64,
    /// cos(n·φ0): -1 puts the minima at the staggered positions.
    phase: f64,
}

struct PairTerm {
    i: usize,
    j: usize,
    r_star: f64,
    eps: f64,
    qq: f64,
}

const ANGLE_K: f64 = 50.0; // kcal/mol/rad^2
const OOP_K: f64 = 15.0; // kcal/mol/rad^2
const COULOMB: f64 = 332.0637; // kcal*Å/(mol*e^2)
const MMFF_CUBIC_STRETCH: f64 = -2.0; // 1/Å

/// Every energy term of one molecule under one force field.
struct EnergyModel {
    field: ForceField,
    bonds: Vec<BondTerm>,
    angles: Vec<AngleTerm>,
    torsions: Vec<TorsionTerm>,
    pairs: Vec<PairTerm>,
    /// sp2 centres with exactly three neighbours.
    oop: Vec<[usize; 4]>,
}

impl EnergyModel {
    fn new(mol: &Molecule, field: ForceField) -> Self {
        let uff_types = assign_uff_types(mol);
        let mmff_types = assign_mmff94_types(mol);
        let charges = gasteiger_charges(mol);
        let rings = RingInfo::new(mol);

        let bonds = mol
            .bonds
            .iter()
            .map(|bond| {
                let (a, b) = (bond.atom1, bond.atom2);
                match field {
                    ForceField::Uff => {
                        let p1 = uff_params(uff_types[a]);
                        let p2 = uff_params(uff_types[b]);
                        let bo_corr = match bond.order {
                            BondOrder::Single => 0.0,
                            BondOrder::Aromatic => -0.0332,
                            BondOrder::Double => -0.0668,
                            BondOrder::Triple => -0.0997,
                        };
                        let r0 = p1.r_cov + p2.r_cov + bo_corr;
                        let k = (664.12 * p1.chi * p2.chi / (r0 * r0 * r0)).min(2000.0);
                        BondTerm { i: a, j: b, r0, k }
                    }
                    ForceField::Mmff94 => {
                        let (t1, t2) = (mmff_types[a], mmff_types[b]);
                        let (bo_corr, base) = match bond.order {
                            BondOrder::Single => (0.0, 300.0),
                            BondOrder::Aromatic => (-0.04, 400.0),
                            BondOrder::Double => (-0.08, 600.0),
                            BondOrder::Triple => (-0.12, 800.0),
                        };
                        BondTerm {
                            i: a,
                            j: b,
                            r0: mmff94_cov_radius(t1) + mmff94_cov_radius(t2) + bo_corr,
                            k: base * mmff94_bond_scale(t1) * mmff94_bond_scale(t2),
                        }
                    }
                }
            })
            .collect();

        let mut angles = Vec::new();
        for j in 0..mol.atom_count() {
            let nbrs = &mol.adjacency[j];
            let theta0 = uff_params(uff_types[j]).theta0.to_radians();
            for a in 0..nbrs.len() {
                for b in (a + 1)..nbrs.len() {
                    angles.push(AngleTerm { i: nbrs[a].0, j, k: nbrs[b].0, theta0 });
                }
            }
        }

        let mut torsions = Vec::new();
        for (bi, bond) in mol.bonds.iter().enumerate() {
            let (j, k) = (bond.atom1, bond.atom2);
            if mol.degree(j) < 2 || mol.degree(k) < 2 {
                continue;
            }
            let (v, n, phase) = torsion_params(uff_types[j], uff_types[k], bond.order);
            if v.abs() < 1e-10 {
                continue;
            }
            let v = if rings.is_bond_in_ring(bi) { v * 0.5 } else { v };
            for &(i, _) in &mol.adjacency[j] {
                if i == k {
                    continue;
                }
                for &(l, _) in &mol.adjacency[k] {
                    if l == j || l == i {
                        continue;
                    }
                    torsions.push(TorsionTerm { i, j, k, l, v, n, phase });
                }
            }
        }

        let excluded = build_exclusion_set(mol);
        let n = mol.atom_count();
        let mut pairs = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if excluded.contains(&(i, j)) {
                    continue;
                }
                let (r_star, eps) = match field {
                    ForceField::Uff => {
                        let p1 = uff_params(uff_types[i]);
                        let p2 = uff_params(uff_types[j]);
                        ((p1.x_vdw * p2.x_vdw).sqrt(), (p1.d_vdw * p2.d_vdw).sqrt())
                    }
                    ForceField::Mmff94 => {
                        let p1 = mmff94_vdw_params(mmff_types[i]);
                        let p2 = mmff94_vdw_params(mmff_types[j]);
                        ((p1.r_star + p2.r_star) / 2.0, (p1.g * p2.g).sqrt() * 0.05)
                    }
                };
                pairs.push(PairTerm { i, j, r_star, eps, qq: charges[i] * charges[j] });
            }
        }

        let oop = (0..n)
            .filter(|&j| mol.adjacency[j].len() == 3 && hybridization(mol, j) == Hybridization::Sp2)
            .map(|j| {
                let nb = &mol.adjacency[j];
                [j, nb[0].0, nb[1].0, nb[2].0]
            })
            .collect();

        EnergyModel { field, bonds, angles, torsions, pairs, oop }
    }

    fn evaluate(&self, coords: &[Vec3]) -> EnergyComponents {
        let dist = |a: usize, b: usize| norm(sub(coords[a], coords[b]));

        let mut e_bond = 0.0;
        for t in &self.bonds {
            let dr = dist(t.i, t.j) - t.r0;
            e_bond += match self.field {
                ForceField::Uff => 0.5 * t.k * dr * dr,
                // quartic-corrected cubic stretch stays bounded below
                ForceField::Mmff94 => {
                    let cs = MMFF_CUBIC_STRETCH;
                    0.5 * t.k * dr * dr * (1.0 + cs * dr + 7.0 / 12.0 * cs * cs * dr * dr)
                }
            };
        }

        let mut e_angle = 0.0;
        for t in &self.angles {
            let diff = bond_angle(coords, t.i, t.j, t.k) - t.theta0;
            e_angle += 0.5 * ANGLE_K * diff * diff;
        }

        let mut e_torsion = 0.0;
        for t in &self.torsions {
            let phi = torsion_angle(coords, t.i, t.j, t.k, t.l);
            e_torsion += 0.5 * t.v * (1.0 - t.phase * (t.n * phi).cos());
        }

        let mut e_vdw = 0.0;
        let mut e_elec = 0.0;
        for t in &self.pairs {
            let r = dist(t.i, t.j).max(0.1);
            if r > 10.0 {
                continue;
            }
            e_vdw += match self.field {
                ForceField::Uff => {
                    let r6 = (t.r_star / r).powi(6);
                    t.eps * (r6 * r6 - 2.0 * r6)
                }
                // buffered 14-7
                ForceField::Mmff94 => {
                    let rs7 = t.r_star.powi(7);
                    let a = (1.07 * t.r_star / (r + 0.07 * t.r_star)).powi(7);
                    t.eps * a * (1.12 * rs7 / (r.powi(7) + 0.12 * rs7) - 2.0)
                }
            };
            // distance-dependent dielectric ε = r
            e_elec += COULOMB * t.qq / (r * r);
        }

        let mut e_oop = 0.0;
        if self.field == ForceField::Mmff94 {
            for &[c, a, b, d] in &self.oop {
                for (x, y, z) in [(a, b, d), (b, d, a), (d, a, b)] {
                    let chi = wilson_angle(coords, c, x, y, z);
                    e_oop += 0.5 * OOP_K * chi * chi / 3.0;
                }
            }
        }

        EnergyComponents {
            bond_stretch: e_bond,
            angle_bend: e_angle,
            torsion: e_torsion,
            van_der_waals: e_vdw,
            electrostatic: e_elec,
            out_of_plane: e_oop,
            total: e_bond + e_angle + e_torsion + e_vdw + e_elec + e_oop,
        }
    }

    /// Central-difference gradient of the total energy.
    fn gradient(&self, coords: &mut [Vec3]) -> Vec<Vec3> {
        let dx = 1e-4;
        let mut grad = vec![[0.0; 3]; coords.len()];
        for i in 0..coords.len() {
            for dim in 0..3 {
                let orig = coords[i][dim];
                coords[i][dim] = orig + dx;
                let e_plus = self.evaluate(coords).total;
                coords[i][dim] = orig - dx;
                let e_minus = self.evaluate(coords).total;
                coords[i][dim] = orig;
                grad[i][dim] = (e_plus - e_minus) / (2.0 * dx);
            }
        }
        grad
    }
}

/// (barrier, periodicity, phase) for rotation about a bond.
fn torsion_params(t1: UffAtomType, t2: UffAtomType, order: BondOrder) -> (f64, f64, f64) {
    match order {
        BondOrder::Double => (45.0, 2.0, 1.0),
        BondOrder::Triple => (0.0, 1.0, 1.0),
        BondOrder::Aromatic => (3.0, 2.0, 1.0),
        BondOrder::Single => {
            let sp2 = |t| {
                matches!(
                    t,
                    UffAtomType::C2 | UffAtomType::CR | UffAtomType::N2 | UffAtomType::NR | UffAtomType::O2 | UffAtomType::OR
                )
            };
            match (sp2(t1), sp2(t2)) {
                (true, true) => (5.0, 2.0, 1.0),
                (true, false) | (false, true) => (1.0, 6.0, 1.0),
                (false, false) => (1.0, 3.0, -1.0),
            }
        }
    }
}

fn bond_angle(coords: &[Vec3], i: usize, j: usize, k: usize) -> f64 {
    let v1 = sub(coords[i], coords[j]);
    let v2 = sub(coords[k], coords[j]);
    let (n1, n2) = (norm(v1), norm(v2));
    if n1 < 1e-12 || n2 < 1e-12 {
        return 0.0;
    }
    (dot(v1, v2) / (n1 * n2)).clamp(-1.0, 1.0).acos()
}

fn torsion_angle(coords: &[Vec3], i: usize, j: usize, k: usize, l: usize) -> f64 {
    let b1 = sub(coords[j], coords[i]);
    let b2 = sub(coords[k], coords[j]);
    let b3 = sub(coords[l], coords[k]);
    let n1 = cross(b1, b2);
    let n2 = cross(b2, b3);
    let b2_len = norm(b2);
    if b2_len < 1e-12 {
        return 0.0;
    }
    let y = dot(cross(n1, b2), n2) / b2_len;
    y.atan2(dot(n1, n2))
}

/// Angle of the `center`→`a` bond out of the plane spanned by `b` and `c`.
fn wilson_angle(coords: &[Vec3], center: usize, a: usize, b: usize, c: usize) -> f64 {
    let va = sub(coords[a], coords[center]);
    let n = cross(sub(coords[b], coords[center]), sub(coords[c], coords[center]));
    let (n_len, va_len) = (norm(n), norm(va));
    if n_len < 1e-12 || va_len < 1e-12 {
        return 0.0;
    }
    (dot(va, n) / (va_len * n_len)).clamp(-1.0, 1.0).asin()
}

// ---------------------------------------------------------------------------
// Energies
// ---------------------------------------------------------------------------

fn check_conformer(mol: &Molecule, conf: &Conformer) -> Result<()> {
    if conf.len() != mol.atom_count() {
        return Err(MolkitError::InvalidInput(format!(
            "conformer has {} coordinates but the molecule has {} atoms",
            conf.len(),
            mol.atom_count()
        )));
    }
    Ok(())
}

/// Energy of one conformer under the given force field.
pub fn energy(mol: &Molecule, conf: &Conformer, field: ForceField) -> Result<EnergyComponents> {
    check_conformer(mol, conf)?;
    Ok(EnergyModel::new(mol, field).evaluate(&conf.coords))
}

/// Compute UFF energy for a molecule with 3D coordinates.
pub fn uff_energy(mol: &Molecule, conf: &Conformer) -> Result<EnergyComponents> {
    energy(mol, conf, ForceField::Uff)
}

/// Compute MMFF94 energy for a molecule with 3D coordinates.
pub fn mmff94_energy(mol: &Molecule, conf: &Conformer) -> Result<EnergyComponents> {
    energy(mol, conf, ForceField::Mmff94)
}

// ---------------------------------------------------------------------------
// Minimization
// ---------------------------------------------------------------------------

/// Largest per-atom displacements (Å) tried by the line search.
const TRIAL_STEPS: [f64; 6] = [0.3, 0.1, 0.03, 0.01, 0.003, 0.001];

/// Minimize the energy of `conformer`, returning the optimised copy.
///
/// The energy never increases: a step is taken only when it lowers the
/// energy, and the run stops when no trial step does.
pub fn minimize(
    mol: &Molecule,
    conformer: &Conformer,
    field: ForceField,
    config: &MinimizeConfig,
) -> Result<MinimizeResult> {
    check_conformer(mol, conformer)?;
    let model = EnergyModel::new(mol, field);
    let n = mol.atom_count();

    let mut current = conformer.coords.clone();
    let initial_energy = model.evaluate(&current).total;
    let mut current_energy = initial_energy;
    let mut prev_grad_sq = 0.0;
    let mut direction = vec![[0.0_f64; 3]; n];
    let mut converged = false;
    let mut step_count = 0;

    for step in 0..config.max_steps {
        step_count = step + 1;
        let gradient = model.gradient(&mut current);
        let grad_sq: f64 = gradient.iter().map(|g| dot(*g, *g)).sum();
        if grad_sq.sqrt() < config.gradient_threshold {
            converged = true;
            break;
        }

        let beta = match config.method {
            MinimizeMethod::ConjugateGradient if step > 0 && prev_grad_sq > 1e-30 => {
                // Fletcher-Reeves, capped
                (grad_sq / prev_grad_sq).min(2.0)
            }
            _ => 0.0,
        };
        for i in 0..n {
            for d in 0..3 {
                direction[i][d] = -gradient[i][d] + beta * direction[i][d];
            }
        }
        let slope: f64 = direction.iter().zip(&gradient).map(|(p, g)| dot(*p, *g)).sum();
        if slope >= 0.0 {
            for i in 0..n {
                direction[i] = [-gradient[i][0], -gradient[i][1], -gradient[i][2]];
            }
        }
        prev_grad_sq = grad_sq;

        let max_move = direction.iter().map(|p| norm(*p)).fold(0.0, f64::max);
        if max_move < 1e-12 {
            converged = true;
            break;
        }

        let mut best: Option<(f64, Vec<Vec3>)> = None;
        for &limit in &TRIAL_STEPS {
            let alpha = limit / max_move;
            let trial: Vec<Vec3> = current
                .iter()
                .zip(&direction)
                .map(|(x, p)| [x[0] + alpha * p[0], x[1] + alpha * p[1], x[2] + alpha * p[2]])
                .collect();
            let e = model.evaluate(&trial).total;
            if e < best.as_ref().map_or(current_energy, |b| b.0) {
                best = Some((e, trial));
            }
        }
        match best {
            Some((e, coords)) => {
                current = coords;
                current_energy = e;
            }
            None => break,
        }
    }

    let final_components = model.evaluate(&current);
    debug!(
        "{field} minimisation: {initial_energy:.3} -> {:.3} kcal/mol in {step_count} steps (converged: {converged})",
        final_components.total
    );

    Ok(MinimizeResult {
        conformer: Conformer::new(current),
        initial_energy,
        final_energy: final_components.total,
        n_steps: step_count,
        converged,
        energy_components: final_components,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build exclusion set: 1-2 (bonded) and 1-3 (angle) pairs.
fn build_exclusion_set(mol: &Molecule) -> HashSet<(usize, usize)> {
    let ordered = |a: usize, b: usize| if a < b { (a, b) } else { (b, a) };
    let mut excluded = HashSet::new();

    for bond in &mol.bonds {
        excluded.insert(ordered(bond.atom1, bond.atom2));
    }
    for j in 0..mol.atom_count() {
        let neighbors = &mol.adjacency[j];
        for a in 0..neighbors.len() {
            for b in (a + 1)..neighbors.len() {
                excluded.insert(ordered(neighbors[a].0, neighbors[b].0));
            }
        }
    }
    excluded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrogens::add_hydrogens;
    use crate::smiles::parse_smiles;

    /// Ethane with explicit hydrogens in a staggered geometry.
    fn ethane(cc: f64) -> Molecule {
        let mut mol = parse_smiles("CC").unwrap();
        mol.add_conformer(Conformer::new(vec![[0.0, 0.0, 0.0], [cc, 0.0, 0.0]]))
            .unwrap();
        add_hydrogens(&mut mol);
        mol
    }

    #[test]
    fn selector_parsing() {
        for key in ["MMF", "MMFF", "MMFF94", "mmff94", " MMFF "] {
            assert_eq!(key.parse::<ForceField>().unwrap(), ForceField::Mmff94, "{key}");
        }
        assert_eq!("UFF".parse::<ForceField>().unwrap(), ForceField::Uff);
        let err = "GAFF".parse::<ForceField>().unwrap_err();
        assert!(matches!(err, MolkitError::InvalidSelector(ref s) if s == "GAFF"));
        assert_eq!(ForceField::Mmff94.to_string().parse::<ForceField>().unwrap(), ForceField::Mmff94);
    }

    #[test]
    fn uff_type_assignment() {
        let mol = parse_smiles("CCO").unwrap();
        let types = assign_uff_types(&mol);
        assert_eq!(types, vec![UffAtomType::C3, UffAtomType::C3, UffAtomType::O3]);
    }

    #[test]
    fn types_ignore_hydrogen_count() {
        let mut mol = parse_smiles("C=C").unwrap();
        add_hydrogens(&mut mol);
        let types = assign_uff_types(&mol);
        assert_eq!(types[0], UffAtomType::C2);
        let mut methane = parse_smiles("C").unwrap();
        add_hydrogens(&mut methane);
        assert_eq!(assign_uff_types(&methane)[0], UffAtomType::C3);
        assert_eq!(assign_mmff94_types(&methane)[0], Mmff94AtomType::CR);
    }

    #[test]
    fn uff_type_aromatic() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert!(assign_uff_types(&mol).iter().all(|t| *t == UffAtomType::CR));
    }

    #[test]
    fn mmff94_type_assignment() {
        let mut mol = parse_smiles("CC(=O)O").unwrap();
        add_hydrogens(&mut mol);
        let types = assign_mmff94_types(&mol);
        assert_eq!(types[0], Mmff94AtomType::CR);
        assert_eq!(types[1], Mmff94AtomType::C3);
        assert_eq!(types[2], Mmff94AtomType::O2);
        assert_eq!(types[3], Mmff94AtomType::OR);
        assert_eq!(types[mol.atom_count() - 1], Mmff94AtomType::HO);
    }

    #[test]
    fn mmff94_aromatic_nitrogen() {
        let mol = parse_smiles("c1ccncc1").unwrap();
        let types = assign_mmff94_types(&mol);
        let n_idx = mol.atoms.iter().position(|a| a.atomic_number == 7).unwrap();
        assert_eq!(types[n_idx], Mmff94AtomType::NAR);
    }

    #[test]
    fn energies_are_finite() {
        let mol = ethane(1.54);
        let conf = mol.conformer(0).unwrap();
        for field in [ForceField::Uff, ForceField::Mmff94] {
            let e = energy(&mol, conf, field).unwrap();
            assert!(e.total.is_finite(), "{field}: {e:?}");
            assert!(e.bond_stretch >= 0.0);
            assert!(e.angle_bend >= 0.0);
        }
    }

    #[test]
    fn energy_atom_count_mismatch() {
        let mol = parse_smiles("CCO").unwrap();
        let conf = Conformer::new(vec![[0.0; 3], [1.0, 0.0, 0.0]]);
        assert!(matches!(uff_energy(&mol, &conf), Err(MolkitError::InvalidInput(_))));
    }

    #[test]
    fn single_atom_has_no_bonded_terms() {
        let mol = parse_smiles("[OH2]").unwrap();
        let e = uff_energy(&mol, &Conformer::new(vec![[0.0; 3]])).unwrap();
        assert_eq!(e.bond_stretch, 0.0);
        assert_eq!(e.angle_bend, 0.0);
        assert_eq!(e.total, 0.0);
    }

    #[test]
    fn staggered_ethane_beats_eclipsed() {
        let mol = ethane(1.54);
        let staggered = mol.conformer(0).unwrap().clone();
        let mut eclipsed = staggered.clone();
        let beyond: Vec<usize> = mol.neighbors(1).into_iter().filter(|&a| a != 0).collect();
        eclipsed.rotate_about_bond(0, 1, &beyond, 60f64.to_radians());
        let e_st = uff_energy(&mol, &staggered).unwrap().torsion;
        let e_ec = uff_energy(&mol, &eclipsed).unwrap().torsion;
        // nine H-C-C-H terms, each 0 when staggered and V = 1 when eclipsed
        assert!(e_st < 1e-3, "staggered torsion {e_st}");
        assert!((e_ec - 9.0).abs() < 1e-2, "eclipsed torsion {e_ec}");
    }

    #[test]
    fn mmff_stretch_is_bounded_below() {
        let mol = parse_smiles("CC").unwrap();
        for cc in [1.0, 1.54, 2.5, 4.0, 8.0] {
            let conf = Conformer::new(vec![[0.0; 3], [cc, 0.0, 0.0]]);
            let e = mmff94_energy(&mol, &conf).unwrap();
            assert!(e.bond_stretch >= 0.0, "stretch at {cc}: {}", e.bond_stretch);
        }
    }

    #[test]
    fn minimisation_lowers_energy() {
        let mol = ethane(2.0);
        let conf = mol.conformer(0).unwrap();
        for (field, method) in [
            (ForceField::Uff, MinimizeMethod::SteepestDescent),
            (ForceField::Uff, MinimizeMethod::ConjugateGradient),
            (ForceField::Mmff94, MinimizeMethod::ConjugateGradient),
        ] {
            let config = MinimizeConfig { max_steps: 100, gradient_threshold: 0.5, method };
            let result = minimize(&mol, conf, field, &config).unwrap();
            assert!(
                result.final_energy < result.initial_energy,
                "{field}/{method:?}: {} -> {}",
                result.initial_energy,
                result.final_energy
            );
            assert!(result.n_steps <= 100);
            let cc = result.conformer.distance(0, 1);
            assert!(cc < 1.9, "{field}: C-C still {cc}");
        }
    }

    #[test]
    fn minimisation_at_zero_steps_is_identity() {
        let mol = ethane(1.54);
        let conf = mol.conformer(0).unwrap();
        let config = MinimizeConfig { max_steps: 0, ..Default::default() };
        let result = minimize(&mol, conf, ForceField::Uff, &config).unwrap();
        assert_eq!(&result.conformer, conf);
        assert_eq!(result.initial_energy, result.final_energy);
    }

    #[test]
    fn exclusions_cover_bonds_and_angles() {
        let mol = parse_smiles("CCC").unwrap();
        let excl = build_exclusion_set(&mol);
        assert!(excl.contains(&(0, 1)));
        assert!(excl.contains(&(0, 2)));
        assert_eq!(excl.len(), 3);
    }
}
