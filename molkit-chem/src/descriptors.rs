//! Molecular descriptors: heavy atoms, hydrogen-bond donors and acceptors,
//! molecular weight and Wildman-Crippen logP.
//!
//! Every descriptor gives the same value whether hydrogens are implicit
//! counts or explicit atoms.

use std::collections::BTreeMap;

use molkit_core::Summarizable;

use crate::element::element_by_number;
use crate::molecule::{BondOrder, Molecule};
use crate::valence::explicit_valence;

/// Map keys, in [`Descriptors::to_map`] order.
pub const HEAVY_ATOMS: &str = "Heavy atoms";
pub const H_BOND_DONORS: &str = "H-bond donors";
pub const H_BOND_ACCEPTORS: &str = "H-bond acceptors";
pub const MOLECULAR_WEIGHT: &str = "Molecular weight";
pub const LOGP: &str = "LogP";

/// Computed molecular descriptors.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Descriptors {
    pub heavy_atoms: usize,
    pub h_bond_donors: usize,
    pub h_bond_acceptors: usize,
    /// Average molecular weight (g/mol) including every hydrogen.
    pub molecular_weight: f64,
    pub logp: f64,
}

impl Descriptors {
    /// Descriptor values keyed by their display names.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            (HEAVY_ATOMS.to_string(), self.heavy_atoms as f64),
            (H_BOND_DONORS.to_string(), self.h_bond_donors as f64),
            (H_BOND_ACCEPTORS.to_string(), self.h_bond_acceptors as f64),
            (MOLECULAR_WEIGHT.to_string(), self.molecular_weight),
            (LOGP.to_string(), self.logp),
        ])
    }
}

impl Summarizable for Descriptors {
    fn summary(&self) -> String {
        format!(
            "MW={:.2} HeavyAtoms={} HBD={} HBA={} LogP={:.2}",
            self.molecular_weight, self.heavy_atoms, self.h_bond_donors, self.h_bond_acceptors, self.logp,
        )
    }
}

/// Compute all descriptors at once.
pub fn compute_descriptors(mol: &Molecule) -> Descriptors {
    Descriptors {
        heavy_atoms: mol.heavy_atom_count(),
        h_bond_donors: hbd_count(mol),
        h_bond_acceptors: hba_count(mol),
        molecular_weight: molecular_weight(mol),
        logp: wildman_crippen_logp(mol).0,
    }
}

/// Calculate the molecular weight (sum of atomic weights including implicit H).
pub fn molecular_weight(mol: &Molecule) -> f64 {
    let h_weight = 1.008;
    let mut mw = 0.0;
    for atom in &mol.atoms {
        if let Some(elem) = element_by_number(atom.atomic_number) {
            mw += elem.atomic_weight;
        }
        mw += atom.implicit_hydrogens as f64 * h_weight;
    }
    mw
}

/// Generate the molecular formula in Hill system order (C first, then H, then alphabetical).
pub fn molecular_formula(mol: &Molecule) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

    for atom in &mol.atoms {
        if let Some(elem) = element_by_number(atom.atomic_number) {
            *counts.entry(elem.symbol).or_insert(0) += 1;
        }
        if atom.implicit_hydrogens > 0 {
            *counts.entry("H").or_insert(0) += atom.implicit_hydrogens as usize;
        }
    }

    let mut formula = String::new();
    let mut push = |symbol: &str, count: usize| {
        formula.push_str(symbol);
        if count > 1 {
            formula.push_str(&count.to_string());
        }
    };

    // Hill system: C first, then H; without carbon everything is alphabetical
    if let Some(c_count) = counts.remove("C") {
        push("C", c_count);
        if let Some(h_count) = counts.remove("H") {
            push("H", h_count);
        }
    }
    for (symbol, count) in counts {
        push(symbol, count);
    }
    formula
}

// ---------------------------------------------------------------------------
// Hydrogen bonding
// ---------------------------------------------------------------------------

/// Valence including hydrogens, aromatic bonds counting one.
fn total_valence(mol: &Molecule, idx: usize) -> u32 {
    explicit_valence(mol, idx) + mol.atoms[idx].implicit_hydrogens as u32
}

/// Whether `idx` is singly bonded to an atom that is double-bonded to O, N, P or S,
/// as the hydroxyl of an acid or the nitrogen of an amide is.
fn next_to_unsaturated_hetero(mol: &Molecule, idx: usize) -> bool {
    mol.adjacency[idx].iter().any(|&(x, bxi)| {
        mol.bonds[bxi].order == BondOrder::Single
            && mol.adjacency[x].iter().any(|&(y, bxy)| {
                y != idx
                    && mol.bonds[bxy].order == BondOrder::Double
                    && matches!(mol.atoms[y].atomic_number, 7 | 8 | 15 | 16)
            })
    })
}

/// Count hydrogen bond donors: N with at least one H (neutral trivalent or
/// charged tetravalent), neutral O or S with exactly one H, and aromatic NH.
pub fn hbd_count(mol: &Molecule) -> usize {
    (0..mol.atom_count())
        .filter(|&i| {
            let atom = &mol.atoms[i];
            let h = mol.total_hydrogens(i);
            match atom.atomic_number {
                7 if atom.is_aromatic => h == 1 && atom.formal_charge == 0,
                7 => {
                    let v = total_valence(mol, i);
                    h > 0 && (v == 3 || (v == 4 && atom.formal_charge == 1))
                }
                8 | 16 => h == 1 && atom.formal_charge == 0,
                _ => false,
            }
        })
        .count()
}

/// Count hydrogen bond acceptors.
///
/// Divalent O and S (hydroxyls of acids excluded), anionic O and S,
/// trivalent N that is not amide-like, pyridine-type aromatic N, and
/// aromatic O and S away from aromatic N.
pub fn hba_count(mol: &Molecule) -> usize {
    (0..mol.atom_count())
        .filter(|&i| {
            let atom = &mol.atoms[i];
            let h = mol.total_hydrogens(i);
            match atom.atomic_number {
                8 | 16 if atom.formal_charge < 0 => true,
                8 | 16 if atom.is_aromatic => atom.formal_charge == 0 && !near_aromatic_nitrogen(mol, i),
                8 | 16 => {
                    total_valence(mol, i) == 2 && (h == 0 || (h == 1 && !next_to_unsaturated_hetero(mol, i)))
                }
                7 if atom.is_aromatic => h == 0 && atom.formal_charge == 0,
                7 => {
                    atom.formal_charge == 0 && total_valence(mol, i) == 3 && !next_to_unsaturated_hetero(mol, i)
                }
                _ => false,
            }
        })
        .count()
}

/// Aromatic N one or two aromatic bonds away (`o:n` or `o:c:n`).
fn near_aromatic_nitrogen(mol: &Molecule, idx: usize) -> bool {
    let aromatic_n = |a: usize| mol.atoms[a].atomic_number == 7 && mol.atoms[a].is_aromatic;
    mol.adjacency[idx].iter().any(|&(x, bi)| {
        mol.bonds[bi].order == BondOrder::Aromatic
            && (aromatic_n(x)
                || (mol.atoms[x].atomic_number == 6
                    && mol.adjacency[x]
                        .iter()
                        .any(|&(y, bj)| y != idx && mol.bonds[bj].order == BondOrder::Aromatic && aromatic_n(y))))
    })
}

// ---------------------------------------------------------------------------
// Wildman-Crippen logP
// ---------------------------------------------------------------------------

/// A Wildman-Crippen atom type with its logP and molar-refractivity
/// contributions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrippenType {
    pub label: &'static str,
    pub logp: f64,
    pub mr: f64,
}

impl CrippenType {
    const fn new(label: &'static str, logp: f64, mr: f64) -> Self {
        Self { label, logp, mr }
    }
}

const C1: CrippenType = CrippenType::new("C1", 0.1441, 2.503);
const C2: CrippenType = CrippenType::new("C2", 0.0, 2.433);
const C3: CrippenType = CrippenType::new("C3", -0.2035, 2.753);
const C4: CrippenType = CrippenType::new("C4", -0.2051, 2.731);
const C5: CrippenType = CrippenType::new("C5", -0.2783, 5.007);
const C6: CrippenType = CrippenType::new("C6", 0.1551, 3.513);
const C7: CrippenType = CrippenType::new("C7", 0.0017, 3.888);
const C8: CrippenType = CrippenType::new("C8", 0.08452, 2.464);
const C9: CrippenType = CrippenType::new("C9", -0.1444, 2.412);
const C10: CrippenType = CrippenType::new("C10", -0.0516, 2.488);
const C11: CrippenType = CrippenType::new("C11", 0.1193, 2.582);
const C12: CrippenType = CrippenType::new("C12", -0.0967, 2.576);
const C13: CrippenType = CrippenType::new("C13", -0.5443, 4.041);
const C14: CrippenType = CrippenType::new("C14", 0.0, 3.257);
const C15: CrippenType = CrippenType::new("C15", 0.245, 3.564);
const C16: CrippenType = CrippenType::new("C16", 0.198, 3.18);
const C17: CrippenType = CrippenType::new("C17", 0.0, 3.104);
const C18: CrippenType = CrippenType::new("C18", 0.1581, 3.35);
const C19: CrippenType = CrippenType::new("C19", 0.2955, 4.346);
const C20: CrippenType = CrippenType::new("C20", 0.2713, 3.904);
const C21: CrippenType = CrippenType::new("C21", 0.136, 3.509);
const C22: CrippenType = CrippenType::new("C22", 0.4619, 3.067);
const C23: CrippenType = CrippenType::new("C23", 0.5437, 3.853);
const C24: CrippenType = CrippenType::new("C24", 0.1893, 2.673);
const C25: CrippenType = CrippenType::new("C25", -0.8186, 3.135);
const C26: CrippenType = CrippenType::new("C26", 0.264, 4.305);
const C27: CrippenType = CrippenType::new("C27", 0.2148, 2.693);
const CS: CrippenType = CrippenType::new("CS", 0.08129, 3.243);

const H1: CrippenType = CrippenType::new("H1", 0.123, 1.057);
const H2: CrippenType = CrippenType::new("H2", -0.2677, 1.395);
const H3: CrippenType = CrippenType::new("H3", 0.2142, 0.9627);
const H4: CrippenType = CrippenType::new("H4", 0.298, 1.805);
const HS: CrippenType = CrippenType::new("HS", 0.1125, 1.112);

const N1: CrippenType = CrippenType::new("N1", -1.019, 2.262);
const N2: CrippenType = CrippenType::new("N2", -0.7096, 2.173);
const N3: CrippenType = CrippenType::new("N3", -1.027, 2.827);
const N4: CrippenType = CrippenType::new("N4", -0.5188, 3.0);
const N5: CrippenType = CrippenType::new("N5", 0.08387, 1.757);
const N6: CrippenType = CrippenType::new("N6", 0.1836, 2.428);
const N7: CrippenType = CrippenType::new("N7", -0.3187, 1.839);
const N8: CrippenType = CrippenType::new("N8", -0.4458, 2.819);
const N9: CrippenType = CrippenType::new("N9", 0.01508, 1.725);
const N10: CrippenType = CrippenType::new("N10", -1.95, 0.0);
const N11: CrippenType = CrippenType::new("N11", -0.3239, 2.202);
const N12: CrippenType = CrippenType::new("N12", -1.119, 0.0);
const N13: CrippenType = CrippenType::new("N13", -0.3396, 0.2604);
const N14: CrippenType = CrippenType::new("N14", 0.2887, 3.359);
const NS: CrippenType = CrippenType::new("NS", -0.4806, 2.134);

const O1: CrippenType = CrippenType::new("O1", 0.1552, 1.08);
const O2: CrippenType = CrippenType::new("O2", -0.2893, 0.8238);
const O3: CrippenType = CrippenType::new("O3", -0.0684, 1.085);
const O4: CrippenType = CrippenType::new("O4", -0.4195, 1.182);
const O5: CrippenType = CrippenType::new("O5", 0.0335, 3.367);
const O6: CrippenType = CrippenType::new("O6", -0.3339, 0.7774);
const O7: CrippenType = CrippenType::new("O7", -1.189, 0.0);
const O8: CrippenType = CrippenType::new("O8", 0.1788, 3.135);
const O9: CrippenType = CrippenType::new("O9", -0.1526, 0.0);
const O10: CrippenType = CrippenType::new("O10", 0.1129, 0.2215);
const O11: CrippenType = CrippenType::new("O11", 0.4833, 0.389);
const O12: CrippenType = CrippenType::new("O12", -1.326, 0.0);
const OS: CrippenType = CrippenType::new("OS", -0.1188, 0.6865);

const F: CrippenType = CrippenType::new("F", 0.4202, 1.108);
const CL: CrippenType = CrippenType::new("Cl", 0.6895, 5.853);
const BR: CrippenType = CrippenType::new("Br", 0.8456, 8.927);
const I: CrippenType = CrippenType::new("I", 0.8857, 14.02);
const HAL: CrippenType = CrippenType::new("Hal", -2.996, 0.0);
const P: CrippenType = CrippenType::new("P", 0.8612, 6.92);
const S1: CrippenType = CrippenType::new("S1", 0.6482, 7.591);
const S2: CrippenType = CrippenType::new("S2", -0.0024, 7.365);
const S3: CrippenType = CrippenType::new("S3", 0.6237, 6.691);
const UNTYPED: CrippenType = CrippenType::new("", 0.0, 0.0);

/// Wildman-Crippen logP and molar refractivity.
///
/// Returns (logP, MR). Hydrogens are typed through their parent atom, so
/// implicit and explicit hydrogens give the same result.
pub fn wildman_crippen_logp(mol: &Molecule) -> (f64, f64) {
    let mut logp = 0.0;
    let mut mr = 0.0;
    for i in 0..mol.atom_count() {
        if mol.atoms[i].is_hydrogen() {
            continue;
        }
        let heavy = crippen_atom_type(mol, i);
        let h = mol.total_hydrogens(i) as f64;
        let hydrogen = if h > 0.0 { crippen_hydrogen_type(mol, i) } else { UNTYPED };
        logp += heavy.logp + h * hydrogen.logp;
        mr += heavy.mr + h * hydrogen.mr;
    }
    (logp, mr)
}

/// Heavy neighbours of `idx` with the bond order to each.
struct Environment<'a> {
    mol: &'a Molecule,
    hydrogens: usize,
    neighbors: Vec<(usize, BondOrder)>,
}

impl<'a> Environment<'a> {
    fn new(mol: &'a Molecule, idx: usize) -> Self {
        let neighbors = mol.adjacency[idx]
            .iter()
            .filter(|&&(n, _)| !mol.atoms[n].is_hydrogen())
            .map(|&(n, bi)| (n, mol.bonds[bi].order))
            .collect();
        Self { mol, hydrogens: mol.total_hydrogens(idx), neighbors }
    }

    /// Total connections, hydrogens included.
    fn connections(&self) -> usize {
        self.neighbors.len() + self.hydrogens
    }

    fn element(&self, n: usize) -> u8 {
        self.mol.atoms[n].atomic_number
    }

    fn aromatic(&self, n: usize) -> bool {
        self.mol.atoms[n].is_aromatic
    }

    fn aliphatic_carbon(&self, n: usize) -> bool {
        self.element(n) == 6 && !self.aromatic(n)
    }

    fn all(&self, pred: impl Fn(usize, BondOrder) -> bool) -> bool {
        self.neighbors.iter().all(|&(n, o)| pred(n, o))
    }

    fn any(&self, pred: impl Fn(usize, BondOrder) -> bool) -> bool {
        self.neighbors.iter().any(|&(n, o)| pred(n, o))
    }
}

/// Aliphatic N, O, P, S or halogen.
fn is_common_hetero(env: &Environment<'_>, n: usize) -> bool {
    !env.aromatic(n) && matches!(env.element(n), 7 | 8 | 15 | 16 | 9 | 17 | 35 | 53)
}

/// Classify a heavy atom into its Wildman-Crippen type.
pub fn crippen_atom_type(mol: &Molecule, atom_idx: usize) -> CrippenType {
    let atom = &mol.atoms[atom_idx];
    let env = Environment::new(mol, atom_idx);
    match (atom.atomic_number, atom.is_aromatic) {
        (6, false) => aliphatic_carbon_type(&env),
        (6, true) => aromatic_carbon_type(&env),
        (7, _) => nitrogen_type(&env, atom.is_aromatic, atom.formal_charge),
        (8, _) => oxygen_type(&env, atom_idx, atom.is_aromatic, atom.formal_charge),
        (9 | 17 | 35 | 53, _) if atom.formal_charge != 0 => HAL,
        (9, _) => F,
        (17, _) => CL,
        (35, _) => BR,
        (53, _) => I,
        (15, _) => P,
        (16, true) => S3,
        (16, false) if atom.formal_charge == 0 => S1,
        (16, false) => S2,
        _ => UNTYPED,
    }
}

fn aliphatic_carbon_type(env: &Environment<'_>) -> CrippenType {
    let (h, heavy, x) = (env.hydrogens, env.neighbors.len(), env.connections());
    let aliphatic = |n: usize, _: BondOrder| !env.aromatic(n);
    let carbon = |n: usize, _: BondOrder| env.aliphatic_carbon(n);
    let hetero = |n: usize, _: BondOrder| is_common_hetero(env, n);
    let aromatic = |n: usize, _: BondOrder| env.aromatic(n);
    let double_to_carbon = env.any(|n, o| o == BondOrder::Double && env.aliphatic_carbon(n));

    if (h == 4 && heavy == 0) || (h == 3 && heavy == 1 && env.all(carbon)) || (h == 2 && heavy == 2 && env.all(carbon)) {
        return C1;
    }
    if (h == 1 && heavy == 3 && env.all(carbon)) || (h == 0 && heavy == 4 && env.all(carbon)) {
        return C2;
    }
    if (h == 3 && heavy == 1 && env.all(hetero)) || (h == 2 && x == 4 && env.all(aliphatic) && env.any(hetero)) {
        return C3;
    }
    if x == 4 && h <= 1 && env.all(aliphatic) && env.any(hetero) {
        return C4;
    }
    if env.any(|n, o| o == BondOrder::Double && !env.aromatic(n) && env.element(n) != 6) {
        return C5;
    }
    if double_to_carbon && env.all(aliphatic) {
        return C6;
    }
    if x == 2 && env.any(|_, o| o == BondOrder::Triple) {
        return C7;
    }
    if h == 3 && env.any(|n, _| env.aromatic(n) && env.element(n) == 6) {
        return C8;
    }
    if h == 3 && env.any(aromatic) {
        return C9;
    }
    if x == 4 && env.any(aromatic) {
        return match h {
            2 => C10,
            1 => C11,
            _ => C12,
        };
    }
    if (double_to_carbon && env.any(aromatic))
        || env.any(|n, o| o == BondOrder::Double && env.aromatic(n) && env.element(n) == 6)
    {
        return C26;
    }
    if x == 4 && env.any(|n, _| !env.aromatic(n) && !matches!(env.element(n), 6 | 7 | 8 | 15 | 16 | 9 | 17 | 35 | 53)) {
        return C27;
    }
    CS
}

fn aromatic_carbon_type(env: &Environment<'_>) -> CrippenType {
    let unusual = |n: usize, o: BondOrder| {
        o == BondOrder::Single && !env.aromatic(n) && !matches!(env.element(n), 6 | 7 | 8 | 16 | 9 | 17 | 35 | 53)
    };
    if env.hydrogens == 0 && env.any(unusual) {
        return C13;
    }
    for (z, ty) in [(9, C14), (17, C15), (35, C16), (53, C17)] {
        if env.any(|n, _| env.element(n) == z) {
            return ty;
        }
    }
    if env.hydrogens == 1 {
        return C18;
    }
    let ring_bonds = env.neighbors.iter().filter(|&&(_, o)| o == BondOrder::Aromatic).count();
    if ring_bonds >= 3 {
        return C19;
    }
    // the one substituent off the ring
    let Some(&(sub, order)) = env.neighbors.iter().find(|&&(_, o)| o != BondOrder::Aromatic) else {
        return CS;
    };
    match (order, env.aromatic(sub), env.element(sub)) {
        (BondOrder::Single, true, _) => C20,
        (BondOrder::Single, false, 6) => C21,
        (BondOrder::Single, false, 7) => C22,
        (BondOrder::Single, false, 8) => C23,
        (BondOrder::Single, false, 16) => C24,
        (BondOrder::Double, false, 6 | 7 | 8) => C25,
        _ => CS,
    }
}

fn nitrogen_type(env: &Environment<'_>, aromatic_atom: bool, charge: i8) -> CrippenType {
    if aromatic_atom {
        return match charge {
            0 => N11,
            c if c > 0 => N12,
            _ => NS,
        };
    }
    let (h, heavy) = (env.hydrogens, env.neighbors.len());
    let aliphatic = |n: usize, _: BondOrder| !env.aromatic(n);
    let aromatic = |n: usize, _: BondOrder| env.aromatic(n);
    let double = env.neighbors.iter().filter(|&&(_, o)| o == BondOrder::Double).count();
    let triple = env.any(|_, o| o == BondOrder::Triple);

    if charge == 0 {
        return match (h, heavy) {
            (2, 1) if env.all(aliphatic) => N1,
            (1, 2) if env.all(aliphatic) && double == 0 => N2,
            (2, 1) => N3,
            (1, 2) if double == 0 => N4,
            (1, _) if double > 0 => N5,
            (0, _) if double > 0 && heavy >= 2 => N6,
            (0, 3) if env.all(aliphatic) => N7,
            (0, 3) if env.any(aromatic) => N8,
            (0, _) if triple => N9,
            _ => NS,
        };
    }
    if charge > 0 {
        if h > 0 {
            return N10;
        }
        let double_to = |z: u8| env.any(|n, o| o == BondOrder::Double && env.element(n) == z);
        if (heavy == 4 && env.all(aliphatic))
            || (double == 1 && heavy >= 3 && env.any(|n, o| o == BondOrder::Double && !env.aromatic(n)))
            || (double == 2 && double_to(6) && double_to(7))
        {
            return N13;
        }
        if triple || double == 2 {
            return N14;
        }
        return NS;
    }
    N14
}

fn oxygen_type(env: &Environment<'_>, oxygen: usize, aromatic_atom: bool, charge: i8) -> CrippenType {
    if aromatic_atom {
        return O1;
    }
    if env.hydrogens > 0 {
        return O2;
    }
    let mol = env.mol;
    match env.neighbors.as_slice() {
        &[(a, _), (b, _)] => {
            if !env.aromatic(a) && !env.aromatic(b) {
                O3
            } else {
                O4
            }
        }
        &[(n, BondOrder::Double)] if matches!(env.element(n), 7 | 8) => O5,
        &[(n, BondOrder::Double)] if env.aromatic(n) && env.element(n) == 6 => O8,
        &[(n, BondOrder::Double)] if env.element(n) == 6 => carbonyl_oxygen_type(mol, oxygen, n),
        &[(n, _)] if charge < 0 => match env.element(n) {
            7 => O5,
            16 => O6,
            6 if !env.aromatic(n) && is_carbonyl_carbon(mol, n) => O12,
            _ => O7,
        },
        _ => OS,
    }
}

fn is_carbonyl_carbon(mol: &Molecule, c: usize) -> bool {
    mol.adjacency[c]
        .iter()
        .any(|&(n, bi)| mol.bonds[bi].order == BondOrder::Double && mol.atoms[n].atomic_number == 8)
}

/// The three carbonyl classes differ by what sits on the carbonyl carbon.
fn carbonyl_oxygen_type(mol: &Molecule, oxygen: usize, carbon: usize) -> CrippenType {
    let env = Environment::new(mol, carbon);
    let others: Vec<(usize, BondOrder)> = env.neighbors.iter().copied().filter(|&(n, _)| n != oxygen).collect();
    let is_c = |n: usize| env.element(n) == 6;
    let aromatic_c = |n: usize| is_c(n) && env.aromatic(n);
    let aliphatic = |n: usize| !env.aromatic(n);
    match (env.hydrogens, others.as_slice()) {
        (2, []) => O9,
        (0, &[(x, BondOrder::Double)]) if env.element(x) == 8 => O9,
        (1, &[(x, _)]) if aromatic_c(x) => O10,
        (1, &[(x, _)]) if aliphatic(x) && matches!(env.element(x), 6 | 7 | 8) => O9,
        (0, &[(x, _), (y, _)]) => {
            if (env.aliphatic_carbon(x) && aliphatic(y)) || (env.aliphatic_carbon(y) && aliphatic(x)) {
                O9
            } else if (is_c(x) && env.aromatic(y))
                || (is_c(y) && env.aromatic(x))
                || (aromatic_c(x) && aliphatic(y))
                || (aromatic_c(y) && aliphatic(x))
            {
                O10
            } else if !is_c(x) && !is_c(y) {
                O11
            } else {
                OS
            }
        }
        _ => OS,
    }
}

/// Hydrogen type H1 (on carbon), H2 (alcohol), H3 (amine), H4 (acid) or
/// HS, keyed by the parent atom.
pub fn crippen_hydrogen_type(mol: &Molecule, parent: usize) -> CrippenType {
    match mol.atoms[parent].atomic_number {
        6 => H1,
        7 => H3,
        8 => hydroxyl_hydrogen_type(mol, parent),
        _ => H2,
    }
}

fn hydroxyl_hydrogen_type(mol: &Molecule, oxygen: usize) -> CrippenType {
    let env = Environment::new(mol, oxygen);
    if env.hydrogens >= 2 {
        return H2;
    }
    let alcohol = |n: usize, _: BondOrder| {
        let z = env.element(n);
        (z == 6 && env.aromatic(n))
            || (z == 6 && Environment::new(mol, n).connections() == 4)
            || !matches!(z, 6 | 7 | 8 | 16)
    };
    if env.any(alcohol) {
        return H2;
    }
    if env.any(|n, _| env.element(n) == 7) {
        return H3;
    }
    let acid = |n: usize, _: BondOrder| match env.element(n) {
        8 | 16 => true,
        6 => mol.adjacency[n].iter().any(|&(m, bi)| {
            m != oxygen && mol.bonds[bi].order == BondOrder::Double && matches!(mol.atoms[m].atomic_number, 6 | 7 | 8 | 16)
        }),
        _ => false,
    };
    if env.any(acid) {
        return H4;
    }
    HS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrogens::add_hydrogens;
    use crate::smiles::parse_smiles;

    fn descriptors_of(smiles: &str) -> Descriptors {
        compute_descriptors(&parse_smiles(smiles).unwrap())
    }

    #[test]
    fn ethanol_descriptors() {
        let d = descriptors_of("CCO");
        assert_eq!(d.heavy_atoms, 3);
        assert_eq!(d.h_bond_donors, 1);
        assert_eq!(d.h_bond_acceptors, 1);
        assert!((d.molecular_weight - 46.069).abs() < 0.01, "MW={}", d.molecular_weight);
        assert!(d.logp > -1.0 && d.logp < 0.5, "logP={}", d.logp);
    }

    #[test]
    fn explicit_hydrogens_change_nothing() {
        for smi in ["CCO", "c1ccccc1O", "CC(=O)Nc1ccc(O)cc1", "C[NH3+]", "CC(=O)[O-]", "CC(=O)O", "OO", "O"] {
            let implicit = parse_smiles(smi).unwrap();
            let mut explicit = implicit.clone();
            add_hydrogens(&mut explicit);
            let (a, b) = (compute_descriptors(&implicit), compute_descriptors(&explicit));
            assert_eq!(a.heavy_atoms, b.heavy_atoms, "{smi}");
            assert_eq!(a.h_bond_donors, b.h_bond_donors, "{smi}");
            assert_eq!(a.h_bond_acceptors, b.h_bond_acceptors, "{smi}");
            assert!((a.molecular_weight - b.molecular_weight).abs() < 1e-9, "{smi}");
            assert!((a.logp - b.logp).abs() < 1e-9, "{smi}");
        }
    }

    #[test]
    fn donors_and_acceptors() {
        // paracetamol: amide NH and phenol OH donate; carbonyl O and phenol O accept
        let d = descriptors_of("CC(=O)Nc1ccc(O)cc1");
        assert_eq!(d.h_bond_donors, 2);
        assert_eq!(d.h_bond_acceptors, 2);

        // acetic acid: the acid OH donates but does not accept
        let d = descriptors_of("CC(=O)O");
        assert_eq!(d.h_bond_donors, 1);
        assert_eq!(d.h_bond_acceptors, 1);

        // pyridine accepts, pyrrole donates
        assert_eq!(descriptors_of("c1ccncc1").h_bond_acceptors, 1);
        assert_eq!(descriptors_of("c1cc[nH]c1").h_bond_donors, 1);
        assert_eq!(descriptors_of("c1cc[nH]c1").h_bond_acceptors, 0);

        // triethylamine accepts, water (two H) neither donates nor accepts as OH
        assert_eq!(descriptors_of("CCN(CC)CC").h_bond_acceptors, 1);
        assert_eq!(descriptors_of("O").h_bond_donors, 0);
    }

    fn logp_of(smiles: &str) -> f64 {
        wildman_crippen_logp(&parse_smiles(smiles).unwrap()).0
    }

    #[test]
    fn crippen_reference_values() {
        for (smi, expected) in [
            ("CCO", -0.0014),
            ("c1ccccc1", 1.6866),
            ("CC(=O)O", 0.0909),
            ("CCCCCC", 2.5866),
            ("C1CCCCC1", 2.3406),
            ("Oc1ccccc1", 1.3922),
            ("c1ccncc1", 1.0816),
        ] {
            let logp = logp_of(smi);
            assert!((logp - expected).abs() < 1e-3, "{smi}: logP={logp}, expected {expected}");
        }
        let (_, mr) = wildman_crippen_logp(&parse_smiles("C").unwrap());
        assert!((mr - (2.503 + 4.0 * 1.057)).abs() < 1e-9);
    }

    #[test]
    fn heavy_atom_types() {
        let types = |smi: &str| {
            let mol = parse_smiles(smi).unwrap();
            (0..mol.atom_count()).map(|i| crippen_atom_type(&mol, i).label).collect::<Vec<_>>()
        };
        assert_eq!(types("CCO"), ["C1", "C3", "O2"]);
        assert_eq!(types("CC(=O)O"), ["C1", "C5", "O9", "O2"]);
        assert_eq!(types("Cc1ccccc1"), ["C8", "C21", "C18", "C18", "C18", "C18", "C18"]);
        assert_eq!(types("CC(C)(C)C"), ["C1", "C2", "C1", "C1", "C1"]);
        assert_eq!(types("C=CC#N"), ["C6", "C6", "C7", "N9"]);
        assert_eq!(types("CN(C)C"), ["C3", "N7", "C3", "C3"]);
        assert_eq!(types("Nc1ccccc1")[..2], ["N3", "C22"]);
        assert_eq!(types("COC"), ["C3", "O3", "C3"]);
        assert_eq!(types("O=Cc1ccccc1")[..2], ["O10", "C5"]);
        assert_eq!(types("NC(N)=O"), ["N1", "C5", "N1", "O11"]);
        assert_eq!(types("CC(=O)[O-]")[3], "O12");
        assert_eq!(types("C[NH3+]")[1], "N10");
        assert_eq!(types("FC(Cl)Br"), ["F", "C4", "Cl", "Br"]);
        assert_eq!(types("c1ccsc1")[3], "S3");
    }

    #[test]
    fn hydrogen_types_follow_the_parent() {
        let hydrogen = |smi: &str, parent: usize| {
            crippen_hydrogen_type(&parse_smiles(smi).unwrap(), parent).label
        };
        assert_eq!(hydrogen("CCO", 0), "H1");
        assert_eq!(hydrogen("CCO", 2), "H2");
        assert_eq!(hydrogen("Oc1ccccc1", 0), "H2");
        assert_eq!(hydrogen("CN", 1), "H3");
        assert_eq!(hydrogen("CC(=O)O", 3), "H4");
        assert_eq!(hydrogen("OO", 0), "H4");
        assert_eq!(hydrogen("O", 0), "H2");
        assert_eq!(hydrogen("CS", 1), "H2");
        assert_eq!(hydrogen("[OH-]", 0), "HS");
    }

    #[test]
    fn logp_ordering() {
        assert!(logp_of("CCCCCC") > logp_of("CCO"));
        assert!(logp_of("c1ccccc1Cl") > logp_of("c1ccccc1"));
        assert!(logp_of("CC(=O)[O-]") < logp_of("CC(=O)O"));
    }

    #[test]
    fn map_uses_display_names() {
        let map = descriptors_of("CCO").to_map();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        for key in [HEAVY_ATOMS, H_BOND_DONORS, H_BOND_ACCEPTORS, MOLECULAR_WEIGHT, LOGP] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert_eq!(map.len(), 5);
        assert_eq!(map[HEAVY_ATOMS], 3.0);
    }

    #[test]
    fn hill_formula() {
        assert_eq!(molecular_formula(&parse_smiles("CCO").unwrap()), "C2H6O");
        assert_eq!(molecular_formula(&parse_smiles("O").unwrap()), "H2O");
        assert_eq!(molecular_formula(&parse_smiles("[Na+].[Cl-]").unwrap()), "ClNa");
        let mut explicit = parse_smiles("c1ccccc1").unwrap();
        add_hydrogens(&mut explicit);
        assert_eq!(molecular_formula(&explicit), "C6H6");
    }

    #[test]
    fn empty_molecule() {
        let mol = Molecule::new(String::new(), Vec::new(), Vec::new());
        let d = compute_descriptors(&mol);
        assert_eq!(d.heavy_atoms, 0);
        assert_eq!(d.molecular_weight, 0.0);
        assert_eq!(d.logp, 0.0);
        assert_eq!(molecular_formula(&mol), "");
    }
}
