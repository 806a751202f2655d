//! Valence model: implicit-hydrogen perception and sanitisation.
//!
//! Main-group atoms follow the octet rule on their valence-electron count
//! shifted by the formal charge, so `[NH4+]` is treated like carbon and
//! `[O-]` like fluorine. Period-3+ chalcogens, pnictogens and iodine also
//! accept the expanded valences (`S` 2/4/6, `P` 3/5, `I` 1/3/5).
//!
//! Aromatic atoms count each aromatic bond as one sigma bond plus one
//! electron in the pi system.

use molkit_core::{MolkitError, Result};

use crate::element::element_by_number;
use crate::molecule::{BondOrder, Molecule};

/// Valence-electron count of the neutral main-group elements we model.
fn valence_electrons(atomic_number: u8) -> Option<i32> {
    match atomic_number {
        5 => Some(3),
        6 | 14 => Some(4),
        7 | 15 | 33 => Some(5),
        8 | 16 | 34 | 52 => Some(6),
        9 | 17 | 35 | 53 => Some(7),
        _ => None,
    }
}

fn is_hypervalent(atomic_number: u8) -> bool {
    matches!(atomic_number, 15 | 16 | 33 | 34 | 52 | 53)
}

/// Allowed total valences for an atom, lowest first, or `None` for
/// elements outside the organic set (metals, noble gases).
pub fn allowed_valences(atomic_number: u8, formal_charge: i8) -> Option<Vec<u8>> {
    if atomic_number == 1 {
        return Some(if formal_charge == 0 { vec![1] } else { vec![0] });
    }
    let ve = valence_electrons(atomic_number)? - formal_charge as i32;
    if !(0..=8).contains(&ve) {
        return Some(vec![0]);
    }
    let base = if ve >= 4 { 8 - ve } else { ve };
    let mut out = vec![base as u8];
    if is_hypervalent(atomic_number) && ve >= 4 {
        let mut v = base + 2;
        while v <= ve {
            out.push(v as u8);
            v += 2;
        }
    }
    Some(out)
}

/// Bond contribution to valence: aromatic bonds count as single sigma bonds.
pub(crate) fn explicit_valence(mol: &Molecule, atom_idx: usize) -> u32 {
    mol.adjacency[atom_idx]
        .iter()
        .map(|&(_, bi)| match mol.bonds[bi].order {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        })
        .sum()
}

/// Implicit hydrogens an atom needs to reach its nearest allowed valence.
///
/// Aromatic atoms only fill their lowest valence, after reserving one
/// electron for the pi system.
pub fn implicit_hydrogen_count(mol: &Molecule, atom_idx: usize) -> u8 {
    let atom = &mol.atoms[atom_idx];
    if atom.is_hydrogen() {
        return 0;
    }
    let Some(allowed) = allowed_valences(atom.atomic_number, atom.formal_charge) else {
        return 0;
    };
    let mut used = explicit_valence(mol, atom_idx);
    if atom.is_aromatic {
        used += 1;
        let lowest = allowed[0] as u32;
        return lowest.saturating_sub(used) as u8;
    }
    allowed
        .iter()
        .map(|&v| v as u32)
        .find(|&v| v >= used)
        .map_or(0, |v| (v - used) as u8)
}

/// Recompute `implicit_hydrogens` for every heavy atom from the bond orders.
pub fn assign_implicit_hydrogens(mol: &mut Molecule) {
    let counts: Vec<u8> = (0..mol.atom_count())
        .map(|i| implicit_hydrogen_count(mol, i))
        .collect();
    for (atom, h) in mol.atoms.iter_mut().zip(counts) {
        atom.implicit_hydrogens = h;
    }
}

/// Whether an aromatic atom takes a double bond in a Kekulé structure:
/// its sigma bonds and hydrogens sit exactly one below its lowest valence.
/// Pyrrole-type N, furan O and thiophene S are already saturated.
fn needs_pi_bond(mol: &Molecule, atom_idx: usize) -> bool {
    let atom = &mol.atoms[atom_idx];
    if !atom.is_aromatic {
        return false;
    }
    let Some(allowed) = allowed_valences(atom.atomic_number, atom.formal_charge) else {
        return false;
    };
    let used = explicit_valence(mol, atom_idx) + atom.implicit_hydrogens as u32;
    allowed
        .iter()
        .map(|&v| v as u32)
        .find(|&v| v >= used)
        .is_some_and(|v| v == used + 1)
}

/// Bond orders with every aromatic bond resolved to single or double.
///
/// Each aromatic atom that needs a pi bond gets exactly one double bond to
/// another such atom. Non-aromatic bonds keep their order.
///
/// # Errors
///
/// [`MolkitError::Computation`] when no such assignment exists.
pub fn kekulize(mol: &Molecule) -> Result<Vec<BondOrder>> {
    let mut orders: Vec<BondOrder> = mol.bonds.iter().map(|b| b.order).collect();
    if !orders.contains(&BondOrder::Aromatic) {
        return Ok(orders);
    }
    for order in orders.iter_mut().filter(|o| **o == BondOrder::Aromatic) {
        *order = BondOrder::Single;
    }

    let needs: Vec<bool> = (0..mol.atom_count()).map(|i| needs_pi_bond(mol, i)).collect();
    let pending: Vec<usize> = (0..mol.atom_count()).filter(|&i| needs[i]).collect();
    let mut matched = vec![false; mol.atom_count()];
    if place_double_bonds(mol, &pending, &needs, &mut matched, &mut orders) {
        Ok(orders)
    } else {
        Err(MolkitError::Computation(format!(
            "cannot kekulize the aromatic system of '{}'",
            mol.name
        )))
    }
}

/// Backtracking perfect matching over aromatic bonds between atoms in `pending`.
fn place_double_bonds(
    mol: &Molecule,
    pending: &[usize],
    needs: &[bool],
    matched: &mut [bool],
    orders: &mut [BondOrder],
) -> bool {
    let Some(pos) = pending.iter().position(|&a| !matched[a]) else {
        return true;
    };
    let atom = pending[pos];
    for &(nbr, bi) in &mol.adjacency[atom] {
        if mol.bonds[bi].order != BondOrder::Aromatic || !needs[nbr] || matched[nbr] {
            continue;
        }
        matched[atom] = true;
        matched[nbr] = true;
        orders[bi] = BondOrder::Double;
        if place_double_bonds(mol, &pending[pos + 1..], needs, matched, orders) {
            return true;
        }
        matched[atom] = false;
        matched[nbr] = false;
        orders[bi] = BondOrder::Single;
    }
    false
}

/// Orbital hybridisation guessed from the bonds an atom makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hybridization {
    Sp,
    Sp2,
    Sp3,
}

impl Hybridization {
    /// Ideal angle between two substituents, in radians.
    pub fn bond_angle(self) -> f64 {
        match self {
            Hybridization::Sp => std::f64::consts::PI,
            Hybridization::Sp2 => 120f64.to_radians(),
            Hybridization::Sp3 => 109.47f64.to_radians(),
        }
    }
}

/// A triple bond or two double bonds make an atom sp; one double or any
/// aromatic bond makes it sp2.
pub fn hybridization(mol: &Molecule, atom_idx: usize) -> Hybridization {
    let mut doubles = 0;
    for &(_, bi) in &mol.adjacency[atom_idx] {
        match mol.bonds[bi].order {
            BondOrder::Triple => return Hybridization::Sp,
            BondOrder::Aromatic => return Hybridization::Sp2,
            BondOrder::Double => doubles += 1,
            BondOrder::Single => {}
        }
    }
    match doubles {
        0 => Hybridization::Sp3,
        1 => Hybridization::Sp2,
        _ => Hybridization::Sp,
    }
}

/// Check every atom's total valence against what its element allows.
///
/// Returns [`MolkitError::Computation`] naming the first offending atom.
pub fn sanitize(mol: &Molecule) -> Result<()> {
    for (i, atom) in mol.atoms.iter().enumerate() {
        let Some(elem) = element_by_number(atom.atomic_number) else {
            continue;
        };
        let total = explicit_valence(mol, i) + atom.implicit_hydrogens as u32;
        let max = match allowed_valences(atom.atomic_number, atom.formal_charge) {
            Some(allowed) => {
                let top = allowed.iter().copied().max().unwrap_or(0) as u32;
                // room for the extra pi electron pair of pyrrole-type atoms
                if atom.is_aromatic {
                    top + 1
                } else {
                    top
                }
            }
            None => elem.max_bonds.max(1) as u32 + atom.formal_charge.unsigned_abs() as u32,
        };
        if total > max {
            return Err(MolkitError::Computation(format!(
                "explicit valence {total} for atom #{i} ({}) exceeds the allowed maximum {max}",
                elem.symbol
            )));
        }
    }
    Ok(())
}
