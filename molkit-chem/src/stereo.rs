//! Stereochemistry in three dimensions.
//!
//! [`assign_stereo_from_conformer`] reads chirality tags and bond directions
//! off a conformer, and [`StereoConstraints`] checks coordinates against the
//! tags a molecule already carries.
//!
//! A tetrahedral tag is the sign of the volume spanned by the last three
//! reference neighbours of the centre: negative for `@`, positive for `@@`.
//! Across a double bond `i-j=k-l`, the direction of `i-j` read from `i` and
//! the direction of `k-l` read from `k` agree when `i` and `l` are trans.

use log::debug;
use molkit_core::Result;

use crate::linalg::{cross, dot, norm, normalize, sub, Vec3};
use crate::molecule::{BondOrder, BondStereo, Chirality, Molecule};
use crate::ring::RingInfo;
use crate::smiles::{reference_order, IMPLICIT_H};
use crate::valence::{hybridization, Hybridization};

/// Normalised volume below which a centre is read as flat.
const MIN_CHIRAL_VOLUME: f64 = 0.1;
/// Torsions with |cos| below this are too twisted to call cis or trans.
const MIN_TORSION_COS: f64 = 0.5;
/// Double bonds in rings smaller than this are always cis.
const MIN_STEREO_RING: usize = 8;

/// A tagged tetrahedral centre: the volume over `neighbors` must have `sign`.
#[derive(Debug, Clone)]
pub(crate) struct TetrahedralCenter {
    pub center: usize,
    pub neighbors: [usize; 3],
    pub sign: f64,
}

impl TetrahedralCenter {
    pub fn volume(&self, coords: &[Vec3]) -> f64 {
        signed_volume(coords, self.center, self.neighbors)
    }

    pub fn is_satisfied(&self, coords: &[Vec3]) -> bool {
        self.sign * self.volume(coords) > 0.0
    }
}

/// A directed double bond `atoms[1]=atoms[2]` with the relation between the
/// two reference substituents `atoms[0]` and `atoms[3]`.
#[derive(Debug, Clone)]
pub(crate) struct DoubleBondConfig {
    pub atoms: [usize; 4],
    pub cis: bool,
}

impl DoubleBondConfig {
    /// Whether the bond is `j=k`, in either orientation.
    pub fn joins(&self, j: usize, k: usize) -> bool {
        (self.atoms[1], self.atoms[2]) == (j, k) || (self.atoms[1], self.atoms[2]) == (k, j)
    }

    /// Relation of any substituent pair: `i` on `j`, `l` on `k`. Swapping a
    /// reference substituent for the other one on the same atom flips it.
    pub fn is_cis(&self, i: usize, j: usize, l: usize) -> bool {
        let (near, far) = if j == self.atoms[1] { (i, l) } else { (l, i) };
        self.cis ^ (near != self.atoms[0]) ^ (far != self.atoms[3])
    }

    pub fn is_satisfied(&self, coords: &[Vec3]) -> bool {
        torsion_cosine(coords, self.atoms).is_some_and(|c| (c > 0.0) == self.cis)
    }
}

/// The stereo tags of a molecule as geometric constraints.
#[derive(Debug, Clone, Default)]
pub struct StereoConstraints {
    pub(crate) centers: Vec<TetrahedralCenter>,
    pub(crate) double_bonds: Vec<DoubleBondConfig>,
}

impl StereoConstraints {
    /// Collect tagged centres with four reference neighbours and double
    /// bonds with a direction on each side.
    pub fn from_molecule(mol: &Molecule) -> Self {
        let centers = (0..mol.atom_count())
            .filter_map(|c| {
                let sign = match mol.atoms[c].chirality {
                    Chirality::None => return None,
                    Chirality::CounterClockwise => -1.0,
                    Chirality::Clockwise => 1.0,
                };
                let order = reference_order(mol, c);
                if order.len() != 4 || order[1..].contains(&IMPLICIT_H) {
                    return None;
                }
                Some(TetrahedralCenter {
                    center: c,
                    neighbors: [order[1], order[2], order[3]],
                    sign,
                })
            })
            .collect();

        let double_bonds = mol
            .bonds
            .iter()
            .filter(|b| b.order == BondOrder::Double)
            .filter_map(|b| {
                let (j, k) = (b.atom1, b.atom2);
                let (i, bij) = directed_substituent(mol, j, k)?;
                let (l, bkl) = directed_substituent(mol, k, j)?;
                let cis = direction_from(mol, bij, i) != direction_from(mol, bkl, k);
                Some(DoubleBondConfig {
                    atoms: [i, j, k, l],
                    cis,
                })
            })
            .collect();

        StereoConstraints {
            centers,
            double_bonds,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty() && self.double_bonds.is_empty()
    }

    pub(crate) fn wrong_centers(&self, coords: &[Vec3]) -> usize {
        self.centers.iter().filter(|s| !s.is_satisfied(coords)).count()
    }

    /// Tetrahedral centres and double bonds whose geometry contradicts their tag.
    pub fn violations(&self, coords: &[[f64; 3]]) -> usize {
        self.wrong_centers(coords)
            + self.double_bonds.iter().filter(|d| !d.is_satisfied(coords)).count()
    }
}

/// First neighbour of `atom` (other than `partner`) whose bond carries a direction.
fn directed_substituent(mol: &Molecule, atom: usize, partner: usize) -> Option<(usize, usize)> {
    mol.adjacency[atom]
        .iter()
        .copied()
        .find(|&(n, bi)| n != partner && mol.bonds[bi].stereo != BondStereo::None)
}

/// Direction of bond `bi` read from its end `from`.
pub(crate) fn direction_from(mol: &Molecule, bi: usize, from: usize) -> BondStereo {
    let bond = &mol.bonds[bi];
    if bond.atom1 == from {
        bond.stereo
    } else {
        bond.stereo.inverted()
    }
}

fn set_direction(mol: &mut Molecule, bi: usize, from: usize, direction: BondStereo) {
    let bond = &mut mol.bonds[bi];
    bond.stereo = if bond.atom1 == from {
        direction
    } else {
        direction.inverted()
    };
}

pub(crate) fn signed_volume(coords: &[Vec3], center: usize, n: [usize; 3]) -> f64 {
    let c = coords[center];
    dot(sub(coords[n[0]], c), cross(sub(coords[n[1]], c), sub(coords[n[2]], c)))
}

/// Cosine of the i-j-k-l torsion; `None` when either end is collinear.
fn torsion_cosine(coords: &[Vec3], [i, j, k, l]: [usize; 4]) -> Option<f64> {
    let b1 = sub(coords[j], coords[i]);
    let b2 = sub(coords[k], coords[j]);
    let b3 = sub(coords[l], coords[k]);
    let n1 = cross(b1, b2);
    let n2 = cross(b2, b3);
    let (m1, m2) = (norm(n1), norm(n2));
    if m1 < 1e-8 || m2 < 1e-8 {
        return None;
    }
    Some(dot(n1, n2) / (m1 * m2))
}

/// Replace every chirality tag and bond direction with what conformer
/// `index` shows.
///
/// A centre is tagged when it is sp3 with four distinct reference
/// neighbours (by canonical rank) and is not flat. A double bond outside
/// small rings gets directions when each end has distinct substituents and
/// the torsion is clearly cis or trans.
///
/// # Errors
///
/// [`molkit_core::MolkitError::InvalidInput`] when the conformer does not exist.
pub fn assign_stereo_from_conformer(mol: &mut Molecule, index: usize) -> Result<()> {
    let coords = mol.conformer(index)?.coords.clone();
    let ranks = mol.canonical_ranks();
    let rings = RingInfo::new(mol);

    for atom in &mut mol.atoms {
        atom.chirality = Chirality::None;
    }
    for bond in &mut mol.bonds {
        bond.stereo = BondStereo::None;
    }

    let mut centers = 0;
    for c in 0..mol.atom_count() {
        if !is_tetrahedral_candidate(mol, &ranks, c) {
            continue;
        }
        let order = reference_order(mol, c);
        let unit = |a: usize| normalize(sub(coords[a], coords[c]));
        let (Some(a), Some(b), Some(d)) = (unit(order[1]), unit(order[2]), unit(order[3])) else {
            continue;
        };
        let volume = dot(a, cross(b, d));
        if volume.abs() < MIN_CHIRAL_VOLUME {
            continue;
        }
        mol.atoms[c].chirality = if volume < 0.0 {
            Chirality::CounterClockwise
        } else {
            Chirality::Clockwise
        };
        centers += 1;
    }

    let mut double_bonds = 0;
    for bi in 0..mol.bond_count() {
        let bond = &mol.bonds[bi];
        if bond.order != BondOrder::Double || bond.is_aromatic {
            continue;
        }
        let (j, k) = (bond.atom1, bond.atom2);
        let in_small_ring = rings
            .rings
            .iter()
            .any(|r| r.len() < MIN_STEREO_RING && r.contains(&j) && r.contains(&k));
        if in_small_ring {
            continue;
        }
        let (Some(i), Some(l)) = (stereo_substituent(mol, &ranks, j, k), stereo_substituent(mol, &ranks, k, j))
        else {
            continue;
        };
        let Some(cos) = torsion_cosine(&coords, [i, j, k, l]) else {
            continue;
        };
        if cos.abs() < MIN_TORSION_COS {
            continue;
        }
        if set_double_bond(mol, [i, j, k, l], cos > 0.0) {
            double_bonds += 1;
        }
    }

    debug!(
        "'{}': {centers} tetrahedral centres and {double_bonds} double bonds from conformer {index}",
        mol.name
    );
    Ok(())
}

fn is_tetrahedral_candidate(mol: &Molecule, ranks: &[u32], c: usize) -> bool {
    let atom = &mol.atoms[c];
    if atom.is_hydrogen() || atom.is_aromatic || atom.implicit_hydrogens > 1 {
        return false;
    }
    if hybridization(mol, c) != Hybridization::Sp3 {
        return false;
    }
    let order = reference_order(mol, c);
    if order.len() != 4 {
        return false;
    }
    let explicit: Vec<usize> = order.into_iter().filter(|&a| a != IMPLICIT_H).collect();
    if atom.implicit_hydrogens == 1 && explicit.iter().any(|&a| mol.atoms[a].is_hydrogen()) {
        return false;
    }
    let mut seen: Vec<u32> = explicit.iter().map(|&a| ranks[a]).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len() == explicit.len()
}

/// The substituent of `atom` (across from `partner`) that carries the bond
/// direction, or `None` when the end cannot be stereogenic.
fn stereo_substituent(mol: &Molecule, ranks: &[u32], atom: usize, partner: usize) -> Option<usize> {
    let others: Vec<(usize, usize)> = mol.adjacency[atom]
        .iter()
        .copied()
        .filter(|&(n, _)| n != partner)
        .collect();
    if others.iter().any(|&(_, bi)| mol.bonds[bi].order != BondOrder::Single) {
        return None;
    }
    match others.as_slice() {
        [(only, _)] => Some(*only),
        [(a, ba), (b, bb)] if mol.atoms[atom].implicit_hydrogens == 0 && ranks[*a] != ranks[*b] => {
            // reuse a direction set for a conjugated neighbour, then prefer heavy atoms
            let directed = |bi: usize| mol.bonds[bi].stereo != BondStereo::None;
            Some(if directed(*bb) && !directed(*ba) {
                *b
            } else if directed(*ba) || !mol.atoms[*a].is_hydrogen() {
                *a
            } else {
                *b
            })
        }
        _ => None,
    }
}

/// Give `i-j` and `k-l` directions describing the relation of `i` and `l`.
/// Returns `false` when directions already set elsewhere contradict it.
fn set_double_bond(mol: &mut Molecule, [i, j, k, l]: [usize; 4], cis: bool) -> bool {
    let (Some(bij), Some(bkl)) = (mol.bond_index(i, j), mol.bond_index(k, l)) else {
        return false;
    };
    let across = |d: BondStereo| if cis { d.inverted() } else { d };
    match (direction_from(mol, bij, i), direction_from(mol, bkl, k)) {
        (BondStereo::None, BondStereo::None) => {
            set_direction(mol, bij, i, BondStereo::Up);
            set_direction(mol, bkl, k, across(BondStereo::Up));
        }
        (d1, BondStereo::None) => set_direction(mol, bkl, k, across(d1)),
        (BondStereo::None, d2) => set_direction(mol, bij, i, across(d2)),
        (d1, d2) if across(d1) == d2 => {}
        _ => {
            debug!("conflicting directions around bond {j}={k} in '{}'", mol.name);
            return false;
        }
    }
    true
}
