//! Conversion of implicit hydrogens into explicit atoms.

use log::debug;

use crate::conformer::Conformer;
use crate::element::covalent_radius;
use crate::linalg::{add, cross, dot, normalize, perpendicular, scale, sub, Vec3};
use crate::molecule::{Chirality, Molecule};
use crate::smiles::{permutation_is_odd, reference_order, IMPLICIT_H};
use crate::valence::{hybridization, Hybridization};

/// Turn every implicit hydrogen into an explicit H atom bonded to its parent.
///
/// New atoms are appended after the existing ones, parent by parent. When
/// the molecule has conformers, each conformer gains a position for every
/// new hydrogen, so conformer lengths keep matching the atom count.
/// Tetrahedral tags are re-expressed for the new neighbour order.
///
/// Returns the number of hydrogens added.
pub fn add_hydrogens(mol: &mut Molecule) -> usize {
    let heavy_count = mol.atom_count();
    let hybrid: Vec<Hybridization> = (0..heavy_count).map(|i| hybridization(mol, i)).collect();
    let mut added: Vec<(usize, usize)> = Vec::new();

    for parent in 0..heavy_count {
        let count = mol.atoms[parent].implicit_hydrogens;
        if count == 0 || mol.atoms[parent].is_hydrogen() {
            continue;
        }
        let old_reference = reference_order(mol, parent);
        mol.atoms[parent].implicit_hydrogens = 0;

        let first_h = mol.atom_count();
        for _ in 0..count {
            let h = mol.attach_hydrogen(parent);
            added.push((parent, h));
        }

        if mol.atoms[parent].chirality != Chirality::None {
            let old: Vec<usize> = old_reference
                .into_iter()
                .map(|a| if a == IMPLICIT_H { first_h } else { a })
                .collect();
            if permutation_is_odd(&old, &reference_order(mol, parent)) {
                mol.atoms[parent].chirality = mol.atoms[parent].chirality.inverted();
            }
        }
    }

    if added.is_empty() {
        return 0;
    }
    debug!(
        "added {} hydrogens to '{}' ({} conformers)",
        added.len(),
        mol.name,
        mol.num_conformers()
    );

    let placed: Vec<Vec<Vec3>> = mol
        .conformers()
        .iter()
        .map(|conf| place_hydrogens(mol, conf, &added, &hybrid))
        .collect();
    for (conf, positions) in mol.conformers_mut().iter_mut().zip(placed) {
        for p in positions {
            conf.push(p);
        }
    }
    added.len()
}

/// Positions for the new hydrogens of one conformer, in `added` order.
fn place_hydrogens(
    mol: &Molecule,
    conf: &Conformer,
    added: &[(usize, usize)],
    hybrid: &[Hybridization],
) -> Vec<Vec3> {
    let start = conf.len();
    let mut coords = conf.coords.clone();
    for &(parent, h) in added {
        debug_assert_eq!(coords.len(), h);
        let origin = coords[parent];
        let placed: Vec<Vec3> = mol.adjacency[parent]
            .iter()
            .map(|&(j, _)| j)
            .filter(|&j| j < coords.len())
            .filter_map(|j| normalize(sub(coords[j], origin)))
            .collect();
        let dir = next_direction(&placed, hybrid[parent]);
        let length = covalent_radius(mol.atoms[parent].atomic_number) + covalent_radius(1);
        coords.push(add(origin, scale(dir, length)));
    }
    coords.split_off(start)
}

/// Unit direction for one more substituent given the unit vectors already bonded.
fn next_direction(existing: &[Vec3], hybrid: Hybridization) -> Vec3 {
    let theta = hybrid.bond_angle();
    match existing {
        [] => [1.0, 0.0, 0.0],
        [u] => {
            let p = perpendicular(*u);
            add(scale(*u, theta.cos()), scale(p, theta.sin()))
        }
        [u1, u2] => {
            let bisector = normalize(scale(add(*u1, *u2), -1.0)).unwrap_or_else(|| perpendicular(*u1));
            if hybrid != Hybridization::Sp3 {
                return bisector;
            }
            let normal = normalize(cross(*u1, *u2)).unwrap_or_else(|| perpendicular(bisector));
            // the two free tetrahedral vertices sit ±54.74° off the bisector
            let half = 54.74f64.to_radians();
            add(scale(bisector, half.cos()), scale(normal, half.sin()))
        }
        _ => {
            let sum = existing.iter().fold([0.0; 3], |acc, u| add(acc, *u));
            match normalize(scale(sum, -1.0)) {
                Some(d) if dot(sum, sum) > 1e-4 => d,
                _ => {
                    let plane = cross(sub(existing[1], existing[0]), sub(existing[2], existing[0]));
                    normalize(plane).unwrap_or_else(|| perpendicular(existing[0]))
                }
            }
        }
    }
}
