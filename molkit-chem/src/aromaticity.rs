//! Hückel aromaticity over the smallest set of smallest rings.
//!
//! Aromatic bonds already present are first resolved with [`kekulize`], so
//! Kekulé and aromatic input end up with the same flags. A ring is aromatic
//! when every atom can contribute to a pi system and the ring holds 4n+2 pi
//! electrons; two fused rings that fail on their own are tested together,
//! which catches azulene-like systems. Implicit hydrogen counts are kept.

use log::debug;
use molkit_core::Result;

use crate::molecule::{BondOrder, Molecule};
use crate::ring::RingInfo;
use crate::valence::kekulize;

/// Mark aromatic atoms and bonds, returning the number of aromatic atoms.
///
/// # Errors
///
/// [`molkit_core::MolkitError::Computation`] when aromatic input has no
/// Kekulé structure.
pub fn perceive_aromaticity(mol: &mut Molecule) -> Result<usize> {
    let orders = kekulize(mol)?;
    for (bond, order) in mol.bonds.iter_mut().zip(orders) {
        bond.order = order;
        bond.is_aromatic = false;
    }
    for atom in &mut mol.atoms {
        atom.is_aromatic = false;
    }

    let rings = RingInfo::new(mol);
    if rings.num_rings() == 0 {
        return Ok(0);
    }
    let pi: Vec<Option<u32>> = (0..mol.atom_count()).map(|a| pi_electrons(mol, &rings, a)).collect();
    let mut aromatic: Vec<bool> = rings
        .rings
        .iter()
        .map(|r| ring_pi(&pi, r).is_some_and(is_huckel))
        .collect();

    for a in 0..rings.rings.len() {
        for b in (a + 1)..rings.rings.len() {
            if aromatic[a] && aromatic[b] {
                continue;
            }
            let (ra, rb) = (&rings.rings[a], &rings.rings[b]);
            if ra.iter().filter(|&x| rb.contains(x)).count() != 2 {
                continue;
            }
            let mut envelope = ra.clone();
            envelope.extend(rb.iter().filter(|&x| !ra.contains(x)));
            if ring_pi(&pi, &envelope).is_some_and(is_huckel) {
                aromatic[a] = true;
                aromatic[b] = true;
            }
        }
    }

    for (ring, &is_aromatic) in rings.rings.iter().zip(&aromatic) {
        if !is_aromatic {
            continue;
        }
        for (k, &atom) in ring.iter().enumerate() {
            mol.atoms[atom].is_aromatic = true;
            if let Some(bi) = mol.bond_index(atom, ring[(k + 1) % ring.len()]) {
                mol.bonds[bi].order = BondOrder::Aromatic;
                mol.bonds[bi].is_aromatic = true;
            }
        }
    }

    let count = mol.atoms.iter().filter(|a| a.is_aromatic).count();
    debug!("'{}': {count} aromatic atoms in {} rings", mol.name, rings.num_rings());
    Ok(count)
}

/// Pi electrons a ring atom gives to an aromatic system, or `None` when it
/// cannot take part in one.
fn pi_electrons(mol: &Molecule, rings: &RingInfo, atom_idx: usize) -> Option<u32> {
    if !rings.is_atom_in_ring(atom_idx) {
        return None;
    }
    let atom = &mol.atoms[atom_idx];
    let mut ring_double = false;
    let mut exocyclic_double = None;
    for &(nbr, bi) in &mol.adjacency[atom_idx] {
        match mol.bonds[bi].order {
            BondOrder::Double if rings.is_bond_in_ring(bi) => ring_double = true,
            BondOrder::Double => exocyclic_double = Some(nbr),
            BondOrder::Triple => return None,
            BondOrder::Single | BondOrder::Aromatic => {}
        }
    }
    let connections = mol.degree(atom_idx) + atom.implicit_hydrogens as usize;

    match (atom.atomic_number, atom.formal_charge) {
        (6, 0) => match exocyclic_double {
            _ if ring_double => Some(1),
            // a carbonyl-like carbon keeps its electrons outside the ring
            Some(nbr) if matches!(mol.atoms[nbr].atomic_number, 7 | 8 | 16) => Some(0),
            _ => None,
        },
        (6, -1) => Some(if ring_double { 1 } else { 2 }),
        (6, 1) | (5, 0) => Some(if ring_double { 1 } else { 0 }),
        (7 | 15 | 33, 0) => {
            if ring_double {
                Some(1)
            } else if exocyclic_double.is_none() && connections <= 3 {
                Some(2)
            } else {
                None
            }
        }
        (7, 1) | (8 | 16 | 34, 1) if ring_double => Some(1),
        (7, -1) if !ring_double && connections == 2 => Some(2),
        (8 | 16 | 34 | 52, 0) if !ring_double && exocyclic_double.is_none() && connections == 2 => Some(2),
        _ => None,
    }
}

/// Total over the ring, `None` if any atom cannot join.
fn ring_pi(pi: &[Option<u32>], ring: &[usize]) -> Option<u32> {
    ring.iter().map(|&a| pi[a]).sum()
}

fn is_huckel(pi: u32) -> bool {
    pi >= 2 && (pi - 2) % 4 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::{Bond, MolAtom};
    use crate::smiles::parse_smiles;
    use crate::valence::assign_implicit_hydrogens;

    fn aromatic_atoms(smiles: &str) -> Vec<bool> {
        let mut mol = parse_smiles(smiles).unwrap();
        perceive_aromaticity(&mut mol).unwrap();
        mol.atoms.iter().map(|a| a.is_aromatic).collect()
    }

    #[test]
    fn kekule_rings_become_aromatic() {
        for smi in [
            "C1=CC=CC=C1",
            "C1=CC=NC=C1",
            "C1=CNC=C1",
            "C1=COC=C1",
            "C1=CSC=C1",
            "C1=CC=C2C=CC=CC2=C1",
            "[CH-]1C=CC=C1",
        ] {
            assert!(aromatic_atoms(smi).iter().all(|&a| a), "{smi}");
        }

        // 2-pyridone: the carbonyl carbon joins with no electrons of its own
        let flags = aromatic_atoms("O=C1C=CC=CN1");
        assert!(!flags[0]);
        assert!(flags[1..].iter().all(|&a| a));
    }

    #[test]
    fn non_aromatic_rings_stay_kekule() {
        for smi in ["C1CCCCC1", "C1=CCC=C1", "C1=CC=CC=CC=C1", "C1=CC=C1", "O=C1C=CC(=O)C=C1"] {
            assert!(aromatic_atoms(smi).iter().all(|&a| !a), "{smi}");
        }
    }

    #[test]
    fn substituents_are_not_aromatic() {
        let flags = aromatic_atoms("OC1=CC=CC=C1");
        assert!(!flags[0]);
        assert!(flags[1..].iter().all(|&a| a));
    }

    #[test]
    fn fused_pair_is_tested_as_one_system() {
        // azulene: 5- and 7-membered rings with 10 pi electrons together
        assert!(aromatic_atoms("C1=CC2=CC=CC=CC2=C1").iter().all(|&a| a));
    }

    #[test]
    fn lowercase_and_kekule_input_agree() {
        let mut lower = parse_smiles("c1ccncc1").unwrap();
        let mut kekule = parse_smiles("C1=CC=NC=C1").unwrap();
        perceive_aromaticity(&mut lower).unwrap();
        perceive_aromaticity(&mut kekule).unwrap();
        assert_eq!(lower.atoms, kekule.atoms);
        assert!(kekule.bonds.iter().all(|b| b.order == BondOrder::Aromatic && b.is_aromatic));
        assert_eq!(lower.canonical_ranks(), kekule.canonical_ranks());
    }

    #[test]
    fn hydrogen_counts_are_kept() {
        // pyrrole from bond orders alone: the N-H must survive aromatisation
        let mut atoms = vec![MolAtom::new(7)];
        atoms.extend((0..4).map(|_| MolAtom::new(6)));
        let bonds = vec![
            Bond::new(0, 1, BondOrder::Single),
            Bond::new(1, 2, BondOrder::Double),
            Bond::new(2, 3, BondOrder::Single),
            Bond::new(3, 4, BondOrder::Double),
            Bond::new(4, 0, BondOrder::Single),
        ];
        let mut mol = Molecule::new("pyrrole".into(), atoms, bonds);
        assign_implicit_hydrogens(&mut mol);
        assert_eq!(perceive_aromaticity(&mut mol).unwrap(), 5);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 1);
        assert_eq!(mol.total_hydrogen_count(), 5);
        assert!(kekulize(&mol).is_ok());
    }

    #[test]
    fn huckel_counts() {
        assert!(is_huckel(2));
        assert!(is_huckel(6));
        assert!(is_huckel(10));
        assert!(!is_huckel(0));
        assert!(!is_huckel(4));
        assert!(!is_huckel(8));
    }
}
