//! Canonical atom ranking.
//!
//! Ranks come from Morgan-like invariant refinement: atoms start in classes
//! keyed by local invariants, and classes are split by the sorted multiset of
//! (neighbour class, bond order) until the partition stops changing. Class
//! keys are compared as values rather than hashed, so the result does not
//! depend on the input atom order and two atoms share a rank only when the
//! refinement cannot tell them apart.
//!
//! # Example
//!
//! ```
//! use molkit_chem::parse_smiles;
//!
//! let mol = parse_smiles("OCC(C)C").unwrap();
//! let ranks = mol.canonical_ranks();
//! assert_eq!(ranks[3], ranks[4]); // the two methyls
//! assert_ne!(ranks[0], ranks[1]);
//! ```

use crate::molecule::{BondOrder, Molecule};

/// Symmetry-preserving canonical ranks, dense and 0-based.
///
/// Prefer [`Molecule::canonical_ranks`], which caches the result.
pub fn compute_canonical_ranks(mol: &Molecule) -> Vec<u32> {
    let n = mol.atom_count();
    if n == 0 {
        return Vec::new();
    }
    let initial: Vec<_> = (0..n)
        .map(|i| {
            let atom = &mol.atoms[i];
            (
                atom.atomic_number,
                mol.degree(i),
                mol.total_hydrogens(i),
                atom.formal_charge,
                atom.isotope.unwrap_or(0),
                atom.is_aromatic,
            )
        })
        .collect();
    refine(mol, dense_ranks(&initial))
}

/// A total canonical order: symmetric ties are broken one at a time,
/// re-refining after each split, so every atom gets a distinct rank.
pub fn canonical_order(mol: &Molecule) -> Vec<u32> {
    let n = mol.atom_count();
    let mut ranks = mol.canonical_ranks();
    loop {
        let mut counts = vec![0usize; n];
        for &r in &ranks {
            counts[r as usize] += 1;
        }
        let Some(tied) = (0..n).find(|&r| counts[r] > 1) else {
            break;
        };
        let tied = tied as u32;
        let Some(pick) = (0..n).find(|&i| ranks[i] == tied) else {
            break;
        };
        let keys: Vec<u32> = (0..n)
            .map(|i| ranks[i] * 2 + u32::from(ranks[i] == tied && i != pick))
            .collect();
        ranks = refine(mol, dense_ranks(&keys));
    }
    ranks
}

fn bond_code(order: BondOrder) -> u8 {
    match order {
        BondOrder::Single => 1,
        BondOrder::Aromatic => 2,
        BondOrder::Double => 3,
        BondOrder::Triple => 4,
    }
}

/// Split classes by neighbourhood until the number of classes is stable.
fn refine(mol: &Molecule, mut ranks: Vec<u32>) -> Vec<u32> {
    let n = mol.atom_count();
    let mut classes = count_distinct(&ranks);
    loop {
        let keys: Vec<(u32, Vec<(u32, u8)>)> = (0..n)
            .map(|i| {
                let mut around: Vec<(u32, u8)> = mol.adjacency[i]
                    .iter()
                    .map(|&(j, bi)| (ranks[j], bond_code(mol.bonds[bi].order)))
                    .collect();
                around.sort_unstable();
                (ranks[i], around)
            })
            .collect();
        ranks = dense_ranks(&keys);
        let new_classes = count_distinct(&ranks);
        if new_classes == classes {
            return ranks;
        }
        classes = new_classes;
    }
}

/// Dense 0-based ranks of `keys` under their natural order.
fn dense_ranks<K: Ord>(keys: &[K]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    let mut ranks = vec![0u32; keys.len()];
    let mut rank = 0u32;
    for w in 0..order.len() {
        if w > 0 && keys[order[w]] != keys[order[w - 1]] {
            rank += 1;
        }
        ranks[order[w]] = rank;
    }
    ranks
}

fn count_distinct(values: &[u32]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrogens::add_hydrogens;
    use crate::smiles::parse_smiles;

    fn ranks_of(smiles: &str) -> Vec<u32> {
        compute_canonical_ranks(&parse_smiles(smiles).unwrap())
    }

    #[test]
    fn empty_molecule() {
        let mol = Molecule::new(String::new(), vec![], vec![]);
        assert!(compute_canonical_ranks(&mol).is_empty());
        assert!(canonical_order(&mol).is_empty());
    }

    #[test]
    fn benzene_atoms_all_equivalent() {
        let ranks = ranks_of("c1ccccc1");
        assert!(ranks.iter().all(|&r| r == ranks[0]));
    }

    #[test]
    fn ethanol_atoms_distinct() {
        let ranks = ranks_of("CCO");
        assert_ne!(ranks[0], ranks[1]);
        assert_ne!(ranks[1], ranks[2]);
        assert_ne!(ranks[0], ranks[2]);
    }

    #[test]
    fn ranks_independent_of_input_order() {
        let a = parse_smiles("CC(=O)O").unwrap();
        let b = parse_smiles("OC(C)=O").unwrap();
        let ra = compute_canonical_ranks(&a);
        let rb = compute_canonical_ranks(&b);
        // a: C0 C1 O2 O3 ; b: O0 C1 C2 O3
        assert_eq!(ra[0], rb[2]);
        assert_eq!(ra[1], rb[1]);
        assert_eq!(ra[2], rb[3]);
        assert_eq!(ra[3], rb[0]);
    }

    #[test]
    fn explicit_hydrogens_share_ranks() {
        let mut mol = parse_smiles("CO").unwrap();
        add_hydrogens(&mut mol);
        let ranks = compute_canonical_ranks(&mol);
        // methyl hydrogens 2, 3, 4 are equivalent; hydroxyl H 5 is not
        assert_eq!(ranks[2], ranks[3]);
        assert_eq!(ranks[3], ranks[4]);
        assert_ne!(ranks[2], ranks[5]);
    }

    #[test]
    fn distance_from_substituent_is_seen() {
        // toluene: ortho/meta/para carbons split, ortho pair and meta pair tie
        let ranks = ranks_of("Cc1ccccc1");
        assert_eq!(ranks[2], ranks[6]);
        assert_eq!(ranks[3], ranks[5]);
        assert_ne!(ranks[2], ranks[3]);
        assert_ne!(ranks[3], ranks[4]);
    }

    #[test]
    fn canonical_order_is_a_permutation() {
        let mol = parse_smiles("c1ccccc1C(C)C").unwrap();
        let mut order = canonical_order(&mol);
        order.sort_unstable();
        let expected: Vec<u32> = (0..mol.atom_count() as u32).collect();
        assert_eq!(order, expected);
    }
}
