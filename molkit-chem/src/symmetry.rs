//! Graph-symmetry classes from canonical ranks.
//!
//! Atoms with equal canonical rank are interchangeable under the graph's
//! automorphisms. [`classify`] turns a rank array into a map from atom
//! index to a dense class label.

use std::collections::BTreeMap;

use log::debug;
use molkit_core::{MolkitError, Result};

use crate::molecule::Molecule;

/// Group atom indices by equal rank and label the groups `"0"`, `"1"`, ...
/// in ascending rank order.
///
/// Labels are dense over the ranks actually present, so gaps in the rank
/// values never produce a label. Every index `0..ranks.len()` appears in
/// the result exactly once.
///
/// # Errors
///
/// [`MolkitError::InvalidInput`] for an empty array or a negative rank.
///
/// # Example
///
/// ```
/// use molkit_chem::classify;
///
/// let classes = classify(&[0, 1, 0, 2, 1]).unwrap();
/// assert_eq!(classes[&0], classes[&2]);
/// assert_eq!(classes[&1], classes[&4]);
/// assert_ne!(classes[&0], classes[&3]);
/// ```
pub fn classify(ranks: &[i64]) -> Result<BTreeMap<usize, String>> {
    if ranks.is_empty() {
        return Err(MolkitError::InvalidInput("rank array is empty".into()));
    }
    if let Some((atom, rank)) = ranks.iter().enumerate().find(|(_, &r)| r < 0) {
        return Err(MolkitError::InvalidInput(format!(
            "negative rank {rank} for atom {atom}"
        )));
    }

    let mut buckets: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (atom, &rank) in ranks.iter().enumerate() {
        buckets.entry(rank).or_default().push(atom);
    }

    let mut classes = BTreeMap::new();
    for (label, atoms) in buckets.values().enumerate() {
        for &atom in atoms {
            classes.insert(atom, label.to_string());
        }
    }
    debug!("{} atoms in {} symmetry classes", ranks.len(), buckets.len());
    Ok(classes)
}

/// Symmetry classes of a molecule's atoms from its canonical ranks.
pub fn find_symmetry_classes(mol: &Molecule) -> Result<BTreeMap<usize, String>> {
    if mol.atom_count() == 0 {
        return Err(MolkitError::InvalidInput(format!(
            "molecule '{}' has no atoms",
            mol.name
        )));
    }
    let ranks: Vec<i64> = mol.canonical_ranks().into_iter().map(i64::from).collect();
    classify(&ranks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn members(classes: &BTreeMap<usize, String>, label: &str) -> Vec<usize> {
        classes.iter().filter(|(_, l)| *l == label).map(|(&a, _)| a).collect()
    }

    #[test]
    fn mixed_ranks() {
        let classes = classify(&[0, 1, 0, 2, 1]).unwrap();
        assert_eq!(classes.len(), 5);
        assert_eq!(members(&classes, "0"), vec![0, 2]);
        assert_eq!(members(&classes, "1"), vec![1, 4]);
        assert_eq!(members(&classes, "2"), vec![3]);
    }

    #[test]
    fn sparse_ranks_are_compacted() {
        let classes = classify(&[5, 5, 5]).unwrap();
        assert_eq!(classes.len(), 3);
        assert!(classes.values().all(|l| l == "0"));

        let classes = classify(&[10, 3, 99]).unwrap();
        assert_eq!(classes[&1], "0");
        assert_eq!(classes[&0], "1");
        assert_eq!(classes[&2], "2");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(classify(&[]), Err(MolkitError::InvalidInput(_))));
        assert!(matches!(classify(&[0, -1]), Err(MolkitError::InvalidInput(_))));
    }

    #[test]
    fn molecule_classes() {
        // ethanol: every heavy atom is distinct
        let ethanol = parse_smiles("CCO").unwrap();
        let classes = find_symmetry_classes(&ethanol).unwrap();
        assert_eq!(classes.values().collect::<std::collections::BTreeSet<_>>().len(), 3);

        // propane: the two methyls match
        let propane = parse_smiles("CCC").unwrap();
        let classes = find_symmetry_classes(&propane).unwrap();
        assert_eq!(classes[&0], classes[&2]);
        assert_ne!(classes[&0], classes[&1]);

        // benzene: one class
        let benzene = parse_smiles("c1ccccc1").unwrap();
        let classes = find_symmetry_classes(&benzene).unwrap();
        assert!(classes.values().all(|l| l == "0"));
    }

    #[test]
    fn empty_molecule_is_rejected() {
        let mol = Molecule::new("empty".into(), vec![], vec![]);
        assert!(matches!(
            find_symmetry_classes(&mol),
            Err(MolkitError::InvalidInput(_))
        ));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    proptest! {
        #[test]
        fn every_index_labelled_once(ranks in proptest::collection::vec(0i64..50, 1..40)) {
            let classes = classify(&ranks).unwrap();
            let keys: Vec<usize> = classes.keys().copied().collect();
            prop_assert_eq!(keys, (0..ranks.len()).collect::<Vec<_>>());
        }

        #[test]
        fn labels_follow_rank_equality(ranks in proptest::collection::vec(0i64..10, 1..30)) {
            let classes = classify(&ranks).unwrap();
            for i in 0..ranks.len() {
                for j in 0..ranks.len() {
                    prop_assert_eq!(ranks[i] == ranks[j], classes[&i] == classes[&j]);
                }
            }
        }

        #[test]
        fn one_label_per_distinct_rank(ranks in proptest::collection::vec(0i64..1000, 1..40)) {
            let classes = classify(&ranks).unwrap();
            let labels: BTreeSet<&String> = classes.values().collect();
            let distinct: BTreeSet<i64> = ranks.iter().copied().collect();
            prop_assert_eq!(labels.len(), distinct.len());
            // dense labels
            for k in 0..distinct.len() {
                prop_assert!(labels.contains(&k.to_string()));
            }
        }

        #[test]
        fn classify_is_idempotent(ranks in proptest::collection::vec(0i64..20, 1..30)) {
            let once = classify(&ranks).unwrap();
            let relabelled: Vec<i64> = (0..ranks.len())
                .map(|i| once[&i].parse::<i64>().unwrap())
                .collect();
            prop_assert_eq!(classify(&relabelled).unwrap(), once);
        }
    }
}
