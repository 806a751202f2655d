use std::fs;

use molkit_chem::{
    add_conformer, classify, conformer_rmsd, descriptor_map, energy, find_symmetry_classes,
    generate_conformers, get_mol, get_smarts, get_smiles, load_molecule, mm_optimise,
    molecular_formula, optimize, parse_smiles, read_mol_file, read_pdb_file, smiles_to_molecule,
    write_mol_file, write_pdb_file, Bond, BondOrder, Chirality, Conformer, ForceField, MolAtom,
    MolInput, Molecule, StereoConstraints,
};
use molkit_core::MolkitError;
use tempfile::tempdir;

const ACETATE_MOL2: &str = "\
@<TRIPOS>MOLECULE
acetate
 4 3 0 0 0
SMALL
NO_CHARGES

@<TRIPOS>ATOM
      1 C1          0.0000    0.0000    0.0000 C.3       1 ACT  0.0
      2 C2          1.5000    0.0000    0.0000 C.2       1 ACT  0.0
      3 O1          2.1000    1.1000    0.0000 O.co2     1 ACT  0.0
      4 O2          2.1000   -1.1000    0.0000 O.co2     1 ACT  0.0
@<TRIPOS>BOND
     1     1     2    1
     2     2     3   ar
     3     2     4   ar
";

#[test]
fn appended_conformer_reads_back_in_order() {
    let atoms = vec![MolAtom::new(1), MolAtom::new(1)];
    let bonds = vec![Bond::new(0, 1, BondOrder::Single)];
    let mut mol = Molecule::new("H2".into(), atoms, bonds);

    let coords = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
    let idx = add_conformer(&mut mol, &coords).unwrap();
    assert_eq!(idx, mol.num_conformers() - 1);
    assert_eq!(mol.conformer(idx).unwrap().coords, coords.to_vec());

    let err = add_conformer(&mut mol, &[[0.0; 3]; 3]).unwrap_err();
    assert!(matches!(err, MolkitError::InvalidInput(_)));
    assert_eq!(mol.num_conformers(), 1);
}

#[test]
fn classifier_scenarios() {
    let classes = classify(&[0, 1, 0, 2, 1]).unwrap();
    assert_eq!(classes.len(), 5);
    assert_eq!(classes[&0], classes[&2]);
    assert_eq!(classes[&1], classes[&4]);
    let labels: std::collections::BTreeSet<_> = classes.values().collect();
    assert_eq!(labels.len(), 3);

    let classes = classify(&[5, 5, 5]).unwrap();
    assert!(classes.values().all(|l| l == "0"));
}

#[test]
fn hydrogens_on_one_carbon_share_a_class() {
    let mol = smiles_to_molecule("CCO", Some("ethanol")).unwrap();
    let classes = find_symmetry_classes(&mol).unwrap();
    // methyl carbon is atom 0; its three hydrogens follow the heavy atoms
    let methyl_h: Vec<usize> = mol.adjacency[0]
        .iter()
        .map(|&(n, _)| n)
        .filter(|&n| mol.atoms[n].is_hydrogen())
        .collect();
    assert_eq!(methyl_h.len(), 3);
    assert!(methyl_h.iter().all(|h| classes[h] == classes[&methyl_h[0]]));
    assert_ne!(classes[&0], classes[&1]);
}

#[test]
fn unsupported_extension_is_an_error() {
    let err = MolInput::from_path("ligand.xyz").unwrap_err();
    assert!(matches!(err, MolkitError::UnsupportedFormat(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let input = MolInput::from_path(dir.path().join("missing.pdb")).unwrap();
    assert!(matches!(load_molecule(&input, None), Err(MolkitError::Io(_))));
}

#[test]
fn mm_optimise_writes_pdb_and_lowers_energy() {
    let dir = tempdir().unwrap();
    let mol = smiles_to_molecule("CCC(=O)O", Some("propanoic")).unwrap();
    let src = dir.path().join("propanoic.mol");
    write_mol_file(&mol, &src).unwrap();

    let input = MolInput::from_path(&src).unwrap();
    let before = load_molecule(&input, None).unwrap();
    let start = energy(&before, before.conformer(0).unwrap(), ForceField::Mmff94).unwrap().total;

    let out = mm_optimise(&input, "MMF", dir.path()).unwrap();
    assert_eq!(out.file_name().unwrap(), "propanoic_optimised.pdb");
    let optimised = read_pdb_file(&out).unwrap();
    assert_eq!(optimised.atom_count(), before.atom_count());
    let end = energy(&optimised, optimised.conformer(0).unwrap(), ForceField::Mmff94).unwrap().total;
    // PDB keeps three decimals, so allow for rounding
    assert!(end <= start + 0.5, "energy rose from {start} to {end}");

    let err = mm_optimise(&input, "GAFF", dir.path()).unwrap_err();
    assert!(matches!(err, MolkitError::InvalidSelector(_)));
}

#[test]
fn get_mol_and_smiles_from_files() {
    let dir = tempdir().unwrap();
    let mol = smiles_to_molecule("c1ccccc1O", Some("phenol")).unwrap();
    let pdb = dir.path().join("phenol.pdb");
    write_pdb_file(&mol, &pdb).unwrap();
    let input = MolInput::from_path(&pdb).unwrap();

    let mol_path = get_mol(&input, dir.path()).unwrap();
    assert_eq!(mol_path.file_name().unwrap(), "phenol.mol");
    let text = fs::read_to_string(&mol_path).unwrap();
    assert!(text.contains("V2000"));
    let reread = read_mol_file(&mol_path).unwrap();
    assert_eq!(reread.atom_count(), mol.atom_count());

    let smiles = get_smiles(&input, false).unwrap();
    assert_eq!(molecular_formula(&parse_smiles(&smiles).unwrap()), "C6H6O");
    let explicit = get_smiles(&input, true).unwrap();
    assert!(explicit.contains('['));

    let smarts = get_smarts(&input).unwrap();
    assert!(smarts.contains("[#6"));
    assert!(smarts.contains("[#8"));
}

#[test]
fn mol2_input_keeps_charges() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("acetate.mol2");
    fs::write(&path, ACETATE_MOL2).unwrap();

    let mol = load_molecule(&MolInput::from_path(&path).unwrap(), Some("ion")).unwrap();
    assert_eq!(mol.name, "ion");
    let charge: i32 = mol.atoms.iter().map(|a| a.formal_charge as i32).sum();
    assert_eq!(charge, -1);
    assert_eq!(molecular_formula(&mol), "C2H3O2");
}

#[test]
fn smiles_round_trip_keeps_formula() {
    for smi in ["CC(=O)Nc1ccc(O)cc1", "N[C@@H](C)C(=O)O", "F/C=C/F", "[NH4+].[Cl-]", "C1CC1"] {
        let mol = parse_smiles(smi).unwrap();
        let written = get_smiles(&MolInput::Smiles(smi.to_string()), false).unwrap();
        let back = parse_smiles(&written).unwrap();
        assert_eq!(molecular_formula(&mol), molecular_formula(&back), "{smi} -> {written}");
    }
}

#[test]
fn conformers_and_rmsd() {
    let mut mol = smiles_to_molecule("CCCCO", None).unwrap();
    let generated = generate_conformers(&mut mol, 2).unwrap();
    assert_eq!(generated.len(), 2);
    assert_eq!(mol.num_conformers(), 3);

    assert!(conformer_rmsd(&mol, 1, 1).unwrap() < 1e-9);
    assert!(conformer_rmsd(&mol, 0, 2).unwrap() >= 0.0);
    assert!(matches!(conformer_rmsd(&mol, 0, 3), Err(MolkitError::InvalidInput(_))));
}

#[test]
fn descriptors_match_implicit_and_explicit_forms() {
    let embedded = smiles_to_molecule("CC(=O)O", None).unwrap();
    let implicit = parse_smiles("CC(=O)O").unwrap();
    let a = descriptor_map(&embedded);
    let b = descriptor_map(&implicit);
    assert_eq!(a.len(), 5);
    for (key, value) in &a {
        assert!((value - b[key]).abs() < 1e-9, "{key}: {value} vs {}", b[key]);
    }
    assert_eq!(a["Heavy atoms"], 4.0);
}

#[test]
fn symmetry_classes_survive_a_pdb_round_trip() {
    let dir = tempdir().unwrap();
    for (smi, expected) in [("c1ccncc1", 7), ("c1ccccc1", 2), ("Cc1ccccc1", 9)] {
        let mol = smiles_to_molecule(smi, Some("ring")).unwrap();
        let path = dir.path().join("ring.pdb");
        write_pdb_file(&mol, &path).unwrap();
        let back = load_molecule(&MolInput::from_path(&path).unwrap(), None).unwrap();
        let aromatic = |m: &Molecule| m.atoms.iter().filter(|a| a.is_aromatic).count();
        assert_eq!(aromatic(&back), aromatic(&mol), "{smi}");

        let a = find_symmetry_classes(&mol).unwrap();
        let b = find_symmetry_classes(&back).unwrap();
        assert_eq!(a, b, "{smi}");
        let labels: std::collections::BTreeSet<_> = b.values().collect();
        assert_eq!(labels.len(), expected, "{smi}");
    }
}

#[test]
fn over_valent_mol_file_is_rejected() {
    let mut atoms = vec![MolAtom::new(6)];
    atoms.extend((0..5).map(|_| MolAtom::new(9)));
    let bonds = (1..6).map(|f| Bond::new(0, f, BondOrder::Single)).collect();
    let mut mol = Molecule::new("CF5".into(), atoms, bonds);
    let coords = vec![
        [0.0, 0.0, 0.0],
        [1.4, 0.0, 0.0],
        [-1.4, 0.0, 0.0],
        [0.0, 1.4, 0.0],
        [0.0, -1.4, 0.0],
        [0.0, 0.0, 1.4],
    ];
    mol.add_conformer(Conformer::new(coords)).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("cf5.mol");
    write_mol_file(&mol, &path).unwrap();
    let err = load_molecule(&MolInput::from_path(&path).unwrap(), None).unwrap_err();
    assert!(matches!(err, MolkitError::Computation(_)), "{err}");
}

#[test]
fn alanine_chirality_read_from_mol_coordinates() {
    let dir = tempdir().unwrap();
    let mut read = Vec::new();
    for smi in ["N[C@@H](C)C(=O)O", "N[C@H](C)C(=O)O"] {
        let mol = smiles_to_molecule(smi, Some("ala")).unwrap();
        let path = dir.path().join("ala.mol");
        write_mol_file(&mol, &path).unwrap();
        let back = load_molecule(&MolInput::from_path(&path).unwrap(), None).unwrap();

        assert_ne!(back.atoms[1].chirality, Chirality::None, "{smi}");
        assert_eq!(back.atoms[1].chirality, mol.atoms[1].chirality, "{smi}");
        let tagged = back.atoms.iter().filter(|a| a.chirality != Chirality::None).count();
        assert_eq!(tagged, 1, "{smi}");
        read.push(back.atoms[1].chirality);
    }
    assert_eq!(read[0], read[1].inverted());
}

#[test]
fn double_bond_configuration_read_from_mol_coordinates() {
    let dir = tempdir().unwrap();
    for smi in ["C/C=C/C", "C/C=C\\C"] {
        let mol = smiles_to_molecule(smi, Some("butene")).unwrap();
        let path = dir.path().join("butene.mol");
        write_mol_file(&mol, &path).unwrap();
        let back = load_molecule(&MolInput::from_path(&path).unwrap(), None).unwrap();

        let original = StereoConstraints::from_molecule(&mol);
        let perceived = StereoConstraints::from_molecule(&back);
        assert!(!perceived.is_empty(), "{smi}");
        // the reference geometry obeys both sets of tags
        let coords = &mol.conformer(0).unwrap().coords;
        assert_eq!(original.violations(coords), 0, "{smi}");
        assert_eq!(perceived.violations(coords), 0, "{smi}");
    }
}

#[test]
fn optimisation_keeps_cis_geometry() {
    let mut mol = smiles_to_molecule("C/C=C\\C", Some("cis")).unwrap();
    for selector in ["UFF", "MMFF94"] {
        optimize(&mut mol, selector).unwrap();
    }
    let stereo = StereoConstraints::from_molecule(&mol);
    assert_eq!(stereo.violations(&mol.conformer(0).unwrap().coords), 0);
    let conf = mol.conformer(0).unwrap();
    let phi = conf.dihedral(0, 1, 2, 3).to_degrees();
    assert!(phi < 30.0 || phi > 330.0, "C-C=C-C torsion {phi}");
}
