//! Small-molecule toolkit for the molkit workspace.
//!
//! Reads PDB, MOL, MOL2, SDF and SMILES into a molecular graph, embeds and
//! optimises 3-D conformers with UFF or MMFF94, computes descriptors, writes
//! SMILES, SMARTS, MOL and PDB, and groups atoms into graph-symmetry classes
//! from their canonical ranks.
//!
//! The [`toolkit`] module holds the procedural entry points; the other
//! modules expose the pieces they are built from.
//!
//! # Example
//!
//! ```
//! use molkit_chem::{find_symmetry_classes, parse_smiles, molecular_formula};
//!
//! // Parse propane from SMILES
//! let propane = parse_smiles("CCC").unwrap();
//! assert_eq!(propane.atom_count(), 3);
//! assert_eq!(molecular_formula(&propane), "C3H8");
//!
//! // The two methyl carbons are interchangeable
//! let classes = find_symmetry_classes(&propane).unwrap();
//! assert_eq!(classes[&0], classes[&2]);
//! assert_ne!(classes[&0], classes[&1]);
//! ```

pub mod aromaticity;
pub mod canon;
pub mod conformer;
pub mod descriptors;
pub mod element;
pub mod embed;
pub mod forcefield;
pub mod gasteiger;
pub mod hydrogens;
pub mod mol2;
pub mod molecule;
pub mod pdb;
pub mod ring;
pub mod sdf;
pub mod smiles;
pub mod stereo;
pub mod symmetry;
pub mod toolkit;
pub mod valence;
pub mod writer;

mod linalg;

pub use aromaticity::perceive_aromaticity;
pub use conformer::Conformer;
pub use descriptors::{compute_descriptors, molecular_formula, molecular_weight, Descriptors};
pub use element::{element_by_number, element_by_symbol, Element};
pub use embed::{embed_molecule, embed_multiple, EmbedConfig};
pub use forcefield::{
    energy, minimize, mmff94_energy, uff_energy, EnergyComponents, ForceField, MinimizeConfig,
    MinimizeMethod, MinimizeResult,
};
pub use gasteiger::gasteiger_charges;
pub use hydrogens::add_hydrogens;
pub use mol2::{parse_mol2, read_mol2_file};
pub use molecule::{Bond, BondOrder, BondStereo, Chirality, MolAtom, Molecule};
pub use pdb::{parse_pdb, read_pdb_file, write_pdb_block, write_pdb_file};
pub use ring::RingInfo;
pub use sdf::{
    parse_mol_block, parse_mol_v2000, parse_mol_v3000, parse_sdf, read_mol_file, read_sdf_file,
    write_mol_block, write_mol_file,
};
pub use smiles::{parse_smiles, parse_smiles_named};
pub use stereo::{assign_stereo_from_conformer, StereoConstraints};
pub use symmetry::{classify, find_symmetry_classes};
pub use toolkit::{
    add_conformer, conformer_rmsd, descriptor_map, generate_conformers, get_mol, get_smarts,
    get_smiles, load_molecule, mm_optimise, optimize, smiles_to_molecule, MolInput,
};
pub use valence::{assign_implicit_hydrogens, kekulize, sanitize};
pub use writer::{canonical_smiles, write_smarts, write_smiles, SmilesWriteOptions};
