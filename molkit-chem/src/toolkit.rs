//! Procedural entry points: load a molecule from a file or SMILES, optimise
//! it, describe it, write it out and manage its conformers.
//!
//! Every function is stateless; the molecule is owned by the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use molkit_core::{ContentAddressable, MolkitError, Result};

use crate::aromaticity::perceive_aromaticity;
use crate::conformer::Conformer;
use crate::descriptors::compute_descriptors;
use crate::embed::{embed_molecule, embed_multiple, EmbedConfig};
use crate::forcefield::{minimize, ForceField, MinimizeConfig, MinimizeResult};
use crate::hydrogens::add_hydrogens;
use crate::mol2::read_mol2_file;
use crate::molecule::Molecule;
use crate::pdb::{read_pdb_file, write_pdb_file};
use crate::sdf::{read_mol_file, read_sdf_file, write_mol_file};
use crate::smiles::parse_smiles;
use crate::stereo::{assign_stereo_from_conformer, StereoConstraints};
use crate::valence::sanitize;
use crate::writer::{write_smarts, write_smiles, SmilesWriteOptions};

/// A molecule source, resolved once from a path extension or given as SMILES.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MolInput {
    Pdb(PathBuf),
    Mol2(PathBuf),
    Mol(PathBuf),
    /// First record of an SD file.
    Sdf(PathBuf),
    Smiles(String),
}

impl MolInput {
    /// Pick the reader from the file extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// [`MolkitError::UnsupportedFormat`] for a missing or unknown extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let path = path.to_path_buf();
        match ext.as_str() {
            "pdb" => Ok(MolInput::Pdb(path)),
            "mol2" => Ok(MolInput::Mol2(path)),
            "mol" => Ok(MolInput::Mol(path)),
            "sdf" | "sd" => Ok(MolInput::Sdf(path)),
            _ => Err(MolkitError::UnsupportedFormat(format!(
                "cannot read '{}': unknown extension '{ext}'",
                path.display()
            ))),
        }
    }

    /// The file behind this input, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            MolInput::Pdb(p) | MolInput::Mol2(p) | MolInput::Mol(p) | MolInput::Sdf(p) => Some(p),
            MolInput::Smiles(_) => None,
        }
    }

    fn file_stem(&self) -> Option<String> {
        self.path()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned())
    }
}

impl fmt::Display for MolInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MolInput::Pdb(p) | MolInput::Mol2(p) | MolInput::Mol(p) | MolInput::Sdf(p) => {
                write!(f, "{}", p.display())
            }
            MolInput::Smiles(s) => write!(f, "SMILES '{s}'"),
        }
    }
}

/// Load a molecule. Hydrogens present in files are kept.
///
/// `name` overrides whatever name the file carries; a file without a name
/// takes its stem. SMILES input goes through [`smiles_to_molecule`].
///
/// File input is sanitised, gets Hückel aromaticity, and takes its
/// chirality tags and double-bond directions from the first conformer.
///
/// # Errors
///
/// [`MolkitError::Computation`] for an atom above its allowed valence.
pub fn load_molecule(input: &MolInput, name: Option<&str>) -> Result<Molecule> {
    debug!("loading {input}");
    let mut mol = match input {
        MolInput::Pdb(p) => read_pdb_file(p)?,
        MolInput::Mol2(p) => read_mol2_file(p)?,
        MolInput::Mol(p) => read_mol_file(p)?,
        MolInput::Sdf(p) => read_sdf_file(p)?,
        MolInput::Smiles(s) => return smiles_to_molecule(s, name),
    };
    if let Some(name) = name {
        mol.name = name.to_string();
    } else if mol.name.trim().is_empty() {
        mol.name = input.file_stem().unwrap_or_default();
    }
    sanitize(&mol)?;
    perceive_aromaticity(&mut mol)?;
    if mol.num_conformers() > 0 {
        assign_stereo_from_conformer(&mut mol, 0)?;
    }
    Ok(mol)
}

/// Deterministic name for an unnamed molecule, from its structural hash.
pub fn placeholder_name(mol: &Molecule) -> String {
    let hash = mol.content_hash();
    format!("MOL_{}", &hash[..8.min(hash.len())])
}

/// Build a 3-D molecule from SMILES: Hückel aromaticity, explicit
/// hydrogens, one embedded conformer, sanitised graph.
///
/// Without a name the molecule is called [`placeholder_name`] of the parsed
/// graph. Embedding failure is not an error: the molecule comes back with
/// no conformer and a warning is logged.
pub fn smiles_to_molecule(smiles: &str, name: Option<&str>) -> Result<Molecule> {
    let mut mol = parse_smiles(smiles)?;
    perceive_aromaticity(&mut mol)?;
    mol.name = match name {
        Some(n) => n.to_string(),
        None => placeholder_name(&mol),
    };
    add_hydrogens(&mut mol);

    match embed_molecule(&mol, &EmbedConfig::default()) {
        Ok(conformer) => {
            mol.add_conformer(conformer)?;
        }
        Err(e) => warn!("embedding '{}' failed, returning it without coordinates: {e}", mol.name),
    }
    sanitize(&mol)?;
    Ok(mol)
}

/// Optimise the first conformer in place with the selected force field.
///
/// The selector accepts `MMF`, `MMFF`, `MMFF94` or `UFF`.
///
/// # Errors
///
/// [`MolkitError::InvalidSelector`] for any other selector and
/// [`MolkitError::Computation`] when the molecule has no conformer.
pub fn optimize(mol: &mut Molecule, selector: &str) -> Result<MinimizeResult> {
    let field: ForceField = selector.parse()?;
    optimize_with(mol, field, &MinimizeConfig::default())
}

/// [`optimize`] with an explicit force field and minimiser settings.
///
/// A minimised geometry that inverts a tagged centre or flips a directed
/// double bond is rejected with [`MolkitError::Computation`], and the
/// conformer keeps its old coordinates.
pub fn optimize_with(mol: &mut Molecule, field: ForceField, config: &MinimizeConfig) -> Result<MinimizeResult> {
    if mol.num_conformers() == 0 {
        return Err(MolkitError::Computation(format!(
            "cannot optimise '{}': it has no conformer",
            mol.name
        )));
    }
    let start = mol.conformer(0)?;
    let stereo = StereoConstraints::from_molecule(mol);
    let broken_before = stereo.violations(&start.coords);
    let result = minimize(mol, start, field, config)?;
    if stereo.violations(&result.conformer.coords) > broken_before {
        return Err(MolkitError::Computation(format!(
            "{field} optimisation of '{}' changed its stereochemistry; coordinates left unchanged",
            mol.name
        )));
    }
    debug!(
        "{field} optimisation of '{}': {:.4} -> {:.4} kcal/mol in {} steps",
        mol.name, result.initial_energy, result.final_energy, result.n_steps
    );
    *mol.conformer_mut(0)? = result.conformer.clone();
    Ok(result)
}

/// Load, optimise and write `<stem>_optimised.pdb` into `out_dir`.
///
/// Returns the path written. SMILES input uses the molecule name as stem.
pub fn mm_optimise(input: &MolInput, selector: &str, out_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let field: ForceField = selector.parse()?;
    let mut mol = load_molecule(input, None)?;
    optimize_with(&mut mol, field, &MinimizeConfig::default())?;

    let stem = input.file_stem().unwrap_or_else(|| mol.name.clone());
    let path = out_dir.as_ref().join(format!("{stem}_optimised.pdb"));
    write_pdb_file(&mol, &path)?;
    Ok(path)
}

/// Descriptors keyed by display name (`Heavy atoms`, `H-bond donors`,
/// `H-bond acceptors`, `Molecular weight`, `LogP`).
pub fn descriptor_map(mol: &Molecule) -> BTreeMap<String, f64> {
    compute_descriptors(mol).to_map()
}

/// Canonical isomeric SMILES of the loaded input.
pub fn get_smiles(input: &MolInput, all_hs_explicit: bool) -> Result<String> {
    let mol = load_molecule(input, None)?;
    Ok(write_smiles(
        &mol,
        &SmilesWriteOptions {
            all_hs_explicit,
            ..SmilesWriteOptions::default()
        },
    ))
}

/// SMARTS of the loaded input, atoms in file order.
pub fn get_smarts(input: &MolInput) -> Result<String> {
    let mol = load_molecule(input, None)?;
    Ok(write_smarts(&mol))
}

/// Load and write `<stem>.mol` into `out_dir`, returning the path written.
pub fn get_mol(input: &MolInput, out_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let mol = load_molecule(input, None)?;
    let stem = input.file_stem().unwrap_or_else(|| mol.name.clone());
    let path = out_dir.as_ref().join(format!("{stem}.mol"));
    write_mol_file(&mol, &path)?;
    Ok(path)
}

/// Embed `count` new conformers, append them to the molecule and return
/// them in generation order.
///
/// # Errors
///
/// [`MolkitError::InvalidInput`] when `count` is zero, and
/// [`MolkitError::Computation`] when too few embeddings succeed.
pub fn generate_conformers(mol: &mut Molecule, count: usize) -> Result<Vec<Conformer>> {
    if count == 0 {
        return Err(MolkitError::InvalidInput("conformer count must be at least 1".into()));
    }
    let conformers = embed_multiple(mol, count, &EmbedConfig::default())?;
    for conformer in &conformers {
        mol.add_conformer(conformer.clone())?;
    }
    debug!("'{}' now has {} conformers", mol.name, mol.num_conformers());
    Ok(conformers)
}

/// RMSD after superposing conformer `align_index` onto `ref_index`.
pub fn conformer_rmsd(mol: &Molecule, ref_index: usize, align_index: usize) -> Result<f64> {
    mol.conformer(ref_index)?.aligned_rmsd(mol.conformer(align_index)?)
}

/// Append a conformer from raw coordinates and return its index.
pub fn add_conformer(mol: &mut Molecule, coords: &[[f64; 3]]) -> Result<usize> {
    mol.add_conformer(Conformer::new(coords.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forcefield::energy;
    use crate::molecule::{Bond, BondOrder, MolAtom};

    #[test]
    fn dispatch_by_extension() {
        assert!(matches!(MolInput::from_path("a/b.pdb"), Ok(MolInput::Pdb(_))));
        assert!(matches!(MolInput::from_path("x.MOL2"), Ok(MolInput::Mol2(_))));
        assert!(matches!(MolInput::from_path("x.mol"), Ok(MolInput::Mol(_))));
        assert!(matches!(MolInput::from_path("x.sdf"), Ok(MolInput::Sdf(_))));
        assert!(matches!(MolInput::from_path("x.xyz"), Err(MolkitError::UnsupportedFormat(_))));
        assert!(matches!(MolInput::from_path("noext"), Err(MolkitError::UnsupportedFormat(_))));
    }

    #[test]
    fn smiles_gets_hydrogens_and_coordinates() {
        let mol = smiles_to_molecule("CCO", Some("ethanol")).unwrap();
        assert_eq!(mol.name, "ethanol");
        assert_eq!(mol.atom_count(), 9);
        assert_eq!(mol.num_conformers(), 1);
        assert_eq!(mol.conformer(0).unwrap().len(), 9);
    }

    #[test]
    fn placeholder_name_is_deterministic() {
        let a = smiles_to_molecule("CCO", None).unwrap();
        let b = smiles_to_molecule("OCC", None).unwrap();
        assert!(a.name.starts_with("MOL_"));
        assert_eq!(a.name.len(), 12);
        assert_eq!(a.name, smiles_to_molecule("CCO", None).unwrap().name);
        assert_ne!(a.name, smiles_to_molecule("CCN", None).unwrap().name);
        assert!(b.name.starts_with("MOL_"));
    }

    #[test]
    fn optimisation_lowers_energy_in_place() {
        let mut mol = smiles_to_molecule("CCCC", None).unwrap();
        let before = energy(&mol, mol.conformer(0).unwrap(), ForceField::Uff).unwrap().total;
        let result = optimize(&mut mol, "uff").unwrap();
        let after = energy(&mol, mol.conformer(0).unwrap(), ForceField::Uff).unwrap().total;
        assert!(after <= before + 1e-9);
        assert!((after - result.final_energy).abs() < 1e-6);
        assert_eq!(mol.num_conformers(), 1);
    }

    #[test]
    fn optimise_errors() {
        let mut mol = smiles_to_molecule("CO", None).unwrap();
        assert!(matches!(optimize(&mut mol, "GAFF"), Err(MolkitError::InvalidSelector(_))));

        let mut bare = parse_smiles("CO").unwrap();
        assert!(matches!(optimize(&mut bare, "MMFF94"), Err(MolkitError::Computation(_))));
    }

    #[test]
    fn conformer_generation_appends() {
        let mut mol = smiles_to_molecule("CCCO", None).unwrap();
        let confs = generate_conformers(&mut mol, 3).unwrap();
        assert_eq!(confs.len(), 3);
        assert_eq!(mol.num_conformers(), 4);
        assert_eq!(mol.conformer(1).unwrap(), &confs[0]);
        assert!(matches!(generate_conformers(&mut mol, 0), Err(MolkitError::InvalidInput(_))));
    }

    #[test]
    fn add_and_read_back_conformer() {
        let atoms = vec![MolAtom::new(6), MolAtom::new(8)];
        let bonds = vec![Bond::new(0, 1, BondOrder::Double)];
        let mut mol = Molecule::new("co".into(), atoms, bonds);
        let idx = add_conformer(&mut mol, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(mol.conformer(idx).unwrap().coords, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        assert!(matches!(
            add_conformer(&mut mol, &[[0.0, 0.0, 0.0]]),
            Err(MolkitError::InvalidInput(_))
        ));
    }

    #[test]
    fn rmsd_of_rotated_copy_is_zero() {
        let mut mol = smiles_to_molecule("CC(=O)O", None).unwrap();
        let rotated: Vec<[f64; 3]> = mol
            .conformer(0)
            .unwrap()
            .coords
            .iter()
            .map(|&[x, y, z]| [-y + 3.0, x - 1.0, z + 0.5])
            .collect();
        let idx = add_conformer(&mut mol, &rotated).unwrap();
        assert!(conformer_rmsd(&mol, 0, idx).unwrap() < 1e-6);
        assert!(matches!(conformer_rmsd(&mol, 0, 9), Err(MolkitError::InvalidInput(_))));
    }

    #[test]
    fn descriptor_names() {
        let mol = smiles_to_molecule("CCO", None).unwrap();
        let map = descriptor_map(&mol);
        assert_eq!(map["Heavy atoms"], 3.0);
        assert_eq!(map["H-bond donors"], 1.0);
    }
}
