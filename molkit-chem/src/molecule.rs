//! Molecular graph representation.
//!
//! A [`Molecule`] owns its atoms, bonds, an append-only list of
//! [`Conformer`]s and a lazily computed canonical rank array. The rank
//! array is cached against the structural hash, so editing `atoms` or
//! `bonds` invalidates it without any explicit bookkeeping.

use std::cell::RefCell;

use molkit_core::hash::sha256;
use molkit_core::{Annotated, ContentAddressable, MolkitError, Result, Summarizable};

use crate::conformer::Conformer;

/// Tetrahedral chirality at a stereocenter.
///
/// The tag is relative to the reference neighbour order of the atom: its
/// implicit hydrogen first (if any), then its neighbours in adjacency order.
/// Looking from the first reference neighbour, the remaining ones run
/// counterclockwise for `CounterClockwise` (`@`) and clockwise for
/// `Clockwise` (`@@`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Chirality {
    #[default]
    None,
    CounterClockwise,
    Clockwise,
}

impl Chirality {
    /// The opposite tag; `None` stays `None`.
    pub fn inverted(self) -> Self {
        match self {
            Chirality::None => Chirality::None,
            Chirality::CounterClockwise => Chirality::Clockwise,
            Chirality::Clockwise => Chirality::CounterClockwise,
        }
    }
}

/// Cis-trans stereo bond direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondStereo {
    #[default]
    None,
    /// Up bond (`/` in SMILES).
    Up,
    /// Down bond (`\` in SMILES).
    Down,
}

impl BondStereo {
    /// The same direction read from the other end of the bond.
    pub fn inverted(self) -> Self {
        match self {
            BondStereo::None => BondStereo::None,
            BondStereo::Up => BondStereo::Down,
            BondStereo::Down => BondStereo::Up,
        }
    }
}

/// Bond order classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Numeric bond order for valence calculations.
    pub fn as_f64(self) -> f64 {
        match self {
            BondOrder::Single => 1.0,
            BondOrder::Double => 2.0,
            BondOrder::Triple => 3.0,
            BondOrder::Aromatic => 1.5,
        }
    }

    /// MDL bond type code (1, 2, 3, 4 = aromatic).
    pub fn mdl_code(self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Aromatic => 4,
        }
    }

    /// Inverse of [`BondOrder::mdl_code`].
    pub fn from_mdl_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(BondOrder::Single),
            2 => Some(BondOrder::Double),
            3 => Some(BondOrder::Triple),
            4 => Some(BondOrder::Aromatic),
            _ => None,
        }
    }
}

/// An atom in a molecular graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MolAtom {
    pub atomic_number: u8,
    pub formal_charge: i8,
    pub isotope: Option<u16>,
    pub is_aromatic: bool,
    pub implicit_hydrogens: u8,
    pub chirality: Chirality,
}

impl MolAtom {
    /// A neutral, non-aromatic atom with no implicit hydrogens.
    pub fn new(atomic_number: u8) -> Self {
        MolAtom {
            atomic_number,
            formal_charge: 0,
            isotope: None,
            is_aromatic: false,
            implicit_hydrogens: 0,
            chirality: Chirality::None,
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        self.atomic_number == 1
    }
}

/// A bond between two atoms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
    pub order: BondOrder,
    pub is_aromatic: bool,
    pub stereo: BondStereo,
}

impl Bond {
    /// A bond with no stereo; aromatic iff `order` is [`BondOrder::Aromatic`].
    pub fn new(atom1: usize, atom2: usize, order: BondOrder) -> Self {
        Bond {
            atom1,
            atom2,
            order,
            is_aromatic: order == BondOrder::Aromatic,
            stereo: BondStereo::None,
        }
    }

    /// The atom at the other end of the bond.
    pub fn other(&self, atom: usize) -> usize {
        if self.atom1 == atom {
            self.atom2
        } else {
            self.atom1
        }
    }
}

/// A molecular graph with atoms, bonds, adjacency information and conformers.
#[derive(Debug, Clone)]
pub struct Molecule {
    pub name: String,
    pub atoms: Vec<MolAtom>,
    pub bonds: Vec<Bond>,
    /// adjacency[atom_idx] = Vec<(neighbor_atom_idx, bond_idx)>
    pub adjacency: Vec<Vec<(usize, usize)>>,
    conformers: Vec<Conformer>,
    /// (structural hash, ranks) of the last rank computation.
    rank_cache: RefCell<Option<(String, Vec<u32>)>>,
}

impl Molecule {
    /// Create a new molecule, building the adjacency list from atoms and bonds.
    pub fn new(name: String, atoms: Vec<MolAtom>, bonds: Vec<Bond>) -> Self {
        let mut mol = Molecule {
            name,
            atoms,
            bonds,
            adjacency: Vec::new(),
            conformers: Vec::new(),
            rank_cache: RefCell::new(None),
        };
        mol.rebuild_adjacency();
        mol
    }

    /// Recompute `adjacency` from `bonds`. Needed after editing `bonds` directly.
    pub fn rebuild_adjacency(&mut self) {
        let mut adjacency = vec![Vec::new(); self.atoms.len()];
        for (bi, bond) in self.bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        self.adjacency = adjacency;
    }

    /// Number of atoms (graph nodes; implicit hydrogens are not counted).
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Number of non-hydrogen atoms.
    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| !a.is_hydrogen()).count()
    }

    /// Neighbor atom indices for a given atom, in adjacency order.
    pub fn neighbors(&self, atom_idx: usize) -> Vec<usize> {
        self.adjacency[atom_idx].iter().map(|&(n, _)| n).collect()
    }

    /// Graph degree of an atom (number of explicit bonds).
    pub fn degree(&self, atom_idx: usize) -> usize {
        self.adjacency[atom_idx].len()
    }

    /// Find the bond between two atoms, if any.
    pub fn get_bond(&self, a1: usize, a2: usize) -> Option<&Bond> {
        self.bond_index(a1, a2).map(|bi| &self.bonds[bi])
    }

    /// Index of the bond between two atoms, if any.
    pub fn bond_index(&self, a1: usize, a2: usize) -> Option<usize> {
        self.adjacency
            .get(a1)?
            .iter()
            .find(|&&(n, _)| n == a2)
            .map(|&(_, bi)| bi)
    }

    /// Number of explicit hydrogen atoms bonded to `atom_idx`.
    pub fn explicit_hydrogen_count(&self, atom_idx: usize) -> usize {
        self.adjacency[atom_idx]
            .iter()
            .filter(|&&(n, _)| self.atoms[n].is_hydrogen())
            .count()
    }

    /// Implicit plus explicit hydrogens on one atom.
    pub fn total_hydrogens(&self, atom_idx: usize) -> usize {
        self.atoms[atom_idx].implicit_hydrogens as usize + self.explicit_hydrogen_count(atom_idx)
    }

    /// Sum of bond orders around an atom, aromatic bonds counting 1.5.
    pub fn bond_order_sum(&self, atom_idx: usize) -> f64 {
        self.adjacency[atom_idx]
            .iter()
            .map(|&(_, bi)| self.bonds[bi].order.as_f64())
            .sum()
    }

    /// Total hydrogen count (implicit + explicit H atoms).
    pub fn total_hydrogen_count(&self) -> usize {
        let explicit = self.atoms.iter().filter(|a| a.is_hydrogen()).count();
        let implicit: usize = self.atoms.iter().map(|a| a.implicit_hydrogens as usize).sum();
        explicit + implicit
    }

    /// Append an atom and return its index.
    ///
    /// Existing conformers are not extended; callers that add atoms to a
    /// molecule with conformers must place the new atom in each of them
    /// (see [`crate::hydrogens::add_hydrogens`]).
    pub fn add_atom(&mut self, atom: MolAtom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    /// Append a bond and return its index.
    pub fn add_bond(&mut self, bond: Bond) -> Result<usize> {
        let n = self.atoms.len();
        if bond.atom1 >= n || bond.atom2 >= n {
            return Err(MolkitError::InvalidInput(format!(
                "bond {}-{} references an atom outside 0..{n}",
                bond.atom1, bond.atom2
            )));
        }
        if bond.atom1 == bond.atom2 {
            return Err(MolkitError::InvalidInput(format!(
                "atom {} cannot bond to itself",
                bond.atom1
            )));
        }
        if self.bond_index(bond.atom1, bond.atom2).is_some() {
            return Err(MolkitError::InvalidInput(format!(
                "atoms {} and {} are already bonded",
                bond.atom1, bond.atom2
            )));
        }
        let bi = self.bonds.len();
        self.adjacency[bond.atom1].push((bond.atom2, bi));
        self.adjacency[bond.atom2].push((bond.atom1, bi));
        self.bonds.push(bond);
        Ok(bi)
    }

    /// Append a hydrogen bonded to `parent` and return its index.
    ///
    /// Skips the checks of [`Molecule::add_bond`]: the new atom is fresh, so
    /// the bond can be neither a loop nor a duplicate.
    pub(crate) fn attach_hydrogen(&mut self, parent: usize) -> usize {
        let h = self.add_atom(MolAtom::new(1));
        let bi = self.bonds.len();
        self.bonds.push(Bond::new(parent, h, BondOrder::Single));
        self.adjacency[parent].push((h, bi));
        self.adjacency[h].push((parent, bi));
        h
    }

    // --- Conformers ---

    /// All conformers in insertion order.
    pub fn conformers(&self) -> &[Conformer] {
        &self.conformers
    }

    pub fn num_conformers(&self) -> usize {
        self.conformers.len()
    }

    /// The conformer at `index`.
    pub fn conformer(&self, index: usize) -> Result<&Conformer> {
        self.conformers.get(index).ok_or_else(|| {
            MolkitError::InvalidInput(format!(
                "conformer index {index} out of range ({} conformers)",
                self.conformers.len()
            ))
        })
    }

    /// Mutable access to one conformer, for in-place geometry optimisation.
    pub fn conformer_mut(&mut self, index: usize) -> Result<&mut Conformer> {
        let count = self.conformers.len();
        self.conformers.get_mut(index).ok_or_else(|| {
            MolkitError::InvalidInput(format!(
                "conformer index {index} out of range ({count} conformers)"
            ))
        })
    }

    /// Append a conformer and return the index it was stored at.
    ///
    /// The conformer must hold exactly one position per atom.
    pub fn add_conformer(&mut self, conformer: Conformer) -> Result<usize> {
        if conformer.len() != self.atoms.len() {
            return Err(MolkitError::InvalidInput(format!(
                "conformer has {} positions but the molecule has {} atoms",
                conformer.len(),
                self.atoms.len()
            )));
        }
        self.conformers.push(conformer);
        Ok(self.conformers.len() - 1)
    }

    pub(crate) fn conformers_mut(&mut self) -> &mut [Conformer] {
        &mut self.conformers
    }

    // --- Canonical ranks ---

    /// Canonical per-atom ranks; graph-symmetric atoms share a rank.
    ///
    /// Cached until the atoms or bonds change.
    pub fn canonical_ranks(&self) -> Vec<u32> {
        let key = self.content_hash();
        {
            let cache = self.rank_cache.borrow();
            if let Some((cached_key, ranks)) = cache.as_ref() {
                if *cached_key == key {
                    return ranks.clone();
                }
            }
        }
        let ranks = crate::canon::compute_canonical_ranks(self);
        *self.rank_cache.borrow_mut() = Some((key, ranks.clone()));
        ranks
    }

    /// Whether a rank array is currently cached for the present graph.
    pub fn has_cached_ranks(&self) -> bool {
        let key = self.content_hash();
        matches!(self.rank_cache.borrow().as_ref(), Some((k, _)) if *k == key)
    }
}

impl Annotated for Molecule {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Summarizable for Molecule {
    fn summary(&self) -> String {
        format!(
            "{}: {} atoms, {} bonds, {} conformers",
            if self.name.is_empty() { "Molecule" } else { &self.name },
            self.atom_count(),
            self.bond_count(),
            self.num_conformers()
        )
    }
}

impl ContentAddressable for Molecule {
    /// SHA-256 over atoms and bonds in index order. Conformers and the name
    /// do not contribute.
    fn content_hash(&self) -> String {
        let mut buf = Vec::with_capacity(self.atoms.len() * 8 + self.bonds.len() * 18);
        buf.extend_from_slice(&(self.atoms.len() as u64).to_le_bytes());
        for atom in &self.atoms {
            buf.push(atom.atomic_number);
            buf.extend_from_slice(&atom.formal_charge.to_le_bytes());
            buf.extend_from_slice(&atom.isotope.unwrap_or(0).to_le_bytes());
            buf.push(atom.is_aromatic as u8);
            buf.push(atom.implicit_hydrogens);
            buf.push(atom.chirality as u8);
        }
        for bond in &self.bonds {
            buf.extend_from_slice(&(bond.atom1 as u64).to_le_bytes());
            buf.extend_from_slice(&(bond.atom2 as u64).to_le_bytes());
            buf.push(bond.order as u8);
            buf.push(bond.stereo as u8);
        }
        sha256(&buf)
    }
}
