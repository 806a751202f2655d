//! SMILES string parser.
//!
//! Supports the organic subset, bracket atoms (isotope, `@`/`@@`, H count,
//! charge, atom-map class), branches, ring closures including `%nn`, explicit
//! bond symbols and `/` `\` bond directions. Tetrahedral tags are stored
//! relative to each atom's reference neighbour order (see
//! [`Chirality`](crate::molecule::Chirality)).

use std::collections::BTreeMap;

use molkit_core::{MolkitError, Result};

use crate::element::element_by_symbol;
use crate::molecule::{Bond, BondOrder, BondStereo, Chirality, MolAtom, Molecule};
use crate::valence;

/// Parse a SMILES string into an unnamed `Molecule`.
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    parse_smiles_named(smiles, "")
}

/// Parse a SMILES string into a `Molecule` with a given name.
pub fn parse_smiles_named(smiles: &str, name: &str) -> Result<Molecule> {
    let smiles = smiles.trim();
    if smiles.is_empty() {
        return Err(MolkitError::Parse("empty SMILES string".into()));
    }
    let mut parser = SmilesParser::new(smiles);
    parser.parse()?;
    parser.check_balanced()?;

    let SmilesParser {
        atoms,
        bonds,
        bracket,
        neighbor_order,
        ..
    } = parser;
    let mut mol = Molecule::new(name.to_string(), atoms, bonds);

    for i in 0..mol.atom_count() {
        if !bracket[i] {
            mol.atoms[i].implicit_hydrogens = valence::implicit_hydrogen_count(&mol, i);
        }
    }
    for i in 0..mol.atom_count() {
        if mol.atoms[i].chirality != Chirality::None {
            let written: Vec<usize> = neighbor_order[i]
                .iter()
                .map(|slot| match slot {
                    Slot::Atom(a) => *a,
                    Slot::ImplicitH | Slot::Pending => IMPLICIT_H,
                })
                .collect();
            let reference = reference_order(&mol, i);
            if permutation_is_odd(&written, &reference) {
                mol.atoms[i].chirality = mol.atoms[i].chirality.inverted();
            }
        }
    }
    Ok(mol)
}

/// Marker for the implicit hydrogen in neighbour orderings.
pub(crate) const IMPLICIT_H: usize = usize::MAX;

/// Reference neighbour order of an atom: implicit H (if any), then adjacency order.
pub(crate) fn reference_order(mol: &Molecule, atom: usize) -> Vec<usize> {
    let mut order = Vec::with_capacity(mol.degree(atom) + 1);
    if mol.atoms[atom].implicit_hydrogens > 0 {
        order.push(IMPLICIT_H);
    }
    order.extend(mol.neighbors(atom));
    order
}

/// Parity of the permutation taking `a` to `b`. Sequences that are not
/// permutations of each other are reported as even.
pub(crate) fn permutation_is_odd(a: &[usize], b: &[usize]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut perm = Vec::with_capacity(a.len());
    for x in a {
        match b.iter().position(|y| y == x) {
            Some(p) => perm.push(p),
            None => return false,
        }
    }
    let mut seen = vec![false; perm.len()];
    let mut cycles = 0;
    for start in 0..perm.len() {
        if seen[start] {
            continue;
        }
        cycles += 1;
        let mut k = start;
        while !seen[k] {
            seen[k] = true;
            k = perm[k];
        }
    }
    (perm.len() - cycles) % 2 == 1
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Atom(usize),
    ImplicitH,
    /// Ring opening whose partner is not parsed yet.
    Pending,
}

struct SmilesParser<'a> {
    input: &'a [u8],
    pos: usize,
    atoms: Vec<MolAtom>,
    bonds: Vec<Bond>,
    /// Whether each atom was written in brackets (its H count is explicit).
    bracket: Vec<bool>,
    /// Neighbours of each atom in the order they were written.
    neighbor_order: Vec<Vec<Slot>>,
    /// ring number -> (opening atom, slot in its neighbour order, bond written at the opening)
    ring_closures: BTreeMap<u16, (usize, usize, Option<BondOrder>, BondStereo)>,
    /// Stack of atom indices for branch handling
    stack: Vec<usize>,
    prev_atom: Option<usize>,
    pending_bond: Option<BondOrder>,
    pending_stereo: BondStereo,
}

impl<'a> SmilesParser<'a> {
    fn new(input: &'a str) -> Self {
        SmilesParser {
            input: input.as_bytes(),
            pos: 0,
            atoms: Vec::new(),
            bonds: Vec::new(),
            bracket: Vec::new(),
            neighbor_order: Vec::new(),
            ring_closures: BTreeMap::new(),
            stack: Vec::new(),
            prev_atom: None,
            pending_bond: None,
            pending_stereo: BondStereo::None,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn error(&self, msg: impl std::fmt::Display) -> MolkitError {
        MolkitError::Parse(format!("{msg} at position {}", self.pos))
    }

    fn parse(&mut self) -> Result<()> {
        while let Some(ch) = self.peek() {
            match ch {
                b'(' => {
                    self.advance();
                    let prev = self
                        .prev_atom
                        .ok_or_else(|| self.error("branch without preceding atom"))?;
                    self.stack.push(prev);
                }
                b')' => {
                    self.advance();
                    self.prev_atom =
                        Some(self.stack.pop().ok_or_else(|| self.error("unmatched ')'"))?);
                    self.pending_bond = None;
                    self.pending_stereo = BondStereo::None;
                }
                b'-' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Single);
                }
                b'=' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Double);
                }
                b'#' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Triple);
                }
                b':' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Aromatic);
                }
                b'/' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Single);
                    self.pending_stereo = BondStereo::Up;
                }
                b'\\' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Single);
                    self.pending_stereo = BondStereo::Down;
                }
                b'%' => {
                    self.advance();
                    let ring_num = self.parse_two_digit_ring()?;
                    self.handle_ring_closure(ring_num)?;
                }
                b'[' => self.parse_bracket_atom()?,
                b'0'..=b'9' => {
                    self.advance();
                    self.handle_ring_closure((ch - b'0') as u16)?;
                }
                b'.' => {
                    self.advance();
                    if self.pending_bond.is_some() {
                        return Err(self.error("bond symbol before '.'"));
                    }
                    self.prev_atom = None;
                }
                _ if is_organic_atom_start(ch) => self.parse_organic_atom()?,
                _ => return Err(self.error(format!("unexpected character '{}'", ch as char))),
            }
        }
        if self.pending_bond.is_some() {
            return Err(self.error("dangling bond symbol"));
        }
        Ok(())
    }

    fn parse_organic_atom(&mut self) -> Result<()> {
        let ch = self.advance().ok_or_else(|| self.error("expected atom"))?;
        let is_aromatic = ch.is_ascii_lowercase();

        let symbol = match ch {
            b'B' if self.peek() == Some(b'r') => {
                self.advance();
                "Br"
            }
            b'C' if self.peek() == Some(b'l') => {
                self.advance();
                "Cl"
            }
            b'B' | b'b' => "B",
            b'C' | b'c' => "C",
            b'N' | b'n' => "N",
            b'O' | b'o' => "O",
            b'P' | b'p' => "P",
            b'S' | b's' => "S",
            b'F' => "F",
            b'I' => "I",
            _ => return Err(self.error(format!("unknown organic atom '{}'", ch as char))),
        };
        let elem = element_by_symbol(symbol)
            .ok_or_else(|| self.error(format!("unknown element '{symbol}'")))?;

        let mut atom = MolAtom::new(elem.atomic_number);
        atom.is_aromatic = is_aromatic;
        self.push_atom(atom, false, 0)
    }

    fn parse_bracket_atom(&mut self) -> Result<()> {
        self.advance(); // '['

        let isotope = self.parse_optional_number();

        let ch = self
            .advance()
            .ok_or_else(|| self.error("unexpected end of SMILES in bracket atom"))?;
        if !ch.is_ascii_alphabetic() {
            return Err(self.error(format!("expected element symbol, found '{}'", ch as char)));
        }
        let is_aromatic = ch.is_ascii_lowercase();
        let upper = ch.to_ascii_uppercase();

        // Two-letter symbols take precedence when they name an element.
        let mut symbol = String::from(upper as char);
        if let Some(next) = self.peek() {
            if next.is_ascii_lowercase() {
                let two_letter = format!("{}{}", upper as char, next as char);
                if element_by_symbol(&two_letter).is_some() {
                    self.advance();
                    symbol = two_letter;
                }
            }
        }
        let elem = element_by_symbol(&symbol)
            .ok_or_else(|| self.error(format!("unknown element '{symbol}'")))?;

        let mut chirality = Chirality::None;
        if self.peek() == Some(b'@') {
            self.advance();
            chirality = if self.peek() == Some(b'@') {
                self.advance();
                Chirality::Clockwise
            } else {
                Chirality::CounterClockwise
            };
        }

        let mut h_count = 0u8;
        if self.peek() == Some(b'H') {
            self.advance();
            h_count = match self.parse_optional_number() {
                Some(n) => u8::try_from(n).map_err(|_| self.error("hydrogen count too large"))?,
                None => 1,
            };
        }

        let charge = self.parse_charge()?;

        // atom-map class, accepted and dropped
        if self.peek() == Some(b':') {
            self.advance();
            if self.parse_optional_number().is_none() {
                return Err(self.error("expected atom class after ':'"));
            }
        }

        if self.advance() != Some(b']') {
            return Err(self.error("expected ']' in bracket atom"));
        }

        let atom = MolAtom {
            atomic_number: elem.atomic_number,
            formal_charge: charge,
            isotope: isotope
                .map(|n| u16::try_from(n).map_err(|_| self.error("isotope too large")))
                .transpose()?,
            is_aromatic,
            implicit_hydrogens: h_count,
            chirality,
        };
        self.push_atom(atom, true, h_count)
    }

    fn parse_charge(&mut self) -> Result<i8> {
        let sign: i8 = match self.peek() {
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return Ok(0),
        };
        let sym = self.advance().unwrap_or(b'+');
        if let Some(n) = self.parse_optional_number() {
            let n = i8::try_from(n).map_err(|_| self.error("charge too large"))?;
            return Ok(sign * n);
        }
        let mut magnitude = 1i8;
        while self.peek() == Some(sym) {
            self.advance();
            magnitude = magnitude.saturating_add(1);
        }
        Ok(sign * magnitude)
    }

    fn parse_optional_number(&mut self) -> Option<u32> {
        let mut n: u32 = 0;
        let mut found = false;
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            self.advance();
            n = n.saturating_mul(10).saturating_add((ch - b'0') as u32);
            found = true;
        }
        found.then_some(n)
    }

    fn parse_two_digit_ring(&mut self) -> Result<u16> {
        let d1 = self.advance().ok_or_else(|| self.error("expected digit after '%'"))?;
        let d2 = self
            .advance()
            .ok_or_else(|| self.error("expected second digit after '%'"))?;
        if !d1.is_ascii_digit() || !d2.is_ascii_digit() {
            return Err(self.error("invalid ring closure number after '%'"));
        }
        Ok((d1 - b'0') as u16 * 10 + (d2 - b'0') as u16)
    }

    fn push_atom(&mut self, atom: MolAtom, bracket: bool, h_count: u8) -> Result<()> {
        let atom_idx = self.atoms.len();
        self.atoms.push(atom);
        self.bracket.push(bracket);
        self.neighbor_order.push(Vec::new());
        self.add_bond_to_prev(atom_idx)?;
        if h_count > 0 {
            self.neighbor_order[atom_idx].push(Slot::ImplicitH);
        }
        self.prev_atom = Some(atom_idx);
        Ok(())
    }

    fn handle_ring_closure(&mut self, ring_num: u16) -> Result<()> {
        let current = self
            .prev_atom
            .ok_or_else(|| self.error("ring closure without preceding atom"))?;

        if let Some((open_atom, slot, open_bond, open_stereo)) = self.ring_closures.remove(&ring_num) {
            if open_atom == current || self.bonded(open_atom, current) {
                return Err(self.error(format!("ring closure {ring_num} duplicates a bond")));
            }
            if let (Some(a), Some(b)) = (open_bond, self.pending_bond) {
                if a != b {
                    return Err(self.error(format!("conflicting bond orders on ring closure {ring_num}")));
                }
            }
            let order = self.pending_bond.take().or(open_bond);
            let stereo = if self.pending_stereo != BondStereo::None {
                self.pending_stereo
            } else {
                open_stereo
            };
            self.pending_stereo = BondStereo::None;
            self.push_bond(open_atom, current, order, stereo);
            self.neighbor_order[open_atom][slot] = Slot::Atom(current);
            self.neighbor_order[current].push(Slot::Atom(open_atom));
        } else {
            let slot = self.neighbor_order[current].len();
            self.neighbor_order[current].push(Slot::Pending);
            let stereo = std::mem::take(&mut self.pending_stereo);
            self.ring_closures
                .insert(ring_num, (current, slot, self.pending_bond.take(), stereo));
        }
        Ok(())
    }

    fn bonded(&self, a: usize, b: usize) -> bool {
        self.bonds
            .iter()
            .any(|bd| (bd.atom1 == a && bd.atom2 == b) || (bd.atom1 == b && bd.atom2 == a))
    }

    /// Add a bond; with no explicit order two aromatic atoms get an aromatic bond.
    fn push_bond(&mut self, a: usize, b: usize, order: Option<BondOrder>, stereo: BondStereo) {
        let both_aromatic = self.atoms[a].is_aromatic && self.atoms[b].is_aromatic;
        let order = order.unwrap_or(if both_aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        });
        self.bonds.push(Bond {
            atom1: a,
            atom2: b,
            order,
            is_aromatic: order == BondOrder::Aromatic,
            stereo,
        });
    }

    fn add_bond_to_prev(&mut self, atom_idx: usize) -> Result<()> {
        if let Some(prev) = self.prev_atom {
            let order = self.pending_bond.take();
            let stereo = std::mem::take(&mut self.pending_stereo);
            self.push_bond(prev, atom_idx, order, stereo);
            self.neighbor_order[prev].push(Slot::Atom(atom_idx));
            self.neighbor_order[atom_idx].push(Slot::Atom(prev));
        } else if self.pending_bond.is_some() {
            return Err(self.error("bond symbol without preceding atom"));
        }
        Ok(())
    }

    fn check_balanced(&self) -> Result<()> {
        if !self.ring_closures.is_empty() {
            let open: Vec<_> = self.ring_closures.keys().collect();
            return Err(MolkitError::Parse(format!("unmatched ring closure(s): {open:?}")));
        }
        if !self.stack.is_empty() {
            return Err(MolkitError::Parse(format!(
                "{} unmatched '(' in SMILES",
                self.stack.len()
            )));
        }
        Ok(())
    }
}

fn is_organic_atom_start(ch: u8) -> bool {
    matches!(
        ch,
        b'B' | b'C' | b'N' | b'O' | b'P' | b'S' | b'F' | b'I' | b'b' | b'c' | b'n' | b'o' | b'p' | b's'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_methane() {
        let mol = parse_smiles("C").unwrap();
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.bond_count(), 0);
        assert_eq!(mol.atoms[0].atomic_number, 6);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 4);
    }

    #[test]
    fn parse_ethanol() {
        let mol = parse_smiles("CCO").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bond_count(), 2);
        let hs: Vec<u8> = mol.atoms.iter().map(|a| a.implicit_hydrogens).collect();
        assert_eq!(hs, vec![3, 2, 1]);
    }

    #[test]
    fn parse_benzene() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(mol.atom_count(), 6);
        assert_eq!(mol.bond_count(), 6);
        for atom in &mol.atoms {
            assert!(atom.is_aromatic);
            assert_eq!(atom.implicit_hydrogens, 1);
        }
        assert!(mol.bonds.iter().all(|b| b.order == BondOrder::Aromatic));
    }

    #[test]
    fn parse_branching() {
        let mol = parse_smiles("CC(C)C").unwrap();
        assert_eq!(mol.atom_count(), 4);
        assert_eq!(mol.bond_count(), 3);
        assert_eq!(mol.degree(1), 3);
    }

    #[test]
    fn parse_double_bond() {
        let mol = parse_smiles("C=C").unwrap();
        assert_eq!(mol.bonds[0].order, BondOrder::Double);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 2);
        assert_eq!(mol.atoms[1].implicit_hydrogens, 2);
    }

    #[test]
    fn parse_bracket_atoms() {
        let mol = parse_smiles("[NH4+]").unwrap();
        assert_eq!(mol.atoms[0].atomic_number, 7);
        assert_eq!(mol.atoms[0].formal_charge, 1);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 4);

        let mol = parse_smiles("[13CH3][O-]").unwrap();
        assert_eq!(mol.atoms[0].isotope, Some(13));
        assert_eq!(mol.atoms[0].implicit_hydrogens, 3);
        assert_eq!(mol.atoms[1].formal_charge, -1);
        assert_eq!(mol.atoms[1].implicit_hydrogens, 0);

        let mol = parse_smiles("[Fe++]").unwrap();
        assert_eq!(mol.atoms[0].formal_charge, 2);
        let mol = parse_smiles("[CH3:7]C").unwrap();
        assert_eq!(mol.atoms[0].implicit_hydrogens, 3);
    }

    #[test]
    fn bracket_atom_hydrogens_are_not_perceived() {
        // a radical carbon keeps exactly the hydrogens written
        let mol = parse_smiles("[CH2]C").unwrap();
        assert_eq!(mol.atoms[0].implicit_hydrogens, 2);
    }

    #[test]
    fn parse_two_digit_ring_closure() {
        let mol = parse_smiles("C%10CCCCCCCCC%10").unwrap();
        assert_eq!(mol.atom_count(), 10);
        assert_eq!(mol.bond_count(), 10);
    }

    #[test]
    fn ring_closure_bond_order() {
        let mol = parse_smiles("C=1CCCCC1").unwrap();
        let closure = mol.get_bond(0, 5).unwrap();
        assert_eq!(closure.order, BondOrder::Double);
    }

    #[test]
    fn bond_directions_recorded() {
        let mol = parse_smiles("F/C=C/F").unwrap();
        assert_eq!(mol.bonds[0].stereo, BondStereo::Up);
        assert_eq!(mol.bonds[1].stereo, BondStereo::None);
        assert_eq!(mol.bonds[2].stereo, BondStereo::Up);
        assert_eq!(mol.bonds[2].order, BondOrder::Single);
    }

    #[test]
    fn chirality_relative_to_reference_order() {
        // written order H, F, Cl, Br matches the reference order
        let mol = parse_smiles("[C@H](F)(Cl)Br").unwrap();
        assert_eq!(mol.atoms[0].chirality, Chirality::CounterClockwise);

        // from-atom F first, then H: one swap relative to [H, F, Cl, Br]
        let mol = parse_smiles("F[C@H](Cl)Br").unwrap();
        assert_eq!(mol.atoms[1].chirality, Chirality::Clockwise);
    }

    #[test]
    fn chirality_with_ring_opening() {
        // the ring bond to atom 3 is created last, but was written first
        let mol = parse_smiles("[C@@H]1(F)CC1").unwrap();
        // written [H, C3, F, C2]; reference [H, F, C2, C3]: a 3-cycle, even
        assert_eq!(mol.atoms[0].chirality, Chirality::Clockwise);
    }

    #[test]
    fn permutation_parity() {
        assert!(!permutation_is_odd(&[1, 2, 3], &[1, 2, 3]));
        assert!(permutation_is_odd(&[2, 1, 3], &[1, 2, 3]));
        assert!(!permutation_is_odd(&[2, 3, 1], &[1, 2, 3]));
        assert!(!permutation_is_odd(&[1, 2], &[1, 2, 3]));
    }

    #[test]
    fn invalid_smiles_error() {
        for bad in ["C(", "C1CC", "[", "C)", "", "C=", "=C", "[Xx]", "C11", "Q"] {
            assert!(parse_smiles(bad).is_err(), "'{bad}' should fail");
        }
    }

    #[test]
    fn named_parse_keeps_name() {
        let mol = parse_smiles_named("O", "water").unwrap();
        assert_eq!(mol.name, "water");
        assert_eq!(mol.atoms[0].implicit_hydrogens, 2);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for valid simple SMILES: chains of organic subset atoms
    fn simple_chain() -> impl Strategy<Value = String> {
        let atoms = prop_oneof![Just("C"), Just("N"), Just("O"), Just("S"), Just("Cl")];
        proptest::collection::vec(atoms, 1..=20).prop_map(|parts| parts.join(""))
    }

    proptest! {
        #[test]
        fn parse_smiles_does_not_panic(s in "\\PC{0,100}") {
            let _ = parse_smiles(&s);
        }

        #[test]
        fn chains_parse_to_trees(smi in simple_chain()) {
            let mol = parse_smiles(&smi).unwrap();
            prop_assert!(mol.atom_count() > 0);
            prop_assert_eq!(mol.bond_count(), mol.atom_count() - 1);
        }
    }
}
