//! SMILES and SMARTS output.
//!
//! Both writers share one depth-first layout of the molecular graph. The
//! SMILES writer walks atoms in canonical order by default, so the same
//! molecule gives the same string whatever its input atom order was. The
//! SMARTS writer follows atom indices and spells every atom and bond out
//! explicitly.

use crate::canon::canonical_order;
use crate::element::element_by_number;
use crate::molecule::{BondOrder, BondStereo, Chirality, Molecule};
use crate::smiles::{permutation_is_odd, reference_order, IMPLICIT_H};
use crate::valence::implicit_hydrogen_count;

/// Options for [`write_smiles`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SmilesWriteOptions {
    /// Write every atom in brackets with its hydrogen count.
    pub all_hs_explicit: bool,
    /// Include isotopes, tetrahedral tags and bond directions.
    pub isomeric: bool,
    /// Traverse in canonical order instead of atom index order.
    pub canonical: bool,
}

impl Default for SmilesWriteOptions {
    fn default() -> Self {
        Self {
            all_hs_explicit: false,
            isomeric: true,
            canonical: true,
        }
    }
}

/// Canonical isomeric SMILES with default options.
pub fn canonical_smiles(mol: &Molecule) -> String {
    write_smiles(mol, &SmilesWriteOptions::default())
}

/// Write a SMILES string. Disconnected fragments are joined with `.`.
pub fn write_smiles(mol: &Molecule, opts: &SmilesWriteOptions) -> String {
    let priority = if opts.canonical {
        canonical_order(mol)
    } else {
        (0..mol.atom_count() as u32).collect()
    };
    let layout = Layout::new(mol, &priority);
    emit(mol, &layout, Dialect::Smiles(*opts))
}

/// Write a SMARTS pattern matching exactly this molecule's heavy-atom graph.
///
/// Atoms are written as `[#Z]` with isotope, charge and tetrahedral tags;
/// every bond symbol is explicit.
pub fn write_smarts(mol: &Molecule) -> String {
    let priority: Vec<u32> = (0..mol.atom_count() as u32).collect();
    let layout = Layout::new(mol, &priority);
    emit(mol, &layout, Dialect::Smarts)
}

#[derive(Clone, Copy)]
enum Dialect {
    Smiles(SmilesWriteOptions),
    Smarts,
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    New,
    Open,
    Done,
}

/// DFS spanning forest plus the ring bonds that close it.
struct Layout {
    roots: Vec<usize>,
    parent: Vec<Option<(usize, usize)>>,
    children: Vec<Vec<(usize, usize)>>,
    /// Ring bonds opened at an atom: (partner, bond).
    opens: Vec<Vec<(usize, usize)>>,
    /// Ring bonds closed at an atom: (partner, bond).
    closes: Vec<Vec<(usize, usize)>>,
}

impl Layout {
    fn new(mol: &Molecule, priority: &[u32]) -> Self {
        let n = mol.atom_count();
        let mut layout = Layout {
            roots: Vec::new(),
            parent: vec![None; n],
            children: vec![Vec::new(); n],
            opens: vec![Vec::new(); n],
            closes: vec![Vec::new(); n],
        };
        let mut state = vec![Visit::New; n];
        let mut bond_used = vec![false; mol.bond_count()];
        let sorted_neighbors = |v: usize| {
            let mut nbrs = mol.adjacency[v].clone();
            nbrs.sort_by_key(|&(w, _)| (priority[w], w));
            nbrs
        };

        let mut by_priority: Vec<usize> = (0..n).collect();
        by_priority.sort_by_key(|&i| (priority[i], i));

        for root in by_priority {
            if state[root] != Visit::New {
                continue;
            }
            layout.roots.push(root);
            state[root] = Visit::Open;
            let mut stack = vec![(root, sorted_neighbors(root), 0usize)];
            while let Some(frame) = stack.last_mut() {
                let v = frame.0;
                let Some(&(w, bi)) = frame.1.get(frame.2) else {
                    state[v] = Visit::Done;
                    stack.pop();
                    continue;
                };
                frame.2 += 1;
                if bond_used[bi] {
                    continue;
                }
                bond_used[bi] = true;
                match state[w] {
                    Visit::New => {
                        state[w] = Visit::Open;
                        layout.parent[w] = Some((v, bi));
                        layout.children[v].push((w, bi));
                        stack.push((w, sorted_neighbors(w), 0));
                    }
                    // back edge to an ancestor: the ring opens at the ancestor
                    Visit::Open => {
                        layout.opens[w].push((v, bi));
                        layout.closes[v].push((w, bi));
                    }
                    Visit::Done => {}
                }
            }
        }
        layout
    }
}

enum Task {
    Atom(usize),
    Text(&'static str),
}

fn emit(mol: &Molecule, layout: &Layout, dialect: Dialect) -> String {
    let mut out = String::new();
    let mut ring_digit = vec![0u32; mol.bond_count()];
    let mut digits_in_use: Vec<u32> = Vec::new();

    for (f, &root) in layout.roots.iter().enumerate() {
        if f > 0 {
            out.push('.');
        }
        let mut tasks = vec![Task::Atom(root)];
        while let Some(task) = tasks.pop() {
            let v = match task {
                Task::Text(s) => {
                    out.push_str(s);
                    continue;
                }
                Task::Atom(v) => v,
            };
            if let Some((p, bi)) = layout.parent[v] {
                out.push_str(&bond_symbol(mol, bi, p, v, dialect, false));
            }

            // ring digits: closings first, then openings
            let mut ring_text = String::new();
            let mut written: Vec<usize> = Vec::new();
            let mut released = Vec::new();
            for &(w, bi) in &layout.closes[v] {
                ring_text.push_str(&bond_symbol(mol, bi, w, v, dialect, true));
                ring_text.push_str(&digit_text(ring_digit[bi]));
                released.push(ring_digit[bi]);
                written.push(w);
            }
            for &(w, bi) in &layout.opens[v] {
                let d = (1..).find(|d| !digits_in_use.contains(d)).unwrap_or(1);
                digits_in_use.push(d);
                ring_digit[bi] = d;
                ring_text.push_str(&digit_text(d));
                written.push(w);
            }
            digits_in_use.retain(|d| !released.contains(d));

            let mut order = Vec::new();
            if let Some((p, _)) = layout.parent[v] {
                order.push(p);
            }
            if mol.atoms[v].implicit_hydrogens > 0 {
                order.push(IMPLICIT_H);
            }
            order.extend(written);
            order.extend(layout.children[v].iter().map(|&(c, _)| c));
            let chirality = written_chirality(mol, v, &order);

            match dialect {
                Dialect::Smiles(opts) => out.push_str(&smiles_atom(mol, v, chirality, &opts)),
                Dialect::Smarts => out.push_str(&smarts_atom(mol, v, chirality)),
            }
            out.push_str(&ring_text);

            let children = &layout.children[v];
            for (k, &(c, _)) in children.iter().enumerate().rev() {
                if k + 1 == children.len() {
                    tasks.push(Task::Atom(c));
                } else {
                    tasks.push(Task::Text(")"));
                    tasks.push(Task::Atom(c));
                    tasks.push(Task::Text("("));
                }
            }
        }
    }
    out
}

/// The tag to write for `atom` when its neighbours appear in `written` order.
fn written_chirality(mol: &Molecule, atom: usize, written: &[usize]) -> Chirality {
    let tag = mol.atoms[atom].chirality;
    if tag != Chirality::None && permutation_is_odd(written, &reference_order(mol, atom)) {
        tag.inverted()
    } else {
        tag
    }
}

fn digit_text(d: u32) -> String {
    if d < 10 {
        d.to_string()
    } else {
        format!("%{d}")
    }
}

fn bond_symbol(mol: &Molecule, bi: usize, from: usize, to: usize, dialect: Dialect, ring: bool) -> String {
    let bond = &mol.bonds[bi];
    let s = match dialect {
        Dialect::Smarts => match bond.order {
            BondOrder::Single => "-",
            BondOrder::Double => "=",
            BondOrder::Triple => "#",
            BondOrder::Aromatic => ":",
        },
        Dialect::Smiles(opts) => {
            let both_aromatic = mol.atoms[from].is_aromatic && mol.atoms[to].is_aromatic;
            match bond.order {
                BondOrder::Double => "=",
                BondOrder::Triple => "#",
                BondOrder::Aromatic if both_aromatic => "",
                BondOrder::Aromatic => ":",
                BondOrder::Single if both_aromatic => "-",
                BondOrder::Single if opts.isomeric && !ring => {
                    let forward = bond.atom1 == from;
                    match (bond.stereo, forward) {
                        (BondStereo::None, _) => "",
                        (BondStereo::Up, true) | (BondStereo::Down, false) => "/",
                        (BondStereo::Down, true) | (BondStereo::Up, false) => "\\",
                    }
                }
                BondOrder::Single => "",
            }
        }
    };
    s.to_string()
}

fn symbol_of(z: u8) -> &'static str {
    element_by_number(z).map_or("*", |e| e.symbol)
}

fn charge_text(charge: i8) -> String {
    match charge {
        0 => String::new(),
        1 => "+".to_string(),
        -1 => "-".to_string(),
        c if c > 0 => format!("+{c}"),
        c => format!("-{}", -(c as i16)),
    }
}

fn is_organic_subset(z: u8, aromatic: bool) -> bool {
    if aromatic {
        matches!(z, 5 | 6 | 7 | 8 | 15 | 16)
    } else {
        matches!(z, 5 | 6 | 7 | 8 | 9 | 15 | 16 | 17 | 35 | 53)
    }
}

fn smiles_atom(mol: &Molecule, i: usize, chirality: Chirality, opts: &SmilesWriteOptions) -> String {
    let atom = &mol.atoms[i];
    let symbol = symbol_of(atom.atomic_number);
    let symbol = if atom.is_aromatic {
        symbol.to_ascii_lowercase()
    } else {
        symbol.to_string()
    };
    let isotope = atom.isotope.filter(|_| opts.isomeric);
    let chirality = if opts.isomeric { chirality } else { Chirality::None };

    let bracket = opts.all_hs_explicit
        || atom.is_hydrogen()
        || atom.formal_charge != 0
        || isotope.is_some()
        || chirality != Chirality::None
        || !is_organic_subset(atom.atomic_number, atom.is_aromatic)
        || atom.implicit_hydrogens != implicit_hydrogen_count(mol, i);
    if !bracket {
        return symbol;
    }

    let mut s = String::from("[");
    if let Some(iso) = isotope {
        s.push_str(&iso.to_string());
    }
    s.push_str(&symbol);
    match chirality {
        Chirality::CounterClockwise => s.push('@'),
        Chirality::Clockwise => s.push_str("@@"),
        Chirality::None => {}
    }
    match atom.implicit_hydrogens {
        0 => {}
        1 => s.push('H'),
        h => s.push_str(&format!("H{h}")),
    }
    s.push_str(&charge_text(atom.formal_charge));
    s.push(']');
    s
}

fn smarts_atom(mol: &Molecule, i: usize, chirality: Chirality) -> String {
    let atom = &mol.atoms[i];
    let mut s = String::from("[");
    if let Some(iso) = atom.isotope {
        s.push_str(&iso.to_string());
    }
    s.push('#');
    s.push_str(&atom.atomic_number.to_string());
    match chirality {
        Chirality::CounterClockwise => s.push('@'),
        Chirality::Clockwise => s.push_str("@@"),
        Chirality::None => {}
    }
    // the implicit H is part of the neighbour order the tag refers to
    if chirality != Chirality::None && atom.implicit_hydrogens > 0 {
        match atom.implicit_hydrogens {
            1 => s.push('H'),
            h => s.push_str(&format!("H{h}")),
        }
    }
    s.push_str(&charge_text(atom.formal_charge));
    s.push(']');
    s
}
