//! Tripos MOL2 reading.
//!
//! Elements come from the Tripos atom type (`C.3`, `N.ar`, `Cl`), falling
//! back to the atom name. `N.4` atoms carry a +1 charge, and the `O.co2`
//! oxygens of carboxylates, phosphates and sulfonates are resolved into
//! explicit double bonds and -1 charges.

use std::collections::HashMap;
use std::path::Path;

use log::debug;
use molkit_core::{MolkitError, Result};

use crate::conformer::Conformer;
use crate::element::{element_by_symbol, element_by_symbol_ignore_case, Element};
use crate::molecule::{Bond, BondOrder, MolAtom, Molecule};
use crate::valence::assign_implicit_hydrogens;

fn parse_error(line_no: usize, msg: impl std::fmt::Display) -> MolkitError {
    MolkitError::Parse(format!("MOL2 line {line_no}: {msg}"))
}

/// Parse the first molecule of a MOL2 text.
pub fn parse_mol2(input: &str) -> Result<Molecule> {
    let lines: Vec<(usize, &str)> = input.lines().enumerate().map(|(i, l)| (i + 1, l)).collect();

    let mol_idx = find_section(&lines, "@<TRIPOS>MOLECULE", 0)
        .ok_or_else(|| parse_error(1, "missing @<TRIPOS>MOLECULE section"))?;
    // a second MOLECULE section starts the next record
    let end = find_section(&lines, "@<TRIPOS>MOLECULE", mol_idx + 1).unwrap_or(lines.len());
    let lines = &lines[..end];

    let mut cursor = mol_idx + 1;
    let name = lines
        .get(cursor)
        .map(|(_, l)| l.trim().to_string())
        .unwrap_or_default();
    cursor += 1;
    let (count_line_no, count_line) =
        next_data_line(lines, &mut cursor).ok_or_else(|| parse_error(cursor + 1, "missing counts line"))?;
    let (atom_count, bond_count) = parse_counts(count_line, count_line_no)?;

    let atom_section = find_section(lines, "@<TRIPOS>ATOM", 0)
        .ok_or_else(|| parse_error(cursor + 1, "missing @<TRIPOS>ATOM section"))?;
    let (atoms, coords, types, id_map) = parse_atoms(lines, atom_section + 1, atom_count)?;

    let mut mol = Molecule::new(name, atoms, Vec::new());
    if let Some(bond_section) = find_section(lines, "@<TRIPOS>BOND", 0) {
        parse_bonds(&mut mol, lines, bond_section + 1, bond_count, &id_map)?;
    } else if bond_count > 0 {
        return Err(parse_error(count_line_no, "bonds declared but no @<TRIPOS>BOND section"));
    }

    resolve_charged_groups(&mut mol, &types);
    assign_implicit_hydrogens(&mut mol);
    if mol.atom_count() > 0 {
        mol.add_conformer(Conformer::new(coords))?;
    }
    debug!(
        "parsed MOL2 '{}': {} atoms, {} bonds",
        mol.name,
        mol.atom_count(),
        mol.bond_count()
    );
    Ok(mol)
}

/// Read a MOL2 file.
pub fn read_mol2_file(path: impl AsRef<Path>) -> Result<Molecule> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| MolkitError::io_at(path, e))?;
    debug!("reading MOL2 file {}", path.display());
    parse_mol2(&contents)
}

fn find_section(lines: &[(usize, &str)], name: &str, from: usize) -> Option<usize> {
    lines
        .get(from..)?
        .iter()
        .position(|(_, line)| line.trim().eq_ignore_ascii_case(name))
        .map(|p| p + from)
}

fn next_data_line<'a>(lines: &[(usize, &'a str)], cursor: &mut usize) -> Option<(usize, &'a str)> {
    while *cursor < lines.len() {
        let (ln, content) = lines[*cursor];
        *cursor += 1;
        let trimmed = content.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        return Some((ln, content));
    }
    None
}

fn parse_counts(line: &str, line_no: usize) -> Result<(usize, usize)> {
    let parts: Vec<_> = line.split_whitespace().collect();
    let atoms = parts
        .first()
        .and_then(|p| p.parse::<usize>().ok())
        .ok_or_else(|| parse_error(line_no, "invalid atom count in counts line"))?;
    let bonds = match parts.get(1) {
        Some(p) => p
            .parse::<usize>()
            .map_err(|_| parse_error(line_no, "invalid bond count in counts line"))?,
        None => 0,
    };
    Ok((atoms, bonds))
}

type ParsedAtoms<'a> = (Vec<MolAtom>, Vec<[f64; 3]>, Vec<&'a str>, HashMap<usize, usize>);

fn parse_atoms<'a>(lines: &[(usize, &'a str)], start: usize, expected: usize) -> Result<ParsedAtoms<'a>> {
    let mut atoms = Vec::with_capacity(expected);
    let mut coords = Vec::with_capacity(expected);
    let mut types = Vec::with_capacity(expected);
    let mut id_map = HashMap::new();
    let mut cursor = start;

    for _ in 0..expected {
        let (ln, raw) = next_data_line(lines, &mut cursor)
            .filter(|(_, l)| !l.trim_start().starts_with('@'))
            .ok_or_else(|| parse_error(lines.last().map_or(0, |(ln, _)| *ln), "ATOM section ended early"))?;
        let parts: Vec<_> = raw.split_whitespace().collect();
        // id name x y z type [subst_id subst_name charge]
        if parts.len() < 6 {
            return Err(parse_error(ln, "invalid ATOM line"));
        }
        let atom_id = parts[0]
            .parse::<usize>()
            .map_err(|_| parse_error(ln, "invalid atom id in ATOM line"))?;
        let mut xyz = [0.0; 3];
        for (k, field) in parts[2..5].iter().enumerate() {
            xyz[k] = field
                .parse::<f64>()
                .map_err(|_| parse_error(ln, format!("invalid coordinate '{field}'")))?;
        }
        let element = element_from_type(parts[5])
            .or_else(|| element_from_name(parts[1]))
            .ok_or_else(|| parse_error(ln, format!("unable to infer element from '{}'", parts[5])))?;

        let mut atom = MolAtom::new(element.atomic_number);
        if parts[5].eq_ignore_ascii_case("N.4") {
            atom.formal_charge = 1;
        }
        if id_map.insert(atom_id, atoms.len()).is_some() {
            return Err(parse_error(ln, format!("duplicate atom id {atom_id}")));
        }
        atoms.push(atom);
        coords.push(xyz);
        types.push(parts[5]);
    }
    Ok((atoms, coords, types, id_map))
}

/// `C.ar` -> C, `Cl` -> Cl, `Du` and `LP` -> none.
fn element_from_type(tripos: &str) -> Option<&'static Element> {
    let symbol = tripos.split('.').next()?;
    if symbol.eq_ignore_ascii_case("du") || symbol.eq_ignore_ascii_case("lp") {
        return None;
    }
    element_by_symbol(symbol).or_else(|| element_by_symbol_ignore_case(symbol))
}

/// Leading letters of an atom name such as `C12` or `CL3`.
fn element_from_name(name: &str) -> Option<&'static Element> {
    let letters: String = name.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    letters
        .get(..2)
        .and_then(element_by_symbol_ignore_case)
        .or_else(|| letters.get(..1).and_then(element_by_symbol_ignore_case))
}

fn parse_bonds(
    mol: &mut Molecule,
    lines: &[(usize, &str)],
    start: usize,
    expected: usize,
    id_map: &HashMap<usize, usize>,
) -> Result<()> {
    let mut cursor = start;
    for _ in 0..expected {
        let (ln, raw) = next_data_line(lines, &mut cursor)
            .filter(|(_, l)| !l.trim_start().starts_with('@'))
            .ok_or_else(|| parse_error(lines.last().map_or(0, |(ln, _)| *ln), "BOND section ended early"))?;
        let parts: Vec<_> = raw.split_whitespace().collect();
        // id atom1 atom2 type
        if parts.len() < 4 {
            return Err(parse_error(ln, "invalid BOND line"));
        }
        let endpoint = |field: &str| -> Result<usize> {
            let id = field
                .parse::<usize>()
                .map_err(|_| parse_error(ln, format!("invalid atom id '{field}' in BOND line")))?;
            id_map
                .get(&id)
                .copied()
                .ok_or_else(|| parse_error(ln, format!("bond references unknown atom id {id}")))
        };
        let (i, j) = (endpoint(parts[1])?, endpoint(parts[2])?);

        let order = match parts[3].to_ascii_lowercase().as_str() {
            "1" | "am" => BondOrder::Single,
            "2" => BondOrder::Double,
            "3" => BondOrder::Triple,
            "ar" => BondOrder::Aromatic,
            "du" | "un" | "nc" => continue,
            other => return Err(parse_error(ln, format!("unsupported bond type '{other}'"))),
        };
        let mut bond = Bond::new(i, j, order);
        bond.is_aromatic = order == BondOrder::Aromatic;
        mol.add_bond(bond).map_err(|e| parse_error(ln, e))?;
    }

    // aromatic flags follow the bonds
    for bi in 0..mol.bond_count() {
        if mol.bonds[bi].order == BondOrder::Aromatic {
            let (a, b) = (mol.bonds[bi].atom1, mol.bonds[bi].atom2);
            mol.atoms[a].is_aromatic = true;
            mol.atoms[b].is_aromatic = true;
        }
    }
    Ok(())
}

/// Turn the delocalised `O.co2` oxygens around each centre into one
/// localised form: sulfur keeps one charged oxygen and double bonds to the
/// rest; other centres keep one double bond and charge the rest.
fn resolve_charged_groups(mol: &mut Molecule, types: &[&str]) {
    let is_co2 = |i: usize| types.get(i).is_some_and(|t| t.eq_ignore_ascii_case("O.co2"));

    for center in 0..mol.atom_count() {
        let oxygens: Vec<(usize, usize)> = mol.adjacency[center]
            .iter()
            .copied()
            .filter(|&(o, _)| is_co2(o) && mol.degree(o) == 1)
            .collect();
        if oxygens.is_empty() {
            continue;
        }
        let doubles = if mol.atoms[center].atomic_number == 16 {
            oxygens.len() - 1
        } else {
            1
        };
        for (k, &(o, bi)) in oxygens.iter().enumerate() {
            let bond = &mut mol.bonds[bi];
            bond.is_aromatic = false;
            if k < doubles {
                bond.order = BondOrder::Double;
            } else {
                bond.order = BondOrder::Single;
                mol.atoms[o].formal_charge = -1;
            }
            mol.atoms[o].is_aromatic = false;
        }
        // a centre bonded only through O.co2 "ar" bonds is not aromatic
        let still_aromatic = mol.adjacency[center]
            .iter()
            .any(|&(_, bi)| mol.bonds[bi].order == BondOrder::Aromatic);
        mol.atoms[center].is_aromatic = still_aromatic;
    }
}
