//! PDB reading and writing for small molecules.
//!
//! Reads ATOM/HETATM records of the first MODEL and bonds them from CONECT
//! records, or from interatomic distances when the file has none. Writes
//! HETATM records for residue `UNL` followed by CONECT records.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use log::{debug, warn};
use molkit_core::{MolkitError, Result};

use crate::conformer::Conformer;
use crate::element::{covalent_radius, element_by_number, element_by_symbol_ignore_case};
use crate::molecule::{Bond, BondOrder, MolAtom, Molecule};
use crate::valence::{assign_implicit_hydrogens, kekulize};

/// Slack (Å) over the covalent radius sum when bonding by distance.
const BOND_TOLERANCE: f64 = 0.45;

/// Parse a PDB-format string into a [`Molecule`] with one conformer.
///
/// # Errors
///
/// Returns an error if no ATOM/HETATM records are found, if a record is
/// malformed, or if a CONECT record names an unknown serial.
pub fn parse_pdb(input: &str) -> Result<Molecule> {
    let mut name = String::new();
    let mut atoms: Vec<MolAtom> = Vec::new();
    let mut coords: Vec<[f64; 3]> = Vec::new();
    let mut serials: HashMap<u32, usize> = HashMap::new();
    // (from, to) -> times `to` is listed in the CONECT records of `from`
    let mut conect: HashMap<(usize, usize), u8> = HashMap::new();
    let mut conect_lines = Vec::new();
    let mut seen_model = false;

    for line in input.lines() {
        if line.starts_with("ENDMDL") {
            break; // only first model
        }
        if line.starts_with("MODEL") {
            if seen_model {
                break;
            }
            seen_model = true;
            continue;
        }
        if line.starts_with("COMPND") && name.is_empty() {
            name = safe_slice(line, 10, 80).trim().to_string();
        } else if line.starts_with("ATOM  ") || line.starts_with("HETATM") {
            let (serial, atom, xyz) = parse_atom_record(line)?;
            serials.insert(serial, atoms.len());
            atoms.push(atom);
            coords.push(xyz);
        } else if line.starts_with("CONECT") {
            conect_lines.push(line);
        }
    }

    if atoms.is_empty() {
        return Err(MolkitError::Parse("no ATOM or HETATM records found".into()));
    }

    for line in conect_lines {
        let lookup = |field: &str| -> Result<Option<usize>> {
            let field = field.trim();
            if field.is_empty() {
                return Ok(None);
            }
            let serial: u32 = field
                .parse()
                .map_err(|e| MolkitError::Parse(format!("bad CONECT serial '{field}': {e}")))?;
            serials
                .get(&serial)
                .copied()
                .map(Some)
                .ok_or_else(|| MolkitError::Parse(format!("CONECT names unknown atom serial {serial}")))
        };
        let Some(from) = lookup(safe_slice(line, 6, 11))? else {
            continue;
        };
        for start in [11, 16, 21, 26] {
            if let Some(to) = lookup(safe_slice(line, start, start + 5))? {
                *conect.entry((from, to)).or_insert(0) += 1;
            }
        }
    }

    let mut mol = Molecule::new(name, atoms, Vec::new());
    if conect.is_empty() {
        warn!(
            "PDB '{}' has no CONECT records; bonding {} atoms by distance",
            mol.name,
            mol.atom_count()
        );
        for (a, b) in proximity_bonds(&mol, &coords) {
            mol.add_bond(Bond::new(a, b, BondOrder::Single))?;
        }
    } else {
        let mut pairs: Vec<(usize, usize)> = conect
            .keys()
            .filter(|(a, b)| a != b)
            .map(|&(a, b)| (a.min(b), a.max(b)))
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        for (a, b) in pairs {
            // a bond listed twice from the same end is a double bond
            let listed = conect.get(&(a, b)).copied().unwrap_or(0).max(conect.get(&(b, a)).copied().unwrap_or(0));
            let order = match listed {
                0 | 1 => BondOrder::Single,
                2 => BondOrder::Double,
                _ => BondOrder::Triple,
            };
            mol.add_bond(Bond::new(a, b, order))?;
        }
    }

    assign_implicit_hydrogens(&mut mol);
    mol.add_conformer(Conformer::new(coords))?;
    debug!(
        "parsed PDB '{}': {} atoms, {} bonds",
        mol.name,
        mol.atom_count(),
        mol.bond_count()
    );
    Ok(mol)
}

/// Atom pairs closer than their covalent radii plus [`BOND_TOLERANCE`].
fn proximity_bonds(mol: &Molecule, coords: &[[f64; 3]]) -> Vec<(usize, usize)> {
    let n = coords.len();
    let mut bonds = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let d = ((coords[i][0] - coords[j][0]).powi(2)
                + (coords[i][1] - coords[j][1]).powi(2)
                + (coords[i][2] - coords[j][2]).powi(2))
            .sqrt();
            let (zi, zj) = (mol.atoms[i].atomic_number, mol.atoms[j].atomic_number);
            if zi == 1 && zj == 1 {
                continue;
            }
            let limit = covalent_radius(zi) + covalent_radius(zj) + BOND_TOLERANCE;
            if d > 0.4 && d < limit {
                bonds.push((i, j));
            }
        }
    }
    bonds
}

/// Read a PDB file.
pub fn read_pdb_file(path: impl AsRef<Path>) -> Result<Molecule> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| MolkitError::io_at(path, e))?;
    debug!("reading PDB file {}", path.display());
    parse_pdb(&contents)
}

fn parse_atom_record(line: &str) -> Result<(u32, MolAtom, [f64; 3])> {
    // PDB format is fixed-width columns. We need at least 54 chars for coords.
    if line.len() < 54 {
        return Err(MolkitError::Parse(format!(
            "ATOM record too short ({} chars): {line}",
            line.len()
        )));
    }

    let serial = safe_slice(line, 6, 11)
        .trim()
        .parse::<u32>()
        .map_err(|e| MolkitError::Parse(format!("bad atom serial: {e}")))?;

    let mut xyz = [0.0; 3];
    for (k, (start, axis)) in [(30, "x"), (38, "y"), (46, "z")].into_iter().enumerate() {
        xyz[k] = safe_slice(line, start, start + 8)
            .trim()
            .parse::<f64>()
            .map_err(|e| MolkitError::Parse(format!("bad {axis} coordinate: {e}")))?;
    }

    // element column first, then the letters of the atom name
    let element_field = safe_slice(line, 76, 78).trim();
    let atom_name = safe_slice(line, 12, 16);
    let element = (if element_field.is_empty() {
        element_from_atom_name(atom_name)
    } else {
        element_by_symbol_ignore_case(element_field)
    })
    .ok_or_else(|| {
        MolkitError::Parse(format!(
            "cannot determine element of atom {serial} ('{}')",
            atom_name.trim()
        ))
    })?;

    let mut atom = MolAtom::new(element.atomic_number);
    atom.formal_charge = parse_pdb_charge(safe_slice(line, 78, 80)).unwrap_or(0);
    Ok((serial, atom, xyz))
}

/// Two-letter elements are right-aligned into column 13 of the name
/// field; one-letter elements start in column 14.
fn element_from_atom_name(name: &str) -> Option<&'static crate::element::Element> {
    let letters: String = name.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    if !name.starts_with(' ') && letters.len() >= 2 {
        if let Some(e) = element_by_symbol_ignore_case(&letters[..2]) {
            return Some(e);
        }
    }
    letters.get(..1).and_then(element_by_symbol_ignore_case)
}

fn parse_pdb_charge(s: &str) -> Option<i8> {
    // PDB charge format: "2+" or "1-", occasionally "+2"
    let bytes = s.trim().as_bytes();
    let (digit, sign) = match bytes {
        [d, s @ (b'+' | b'-')] if d.is_ascii_digit() => (*d, *s),
        [s @ (b'+' | b'-'), d] if d.is_ascii_digit() => (*d, *s),
        _ => return None,
    };
    let magnitude = (digit - b'0') as i8;
    Some(if sign == b'+' { magnitude } else { -magnitude })
}

/// Substring of a fixed-width record, or "" past the end of the line.
fn safe_slice(s: &str, start: usize, end: usize) -> &str {
    let end = end.min(s.len());
    if start >= end {
        return "";
    }
    s.get(start..end).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write a PDB block from the first conformer.
///
/// Atom names are the element symbol plus a per-element counter. Bonds go
/// into CONECT records, with multiple bonds listed once per order and
/// aromatic rings written in a Kekulé form.
pub fn write_pdb_block(mol: &Molecule) -> Result<String> {
    let n = mol.atom_count();
    if n > 99_999 {
        return Err(MolkitError::InvalidInput(format!(
            "PDB serials hold at most 99999 atoms, '{}' has {n}",
            mol.name
        )));
    }
    let conformer = mol.conformers().first();
    let mut out = String::new();
    if !mol.name.is_empty() {
        let _ = writeln!(out, "COMPND    {}", mol.name);
    }

    let mut per_element: HashMap<u8, usize> = HashMap::new();
    for (i, atom) in mol.atoms.iter().enumerate() {
        let [x, y, z] = conformer.map_or([0.0; 3], |c| c.coords[i]);
        let symbol = element_by_number(atom.atomic_number).map_or("X", |e| e.symbol);
        let count = per_element.entry(atom.atomic_number).or_insert(0);
        *count += 1;
        let label = format!("{symbol}{count}");
        let name = if symbol.len() == 1 && label.len() < 4 {
            format!(" {label:<3}")
        } else {
            format!("{label:<4}")
        };
        let charge = match atom.formal_charge {
            0 => String::from("  "),
            q if q > 0 => format!("{q}+"),
            q => format!("{}-", -q),
        };
        let _ = writeln!(
            out,
            "HETATM{:>5} {name:.4} UNL     1    {x:>8.3}{y:>8.3}{z:>8.3}  1.00  0.00          {symbol:>2}{charge}",
            i + 1,
        );
    }

    let orders = kekulize(mol)?;
    for (i, neighbors) in mol.adjacency.iter().enumerate() {
        let listed: Vec<usize> = neighbors
            .iter()
            .flat_map(|&(j, bi)| {
                let times = match orders[bi] {
                    BondOrder::Double => 2,
                    BondOrder::Triple => 3,
                    BondOrder::Single | BondOrder::Aromatic => 1,
                };
                std::iter::repeat(j + 1).take(times)
            })
            .collect();
        for chunk in listed.chunks(4) {
            let _ = write!(out, "CONECT{:>5}", i + 1);
            for serial in chunk {
                let _ = write!(out, "{serial:>5}");
            }
            out.push('\n');
        }
    }
    out.push_str("END\n");
    Ok(out)
}

/// Write a PDB file.
pub fn write_pdb_file(mol: &Molecule, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let block = write_pdb_block(mol)?;
    std::fs::write(path, block).map_err(|e| MolkitError::io_at(path, e))?;
    debug!("wrote PDB file {}", path.display());
    Ok(())
}
