//! MDL MOL (V2000/V3000) and SDF reading, and MOL V2000 writing.
//!
//! Coordinates become the molecule's first conformer. Bond type 4 marks
//! both ends aromatic, and implicit hydrogens are perceived from valence
//! after the block is read, since MOL files do not store them. The writer
//! emits a Kekulé structure, so aromatic rings leave as types 1 and 2.

use std::fmt::Write as _;
use std::path::Path;

use log::debug;
use molkit_core::{MolkitError, Result};

use crate::conformer::Conformer;
use crate::element::{element_by_number, element_by_symbol};
use crate::molecule::{Bond, BondOrder, MolAtom, Molecule};
use crate::valence::{assign_implicit_hydrogens, kekulize};

/// Atoms and bonds as read from a connection table, before assembly.
struct Ctab {
    name: String,
    atoms: Vec<MolAtom>,
    coords: Vec<[f64; 3]>,
    /// 1-based atom indices and MDL bond type.
    bonds: Vec<(usize, usize, u8)>,
}

impl Ctab {
    fn into_molecule(self) -> Result<Molecule> {
        let n = self.atoms.len();
        let mut mol = Molecule::new(self.name, self.atoms, Vec::new());
        for (a1, a2, code) in self.bonds {
            if a1 == 0 || a2 == 0 || a1 > n || a2 > n {
                return Err(MolkitError::Parse(format!(
                    "bond {a1}-{a2} references an atom outside 1..={n}"
                )));
            }
            let order = BondOrder::from_mdl_code(code).unwrap_or(BondOrder::Single);
            let mut bond = Bond::new(a1 - 1, a2 - 1, order);
            bond.is_aromatic = order == BondOrder::Aromatic;
            mol.add_bond(bond).map_err(|e| MolkitError::Parse(e.to_string()))?;
            if order == BondOrder::Aromatic {
                mol.atoms[a1 - 1].is_aromatic = true;
                mol.atoms[a2 - 1].is_aromatic = true;
            }
        }
        assign_implicit_hydrogens(&mut mol);
        if n > 0 {
            mol.add_conformer(Conformer::new(self.coords))?;
        }
        Ok(mol)
    }
}

fn parse_field<T: std::str::FromStr>(text: &str, what: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| MolkitError::Parse(format!("invalid {what} '{}'", text.trim())))
}

/// Columns `start..end` of a fixed-width line, or "" past its end.
fn column(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    line.get(start.min(end)..end).unwrap_or("")
}

/// Parse a MOL V2000 block into a `Molecule`.
pub fn parse_mol_v2000(input: &str) -> Result<Molecule> {
    let lines: Vec<&str> = input.lines().collect();

    if lines.len() < 4 {
        return Err(MolkitError::Parse("MOL block too short".into()));
    }

    // Header: line 0 = molecule name, 1 = program/timestamp, 2 = comment
    let name = lines[0].trim().to_string();

    // Counts line (line 3): aaabbblllfffcccsssxxxrrrpppiiimmmvvvvvv
    let counts_line = lines[3];
    if counts_line.len() < 6 {
        return Err(MolkitError::Parse("counts line too short".into()));
    }
    let num_atoms: usize = parse_field(column(counts_line, 0, 3), "atom count")?;
    let num_bonds: usize = parse_field(column(counts_line, 3, 6), "bond count")?;

    let atom_start = 4;
    let bond_start = atom_start + num_atoms;

    if lines.len() < bond_start + num_bonds {
        return Err(MolkitError::Parse("MOL block truncated".into()));
    }

    let mut atoms = Vec::with_capacity(num_atoms);
    let mut coords = Vec::with_capacity(num_atoms);
    for line in &lines[atom_start..bond_start] {
        let (atom, xyz) = parse_atom_line(line)?;
        atoms.push(atom);
        coords.push(xyz);
    }

    let mut bonds = Vec::with_capacity(num_bonds);
    for line in &lines[bond_start..bond_start + num_bonds] {
        if line.len() < 9 {
            return Err(MolkitError::Parse(format!("bond line too short: '{line}'")));
        }
        bonds.push((
            parse_field(column(line, 0, 3), "bond atom1")?,
            parse_field(column(line, 3, 6), "bond atom2")?,
            parse_field(column(line, 6, 9), "bond type")?,
        ));
    }

    // Properties block; M  CHG and M  ISO override the atom lines
    for line in &lines[bond_start + num_bonds..] {
        if line.starts_with("M  END") {
            break;
        }
        if let Some(rest) = line.strip_prefix("M  CHG") {
            for (idx, value) in property_pairs(rest)? {
                if let Some(atom) = idx.checked_sub(1).and_then(|i| atoms.get_mut(i)) {
                    atom.formal_charge = value as i8;
                }
            }
        } else if let Some(rest) = line.strip_prefix("M  ISO") {
            for (idx, value) in property_pairs(rest)? {
                if let Some(atom) = idx.checked_sub(1).and_then(|i| atoms.get_mut(i)) {
                    atom.isotope = u16::try_from(value).ok();
                }
            }
        }
    }

    Ctab { name, atoms, coords, bonds }.into_molecule()
}

/// `n aaa vvv aaa vvv ...` after an `M  CHG` or `M  ISO` tag.
fn property_pairs(rest: &str) -> Result<Vec<(usize, i32)>> {
    let parts: Vec<&str> = rest.split_whitespace().collect();
    let Some(count) = parts.first() else {
        return Ok(Vec::new());
    };
    let count: usize = parse_field(count, "property count")?;
    parts[1..]
        .chunks(2)
        .take(count)
        .filter(|pair| pair.len() == 2)
        .map(|pair| -> Result<(usize, i32)> {
            Ok((parse_field(pair[0], "property atom")?, parse_field(pair[1], "property value")?))
        })
        .collect()
}

fn parse_atom_line(line: &str) -> Result<(MolAtom, [f64; 3])> {
    // xxxxx.xxxxyyyyy.yyyyzzzzz.zzzz aaaddcccssshhhbbbvvvHHHrrriiimmmnnneee
    if line.len() < 34 {
        return Err(MolkitError::Parse(format!("atom line too short: '{line}'")));
    }
    let xyz = [
        parse_field(column(line, 0, 10), "x coordinate")?,
        parse_field(column(line, 10, 20), "y coordinate")?,
        parse_field(column(line, 20, 30), "z coordinate")?,
    ];

    let symbol = column(line, 31, 34).trim();
    let elem = element_by_symbol(symbol)
        .ok_or_else(|| MolkitError::Parse(format!("unknown element '{symbol}' in MOL atom block")))?;

    // old-style charge code: 1=+3, 2=+2, 3=+1, 5=-1, 6=-2, 7=-3
    let charge = match column(line, 36, 39).trim().parse::<u8>() {
        Ok(1) => 3,
        Ok(2) => 2,
        Ok(3) => 1,
        Ok(5) => -1,
        Ok(6) => -2,
        Ok(7) => -3,
        _ => 0,
    };

    let mut atom = MolAtom::new(elem.atomic_number);
    atom.formal_charge = charge;
    Ok((atom, xyz))
}

/// Parse a MOL V3000 (Enhanced) block into a `Molecule`.
///
/// The V3000 format uses `M  V30` line prefixes and free-format fields
/// instead of fixed-width columns. Atom and bond indices are 1-based.
pub fn parse_mol_v3000(input: &str) -> Result<Molecule> {
    let lines: Vec<&str> = input.lines().collect();

    if lines.len() < 4 {
        return Err(MolkitError::Parse("V3000 MOL block too short".into()));
    }
    let name = lines[0].trim().to_string();

    let counts_parts: Vec<&str> = lines
        .iter()
        .find(|l| l.contains("M  V30 COUNTS"))
        .ok_or_else(|| MolkitError::Parse("V3000: missing COUNTS line".into()))?
        .split_whitespace()
        .collect();
    // M V30 COUNTS natoms nbonds ...
    if counts_parts.len() < 5 {
        return Err(MolkitError::Parse("V3000: COUNTS line too short".into()));
    }
    let num_atoms: usize = parse_field(counts_parts[3], "V3000 atom count")?;
    let num_bonds: usize = parse_field(counts_parts[4], "V3000 bond count")?;

    let atom_lines = v3000_section(&lines, "ATOM")?
        .ok_or_else(|| MolkitError::Parse("V3000: missing BEGIN ATOM".into()))?;
    let mut atoms = Vec::with_capacity(num_atoms);
    let mut coords = Vec::with_capacity(num_atoms);
    for line in atom_lines {
        let (atom, xyz) = parse_v3000_atom_line(line)?;
        atoms.push(atom);
        coords.push(xyz);
    }
    if atoms.len() != num_atoms {
        return Err(MolkitError::Parse(format!(
            "V3000: expected {num_atoms} atoms, found {}",
            atoms.len()
        )));
    }

    // molecules can have zero bonds and no BOND block
    let mut bonds = Vec::with_capacity(num_bonds);
    match v3000_section(&lines, "BOND")? {
        Some(bond_lines) => {
            for line in bond_lines {
                let parts = v3000_fields(line)?;
                // idx type atom1 atom2 [keyword=value ...]
                if parts.len() < 4 {
                    return Err(MolkitError::Parse(format!("V3000: bond line too short: '{line}'")));
                }
                bonds.push((
                    parse_field(parts[2], "V3000 bond atom1")?,
                    parse_field(parts[3], "V3000 bond atom2")?,
                    parse_field(parts[1], "V3000 bond type")?,
                ));
            }
            if bonds.len() != num_bonds {
                return Err(MolkitError::Parse(format!(
                    "V3000: expected {num_bonds} bonds, found {}",
                    bonds.len()
                )));
            }
        }
        None if num_bonds != 0 => {
            return Err(MolkitError::Parse(
                "V3000: COUNTS declares bonds but no BOND block found".into(),
            ));
        }
        None => {}
    }

    Ctab { name, atoms, coords, bonds }.into_molecule()
}

/// Lines strictly between `M  V30 BEGIN <tag>` and `M  V30 END <tag>`.
fn v3000_section<'a>(lines: &'a [&'a str], tag: &str) -> Result<Option<&'a [&'a str]>> {
    let begin = format!("M  V30 BEGIN {tag}");
    let end = format!("M  V30 END {tag}");
    let Some(start) = lines.iter().position(|l| l.contains(&begin)) else {
        return Ok(None);
    };
    let stop = lines[start..]
        .iter()
        .position(|l| l.contains(&end))
        .ok_or_else(|| MolkitError::Parse(format!("V3000: missing END {tag}")))?;
    Ok(Some(&lines[start + 1..start + stop]))
}

fn v3000_fields(line: &str) -> Result<Vec<&str>> {
    let content = line
        .trim()
        .strip_prefix("M  V30")
        .ok_or_else(|| MolkitError::Parse(format!("V3000: line missing prefix: '{line}'")))?;
    Ok(content.split_whitespace().collect())
}

/// `M  V30 idx symbol x y z aamap [CHG=val] [MASS=val] ...`
fn parse_v3000_atom_line(line: &str) -> Result<(MolAtom, [f64; 3])> {
    let parts = v3000_fields(line)?;
    if parts.len() < 6 {
        return Err(MolkitError::Parse(format!("V3000: atom line too short: '{line}'")));
    }

    let symbol = parts[1];
    let elem = element_by_symbol(symbol)
        .ok_or_else(|| MolkitError::Parse(format!("V3000: unknown element '{symbol}'")))?;
    let mut atom = MolAtom::new(elem.atomic_number);
    let xyz = [
        parse_field(parts[2], "V3000 x")?,
        parse_field(parts[3], "V3000 y")?,
        parse_field(parts[4], "V3000 z")?,
    ];

    for part in &parts[6..] {
        if let Some(val) = part.strip_prefix("CHG=") {
            atom.formal_charge = parse_field(val, "V3000 CHG value")?;
        } else if let Some(val) = part.strip_prefix("MASS=") {
            atom.isotope = Some(parse_field(val, "V3000 MASS value")?);
        }
    }
    Ok((atom, xyz))
}

/// Detect whether a MOL block uses V3000 format.
fn is_v3000(block: &str) -> bool {
    block.lines().take(5).any(|line| line.contains("V3000")) || block.contains("M  V30 BEGIN CTAB")
}

/// Parse a MOL block of either version.
pub fn parse_mol_block(block: &str) -> Result<Molecule> {
    if is_v3000(block) {
        parse_mol_v3000(block)
    } else {
        parse_mol_v2000(block)
    }
}

/// Parse a multi-molecule SDF string, returning results for each molecule.
///
/// Auto-detects V2000 vs V3000 format for each molecule block.
pub fn parse_sdf(input: &str) -> Vec<Result<Molecule>> {
    input
        .split("$$$$")
        // the line break after `$$$$` ends the previous record; blank lines
        // after it are header lines of the next one
        .map(|block| {
            block
                .strip_prefix("\r\n")
                .or_else(|| block.strip_prefix('\n'))
                .unwrap_or(block)
        })
        .filter(|block| !block.trim().is_empty())
        .map(parse_mol_block)
        .collect()
}

/// Read a MOL file.
pub fn read_mol_file(path: impl AsRef<Path>) -> Result<Molecule> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| MolkitError::io_at(path, e))?;
    debug!("reading MOL file {}", path.display());
    parse_mol_block(&content)
}

/// Read the first record of an SDF file.
pub fn read_sdf_file(path: impl AsRef<Path>) -> Result<Molecule> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| MolkitError::io_at(path, e))?;
    debug!("reading SDF file {}", path.display());
    parse_sdf(&content)
        .into_iter()
        .next()
        .unwrap_or_else(|| Err(MolkitError::Parse(format!("{}: no SDF records", path.display()))))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write a MOL V2000 block using the first conformer's coordinates.
///
/// A molecule without conformers is written with zero coordinates and a
/// `2D` header. Charges and isotopes go into `M  CHG`/`M  ISO` lines.
pub fn write_mol_block(mol: &Molecule) -> Result<String> {
    let n = mol.atom_count();
    if n > 999 || mol.bond_count() > 999 {
        return Err(MolkitError::InvalidInput(format!(
            "V2000 holds at most 999 atoms and bonds, '{}' has {n} atoms and {} bonds",
            mol.name,
            mol.bond_count()
        )));
    }
    let conformer = mol.conformers().first();
    let dim = if conformer.is_some() { "3D" } else { "2D" };

    let mut out = String::new();
    // infallible: writing to a String
    let _ = writeln!(out, "{}", mol.name);
    let _ = writeln!(out, "  molkit            {dim}");
    let _ = writeln!(out);
    let _ = writeln!(out, "{n:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000", mol.bond_count());

    for (i, atom) in mol.atoms.iter().enumerate() {
        let [x, y, z] = conformer.map_or([0.0; 3], |c| c.coords[i]);
        let symbol = element_by_number(atom.atomic_number).map_or("*", |e| e.symbol);
        let _ = writeln!(
            out,
            "{x:>10.4}{y:>10.4}{z:>10.4} {symbol:<3} 0  0  0  0  0  0  0  0  0  0  0  0"
        );
    }
    let orders = kekulize(mol)?;
    for (bond, order) in mol.bonds.iter().zip(&orders) {
        let _ = writeln!(
            out,
            "{:>3}{:>3}{:>3}  0",
            bond.atom1 + 1,
            bond.atom2 + 1,
            order.mdl_code()
        );
    }

    let charges: Vec<(usize, i32)> = mol
        .atoms
        .iter()
        .enumerate()
        .filter(|(_, a)| a.formal_charge != 0)
        .map(|(i, a)| (i + 1, i32::from(a.formal_charge)))
        .collect();
    let isotopes: Vec<(usize, i32)> = mol
        .atoms
        .iter()
        .enumerate()
        .filter_map(|(i, a)| a.isotope.map(|m| (i + 1, i32::from(m))))
        .collect();
    write_property(&mut out, "CHG", &charges);
    write_property(&mut out, "ISO", &isotopes);
    out.push_str("M  END\n");
    Ok(out)
}

/// Eight entries per property line.
fn write_property(out: &mut String, tag: &str, entries: &[(usize, i32)]) {
    for chunk in entries.chunks(8) {
        let _ = write!(out, "M  {tag}{:>3}", chunk.len());
        for (idx, value) in chunk {
            let _ = write!(out, " {idx:>3} {value:>3}");
        }
        out.push('\n');
    }
}

/// Write a MOL V2000 file.
pub fn write_mol_file(mol: &Molecule, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let block = write_mol_block(mol)?;
    std::fs::write(path, block).map_err(|e| MolkitError::io_at(path, e))?;
    debug!("wrote MOL file {}", path.display());
    Ok(())
}
