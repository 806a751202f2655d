//! Periodic table data and element lookup.

/// A chemical element from the periodic table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub atomic_number: u8,
    pub symbol: &'static str,
    pub name: &'static str,
    /// Standard atomic weight (g/mol).
    pub atomic_weight: f64,
    /// Valence of the neutral atom used for implicit hydrogen perception.
    pub default_valence: u8,
    /// Largest number of bonds the sanitiser accepts for the neutral atom.
    pub max_bonds: u8,
    /// Single-bond covalent radius (Å), Cordero et al. 2008.
    pub covalent_radius: f64,
}

/// Elements 1–54 (H through Xe).
static ELEMENTS: [Element; 54] = [
    Element { atomic_number: 1, symbol: "H", name: "Hydrogen", atomic_weight: 1.008, default_valence: 1, max_bonds: 1, covalent_radius: 0.31 },
    Element { atomic_number: 2, symbol: "He", name: "Helium", atomic_weight: 4.003, default_valence: 0, max_bonds: 0, covalent_radius: 0.28 },
    Element { atomic_number: 3, symbol: "Li", name: "Lithium", atomic_weight: 6.941, default_valence: 1, max_bonds: 1, covalent_radius: 1.28 },
    Element { atomic_number: 4, symbol: "Be", name: "Beryllium", atomic_weight: 9.012, default_valence: 2, max_bonds: 2, covalent_radius: 0.96 },
    Element { atomic_number: 5, symbol: "B", name: "Boron", atomic_weight: 10.81, default_valence: 3, max_bonds: 4, covalent_radius: 0.84 },
    Element { atomic_number: 6, symbol: "C", name: "Carbon", atomic_weight: 12.011, default_valence: 4, max_bonds: 4, covalent_radius: 0.76 },
    Element { atomic_number: 7, symbol: "N", name: "Nitrogen", atomic_weight: 14.007, default_valence: 3, max_bonds: 4, covalent_radius: 0.71 },
    Element { atomic_number: 8, symbol: "O", name: "Oxygen", atomic_weight: 15.999, default_valence: 2, max_bonds: 3, covalent_radius: 0.66 },
    Element { atomic_number: 9, symbol: "F", name: "Fluorine", atomic_weight: 18.998, default_valence: 1, max_bonds: 1, covalent_radius: 0.57 },
    Element { atomic_number: 10, symbol: "Ne", name: "Neon", atomic_weight: 20.180, default_valence: 0, max_bonds: 0, covalent_radius: 0.58 },
    Element { atomic_number: 11, symbol: "Na", name: "Sodium", atomic_weight: 22.990, default_valence: 1, max_bonds: 1, covalent_radius: 1.66 },
    Element { atomic_number: 12, symbol: "Mg", name: "Magnesium", atomic_weight: 24.305, default_valence: 2, max_bonds: 2, covalent_radius: 1.41 },
    Element { atomic_number: 13, symbol: "Al", name: "Aluminum", atomic_weight: 26.982, default_valence: 3, max_bonds: 4, covalent_radius: 1.21 },
    Element { atomic_number: 14, symbol: "Si", name: "Silicon", atomic_weight: 28.086, default_valence: 4, max_bonds: 4, covalent_radius: 1.11 },
    Element { atomic_number: 15, symbol: "P", name: "Phosphorus", atomic_weight: 30.974, default_valence: 3, max_bonds: 6, covalent_radius: 1.07 },
    Element { atomic_number: 16, symbol: "S", name: "Sulfur", atomic_weight: 32.06, default_valence: 2, max_bonds: 6, covalent_radius: 1.05 },
    Element { atomic_number: 17, symbol: "Cl", name: "Chlorine", atomic_weight: 35.45, default_valence: 1, max_bonds: 1, covalent_radius: 1.02 },
    Element { atomic_number: 18, symbol: "Ar", name: "Argon", atomic_weight: 39.948, default_valence: 0, max_bonds: 0, covalent_radius: 1.06 },
    Element { atomic_number: 19, symbol: "K", name: "Potassium", atomic_weight: 39.098, default_valence: 1, max_bonds: 1, covalent_radius: 2.03 },
    Element { atomic_number: 20, symbol: "Ca", name: "Calcium", atomic_weight: 40.078, default_valence: 2, max_bonds: 2, covalent_radius: 1.76 },
    Element { atomic_number: 21, symbol: "Sc", name: "Scandium", atomic_weight: 44.956, default_valence: 3, max_bonds: 6, covalent_radius: 1.70 },
    Element { atomic_number: 22, symbol: "Ti", name: "Titanium", atomic_weight: 47.867, default_valence: 4, max_bonds: 6, covalent_radius: 1.60 },
    Element { atomic_number: 23, symbol: "V", name: "Vanadium", atomic_weight: 50.942, default_valence: 5, max_bonds: 6, covalent_radius: 1.53 },
    Element { atomic_number: 24, symbol: "Cr", name: "Chromium", atomic_weight: 51.996, default_valence: 3, max_bonds: 6, covalent_radius: 1.39 },
    Element { atomic_number: 25, symbol: "Mn", name: "Manganese", atomic_weight: 54.938, default_valence: 2, max_bonds: 6, covalent_radius: 1.39 },
    Element { atomic_number: 26, symbol: "Fe", name: "Iron", atomic_weight: 55.845, default_valence: 3, max_bonds: 6, covalent_radius: 1.32 },
    Element { atomic_number: 27, symbol: "Co", name: "Cobalt", atomic_weight: 58.933, default_valence: 3, max_bonds: 6, covalent_radius: 1.26 },
    Element { atomic_number: 28, symbol: "Ni", name: "Nickel", atomic_weight: 58.693, default_valence: 2, max_bonds: 6, covalent_radius: 1.24 },
    Element { atomic_number: 29, symbol: "Cu", name: "Copper", atomic_weight: 63.546, default_valence: 2, max_bonds: 6, covalent_radius: 1.32 },
    Element { atomic_number: 30, symbol: "Zn", name: "Zinc", atomic_weight: 65.38, default_valence: 2, max_bonds: 4, covalent_radius: 1.22 },
    Element { atomic_number: 31, symbol: "Ga", name: "Gallium", atomic_weight: 69.723, default_valence: 3, max_bonds: 4, covalent_radius: 1.22 },
    Element { atomic_number: 32, symbol: "Ge", name: "Germanium", atomic_weight: 72.63, default_valence: 4, max_bonds: 4, covalent_radius: 1.20 },
    Element { atomic_number: 33, symbol: "As", name: "Arsenic", atomic_weight: 74.922, default_valence: 3, max_bonds: 5, covalent_radius: 1.19 },
    Element { atomic_number: 34, symbol: "Se", name: "Selenium", atomic_weight: 78.96, default_valence: 2, max_bonds: 6, covalent_radius: 1.20 },
    Element { atomic_number: 35, symbol: "Br", name: "Bromine", atomic_weight: 79.904, default_valence: 1, max_bonds: 1, covalent_radius: 1.20 },
    Element { atomic_number: 36, symbol: "Kr", name: "Krypton", atomic_weight: 83.798, default_valence: 0, max_bonds: 0, covalent_radius: 1.16 },
    Element { atomic_number: 37, symbol: "Rb", name: "Rubidium", atomic_weight: 85.468, default_valence: 1, max_bonds: 1, covalent_radius: 2.20 },
    Element { atomic_number: 38, symbol: "Sr", name: "Strontium", atomic_weight: 87.62, default_valence: 2, max_bonds: 2, covalent_radius: 1.95 },
    Element { atomic_number: 39, symbol: "Y", name: "Yttrium", atomic_weight: 88.906, default_valence: 3, max_bonds: 6, covalent_radius: 1.90 },
    Element { atomic_number: 40, symbol: "Zr", name: "Zirconium", atomic_weight: 91.224, default_valence: 4, max_bonds: 6, covalent_radius: 1.75 },
    Element { atomic_number: 41, symbol: "Nb", name: "Niobium", atomic_weight: 92.906, default_valence: 5, max_bonds: 6, covalent_radius: 1.64 },
    Element { atomic_number: 42, symbol: "Mo", name: "Molybdenum", atomic_weight: 95.95, default_valence: 6, max_bonds: 6, covalent_radius: 1.54 },
    Element { atomic_number: 43, symbol: "Tc", name: "Technetium", atomic_weight: 98.0, default_valence: 7, max_bonds: 7, covalent_radius: 1.47 },
    Element { atomic_number: 44, symbol: "Ru", name: "Ruthenium", atomic_weight: 101.07, default_valence: 4, max_bonds: 8, covalent_radius: 1.46 },
    Element { atomic_number: 45, symbol: "Rh", name: "Rhodium", atomic_weight: 102.906, default_valence: 3, max_bonds: 6, covalent_radius: 1.42 },
    Element { atomic_number: 46, symbol: "Pd", name: "Palladium", atomic_weight: 106.42, default_valence: 2, max_bonds: 6, covalent_radius: 1.39 },
    Element { atomic_number: 47, symbol: "Ag", name: "Silver", atomic_weight: 107.868, default_valence: 1, max_bonds: 4, covalent_radius: 1.45 },
    Element { atomic_number: 48, symbol: "Cd", name: "Cadmium", atomic_weight: 112.414, default_valence: 2, max_bonds: 4, covalent_radius: 1.44 },
    Element { atomic_number: 49, symbol: "In", name: "Indium", atomic_weight: 114.818, default_valence: 3, max_bonds: 4, covalent_radius: 1.42 },
    Element { atomic_number: 50, symbol: "Sn", name: "Tin", atomic_weight: 118.710, default_valence: 4, max_bonds: 4, covalent_radius: 1.39 },
    Element { atomic_number: 51, symbol: "Sb", name: "Antimony", atomic_weight: 121.760, default_valence: 3, max_bonds: 5, covalent_radius: 1.39 },
    Element { atomic_number: 52, symbol: "Te", name: "Tellurium", atomic_weight: 127.60, default_valence: 2, max_bonds: 6, covalent_radius: 1.38 },
    Element { atomic_number: 53, symbol: "I", name: "Iodine", atomic_weight: 126.904, default_valence: 1, max_bonds: 1, covalent_radius: 1.39 },
    Element { atomic_number: 54, symbol: "Xe", name: "Xenon", atomic_weight: 131.293, default_valence: 0, max_bonds: 0, covalent_radius: 1.40 },
];

/// Look up an element by its exact symbol (e.g. "C", "Fe").
pub fn element_by_symbol(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.symbol == symbol)
}

/// Look up an element by symbol ignoring case, as written in PDB element columns ("CL", "FE").
pub fn element_by_symbol_ignore_case(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.symbol.eq_ignore_ascii_case(symbol))
}

/// Look up an element by its atomic number (1-based).
pub fn element_by_number(n: u8) -> Option<&'static Element> {
    if (1..=54).contains(&n) {
        Some(&ELEMENTS[(n - 1) as usize])
    } else {
        None
    }
}

/// Covalent radius for an atomic number, falling back to carbon for unknown elements.
pub fn covalent_radius(atomic_number: u8) -> f64 {
    element_by_number(atomic_number)
        .map(|e| e.covalent_radius)
        .unwrap_or(0.76)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_carbon_by_symbol() {
        let c = element_by_symbol("C").unwrap();
        assert_eq!(c.atomic_number, 6);
        assert_eq!(c.name, "Carbon");
        assert!((c.atomic_weight - 12.011).abs() < 0.001);
        assert_eq!(c.default_valence, 4);
    }

    #[test]
    fn lookup_nitrogen_by_number() {
        let n = element_by_number(7).unwrap();
        assert_eq!(n.symbol, "N");
        assert_eq!(n.max_bonds, 4);
    }

    #[test]
    fn case_insensitive_pdb_symbols() {
        assert_eq!(element_by_symbol_ignore_case("CL").unwrap().atomic_number, 17);
        assert_eq!(element_by_symbol_ignore_case("fe").unwrap().atomic_number, 26);
        // exact lookup stays strict
        assert!(element_by_symbol("CL").is_none());
    }

    #[test]
    fn unknown_returns_none() {
        assert!(element_by_symbol("Zz").is_none());
        assert!(element_by_number(0).is_none());
        assert!(element_by_number(55).is_none());
        assert!((covalent_radius(0) - 0.76).abs() < 1e-12);
    }
}
