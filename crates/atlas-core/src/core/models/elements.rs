use phf::{Set, phf_set};

static METALS: Set<&'static str> = phf_set! {
    "Li", "Be", "Na", "Mg", "Al", "K", "Ca", "Sc", "Ti", "V", "Cr",
    "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Rb", "Sr", "Y", "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb",
    "Cs", "Ba", "La", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au",
    "Hg", "Tl", "Pb", "Bi", "Fr", "Ra", "Ac",
};

static SUPERALLOY_METALS: Set<&'static str> = phf_set! {
    "Ni", "Co", "Cr", "W", "Mo", "Re", "Ta", "Nb", "Ti", "Al",
};

static SEMICONDUCTOR_ELEMENTS: Set<&'static str> = phf_set! {
    "Si", "Ge", "Ga", "As", "In", "Sb", "Te",
};

static ACID_ELEMENTS: Set<&'static str> = phf_set! {
    "S", "P", "N", "Cl", "Br", "I",
};

static NOBLE_GASES: Set<&'static str> = phf_set! {
    "He", "Ne", "Ar", "Kr", "Xe", "Rn",
};

static KNOWN_SYMBOLS: Set<&'static str> = phf_set! {
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn",
    "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd",
    "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th",
    "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm",
    "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds",
    "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
};

pub fn is_metal(symbol: &str) -> bool {
    METALS.contains(symbol)
}

pub fn is_superalloy_metal(symbol: &str) -> bool {
    SUPERALLOY_METALS.contains(symbol)
}

pub fn is_semiconductor_element(symbol: &str) -> bool {
    SEMICONDUCTOR_ELEMENTS.contains(symbol)
}

pub fn is_acid_element(symbol: &str) -> bool {
    ACID_ELEMENTS.contains(symbol)
}

pub fn is_noble_gas(symbol: &str) -> bool {
    NOBLE_GASES.contains(symbol)
}

/// Returns `true` for the 118 IUPAC element symbols (case-sensitive).
pub fn is_known_symbol(symbol: &str) -> bool {
    KNOWN_SYMBOLS.contains(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_metal_recognizes_common_metals_and_rejects_nonmetals() {
        assert!(is_metal("Fe"));
        assert!(is_metal("Li"));
        assert!(is_metal("Bi"));
        assert!(!is_metal("C"));
        assert!(!is_metal("Si"));
        assert!(!is_metal("Ar"));
    }

    #[test]
    fn superalloy_metals_are_all_metals() {
        for symbol in SUPERALLOY_METALS.iter() {
            assert!(is_metal(symbol), "{symbol} should be a metal");
        }
    }

    #[test]
    fn element_tables_are_case_sensitive() {
        assert!(!is_metal("fe"));
        assert!(!is_noble_gas("AR"));
        assert!(!is_known_symbol("co"));
        assert!(is_known_symbol("Co"));
    }

    #[test]
    fn known_symbol_table_covers_the_periodic_table() {
        assert_eq!(KNOWN_SYMBOLS.len(), 118);
        assert!(is_known_symbol("Og"));
        assert!(!is_known_symbol("Xx"));
    }
}
