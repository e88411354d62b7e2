use std::collections::{BTreeSet, HashMap};

use lazy_static::lazy_static;

/// Gap symbol shared by every format
pub const GAP: char = '-';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum SequenceKind {
    Dna,
    Protein,
}

impl std::fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceKind::Dna => write!(f, "DNA"),
            SequenceKind::Protein => write!(f, "Protein"),
        }
    }
}

/// Molecule type and the symbol used for missing data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct SequenceCode {
    pub kind: SequenceKind,
    pub missing: char,
}

impl SequenceCode {
    pub fn dna() -> Self {
        Self {
            kind: SequenceKind::Dna,
            missing: 'n',
        }
    }

    pub fn protein() -> Self {
        Self {
            kind: SequenceKind::Protein,
            missing: 'x',
        }
    }

    /// Gap or missing
    pub fn is_blank(&self, c: char) -> bool {
        c == GAP || c == self.missing
    }
}

/// Guesses the molecule type from one sequence.
///
/// Gaps are ignored. When more than 90% of the remaining characters are
/// `A`, `T`, `G`, `C` or `N` the sequence is DNA.
///
/// ```
/// use alnkit::libs::seqcode::{guess_code, SequenceKind};
/// assert_eq!(guess_code("AT--GCNN").unwrap().kind, SequenceKind::Dna);
/// assert_eq!(guess_code("MKVLAAGIL").unwrap().kind, SequenceKind::Protein);
/// assert!(guess_code("----").is_none());
/// ```
pub fn guess_code(seq: &str) -> Option<SequenceCode> {
    let residues: Vec<char> = seq
        .chars()
        .filter(|c| *c != GAP)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if residues.is_empty() {
        return None;
    }

    let nucl = residues
        .iter()
        .filter(|c| matches!(c, 'A' | 'T' | 'G' | 'C' | 'N'))
        .count();

    if nucl as f64 / residues.len() as f64 > 0.9 {
        Some(SequenceCode::dna())
    } else {
        Some(SequenceCode::protein())
    }
}

/// Characters that break tree and partition formats
const ILLEGAL: &[char] = &[':', ',', ')', '(', ';', '[', ']', '"', '\''];

/// Removes illegal characters from a taxon name
///
/// ```
/// assert_eq!(alnkit::libs::seqcode::rm_illegal("sp:A,(1);[x]\"'"), "spA1x");
/// ```
pub fn rm_illegal(name: &str) -> String {
    name.chars().filter(|c| !ILLEGAL.contains(c)).collect()
}

lazy_static! {
    /// Sorted residue set to IUPAC ambiguity code
    static ref IUPAC: HashMap<&'static str, char> = {
        let mut m = HashMap::new();
        m.insert("ag", 'r');
        m.insert("ct", 'y');
        m.insert("cg", 's');
        m.insert("at", 'w');
        m.insert("gt", 'k');
        m.insert("ac", 'm');
        m.insert("cgt", 'b');
        m.insert("agt", 'd');
        m.insert("act", 'h');
        m.insert("acg", 'v');
        m.insert("acgt", 'n');
        m
    };

    /// IUPAC ambiguity code to the bases it stands for
    static ref IUPAC_REV: HashMap<char, &'static str> =
        IUPAC.iter().map(|(k, v)| (*v, *k)).collect();
}

/// Ambiguity code of a residue set. Symbols that are already ambiguous are
/// expanded to their bases first.
///
/// ```
/// use alnkit::libs::seqcode::iupac_code;
/// assert_eq!(iupac_code(&['a', 'g']), Some('r'));
/// assert_eq!(iupac_code(&['r', 'c']), Some('v'));
/// assert_eq!(iupac_code(&['a']), Some('a'));
/// assert_eq!(iupac_code(&['a', 'z']), None);
/// ```
pub fn iupac_code(residues: &[char]) -> Option<char> {
    let mut bases = BTreeSet::new();
    for c in residues {
        let c = c.to_ascii_lowercase();
        match IUPAC_REV.get(&c) {
            Some(expanded) => bases.extend(expanded.chars()),
            None => {
                bases.insert(c);
            }
        }
    }

    if bases.len() == 1 {
        return bases.into_iter().next();
    }
    let key: String = bases.into_iter().collect();
    IUPAC.get(key.as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_threshold() {
        // 9 of 10 nucleotides is not above 0.9
        assert_eq!(
            guess_code("ATGCATGCAE").unwrap().kind,
            SequenceKind::Protein
        );
        assert_eq!(guess_code("atgcatgcatgcatgcatgcatgcatgcatgcae").unwrap().kind, SequenceKind::Dna);
        assert_eq!(guess_code("nnnn").unwrap().missing, 'n');
        assert_eq!(guess_code("mkvl").unwrap().missing, 'x');
    }

    #[test]
    fn ambiguity() {
        assert_eq!(iupac_code(&['a', 'c', 'g', 't']), Some('n'));
        assert_eq!(iupac_code(&['y', 'r']), Some('n'));
        assert_eq!(iupac_code(&['k', 't']), Some('k'));
        assert_eq!(iupac_code(&['c', 'g', 't']), Some('b'));
    }

    #[test]
    fn blank() {
        let code = SequenceCode::dna();
        assert!(code.is_blank('-'));
        assert!(code.is_blank('n'));
        assert!(!code.is_blank('a'));
    }
}
