use std::path::Path;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use super::RawAlignment;
use crate::libs::error::{AlnError, Result};
use crate::libs::seqcode::rm_illegal;

lazy_static! {
    static ref RE_NCHAR: Regex = RegexBuilder::new(r"nchar\s*=\s*(\d+)")
        .case_insensitive(true)
        .build()
        .unwrap();
    static ref RE_INTERLEAVE: Regex = RegexBuilder::new(r"\binterleave(?:\s*=\s*(\w+))?")
        .case_insensitive(true)
        .build()
        .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Matrix,
    Trailer,
}

/// Splits a matrix row into the taxon and its sequence chunk
fn split_row(row: &str) -> (String, String) {
    if let Some(rest) = row.strip_prefix('\'') {
        if let Some(end) = rest.find('\'') {
            let name = &rest[..end];
            let seq: String = rest[end + 1..].split_whitespace().collect();
            return (rm_illegal(name), seq);
        }
    }
    let mut fields = row.split_whitespace();
    let name = fields.next().unwrap_or("");
    (rm_illegal(name), fields.collect())
}

/// `#NEXUS` data block. `interleave=yes` accumulates matrix rows by taxon;
/// otherwise each row is one taxon. `charset`, `lset` and `prset` lines are
/// kept for the partition model.
pub fn parse(lines: &[String], path: &Path) -> Result<RawAlignment> {
    let mut raw = RawAlignment::default();
    let mut state = State::Header;
    let mut interleave = false;
    let mut blocks: IndexMap<String, String> = IndexMap::new();

    for (i, line) in lines.iter().enumerate() {
        let text = line.trim();
        match state {
            State::Header => {
                if let Some(caps) = RE_NCHAR.captures(text) {
                    raw.nchar = caps[1].parse().ok();
                }
                if text.to_lowercase().starts_with("format") {
                    if let Some(caps) = RE_INTERLEAVE.captures(text) {
                        interleave = caps
                            .get(1)
                            .map_or(true, |v| v.as_str().eq_ignore_ascii_case("yes"));
                    }
                }
                if text.eq_ignore_ascii_case("matrix") {
                    state = State::Matrix;
                }
            }
            State::Matrix => {
                if text.is_empty() || text.starts_with('[') {
                    continue;
                }
                let (row, closes) = match text.strip_suffix(';') {
                    Some(row) => (row.trim(), true),
                    None => (text, false),
                };
                if !row.is_empty() {
                    let (taxon, seq) = split_row(row);
                    if interleave {
                        blocks.entry(taxon).or_default().push_str(&seq);
                    } else {
                        raw.records.push((taxon, seq));
                    }
                }
                if closes {
                    state = State::Trailer;
                }
            }
            State::Trailer => {
                let lower = text.to_lowercase();
                if lower.starts_with("charset") {
                    raw.charsets.push((i + 1, text.to_string()));
                } else if lower.starts_with("lset") || lower.starts_with("prset") {
                    raw.model_lines.push(text.to_string());
                }
            }
        }
    }

    if interleave {
        raw.records = blocks.into_iter().collect();
    }

    match state {
        State::Header => Err(AlnError::input_format(path, "no matrix block")),
        State::Matrix if raw.records.is_empty() => {
            Err(AlnError::EmptyAlignment(path.display().to_string()))
        }
        State::Matrix => Err(AlnError::unequal_length(
            path,
            "matrix block is not terminated",
        )),
        State::Trailer => Ok(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.to_string()).collect()
    }

    const SIMPLE: &str = "#NEXUS

Begin data;
	dimensions ntax=2 nchar=6 ;
	format datatype=DNA interleave=no gap=- missing=n ;
	matrix
spa   ACGTAC
'sp b'   ACG-AC
;
	end;
begin mrbayes;
	charset one = 1-3;
	charset two = 4-6;
	lset applyto=(1) nst=6;
end;
";

    #[test]
    fn sequential() {
        let raw = parse(&lines(SIMPLE), Path::new("x.nex")).unwrap();
        assert_eq!(raw.nchar, Some(6));
        assert_eq!(raw.records[1], ("sp b".to_string(), "ACG-AC".to_string()));
        assert_eq!(raw.charsets.len(), 2);
        assert_eq!(raw.charsets[0].0, 12);
        assert_eq!(raw.model_lines, vec!["lset applyto=(1) nst=6;"]);
    }

    #[test]
    fn interleaved() {
        let text = "#NEXUS\nbegin data;\ndimensions ntax=2 nchar=8;\nformat datatype=dna interleave=yes;\nmatrix\nspa ACGT\nspb TTTT\n\nspa GGGG\nspb CCCC;\nend;\n";
        let raw = parse(&lines(text), Path::new("x.nex")).unwrap();
        assert_eq!(raw.records[0], ("spa".to_string(), "ACGTGGGG".to_string()));
        assert_eq!(raw.records[1].1, "TTTTCCCC");
    }

    #[test]
    fn unterminated() {
        let text = "#NEXUS\nbegin data;\nmatrix\nspa ACGT\nspb ACGT\n";
        let err = parse(&lines(text), Path::new("x.nex")).unwrap_err();
        assert!(err.is_unequal_length());

        let err = parse(&lines("#NEXUS\nmatrix\n"), Path::new("x.nex")).unwrap_err();
        assert!(matches!(err, AlnError::EmptyAlignment(_)));
    }
}
