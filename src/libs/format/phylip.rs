use std::path::Path;

use super::RawAlignment;
use crate::libs::error::{AlnError, Result};
use crate::libs::seqcode::rm_illegal;

/// `ntaxa nchar` header, then one row per taxon.
///
/// When more than `ntaxa` rows follow, the file is interleaved: the first
/// `ntaxa` rows carry the names and every later row continues row
/// `i % ntaxa`.
pub fn parse(lines: &[String], path: &Path) -> Result<RawAlignment> {
    let mut rows = lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty());

    let header = rows
        .next()
        .ok_or_else(|| AlnError::input_format(path, "missing phylip header"))?;
    let fields: Vec<usize> = header
        .split_whitespace()
        .map(|f| f.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| AlnError::input_format(path, format!("bad phylip header: {}", header)))?;
    let (ntaxa, nchar) = match fields[..] {
        [ntaxa, nchar] => (ntaxa, nchar),
        _ => return Err(AlnError::input_format(path, "phylip header needs two numbers")),
    };

    let body: Vec<&str> = rows.collect();
    if body.len() < ntaxa {
        return Err(AlnError::input_format(
            path,
            format!("header declares {} taxa, found {} rows", ntaxa, body.len()),
        ));
    }

    let mut raw = RawAlignment {
        nchar: Some(nchar),
        ..Default::default()
    };
    for row in &body[..ntaxa] {
        let mut fields = row.split_whitespace();
        let taxon = rm_illegal(fields.next().unwrap_or(""));
        raw.records.push((taxon, fields.collect()));
    }

    if ntaxa > 0 {
        for (i, row) in body[ntaxa..].iter().enumerate() {
            let chunk: String = row.split_whitespace().collect();
            raw.records[i % ntaxa].1.push_str(&chunk);
        }
    }

    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn sequential() {
        let raw = parse(&lines("2 8\nspa  ACGT ACGT\nspb  ACGTTTTT\n"), Path::new("x")).unwrap();
        assert_eq!(raw.nchar, Some(8));
        assert_eq!(raw.records[0], ("spa".to_string(), "ACGTACGT".to_string()));
        assert_eq!(raw.records[1].1, "ACGTTTTT");
    }

    #[test]
    fn interleaved() {
        let raw = parse(
            &lines("2 8\nspa ACGT\nspb TTTT\n\nGGGG\nCCCC\n"),
            Path::new("x"),
        )
        .unwrap();
        assert_eq!(raw.records[0].1, "ACGTGGGG");
        assert_eq!(raw.records[1].1, "TTTTCCCC");
    }

    #[test]
    fn too_few_rows() {
        let err = parse(&lines("3 4\nspa ACGT\n"), Path::new("x")).unwrap_err();
        assert!(matches!(err, AlnError::InputFormat { .. }));
    }
}
