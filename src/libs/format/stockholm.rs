use std::path::Path;

use super::RawAlignment;
use crate::libs::error::Result;
use crate::libs::seqcode::rm_illegal;

/// `# STOCKHOLM` header, `name/range sequence` rows, `//` terminator
pub fn parse(lines: &[String], _path: &Path) -> Result<RawAlignment> {
    let mut raw = RawAlignment::default();

    for line in lines.iter().skip(1) {
        let line = line.trim();
        if line.starts_with('#') || line.is_empty() {
            continue;
        }
        if line == "//" {
            break;
        }

        let mut fields = line.split_whitespace();
        let name = fields.next().unwrap_or("");
        let taxon = rm_illegal(name.split('/').next().unwrap_or(name));
        let seq = fields.next().unwrap_or("").to_string();
        raw.records.push((taxon, seq));
    }

    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows() {
        let lines: Vec<String> =
            "# STOCKHOLM 1.0\n#=GF ID x\nspa/1-8 ACGTACGT\nspb/3-10 ACGTACG-\n//\nspc AAAA\n"
                .lines()
                .map(|l| l.to_string())
                .collect();
        let raw = parse(&lines, Path::new("x")).unwrap();

        assert_eq!(raw.records.len(), 2);
        assert_eq!(raw.records[1], ("spb".to_string(), "ACGTACG-".to_string()));
    }
}
