use std::path::Path;

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use super::{NewPartition, Partitions};
use crate::libs::error::{AlnError, Result};

lazy_static! {
    static ref RE_RAXML: Regex = Regex::new(
        r"^\s*([^,]+?)\s*,\s*([^=\s]+)\s*=\s*(\d+)\s*-\s*(\d+|\.)\s*(?:[\\/](\d+))?\s*;?\s*$"
    )
    .unwrap();
    static ref RE_CHARSET: Regex = RegexBuilder::new(
        r"^\s*charset\s+([^=\s]+)\s*=\s*(\d+)\s*-\s*(\d+|\.)\s*(?:[\\/](\d+))?\s*;?\s*$"
    )
    .case_insensitive(true)
    .build()
    .unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionFormat {
    /// `MODEL, name = 1-100`
    Raxml,
    /// `charset name = 1-100;`
    Nexus,
}

/// One parsed partition line, 0-based inclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charset {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub stride: Option<usize>,
    pub model: Option<String>,
    /// 1-based source line
    pub line: usize,
}

impl PartitionFormat {
    /// `charset` as the first word of the first non-empty line means NEXUS
    pub fn detect(lines: &[String]) -> Self {
        let first = lines
            .iter()
            .find(|l| !l.trim().is_empty())
            .and_then(|l| l.split_whitespace().next())
            .unwrap_or("");
        if first.eq_ignore_ascii_case("charset") {
            PartitionFormat::Nexus
        } else {
            PartitionFormat::Raxml
        }
    }
}

fn parse_end(field: &str, length: usize, line: usize) -> Result<usize> {
    if field == "." {
        if length == 0 {
            return Err(AlnError::bad_partition(
                line,
                "the locus length must be known to use '.' as the end of a range",
            ));
        }
        return Ok(length);
    }
    field
        .parse::<usize>()
        .map_err(|_| AlnError::bad_partition(line, format!("bad coordinate {}", field)))
}

fn to_charset(
    caps: &regex::Captures,
    name_idx: usize,
    model: Option<String>,
    length: usize,
    line: usize,
) -> Result<Charset> {
    let name = caps[name_idx].to_string();
    let start: usize = caps[name_idx + 1]
        .parse()
        .map_err(|_| AlnError::bad_partition(line, "bad start coordinate"))?;
    let end = parse_end(&caps[name_idx + 2], length, line)?;
    if start == 0 || end < start {
        return Err(AlnError::bad_partition(
            line,
            format!("invalid range {}-{}", start, end),
        ));
    }
    let stride = match caps.get(name_idx + 3) {
        Some(m) => Some(
            m.as_str()
                .parse::<usize>()
                .map_err(|_| AlnError::bad_partition(line, "bad stride"))?,
        ),
        None => None,
    };

    Ok(Charset {
        name,
        start: start - 1,
        end: end - 1,
        stride,
        model,
        line,
    })
}

/// Parses a RAxML partition line. `length` resolves `.`; 0 means unknown.
pub fn parse_raxml_line(text: &str, length: usize, line: usize) -> Result<Charset> {
    let caps = RE_RAXML
        .captures(text)
        .ok_or_else(|| AlnError::bad_partition(line, text.trim().to_string()))?;
    let model = caps[1].to_string();

    to_charset(&caps, 2, Some(model), length, line)
}

/// Parses a `charset` line. Lines of other commands yield `None`.
pub fn parse_charset_line(text: &str, length: usize, line: usize) -> Result<Option<Charset>> {
    let is_charset = text
        .split_whitespace()
        .next()
        .map_or(false, |w| w.eq_ignore_ascii_case("charset"));
    if !is_charset {
        return Ok(None);
    }
    let caps = RE_CHARSET
        .captures(text)
        .ok_or_else(|| AlnError::bad_partition(line, text.trim().to_string()))?;

    to_charset(&caps, 1, None, length, line).map(Some)
}

impl Partitions {
    /// Reads a partition file in either dialect. Entries may come in any
    /// order; they are sorted by start before being added.
    pub fn read_from_file(&mut self, path: &Path) -> Result<()> {
        let lines = crate::libs::io::read_lines(path)?;
        self.read_from_lines(&lines)
    }

    pub fn read_from_lines(&mut self, lines: &[String]) -> Result<()> {
        let length = self.partition_length;
        self.reset(true);
        self.partition_length = length;

        let format = PartitionFormat::detect(lines);
        let mut charsets = vec![];
        for (i, text) in lines.iter().enumerate() {
            if text.trim().is_empty() || text.trim_start().starts_with('#') {
                continue;
            }
            match format {
                PartitionFormat::Raxml => charsets.push(parse_raxml_line(text, length, i + 1)?),
                PartitionFormat::Nexus => {
                    if let Some(c) = parse_charset_line(text, length, i + 1)? {
                        charsets.push(c);
                    }
                }
            }
        }

        self.add_charsets(charsets)?;
        self.format = Some(format);

        Ok(())
    }

    /// Adds parsed entries in start order and rejects gaps at the end
    pub fn add_charsets(&mut self, mut charsets: Vec<Charset>) -> Result<()> {
        charsets.sort_by_key(|c| c.start);

        for c in charsets {
            let mut name = c.name.clone();
            // the first of three codon positions names the whole partition
            if c.stride == Some(3) && c.start >= self.counter {
                if let Some(base) = name.strip_suffix("_1") {
                    name = base.to_string();
                }
            }

            let mut new = NewPartition::range(&name, c.start, c.end);
            if let Some(file) = self.file_at(c.start) {
                new = new.file(&file);
            }
            if let Some(model) = &c.model {
                new = new.model(super::Model {
                    params: vec![super::model::mrbayes_params(model).unwrap_or_default()],
                    names: vec![Some(model.clone())],
                    links: vec![],
                });
            }

            self.add_partition(new).map_err(|e| match e {
                AlnError::PartitionConsistency(msg) | AlnError::PartitionNameConflict(msg) => {
                    AlnError::bad_partition(c.line, msg)
                }
                other => other,
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn raxml_unsorted() {
        let mut parts = Partitions::new();
        parts
            .read_from_lines(&lines(
                "DNA, gene2 = 11-15\nDNA, gene1 = 1-10\n\nDNA, gene3 = 16-30\n",
            ))
            .unwrap();

        let ranges: Vec<_> = parts.iter().map(|p| (p.name.as_str(), p.range)).collect();
        assert_eq!(
            ranges,
            vec![("gene1", (0, 9)), ("gene2", (10, 14)), ("gene3", (15, 29))]
        );
        assert_eq!(parts.counter, 30);
        assert_eq!(parts.format, Some(PartitionFormat::Raxml));
        assert_eq!(
            parts.get("gene1").unwrap().model.names[0].as_deref(),
            Some("DNA")
        );
    }

    #[test]
    fn raxml_dot_notation() {
        let mut parts = Partitions::new();
        let err = parts
            .read_from_lines(&lines("WAG, a = 1-10\nWAG, b = 11-.\n"))
            .unwrap_err();
        assert!(matches!(err, AlnError::InvalidPartitionFile { line: 2, .. }));

        let mut parts = Partitions::new();
        parts.set_length(25);
        parts
            .read_from_lines(&lines("WAG, a = 1-10\nWAG, b = 11-.\n"))
            .unwrap();
        assert_eq!(parts.get("b").unwrap().range, (10, 24));
    }

    #[test]
    fn bad_line_number() {
        let mut parts = Partitions::new();
        let err = parts
            .read_from_lines(&lines("DNA, a = 1-10\n\nDNA b 11-20\n"))
            .unwrap_err();
        assert!(matches!(err, AlnError::InvalidPartitionFile { line: 3, .. }));

        let err = parts
            .read_from_lines(&lines("DNA, a = 1-10\nDNA, b = 5-20\n"))
            .unwrap_err();
        assert!(matches!(err, AlnError::InvalidPartitionFile { line: 2, .. }));
    }

    #[test]
    fn nexus_codon() {
        let mut parts = Partitions::new();
        parts
            .read_from_lines(&lines(
                "charset cds_2 = 2-9\\3;\ncharset cds_1 = 1-9\\3;\ncharset cds_3 = 3-9\\3;\nbegin foo;\ncharset utr = 10-12;\n",
            ))
            .unwrap();

        assert_eq!(parts.format, Some(PartitionFormat::Nexus));
        assert_eq!(parts.len(), 2);
        assert_eq!(parts.get("cds").unwrap().codon, Some([0, 1, 2]));
        assert_eq!(parts.get("utr").unwrap().range, (9, 11));
    }

    #[test]
    fn detect_dialect() {
        assert_eq!(
            PartitionFormat::detect(&lines("\n  CHARSET a = 1-2;")),
            PartitionFormat::Nexus
        );
        assert_eq!(
            PartitionFormat::detect(&lines("LG, a = 1-2")),
            PartitionFormat::Raxml
        );
    }
}
