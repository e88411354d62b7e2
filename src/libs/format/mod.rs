//! Line-oriented parsers for the supported alignment formats.
//!
//! Every parser produces [`RawAlignment`] records; [`read_alignment`] then
//! applies the checks shared by all formats.

pub mod fasta;
pub mod loci;
pub mod nexus;
pub mod phylip;
pub mod stockholm;

use std::path::Path;

use indexmap::IndexMap;

use crate::libs::error::{AlnError, Result};
use crate::libs::partition::{Charset, NewPartition, Partitions};
use crate::libs::seqcode::{guess_code, SequenceCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum InputFormat {
    Fasta,
    Phylip,
    Nexus,
    Stockholm,
    Loci,
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InputFormat::Fasta => "fasta",
            InputFormat::Phylip => "phylip",
            InputFormat::Nexus => "nexus",
            InputFormat::Stockholm => "stockholm",
            InputFormat::Loci => "loci",
        };
        write!(f, "{}", name)
    }
}

/// Output of one format parser, before validation
#[derive(Debug, Default)]
pub struct RawAlignment {
    pub records: Vec<(String, String)>,
    /// Site count declared in a header
    pub nchar: Option<usize>,
    /// Set by parsers that need the missing symbol while reading
    pub code: Option<SequenceCode>,
    /// `charset` lines found in the file
    pub charsets: Vec<(usize, String)>,
    /// `lset`/`prset` lines found in the file
    pub model_lines: Vec<String>,
    /// Per-block lengths of multi-locus files
    pub loci: Vec<usize>,
}

/// A validated alignment ready to be stored
#[derive(Debug)]
pub struct ParsedAlignment {
    pub format: InputFormat,
    pub code: SequenceCode,
    pub records: Vec<(String, String)>,
    pub locus_length: usize,
    pub partitions: Partitions,
}

/// Guesses the format from the leading lines of a file
pub fn detect_format(lines: &[String], path: &Path) -> Result<InputFormat> {
    let mut non_empty = lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty());
    let first = non_empty
        .next()
        .ok_or_else(|| AlnError::input_format(path, "file is empty"))?;

    if first.to_uppercase().starts_with("#NEXUS") {
        return Ok(InputFormat::Nexus);
    }
    if first.to_uppercase().starts_with("# STOCKHOLM") || first.to_uppercase().starts_with("#STOCKHOLM") {
        return Ok(InputFormat::Stockholm);
    }
    if first.starts_with('>') {
        return match non_empty.next() {
            Some(next) if next.starts_with('>') => Ok(InputFormat::Loci),
            _ => Ok(InputFormat::Fasta),
        };
    }

    let fields: Vec<&str> = first.split_whitespace().collect();
    if fields.len() == 2 && fields.iter().all(|f| f.parse::<usize>().is_ok()) {
        return Ok(InputFormat::Phylip);
    }
    if lines.iter().any(|l| l.trim_start().starts_with("//")) {
        return Ok(InputFormat::Loci);
    }

    Err(AlnError::input_format(path, "unrecognized header"))
}

/// Reads, parses and validates one alignment file
pub fn read_alignment(path: &Path) -> Result<ParsedAlignment> {
    let lines = crate::libs::io::read_lines(path)?;
    parse_lines(&lines, path)
}

pub fn parse_lines(lines: &[String], path: &Path) -> Result<ParsedAlignment> {
    let format = detect_format(lines, path)?;
    log::debug!("{}: parsing as {}", path.display(), format);

    let raw = match format {
        InputFormat::Fasta => fasta::parse(lines, path)?,
        InputFormat::Phylip => phylip::parse(lines, path)?,
        InputFormat::Nexus => nexus::parse(lines, path)?,
        InputFormat::Stockholm => stockholm::parse(lines, path)?,
        InputFormat::Loci => loci::parse(lines, path)?,
    };

    finish(raw, format, path)
}

fn empty(path: &Path) -> AlnError {
    AlnError::EmptyAlignment(path.display().to_string())
}

/// Shared checks: molecule type, case, lengths and duplicates
fn finish(raw: RawAlignment, format: InputFormat, path: &Path) -> Result<ParsedAlignment> {
    if raw.records.is_empty() {
        return Err(empty(path));
    }
    let code = match raw.code {
        Some(code) => code,
        None => guess_code(&raw.records[0].1).ok_or_else(|| empty(path))?,
    };

    let records: Vec<(String, String)> = raw
        .records
        .into_iter()
        .map(|(taxon, seq)| {
            let seq = seq
                .chars()
                .map(|c| if c == '?' { code.missing } else { c.to_ascii_lowercase() })
                .collect();
            (taxon, seq)
        })
        .collect();

    let locus_length = records[0].1.len();
    if let Some((taxon, seq)) = records.iter().find(|(_, s)| s.len() != locus_length) {
        return Err(AlnError::unequal_length(
            path,
            format!(
                "{} has {} sites, {} has {}",
                records[0].0,
                locus_length,
                taxon,
                seq.len()
            ),
        ));
    }
    if let Some(nchar) = raw.nchar {
        if nchar != locus_length {
            return Err(AlnError::unequal_length(
                path,
                format!("header declares {} sites, found {}", nchar, locus_length),
            ));
        }
    }
    if locus_length == 0 {
        return Err(empty(path));
    }

    let mut seen: IndexMap<&str, usize> = IndexMap::new();
    for (taxon, _) in &records {
        *seen.entry(taxon.as_str()).or_insert(0) += 1;
    }
    let duplicated: Vec<String> = seen
        .iter()
        .filter(|(_, n)| **n > 1)
        .map(|(t, _)| t.to_string())
        .collect();
    if !duplicated.is_empty() {
        return Err(AlnError::DuplicateTaxon {
            path: path.to_path_buf(),
            taxa: duplicated,
        });
    }

    let partitions = build_partitions(&raw.charsets, &raw.model_lines, &raw.loci, locus_length, path)?;

    Ok(ParsedAlignment {
        format,
        code,
        records,
        locus_length,
        partitions,
    })
}

/// Partition name of a file: its stem
pub fn locus_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn build_partitions(
    charset_lines: &[(usize, String)],
    model_lines: &[String],
    loci: &[usize],
    locus_length: usize,
    path: &Path,
) -> Result<Partitions> {
    let file = path.display().to_string();
    let mut partitions = Partitions::new();
    partitions.set_length(locus_length);

    if !loci.is_empty() {
        for (i, len) in loci.iter().enumerate() {
            partitions.add_partition(
                NewPartition::length(&format!("locus_{}", i + 1), *len).file(&file),
            )?;
        }
        return Ok(partitions);
    }

    let mut charsets: Vec<Charset> = vec![];
    for (line, text) in charset_lines {
        if let Some(c) =
            crate::libs::partition::reader::parse_charset_line(text, locus_length, *line)?
        {
            charsets.push(c);
        }
    }

    if charsets.is_empty() {
        partitions.add_partition(NewPartition::length(&locus_name(path), locus_length).file(&file))?;
    } else {
        partitions
            .alignments_range
            .insert(file.clone(), (0, locus_length - 1));
        partitions.add_charsets(charsets)?;
        if partitions.counter != locus_length {
            return Err(AlnError::bad_partition(
                charset_lines.last().map_or(0, |(l, _)| *l),
                format!(
                    "charsets cover {} of {} sites",
                    partitions.counter, locus_length
                ),
            ));
        }
    }
    for line in model_lines {
        partitions.parse_nexus_model(line);
    }

    Ok(partitions)
}
