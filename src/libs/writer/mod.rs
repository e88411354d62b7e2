//! Output formats.
//!
//! Every format renders from a [`RenderContext`] into any `Write`. Files are
//! written through [`AtomicFile`], so a failed render leaves nothing behind.

mod ima2;
mod nexus;
mod text;

use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::libs::error::{AlnError, Result};
use crate::libs::io::AtomicFile;
use crate::libs::partition::Partitions;
use crate::libs::seqcode::{SequenceCode, SequenceKind};

pub use ima2::Ima2Options;

/// Width of a wrapped sequence line
pub const LINE_WIDTH: usize = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Fasta,
    Phylip,
    Nexus,
    Stockholm,
    Gphocs,
    Mcmctree,
    Ima2,
    Snapp,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 8] = [
        OutputFormat::Fasta,
        OutputFormat::Phylip,
        OutputFormat::Nexus,
        OutputFormat::Stockholm,
        OutputFormat::Gphocs,
        OutputFormat::Mcmctree,
        OutputFormat::Ima2,
        OutputFormat::Snapp,
    ];

    /// Appended to the output stem
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Fasta => ".fas",
            OutputFormat::Phylip => ".phy",
            OutputFormat::Nexus => ".nex",
            OutputFormat::Stockholm => ".stockholm",
            OutputFormat::Gphocs => ".txt",
            OutputFormat::Mcmctree => "_mcmctree.phy",
            OutputFormat::Ima2 => ".txt",
            OutputFormat::Snapp => "_snapp.nex",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Fasta => "fasta",
            OutputFormat::Phylip => "phylip",
            OutputFormat::Nexus => "nexus",
            OutputFormat::Stockholm => "stockholm",
            OutputFormat::Gphocs => "gphocs",
            OutputFormat::Mcmctree => "mcmctree",
            OutputFormat::Ima2 => "ima2",
            OutputFormat::Snapp => "snapp",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        OutputFormat::ALL
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown output format: {}", s))
    }
}

/// Format specific switches
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Wrap sequences in blocks of 90 columns
    pub interleave: bool,
    /// Truncate phylip names to this many characters
    pub phylip_truncate: Option<usize>,
    /// Model of the phylip partition file; `GTR` or `LG` when unset
    pub model_phylip: Option<String>,
    pub outgroup: Vec<String>,
    /// Write charsets into nexus files
    pub use_charset: bool,
    /// Write the `.partFile` next to phylip files
    pub partition_file: bool,
    pub ima2: Option<Ima2Options>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            interleave: false,
            phylip_truncate: None,
            model_phylip: None,
            outgroup: vec![],
            use_charset: true,
            partition_file: true,
            ima2: None,
        }
    }
}

/// Everything a format needs to render one alignment
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Locus name used by single-locus formats
    pub name: &'a str,
    pub rows: &'a [(String, String)],
    pub partitions: &'a Partitions,
    pub code: SequenceCode,
    pub locus_length: usize,
    /// Gap-coded columns, 0-based inclusive
    pub restriction_range: Option<(usize, usize)>,
}

impl RenderContext<'_> {
    /// `(name, start, end)` of every locus. A single partition gives the
    /// whole alignment under the context name.
    pub fn loci(&self) -> Vec<(String, usize, usize)> {
        let end = self.restriction_range.map_or(self.locus_length, |(s, _)| s);
        if self.partitions.is_empty() || self.partitions.len() == 1 {
            return vec![(self.name.to_string(), 0, end.saturating_sub(1))];
        }
        self.partitions
            .iter()
            .map(|p| (p.name.clone(), p.range.0, p.range.1))
            .collect()
    }

    pub fn is_partitioned(&self) -> bool {
        !self.partitions.is_empty() && !self.partitions.is_single()
    }
}

/// Upper case slice `start..=end`
pub(crate) fn slice_upper(seq: &str, start: usize, end: usize) -> String {
    seq.get(start..=end).unwrap_or("").to_uppercase()
}

/// Renders one format into `writer`
pub fn render<W: Write>(
    format: OutputFormat,
    ctx: &RenderContext,
    opts: &WriteOptions,
    writer: &mut W,
) -> Result<()> {
    if ctx.restriction_range.is_some() && format != OutputFormat::Nexus {
        return Err(AlnError::UnsupportedFormat {
            format: format.to_string(),
            message: "alignments with coded gaps can only be written as nexus".to_string(),
        });
    }

    match format {
        OutputFormat::Fasta => text::fasta(ctx, opts, writer)?,
        OutputFormat::Phylip => text::phylip(ctx, opts, writer)?,
        OutputFormat::Stockholm => text::stockholm(ctx, writer)?,
        OutputFormat::Gphocs => text::gphocs(ctx, writer)?,
        OutputFormat::Mcmctree => text::mcmctree(ctx, writer)?,
        OutputFormat::Nexus => nexus::nexus(ctx, opts, writer)?,
        OutputFormat::Snapp => {
            if ctx.code.kind != SequenceKind::Dna {
                return Err(AlnError::UnsupportedFormat {
                    format: format.to_string(),
                    message: "snapp needs nucleotide data".to_string(),
                });
            }
            nexus::snapp(ctx, writer)?
        }
        OutputFormat::Ima2 => {
            let ima2 = opts.ima2.as_ref().ok_or_else(|| AlnError::UnsupportedFormat {
                format: format.to_string(),
                message: "population assignments are required".to_string(),
            })?;
            ima2::ima2(ctx, ima2, writer)?
        }
    }

    Ok(())
}

/// Writes `{stem}{extension}` and, for partitioned phylip output, the
/// RAxML partition file `{stem}.partFile`. Returns the written paths.
pub fn write_file(
    format: OutputFormat,
    ctx: &RenderContext,
    opts: &WriteOptions,
    stem: &Path,
) -> Result<Vec<PathBuf>> {
    let mut dest = stem.as_os_str().to_owned();
    dest.push(format.extension());
    let dest = PathBuf::from(dest);

    let mut files = vec![];
    let mut file = AtomicFile::create(&dest)?;
    render(format, ctx, opts, &mut file)?;
    files.push(file);

    if format == OutputFormat::Phylip && opts.partition_file && ctx.is_partitioned() {
        let mut part = stem.as_os_str().to_owned();
        part.push(".partFile");
        let mut file = AtomicFile::create(Path::new(&part))?;
        let model = match (&opts.model_phylip, ctx.code.kind) {
            (Some(m), _) => m.as_str(),
            (None, SequenceKind::Dna) => "GTR",
            (None, SequenceKind::Protein) => "LG",
        };
        ctx.partitions.write_raxml(&mut file, model)?;
        files.push(file);
    }

    let mut paths = vec![];
    for file in files {
        paths.push(file.commit()?);
    }

    Ok(paths)
}

/// Reads `taxon population` lines into an ordered map
pub fn read_populations(path: &Path) -> Result<IndexMap<String, String>> {
    let mut map = IndexMap::new();
    for (i, line) in crate::libs::io::read_lines(path)?.iter().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [taxon, population] => {
                map.insert(taxon.to_string(), population.to_string());
            }
            _ => {
                return Err(AlnError::input_format(
                    path,
                    format!("line {} is not `taxon population`", i + 1),
                ))
            }
        }
    }

    Ok(map)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::libs::partition::NewPartition;
    use tempfile::TempDir;

    pub(crate) fn rows(records: &[(&str, &str)]) -> Vec<(String, String)> {
        records
            .iter()
            .map(|(t, s)| (t.to_string(), s.to_string()))
            .collect()
    }

    pub(crate) fn two_genes() -> Partitions {
        let mut parts = Partitions::new();
        parts.add_partition(NewPartition::length("g1", 3)).unwrap();
        parts.add_partition(NewPartition::length("g2", 3)).unwrap();
        parts
    }

    pub(crate) fn render_str(format: OutputFormat, ctx: &RenderContext, opts: &WriteOptions) -> String {
        let mut out = vec![];
        render(format, ctx, opts, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn parse_format() {
        assert_eq!("NEXUS".parse::<OutputFormat>().unwrap(), OutputFormat::Nexus);
        assert_eq!(OutputFormat::Mcmctree.extension(), "_mcmctree.phy");
        assert!("genbank".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn gap_coded_needs_nexus() {
        let rows = rows(&[("a", "ac-t1"), ("b", "acgt0")]);
        let parts = Partitions::new();
        let ctx = RenderContext {
            name: "x",
            rows: &rows,
            partitions: &parts,
            code: SequenceCode::dna(),
            locus_length: 5,
            restriction_range: Some((4, 4)),
        };
        let err = render(OutputFormat::Fasta, &ctx, &WriteOptions::default(), &mut Vec::<u8>::new())
            .unwrap_err();
        assert!(matches!(err, AlnError::UnsupportedFormat { .. }));
    }

    #[test]
    fn phylip_with_part_file() {
        let dir = TempDir::new().unwrap();
        let rows = rows(&[("a", "acgtac"), ("b", "acgaac")]);
        let parts = two_genes();
        let ctx = RenderContext {
            name: "concat",
            rows: &rows,
            partitions: &parts,
            code: SequenceCode::dna(),
            locus_length: 6,
            restriction_range: None,
        };

        let stem = dir.path().join("concat");
        let paths = write_file(OutputFormat::Phylip, &ctx, &WriteOptions::default(), &stem).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("concat.phy"));

        let part = std::fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(part, "GTR, g1 = 1-3\nGTR, g2 = 4-6\n");
    }

    #[test]
    fn failed_render_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let rows = rows(&[("a", "acgt")]);
        let parts = Partitions::new();
        let ctx = RenderContext {
            name: "x",
            rows: &rows,
            partitions: &parts,
            code: SequenceCode::dna(),
            locus_length: 4,
            restriction_range: None,
        };

        let stem = dir.path().join("x");
        assert!(write_file(OutputFormat::Ima2, &ctx, &WriteOptions::default(), &stem).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
