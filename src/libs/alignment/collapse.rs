use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use xxhash_rust::xxh3::xxh3_64;

use super::Alignment;
use crate::libs::cancel::CancelToken;
use crate::libs::error::{AlnError, Result};
use crate::libs::io::AtomicFile;
use crate::libs::seqcode::{iupac_code, GAP};
use crate::libs::store::{SeqRow, TableIo};

/// One unique sequence and the taxa sharing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Haplotype {
    pub name: String,
    pub taxa: Vec<String>,
}

/// How a variable column is turned into one consensus residue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusMode {
    /// The IUPAC ambiguity code of the residues
    Iupac,
    /// Missing data
    SoftMask,
    /// The column is dropped
    Remove,
    /// The first sequence is copied verbatim
    FirstSequence,
}

impl std::str::FromStr for ConsensusMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "iupac" => Ok(ConsensusMode::Iupac),
            "soft mask" | "softmask" => Ok(ConsensusMode::SoftMask),
            "remove" => Ok(ConsensusMode::Remove),
            "first sequence" | "first" => Ok(ConsensusMode::FirstSequence),
            _ => Err(format!("unknown consensus mode: {}", s)),
        }
    }
}

/// Writes `Hap_1: t1; t2` lines
pub fn write_haplotypes<W: Write>(writer: &mut W, haplotypes: &[Haplotype]) -> std::io::Result<()> {
    for hap in haplotypes {
        writeln!(writer, "{}: {}", hap.name, hap.taxa.join("; "))?;
    }
    Ok(())
}

impl Alignment {
    /// Collapses identical sequences into haplotypes named `{prefix}_{n}`,
    /// numbered by first appearance. The correspondence file is written
    /// only when the table commit succeeded.
    pub fn collapse(
        &mut self,
        io: &TableIo,
        prefix: &str,
        haplotypes_file: Option<&Path>,
        cancel: &CancelToken,
    ) -> Result<Vec<Haplotype>> {
        let rows = self.rows(&io.input)?;

        // xxh3 -> indices into `groups`; colliding hashes fall back to a
        // full comparison
        let mut buckets: IndexMap<u64, Vec<usize>> = IndexMap::new();
        let mut groups: Vec<(String, Vec<String>)> = vec![];
        for row in rows {
            cancel.check()?;
            let bucket = buckets.entry(xxh3_64(row.seq.as_bytes())).or_default();
            match bucket.iter().find(|i| groups[**i].0 == row.seq) {
                Some(i) => groups[*i].1.push(row.taxon),
                None => {
                    bucket.push(groups.len());
                    groups.push((row.seq, vec![row.taxon]));
                }
            }
        }

        let mut out = Vec::with_capacity(groups.len());
        let mut haplotypes = Vec::with_capacity(groups.len());
        for (i, (seq, taxa)) in groups.into_iter().enumerate() {
            let name = format!("{}_{}", prefix, i + 1);
            out.push(SeqRow::new(i, &name, &seq));
            haplotypes.push(Haplotype { name, taxa });
        }

        let file = match haplotypes_file {
            Some(path) => {
                let mut file = AtomicFile::create(path)?;
                write_haplotypes(&mut file, &haplotypes)?;
                Some(file)
            }
            None => None,
        };

        self.commit(io, &out)?;
        if let Some(file) = file {
            file.commit()?;
        }
        log::info!(
            "{}: {} haplotypes from {} taxa",
            self.name,
            haplotypes.len(),
            haplotypes.iter().map(|h| h.taxa.len()).sum::<usize>()
        );

        Ok(haplotypes)
    }

    /// Replaces the alignment by one `consensus` row
    pub fn consensus(
        &mut self,
        io: &TableIo,
        mode: ConsensusMode,
        cancel: &CancelToken,
    ) -> Result<()> {
        let rows = self.rows(&io.input)?;
        let first = rows
            .first()
            .ok_or_else(|| AlnError::EmptyAlignment(self.name.clone()))?;

        let (seq, kept) = match mode {
            ConsensusMode::FirstSequence => (first.seq.clone(), None),
            _ => {
                let seqs: Vec<(String, String)> =
                    rows.into_iter().map(|r| (r.taxon, r.seq)).collect();
                let columns = super::columns_of(&seqs);

                let mut seq = String::with_capacity(columns.len());
                let mut kept = vec![true; columns.len()];
                for (j, column) in columns.iter().enumerate() {
                    if j % 1000 == 0 {
                        cancel.check()?;
                    }
                    match self.consensus_residue(column, mode) {
                        Some(c) => seq.push(c),
                        None => kept[j] = false,
                    }
                }
                (seq, Some(kept))
            }
        };
        cancel.check()?;
        if seq.is_empty() {
            return Err(AlnError::EmptyAlignment(self.name.clone()));
        }

        let partitions = match &kept {
            Some(kept) if kept.iter().any(|k| !k) => Some(self.partitions.resized(|p| {
                kept[p.range.0..=p.range.1.min(kept.len() - 1)]
                    .iter()
                    .filter(|k| **k)
                    .count()
            })),
            _ => None,
        };

        self.commit(io, &[SeqRow::new(0, "consensus", &seq)])?;
        if let Some(partitions) = partitions {
            self.partitions = partitions;
        }

        Ok(())
    }

    /// `None` drops the column
    fn consensus_residue(&self, column: &[u8], mode: ConsensusMode) -> Option<char> {
        let missing = self.sequence_code.missing;
        let residues: BTreeSet<char> = column
            .iter()
            .map(|b| *b as char)
            .filter(|c| *c != GAP && *c != missing)
            .collect();

        match residues.len() {
            0 => Some(missing),
            1 => residues.into_iter().next(),
            _ => match mode {
                ConsensusMode::Iupac => {
                    let residues: Vec<char> = residues.into_iter().collect();
                    Some(iupac_code(&residues).unwrap_or(missing))
                }
                ConsensusMode::SoftMask => Some(missing),
                ConsensusMode::Remove => None,
                ConsensusMode::FirstSequence => column.first().map(|b| *b as char),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::alignment::tests::make;
    use tempfile::TempDir;

    #[test]
    fn four_and_one() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("gene.haplotypes");

        let mut aln = make(&[
            ("a", "acgt"),
            ("b", "acgt"),
            ("c", "tcgt"),
            ("d", "acgt"),
            ("e", "acgt"),
        ]);
        let io = aln.next_io("collapsed");
        let haps = aln
            .collapse(&io, "Hap", Some(&file), &CancelToken::new())
            .unwrap();

        assert_eq!(haps.len(), 2);
        assert_eq!(haps[0].name, "Hap_1");
        assert_eq!(haps[0].taxa, vec!["a", "b", "d", "e"]);
        assert_eq!(haps[1].taxa, vec!["c"]);
        assert_eq!(aln.taxa_list, vec!["Hap_1", "Hap_2"]);
        assert_eq!(aln.sequence("Hap_2").unwrap().unwrap(), "tcgt");

        let content = std::fs::read_to_string(&file).unwrap();
        assert_eq!(content, "Hap_1: a; b; d; e\nHap_2: c\n");
    }

    #[test]
    fn cancelled_collapse_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("gene.haplotypes");
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut aln = make(&[("a", "acgt"), ("b", "acgt")]);
        let io = aln.next_io("collapsed");
        assert!(aln.collapse(&io, "Hap", Some(&file), &cancel).is_err());
        assert!(!file.exists());
        assert_eq!(aln.taxa_list, vec!["a", "b"]);
    }

    #[test]
    fn consensus_modes() {
        let records = [("a", "acgt-a"), ("b", "atgtnc"), ("c", "acgt-g")];

        let mut aln = make(&records);
        let io = aln.next_io("consensus");
        aln.consensus(&io, ConsensusMode::Iupac, &CancelToken::new())
            .unwrap();
        assert_eq!(aln.taxa_list, vec!["consensus"]);
        assert_eq!(aln.sequence("consensus").unwrap().unwrap(), "aygtnv");

        let mut aln = make(&records);
        let io = aln.next_io("consensus");
        aln.consensus(&io, ConsensusMode::SoftMask, &CancelToken::new())
            .unwrap();
        assert_eq!(aln.sequence("consensus").unwrap().unwrap(), "angtnn");

        let mut aln = make(&records);
        let io = aln.next_io("consensus");
        aln.consensus(&io, ConsensusMode::Remove, &CancelToken::new())
            .unwrap();
        assert_eq!(aln.sequence("consensus").unwrap().unwrap(), "agtn");
        assert_eq!(aln.locus_length, 4);
        assert_eq!(aln.partitions.counter, 4);

        let mut aln = make(&records);
        let io = aln.next_io("consensus");
        aln.consensus(&io, ConsensusMode::FirstSequence, &CancelToken::new())
            .unwrap();
        assert_eq!(aln.sequence("consensus").unwrap().unwrap(), "acgt-a");
    }

    #[test]
    fn parse_mode() {
        assert_eq!("IUPAC".parse::<ConsensusMode>().unwrap(), ConsensusMode::Iupac);
        assert_eq!(
            "Soft mask".parse::<ConsensusMode>().unwrap(),
            ConsensusMode::SoftMask
        );
        assert_eq!(
            "first-sequence".parse::<ConsensusMode>().unwrap(),
            ConsensusMode::FirstSequence
        );
        assert!("majority".parse::<ConsensusMode>().is_err());
    }
}
