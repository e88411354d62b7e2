use std::path::PathBuf;

use super::Alignment;
use crate::libs::cancel::CancelToken;
use crate::libs::error::{AlnError, Result};
use crate::libs::partition::Partitions;

/// Every `stride`-th character of `seq[start..=end]`
pub fn slice_stride(seq: &str, start: usize, end: usize, stride: usize) -> String {
    seq.get(start..=end)
        .unwrap_or("")
        .chars()
        .step_by(stride.max(1))
        .collect()
}

impl Alignment {
    /// Splits the alignment into one alignment per partition, or per codon
    /// position of codon partitions.
    ///
    /// Taxa whose slice is entirely missing data are left out of that locus,
    /// and a locus without any taxon is skipped.
    pub fn reverse_concatenate(
        &self,
        partitions: Option<&Partitions>,
        cancel: &CancelToken,
    ) -> Result<Vec<Alignment>> {
        let partitions = partitions.unwrap_or(&self.partitions);
        let coded = self.restriction_range.map_or(0, |(s, e)| e + 1 - s);
        if partitions.counter + coded != self.locus_length {
            return Err(AlnError::PartitionConsistency(format!(
                "partitions end at {} but {} has {} sites",
                partitions.counter, self.name, self.locus_length
            )));
        }

        let missing = self.sequence_code.missing;
        let rows = self.current_rows()?;
        let dir = self
            .path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();

        let mut loci = vec![];
        for partition in partitions.iter() {
            for (name, start, end, stride) in partition.subparts() {
                cancel.check()?;
                let records: Vec<(String, String)> = rows
                    .iter()
                    .map(|r| (r.taxon.clone(), slice_stride(&r.seq, start, end, stride)))
                    .filter(|(_, s)| s.chars().any(|c| c != missing))
                    .collect();
                if records.is_empty() {
                    log::warn!("{}: no data for {}", self.name, name);
                    continue;
                }

                let locus = Alignment::from_records(
                    &dir.join(PathBuf::from(&name)),
                    &records,
                    self.sequence_code,
                    None,
                    self.table.derived(&format!("rev_{}", name)),
                    &self.store,
                )?;
                loci.push(locus);
            }
        }
        log::info!("{}: split into {} loci", self.name, loci.len());

        Ok(loci)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::alignment::tests::make;
    use crate::libs::partition::NewPartition;

    #[test]
    fn stride() {
        assert_eq!(slice_stride("acgtacgta", 0, 8, 3), "atg");
        assert_eq!(slice_stride("acgtacgta", 1, 8, 3), "cat");
        assert_eq!(slice_stride("acgt", 1, 2, 1), "cg");
        assert_eq!(slice_stride("acgt", 5, 7, 1), "");
    }

    #[test]
    fn split_two() {
        let aln = make(&[("a", "acgtnn"), ("b", "acgatt")]);
        let mut parts = Partitions::new();
        parts.add_partition(NewPartition::length("one", 4)).unwrap();
        parts.add_partition(NewPartition::length("two", 2)).unwrap();

        let loci = aln
            .reverse_concatenate(Some(&parts), &CancelToken::new())
            .unwrap();
        assert_eq!(loci.len(), 2);
        assert_eq!(loci[0].sname, "one");
        assert_eq!(loci[0].taxa_list, vec!["a", "b"]);
        assert_eq!(loci[1].taxa_list, vec!["b"]);
        assert_eq!(loci[1].sequence("b").unwrap().unwrap(), "tt");
        assert_eq!(loci[1].locus_length, 2);
    }

    #[test]
    fn names_differing_in_punctuation() {
        let aln = make(&[("a", "aaaacc"), ("b", "aaaacc")]);
        let mut parts = Partitions::new();
        parts.add_partition(NewPartition::length("gene-1", 4)).unwrap();
        parts.add_partition(NewPartition::length("gene_1", 2)).unwrap();

        let loci = aln
            .reverse_concatenate(Some(&parts), &CancelToken::new())
            .unwrap();
        assert_eq!(loci[0].sname, "gene-1");
        assert_eq!(loci[0].sequence("a").unwrap().unwrap(), "aaaa");
        assert_eq!(loci[1].sname, "gene_1");
        assert_eq!(loci[1].sequence("a").unwrap().unwrap(), "cc");
    }

    #[test]
    fn codon_split() {
        let aln = make(&[("a", "acgtacgta")]);
        let mut parts = Partitions::new();
        parts
            .add_partition(NewPartition::length("cds", 9).codon())
            .unwrap();

        let loci = aln
            .reverse_concatenate(Some(&parts), &CancelToken::new())
            .unwrap();
        let names: Vec<_> = loci.iter().map(|l| l.sname.clone()).collect();
        assert_eq!(names, vec!["cds_1", "cds_2", "cds_3"]);
        assert_eq!(loci[2].sequence("a").unwrap().unwrap(), "gca");
    }

    #[test]
    fn length_mismatch() {
        let aln = make(&[("a", "acgt")]);
        let mut parts = Partitions::new();
        parts.add_partition(NewPartition::length("one", 3)).unwrap();

        let err = aln
            .reverse_concatenate(Some(&parts), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, AlnError::PartitionConsistency(_)));
    }
}
