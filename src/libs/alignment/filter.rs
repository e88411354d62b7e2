use std::collections::{HashMap, HashSet};

use super::Alignment;
use crate::libs::cancel::CancelToken;
use crate::libs::error::{AlnError, Result};
use crate::libs::seqcode::GAP;
use crate::libs::store::{SeqRow, TableIo};

/// Whether `s` lies within the optional bounds
pub fn in_range(s: usize, min: Option<usize>, max: Option<usize>) -> bool {
    min.map_or(true, |min| s >= min) && max.map_or(true, |max| s <= max)
}

/// Leading and trailing runs of gaps become missing data. The runs stop at
/// the first other symbol, missing data included, so a sequence made only of
/// gaps becomes entirely missing.
pub fn replace_terminal_gaps(seq: &str, missing: char) -> String {
    let chars: Vec<char> = seq.chars().collect();
    let lead = chars.iter().take_while(|c| **c == GAP).count();
    let trail = chars[lead..].iter().rev().take_while(|c| **c == GAP).count();

    chars
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i < lead || i >= chars.len() - trail {
                missing
            } else {
                *c
            }
        })
        .collect()
}

/// Residues of a column, without gaps and missing data
fn residues(column: &[u8], missing: u8) -> impl Iterator<Item = u8> + '_ {
    column
        .iter()
        .copied()
        .filter(move |c| *c != GAP as u8 && *c != missing)
}

pub fn is_segregating(column: &[u8], missing: u8) -> bool {
    residues(column, missing).collect::<HashSet<_>>().len() > 1
}

/// After removing the most common residue, another residue is still shared
/// by two or more sequences
pub fn is_informative(column: &[u8], missing: u8) -> bool {
    let mut counts: HashMap<u8, usize> = HashMap::new();
    for c in residues(column, missing) {
        *counts.entry(c).or_insert(0) += 1;
    }
    if counts.len() < 2 {
        return false;
    }

    let mut values: Vec<usize> = counts.into_values().collect();
    values.sort_unstable_by(|a, b| b.cmp(a));
    values[1..].iter().any(|n| *n >= 2)
}

/// Counts sites with `test`, stopping as soon as the outcome is decided
fn count_sites<F: Fn(&[u8]) -> bool>(
    columns: &[Vec<u8>],
    min: Option<usize>,
    max: Option<usize>,
    test: F,
) -> bool {
    let mut s = 0;
    for column in columns {
        if test(column) {
            s += 1;
        }
        match (min, max) {
            (Some(min), None) if s >= min => return true,
            (None, Some(max)) if s > max => return false,
            _ => {}
        }
    }

    in_range(s, min, max)
}

impl Alignment {
    /// Keeps the codon positions flagged in `positions`, counted from the
    /// first column of the locus
    pub fn filter_codon_positions(
        &mut self,
        io: &TableIo,
        positions: [bool; 3],
        cancel: &CancelToken,
    ) -> Result<()> {
        let keep = |i: usize| positions[i % 3];
        let rows = self.rows(&io.input)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            cancel.check()?;
            let seq: String = row
                .seq
                .chars()
                .enumerate()
                .filter(|(i, _)| keep(*i))
                .map(|(_, c)| c)
                .collect();
            out.push(SeqRow { seq, ..row });
        }
        if out.first().map_or(true, |r| r.seq.is_empty()) {
            return Err(AlnError::EmptyAlignment(self.name.clone()));
        }

        let partitions = self
            .partitions
            .resized(|p| (p.range.0..=p.range.1).filter(|i| keep(*i)).count());
        self.commit(io, &out)?;
        self.partitions = partitions;

        Ok(())
    }

    /// Terminal gaps become missing data, then columns with more than
    /// `gap_threshold`% gaps or more than `missing_threshold`% gaps plus
    /// missing data are removed.
    ///
    /// Terminal gaps exposed by the removed columns are replaced as well, so
    /// a second call with the same thresholds changes nothing.
    pub fn filter_missing_data(
        &mut self,
        io: &TableIo,
        gap_threshold: f64,
        missing_threshold: f64,
        cancel: &CancelToken,
    ) -> Result<()> {
        let missing = self.sequence_code.missing;
        let rows = self.rows(&io.input)?;
        if rows.is_empty() {
            return Err(AlnError::EmptyAlignment(self.name.clone()));
        }

        let mut seqs: Vec<Vec<u8>> = vec![];
        for row in &rows {
            cancel.check()?;
            seqs.push(replace_terminal_gaps(&row.seq, missing).into_bytes());
        }

        let ntaxa = seqs.len() as f64;
        let len = seqs[0].len();
        let mut kept = vec![false; len];
        for (j, keep) in kept.iter_mut().enumerate() {
            if j % 1000 == 0 {
                cancel.check()?;
            }
            let gaps = seqs.iter().filter(|s| s[j] == GAP as u8).count() as f64;
            let blanks = seqs.iter().filter(|s| s[j] == missing as u8).count() as f64;

            let gap_pct = gaps / ntaxa * 100.0;
            let total_pct = gap_pct + blanks / ntaxa * 100.0;
            *keep = gap_pct <= gap_threshold && total_pct <= missing_threshold;
        }
        if !kept.iter().any(|k| *k) {
            return Err(AlnError::EmptyAlignment(self.name.clone()));
        }

        let out: Vec<SeqRow> = rows
            .into_iter()
            .zip(seqs)
            .map(|(row, seq)| {
                let filtered: String = seq
                    .iter()
                    .zip(&kept)
                    .filter(|(_, k)| **k)
                    .map(|(c, _)| *c as char)
                    .collect();
                SeqRow {
                    seq: replace_terminal_gaps(&filtered, missing),
                    ..row
                }
            })
            .collect();

        let partitions = self
            .partitions
            .resized(|p| kept[p.range.0..=p.range.1.min(len - 1)].iter().filter(|k| **k).count());
        log::debug!(
            "{}: kept {} of {} columns",
            self.name,
            kept.iter().filter(|k| **k).count(),
            len
        );
        self.commit(io, &out)?;
        self.partitions = partitions;

        Ok(())
    }

    /// Whether the number of segregating sites lies within the bounds
    pub fn filter_segregating_sites(
        &self,
        io: &TableIo,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Result<bool> {
        let missing = self.sequence_code.missing as u8;
        let columns = self.columns_of_table(io)?;

        Ok(count_sites(&columns, min, max, |c| is_segregating(c, missing)))
    }

    /// Whether the number of parsimony informative sites lies within the
    /// bounds
    pub fn filter_informative_sites(
        &self,
        io: &TableIo,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Result<bool> {
        let missing = self.sequence_code.missing as u8;
        let columns = self.columns_of_table(io)?;

        Ok(count_sites(&columns, min, max, |c| is_informative(c, missing)))
    }

    fn columns_of_table(&self, io: &TableIo) -> Result<Vec<Vec<u8>>> {
        let seqs: Vec<(String, String)> = self
            .rows(&io.input)?
            .into_iter()
            .map(|r| (r.taxon, r.seq))
            .collect();
        Ok(super::columns_of(&seqs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::alignment::tests::make;

    #[test]
    fn terminal_gaps() {
        assert_eq!(replace_terminal_gaps("--ac-gt--", 'n'), "nnac-gtnn");
        assert_eq!(replace_terminal_gaps("n-ac", 'n'), "n-ac");
        assert_eq!(replace_terminal_gaps("-n-ac-n", 'n'), "nn-ac-n");
        assert_eq!(replace_terminal_gaps("----", 'n'), "nnnn");
        assert_eq!(replace_terminal_gaps("", 'n'), "");
        assert_eq!(replace_terminal_gaps("acgt", 'x'), "acgt");
    }

    #[test]
    fn site_tests() {
        assert!(is_segregating(b"aac", b'n'));
        assert!(!is_segregating(b"aa-n", b'n'));
        assert!(!is_informative(b"aaac", b'n'));
        assert!(is_informative(b"aacc", b'n'));
        assert!(is_informative(b"aaaccg", b'n'));
        assert!(!is_informative(b"acgt", b'n'));
    }

    #[test]
    fn bounds() {
        assert!(in_range(3, Some(2), Some(5)));
        assert!(!in_range(1, Some(2), None));
        assert!(in_range(1, None, Some(1)));
        assert!(in_range(7, None, None));
    }

    #[test]
    fn missing_scenario() {
        let mut aln = make(&[("A", "at--gc"), ("B", "atgggc")]);
        let io = aln.next_io("filter");
        aln.filter_missing_data(&io, 0.0, 0.0, &CancelToken::new())
            .unwrap();

        assert_eq!(aln.locus_length, 4);
        let seqs = aln.sequences(&Default::default()).unwrap();
        assert_eq!(seqs[0].1, "atgc");
        assert_eq!(seqs[1].1, "atgc");
        assert_eq!(aln.partitions.get("gene").unwrap().range, (0, 3));
        assert_eq!(aln.active_table(), &io.output);
    }

    #[test]
    fn missing_thresholds() {
        // leading gaps of a and c become missing data
        let mut aln = make(&[("a", "-cgta"), ("b", "acgta"), ("c", "-c-ta"), ("d", "acgtn")]);
        let io = aln.next_io("filter");
        aln.filter_missing_data(&io, 25.0, 50.0, &CancelToken::new())
            .unwrap();

        let seqs = aln.sequences(&Default::default()).unwrap();
        assert_eq!(seqs[0].1, "ncgta");
        assert_eq!(seqs[2].1, "nc-ta");
        assert_eq!(aln.locus_length, 5);

        let io = aln.next_io("filter");
        aln.filter_missing_data(&io, 0.0, 50.0, &CancelToken::new())
            .unwrap();
        let seqs = aln.sequences(&Default::default()).unwrap();
        assert_eq!(seqs[2].1, "ncta");
    }

    #[test]
    fn cancelled_keeps_state() {
        let mut aln = make(&[("A", "at--gc"), ("B", "atgggc")]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let io = aln.next_io("filter");
        let err = aln.filter_missing_data(&io, 0.0, 0.0, &cancel).unwrap_err();
        assert!(matches!(err, AlnError::UserCancelled));
        assert_eq!(aln.locus_length, 6);
        assert!(!aln.store().table_exists(&io.output).unwrap());
    }

    #[test]
    fn codon_positions() {
        let mut aln = make(&[("a", "acgtacgta"), ("b", "tttccczzz")]);
        let io = aln.next_io("codon");
        aln.filter_codon_positions(&io, [true, true, false], &CancelToken::new())
            .unwrap();

        assert_eq!(aln.locus_length, 6);
        assert_eq!(aln.sequence("a").unwrap().unwrap(), "actagt");
        assert_eq!(aln.partitions.counter, 6);

        let io = aln.next_io("codon");
        let err = aln.filter_codon_positions(&io, [false; 3], &CancelToken::new());
        assert!(err.is_err());
    }

    #[test]
    fn segregating_early_exit() {
        let aln = make(&[("a", "acgtac"), ("b", "acgaaa"), ("c", "acgtag")]);
        let io = aln.next_io("x");
        // columns 3 and 5 segregate, none is informative
        assert!(aln.filter_segregating_sites(&io, Some(2), None).unwrap());
        assert!(!aln.filter_segregating_sites(&io, Some(3), None).unwrap());
        assert!(!aln.filter_segregating_sites(&io, None, Some(1)).unwrap());
        assert!(aln.filter_segregating_sites(&io, Some(1), Some(2)).unwrap());
        assert!(!aln.filter_informative_sites(&io, Some(1), None).unwrap());
    }
}
