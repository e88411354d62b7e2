use lazy_static::lazy_static;
use regex::Regex;

use super::Alignment;
use crate::libs::cancel::CancelToken;
use crate::libs::error::Result;
use crate::libs::seqcode::GAP;
use crate::libs::store::{SeqRow, TableIo};

lazy_static! {
    static ref RE_GAPS: Regex = Regex::new(r"-+").unwrap();
}

/// Unique gap runs of all sequences as half-open `(start, end)` spans,
/// sorted by position
pub fn gap_spans<'a, I: IntoIterator<Item = &'a str>>(seqs: I) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = seqs
        .into_iter()
        .flat_map(|seq| RE_GAPS.find_iter(seq).map(|m| (m.start(), m.end())))
        .collect();
    spans.sort_unstable();
    spans.dedup();
    spans
}

/// Simmons and Ochoterena simple indel coding of one sequence.
///
/// `1` when the sequence has exactly this gap run, `-` when the span is all
/// gaps but part of a longer run, `0` otherwise.
pub fn code_sequence(seq: &[u8], spans: &[(usize, usize)]) -> String {
    let gap = GAP as u8;
    spans
        .iter()
        .map(|&(start, end)| {
            if !seq[start..end].iter().all(|c| *c == gap) {
                return '0';
            }
            let before = start > 0 && seq[start - 1] == gap;
            let after = seq.get(end).map_or(false, |c| *c == gap);
            if before || after {
                '-'
            } else {
                '1'
            }
        })
        .collect()
}

impl Alignment {
    /// Appends the binary indel block to every sequence and records its
    /// columns in `restriction_range`. Returns the number of coded gaps.
    pub fn code_gaps(&mut self, io: &TableIo, cancel: &CancelToken) -> Result<usize> {
        if let Some((start, end)) = self.restriction_range {
            log::warn!("{}: gaps are already coded", self.name);
            return Ok(end + 1 - start);
        }

        let rows = self.rows(&io.input)?;
        let spans = gap_spans(rows.iter().map(|r| r.seq.as_str()));

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            cancel.check()?;
            let code = code_sequence(row.seq.as_bytes(), &spans);
            let seq = row.seq + &code;
            out.push(SeqRow { seq, ..row });
        }

        let len = self.locus_length;
        self.commit(io, &out)?;
        if !spans.is_empty() {
            self.restriction_range = Some((len, len + spans.len() - 1));
        }
        log::debug!("{}: {} gaps coded", self.name, spans.len());

        Ok(spans.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::alignment::tests::make;

    #[test]
    fn spans() {
        let spans = gap_spans(["ac--gt", "a---gt", "acgtg-"]);
        assert_eq!(spans, vec![(1, 4), (2, 4), (5, 6)]);
    }

    #[test]
    fn coding() {
        let spans = vec![(1, 4), (2, 4), (5, 6)];
        assert_eq!(code_sequence(b"ac--gt", &spans), "010");
        assert_eq!(code_sequence(b"a---gt", &spans), "1-0");
        assert_eq!(code_sequence(b"acgtg-", &spans), "001");
    }

    #[test]
    fn appended_block() {
        let mut aln = make(&[("a", "ac--gt"), ("b", "a---gt"), ("c", "acgtg-")]);
        let io = aln.next_io("gaps");
        let n = aln.code_gaps(&io, &CancelToken::new()).unwrap();

        assert_eq!(n, 3);
        assert_eq!(aln.restriction_range, Some((6, 8)));
        assert_eq!(aln.locus_length, 9);
        assert_eq!(aln.sequence("b").unwrap().unwrap(), "a---gt1-0");

        // a second run leaves the block alone
        let io = aln.next_io("gaps");
        assert_eq!(aln.code_gaps(&io, &CancelToken::new()).unwrap(), 3);
        assert_eq!(aln.locus_length, 9);
    }

    #[test]
    fn no_gaps() {
        let mut aln = make(&[("a", "acgt"), ("b", "acga")]);
        let io = aln.next_io("gaps");
        assert_eq!(aln.code_gaps(&io, &CancelToken::new()).unwrap(), 0);
        assert_eq!(aln.restriction_range, None);
        assert_eq!(aln.locus_length, 4);
    }
}
