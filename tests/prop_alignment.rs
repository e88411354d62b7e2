use std::path::{Path, PathBuf};

use alnkit::libs::alignment::{
    code_sequence, gap_spans, replace_terminal_gaps, Alignment, VisibilitySet,
};
use alnkit::libs::alignment_list::AlignmentList;
use alnkit::libs::cancel::CancelToken;
use alnkit::libs::partition::{NewPartition, Partitions};
use alnkit::libs::seqcode::SequenceCode;
use alnkit::libs::store::{Store, TableHandle};
use proptest::prelude::*;
use tempfile::TempDir;

fn assert_contiguous(parts: &Partitions) {
    let mut next = 0;
    for p in parts.iter() {
        assert_eq!(p.range.0, next, "{} starts at {}", p.name, p.range.0);
        next = p.range.1 + 1;
    }
    assert_eq!(parts.counter, next);
}

proptest! {
    #[test]
    fn partitions_stay_contiguous(
        lengths in prop::collection::vec(1usize..50, 1..8),
        doomed in prop::collection::vec(any::<bool>(), 8),
    ) {
        let mut parts = Partitions::new();
        for (i, len) in lengths.iter().enumerate() {
            let name = format!("p{}", i);
            parts
                .add_partition(NewPartition::length(&name, *len).file(&format!("{}.fas", name)))
                .unwrap();
        }
        assert_contiguous(&parts);
        prop_assert_eq!(parts.counter, lengths.iter().sum::<usize>());

        let mut kept = 0;
        for (i, len) in lengths.iter().enumerate() {
            if doomed[i] {
                parts.remove_file(&format!("p{}.fas", i)).unwrap();
            } else {
                kept += len;
            }
        }
        assert_contiguous(&parts);
        prop_assert_eq!(parts.counter, kept);
    }

    #[test]
    fn terminal_gaps_idempotent(seq in "[acgtn-]{0,40}") {
        let once = replace_terminal_gaps(&seq, 'n');
        prop_assert_eq!(once.len(), seq.len());
        prop_assert_eq!(replace_terminal_gaps(&once, 'n'), once.clone());
        prop_assert!(!once.starts_with('-'));
        prop_assert!(!once.ends_with('-'));
    }

    #[test]
    fn missing_filter_idempotent(
        seqs in prop::collection::vec("[acn-]{10}", 2..6),
        gap in 0.0f64..100.0,
        missing in 0.0f64..100.0,
    ) {
        let records: Vec<(String, String)> = seqs
            .iter()
            .enumerate()
            .map(|(i, s)| (format!("t{}", i), s.clone()))
            .collect();
        let store = Store::in_memory().unwrap();
        let path = Path::new("prop/gene.fas");
        let mut aln = Alignment::from_records(
            path,
            &records,
            SequenceCode::dna(),
            None,
            TableHandle::for_path(path),
            &store,
        )
        .unwrap();

        let io = aln.next_io("filter");
        if aln.filter_missing_data(&io, gap, missing, &CancelToken::new()).is_err() {
            // every column removed
            return Ok(());
        }
        let once = aln.sequences(&VisibilitySet::new()).unwrap();
        let len = aln.locus_length;

        let io = aln.next_io("filter");
        aln.filter_missing_data(&io, gap, missing, &CancelToken::new()).unwrap();
        prop_assert_eq!(aln.locus_length, len);
        prop_assert_eq!(aln.sequences(&VisibilitySet::new()).unwrap(), once);
    }

    #[test]
    fn gap_coding_is_deterministic(seqs in prop::collection::vec("[ac-]{12}", 2..6)) {
        let spans = gap_spans(seqs.iter().map(|s| s.as_str()));
        let again = gap_spans(seqs.iter().rev().map(|s| s.as_str()));
        prop_assert_eq!(&spans, &again);

        for seq in &seqs {
            let code = code_sequence(seq.as_bytes(), &spans);
            prop_assert_eq!(code.len(), spans.len());
            // every gap run of a sequence is coded present exactly once
            let runs = seq.split(|c| c != '-').filter(|r| !r.is_empty()).count();
            prop_assert_eq!(code.chars().filter(|c| *c == '1').count(), runs);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn concatenate_then_reverse(
        genes in prop::collection::vec(prop::collection::vec("[acgt]{1,15}", 3), 1..4)
            .prop_map(|genes| {
                // one length per gene
                genes
                    .into_iter()
                    .map(|seqs| {
                        let len = seqs.iter().map(|s| s.len()).min().unwrap_or(1);
                        seqs.into_iter().map(|s| s[..len].to_string()).collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>()
            })
    ) {
        let dir = TempDir::new().unwrap();
        let taxa = ["spa", "spb", "spc"];
        let mut paths = vec![];
        for (i, seqs) in genes.iter().enumerate() {
            let path = dir.path().join(format!("gene{}.fas", i));
            let content: String = taxa
                .iter()
                .zip(seqs)
                .map(|(t, s)| format!(">{}\n{}\n", t, s))
                .collect();
            std::fs::write(&path, content).unwrap();
            paths.push(path);
        }

        let store = Store::in_memory().unwrap();
        let mut list = AlignmentList::new(&store);
        list.add_alignment_files(&paths, &CancelToken::new()).unwrap();
        let concat = list.concatenate("concat", &CancelToken::new()).unwrap();
        prop_assert_eq!(concat.locus_length, genes.iter().map(|g| g[0].len()).sum::<usize>());

        let loci = concat.reverse_concatenate(None, &CancelToken::new()).unwrap();
        prop_assert_eq!(loci.len(), genes.len());
        for (locus, seqs) in loci.iter().zip(&genes) {
            let rows = locus.sequences(&VisibilitySet::new()).unwrap();
            let expected: Vec<(String, String)> = taxa
                .iter()
                .zip(seqs)
                .map(|(t, s)| (t.to_string(), s.clone()))
                .collect();
            prop_assert_eq!(rows, expected);
            prop_assert!(paths.iter().any(|p: &PathBuf| p.file_stem().unwrap() == locus.sname.as_str()));
        }
    }
}
