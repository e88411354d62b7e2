use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexSet;

use super::RawAlignment;
use crate::libs::error::{AlnError, Result};
use crate::libs::seqcode::{guess_code, rm_illegal};

fn row_fields(line: &str) -> Option<(String, &str)> {
    let mut fields = line.split_whitespace();
    let name = fields.next()?;
    let seq = fields.next().unwrap_or("");
    Some((rm_illegal(name.trim_start_matches('>')), seq))
}

/// RAD-seq locus blocks, each closed by a `//` line. Taxa absent from a
/// block are padded with missing data; every block becomes a `locus_{n}`
/// partition.
pub fn parse(lines: &[String], path: &Path) -> Result<RawAlignment> {
    let is_row = |l: &&String| {
        let t = l.trim();
        !t.is_empty() && !t.starts_with("//")
    };

    // taxa of the whole file, in order of first appearance
    let taxa: IndexSet<String> = lines
        .iter()
        .filter(is_row)
        .filter_map(|l| row_fields(l.trim()).map(|(t, _)| t))
        .collect();
    let first_seq = lines
        .iter()
        .filter(is_row)
        .find_map(|l| row_fields(l.trim()).map(|(_, s)| s.to_string()))
        .unwrap_or_default();
    let code = guess_code(&first_seq)
        .ok_or_else(|| AlnError::EmptyAlignment(path.display().to_string()))?;

    let mut raw = RawAlignment {
        code: Some(code),
        ..Default::default()
    };
    let mut seqs: Vec<String> = vec![String::new(); taxa.len()];
    let mut block: HashMap<String, String> = HashMap::new();
    let mut block_len: Option<usize> = None;

    let mut close = |block: &mut HashMap<String, String>,
                     block_len: &mut Option<usize>,
                     raw: &mut RawAlignment| {
        if let Some(len) = block_len.take() {
            for (i, taxon) in taxa.iter().enumerate() {
                match block.get(taxon) {
                    Some(seq) => seqs[i].push_str(seq),
                    None => seqs[i].extend(std::iter::repeat(code.missing).take(len)),
                }
            }
            raw.loci.push(len);
        }
        block.clear();
    };

    for line in lines {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.starts_with("//") {
            close(&mut block, &mut block_len, &mut raw);
            continue;
        }
        if let Some((taxon, seq)) = row_fields(text) {
            match block_len {
                Some(len) if len != seq.len() => {
                    return Err(AlnError::unequal_length(
                        path,
                        format!(
                            "locus {} mixes lengths {} and {}",
                            raw.loci.len() + 1,
                            len,
                            seq.len()
                        ),
                    ))
                }
                _ => block_len = Some(seq.len()),
            }
            if block.contains_key(&taxon) {
                return Err(AlnError::DuplicateTaxon {
                    path: path.to_path_buf(),
                    taxa: vec![taxon],
                });
            }
            block.insert(taxon, seq.to_string());
        }
    }
    close(&mut block, &mut block_len, &mut raw);

    raw.records = taxa.into_iter().zip(seqs).collect();

    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_blocks() {
        let lines: Vec<String> = ">spa ACGT\n>spb ACGA\n//    -*|1|\n>spa TTG\n>spc TTC\n//    --*|2|\n"
            .lines()
            .map(|l| l.to_string())
            .collect();
        let raw = parse(&lines, Path::new("x.loci")).unwrap();

        assert_eq!(raw.loci, vec![4, 3]);
        assert_eq!(
            raw.records,
            vec![
                ("spa".to_string(), "ACGTTTG".to_string()),
                ("spb".to_string(), "ACGAnnn".to_string()),
                ("spc".to_string(), "nnnnTTC".to_string()),
            ]
        );
    }

    #[test]
    fn taxon_repeated_in_block() {
        let lines: Vec<String> = ">spa ACGT\n>spb ACGA\n>spa ACGG\n//    -*|1|\n"
            .lines()
            .map(|l| l.to_string())
            .collect();
        match parse(&lines, Path::new("x.loci")) {
            Err(AlnError::DuplicateTaxon { taxa, .. }) => assert_eq!(taxa, vec!["spa"]),
            other => panic!("unexpected {:?}", other.map(|r| r.records)),
        }

        // the same taxon in separate blocks is fine
        let lines: Vec<String> = ">spa ACGT\n//\n>spa TTG\n//\n"
            .lines()
            .map(|l| l.to_string())
            .collect();
        let raw = parse(&lines, Path::new("x.loci")).unwrap();
        assert_eq!(raw.records, vec![("spa".to_string(), "ACGTTTG".to_string())]);
    }
}
