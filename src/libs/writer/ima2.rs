use std::io::Write;

use indexmap::IndexMap;

use super::{slice_upper, RenderContext};
use crate::libs::error::{AlnError, Result};

const IMA2_SPACE: usize = 10;
const IMA2_CUT: usize = 8;

/// Population assignments and per-locus settings of IMa2 files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ima2Options {
    /// Taxon to population, in file order
    pub populations: IndexMap<String, String>,
    /// Population tree, e.g. `(0,1):2`
    pub tree: String,
    pub mutation_model: String,
    pub inheritance: String,
}

impl Ima2Options {
    pub fn new(populations: IndexMap<String, String>, tree: &str) -> Self {
        Self {
            populations,
            tree: tree.to_string(),
            mutation_model: "IS".to_string(),
            inheritance: "1".to_string(),
        }
    }

    /// Population names and their taxa, in order of first appearance
    pub fn groups(&self) -> IndexMap<&str, Vec<&str>> {
        let mut groups: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (taxon, population) in &self.populations {
            groups
                .entry(population.as_str())
                .or_default()
                .push(taxon.as_str());
        }
        groups
    }
}

pub fn ima2<W: Write>(ctx: &RenderContext, opts: &Ima2Options, writer: &mut W) -> Result<()> {
    let groups = opts.groups();
    let seq_of: IndexMap<&str, &str> = ctx
        .rows
        .iter()
        .map(|(t, s)| (t.as_str(), s.as_str()))
        .collect();
    if let Some(taxon) = opts.populations.keys().find(|t| !seq_of.contains_key(t.as_str())) {
        return Err(AlnError::UnknownTaxon(taxon.clone()));
    }

    let loci = ctx.loci();
    writer.write_all(
        format!(
            "Input file for IMa2 using {} alignments\n{}\n{}\n{}\n{}\n",
            loci.len(),
            groups.len(),
            groups.keys().cloned().collect::<Vec<_>>().join(" "),
            opts.tree,
            loci.len()
        )
        .as_ref(),
    )?;

    let missing = ctx.code.missing.to_ascii_uppercase();
    for (name, start, end) in loci {
        // taxa with data in this locus, grouped by population
        let mut counts = vec![];
        let mut lines = vec![];
        for taxa in groups.values() {
            let mut n = 0;
            for taxon in taxa {
                let seq = slice_upper(seq_of[taxon], start, end);
                if seq.chars().all(|c| c == missing) {
                    continue;
                }
                let label: String = taxon.chars().take(IMA2_CUT).collect();
                lines.push(format!("{:<width$}{}", label, seq, width = IMA2_SPACE));
                n += 1;
            }
            counts.push(n.to_string());
        }

        writer.write_all(
            format!(
                "{} {} {} {} {}\n",
                name,
                counts.join(" "),
                end + 1 - start,
                opts.mutation_model,
                opts.inheritance
            )
            .as_ref(),
        )?;
        for line in lines {
            writer.write_all(format!("{}\n", line).as_ref())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::{render_str, rows, two_genes};
    use super::super::*;
    use crate::libs::seqcode::SequenceCode;

    fn options() -> Ima2Options {
        let populations: IndexMap<String, String> = [("a", "p1"), ("b", "p2"), ("c", "p1")]
            .iter()
            .map(|(t, p)| (t.to_string(), p.to_string()))
            .collect();
        Ima2Options::new(populations, "(0,1):2")
    }

    #[test]
    fn loci_by_population() {
        let rows = rows(&[("a", "acgtac"), ("b", "acgaac"), ("c", "nnntta")]);
        let parts = two_genes();
        let ctx = RenderContext {
            name: "concat",
            rows: &rows,
            partitions: &parts,
            code: SequenceCode::dna(),
            locus_length: 6,
            restriction_range: None,
        };
        let opts = WriteOptions {
            ima2: Some(options()),
            ..Default::default()
        };

        let out = render_str(OutputFormat::Ima2, &ctx, &opts);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "2");
        assert_eq!(lines[2], "p1 p2");
        assert_eq!(lines[3], "(0,1):2");
        assert_eq!(lines[4], "2");
        assert_eq!(lines[5], "g1 1 1 3 IS 1");
        assert_eq!(lines[6], format!("{:<10}ACG", "a"));
        assert_eq!(lines[8], "g2 2 1 3 IS 1");
    }

    #[test]
    fn unknown_taxon() {
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
        let opts = WriteOptions {
            ima2: Some(options()),
            ..Default::default()
        };

        let err = render(OutputFormat::Ima2, &ctx, &opts, &mut Vec::<u8>::new()).unwrap_err();
        assert!(matches!(err, AlnError::UnknownTaxon(t) if t == "c"));
    }
}
