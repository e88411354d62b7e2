use std::io::Write;

use super::{slice_upper, RenderContext, WriteOptions, LINE_WIDTH};

/// Phylip name column
const PHYLIP_SPACE: usize = 30;
const PHYLIP_CUT: usize = 258;

fn phylip_name(taxon: &str, cut: usize) -> String {
    let name: String = taxon.chars().take(cut).collect();
    format!("{:<width$}", name, width = PHYLIP_SPACE)
}

pub fn fasta<W: Write>(ctx: &RenderContext, opts: &WriteOptions, writer: &mut W) -> std::io::Result<()> {
    for (taxon, seq) in ctx.rows {
        writer.write_all(format!(">{}\n", taxon).as_ref())?;
        let seq = seq.to_uppercase();
        if opts.interleave {
            for chunk in seq.as_bytes().chunks(LINE_WIDTH) {
                writer.write_all(chunk)?;
                writer.write_all(b"\n")?;
            }
        } else {
            writer.write_all(format!("{}\n", seq).as_ref())?;
        }
    }

    Ok(())
}

/// Interleaved output names the taxa in the first block only
pub fn phylip<W: Write>(ctx: &RenderContext, opts: &WriteOptions, writer: &mut W) -> std::io::Result<()> {
    let cut = opts.phylip_truncate.unwrap_or(PHYLIP_CUT);
    writer.write_all(format!("{} {}\n", ctx.rows.len(), ctx.locus_length).as_ref())?;

    if !opts.interleave {
        for (taxon, seq) in ctx.rows {
            writer.write_all(
                format!("{} {}\n", phylip_name(taxon, cut), seq.to_uppercase()).as_ref(),
            )?;
        }
        return Ok(());
    }

    for start in (0..ctx.locus_length).step_by(LINE_WIDTH) {
        let end = (start + LINE_WIDTH).min(ctx.locus_length) - 1;
        for (taxon, seq) in ctx.rows {
            let chunk = slice_upper(seq, start, end);
            if start == 0 {
                writer.write_all(format!("{} {}\n", phylip_name(taxon, cut), chunk).as_ref())?;
            } else {
                writer.write_all(format!("{}\n", chunk).as_ref())?;
            }
        }
        writer.write_all(b"\n")?;
    }

    Ok(())
}

pub fn stockholm<W: Write>(ctx: &RenderContext, writer: &mut W) -> std::io::Result<()> {
    writer.write_all(b"# STOCKHOLM V1.0\n")?;
    for (taxon, seq) in ctx.rows {
        writer.write_all(format!("{}\t{}\n", taxon, seq.to_uppercase()).as_ref())?;
    }
    writer.write_all(b"//\n")?;

    Ok(())
}

/// Number of loci, then `name ntaxa length` and the rows of every locus
pub fn gphocs<W: Write>(ctx: &RenderContext, writer: &mut W) -> std::io::Result<()> {
    let loci = ctx.loci();
    writer.write_all(format!("{}\n", loci.len()).as_ref())?;

    for (name, start, end) in loci {
        writer.write_all(
            format!("{} {} {}\n", name, ctx.rows.len(), end + 1 - start).as_ref(),
        )?;
        for (taxon, seq) in ctx.rows {
            writer.write_all(format!("{}\t{}\n", taxon, slice_upper(seq, start, end)).as_ref())?;
        }
    }

    Ok(())
}

/// One `ntaxa length` block per locus
pub fn mcmctree<W: Write>(ctx: &RenderContext, writer: &mut W) -> std::io::Result<()> {
    for (_, start, end) in ctx.loci() {
        writer.write_all(format!("{} {}\n", ctx.rows.len(), end + 1 - start).as_ref())?;
        for (taxon, seq) in ctx.rows {
            writer.write_all(
                format!(
                    "{}  {}\n",
                    phylip_name(taxon, PHYLIP_CUT),
                    slice_upper(seq, start, end)
                )
                .as_ref(),
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::{render_str, rows, two_genes};
    use super::super::*;
    use crate::libs::partition::Partitions;
    use crate::libs::seqcode::SequenceCode;

    #[test]
    fn fasta_upper_and_wrapped() {
        let long = "a".repeat(100);
        let rows = rows(&[("spa", long.as_str())]);
        let parts = Partitions::new();
        let ctx = RenderContext {
            name: "x",
            rows: &rows,
            partitions: &parts,
            code: SequenceCode::dna(),
            locus_length: 100,
            restriction_range: None,
        };

        let out = render_str(OutputFormat::Fasta, &ctx, &WriteOptions::default());
        assert_eq!(out, format!(">spa\n{}\n", "A".repeat(100)));

        let opts = WriteOptions {
            interleave: true,
            ..Default::default()
        };
        let out = render_str(OutputFormat::Fasta, &ctx, &opts);
        assert_eq!(out.lines().count(), 3);
        assert_eq!(out.lines().nth(2).unwrap(), "A".repeat(10));
    }

    #[test]
    fn phylip_names() {
        let rows = rows(&[("species_long_name", "acgt")]);
        let parts = Partitions::new();
        let ctx = RenderContext {
            name: "x",
            rows: &rows,
            partitions: &parts,
            code: SequenceCode::dna(),
            locus_length: 4,
            restriction_range: None,
        };

        let out = render_str(OutputFormat::Phylip, &ctx, &WriteOptions::default());
        assert_eq!(out, format!("1 4\n{:<30} ACGT\n", "species_long_name"));

        let opts = WriteOptions {
            phylip_truncate: Some(7),
            ..Default::default()
        };
        let out = render_str(OutputFormat::Phylip, &ctx, &opts);
        assert!(out.contains(&format!("{:<30} ACGT", "species")));
    }

    #[test]
    fn per_locus_formats() {
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

        let out = render_str(OutputFormat::Gphocs, &ctx, &WriteOptions::default());
        assert_eq!(out, "2\ng1 2 3\na\tACG\nb\tACG\ng2 2 3\na\tTAC\nb\tAAC\n");

        let out = render_str(OutputFormat::Mcmctree, &ctx, &WriteOptions::default());
        assert_eq!(out.lines().filter(|l| *l == "2 3").count(), 2);

        let out = render_str(OutputFormat::Stockholm, &ctx, &WriteOptions::default());
        assert_eq!(out, "# STOCKHOLM V1.0\na\tACGTAC\nb\tACGAAC\n//\n");
    }
}
