use std::collections::BTreeSet;
use std::io::Write;

use super::{slice_upper, RenderContext, WriteOptions, LINE_WIDTH};
use crate::libs::error::{AlnError, Result};
use crate::libs::seqcode::{iupac_code, SequenceKind, GAP};

/// Nexus name column
const NEXUS_SPACE: usize = 40;
const NEXUS_CUT: usize = 50;

fn nexus_name(taxon: &str) -> String {
    let name: String = taxon.chars().take(NEXUS_CUT).collect();
    format!("{:<width$}", name, width = NEXUS_SPACE)
}

fn datatype(ctx: &RenderContext) -> String {
    let kind = ctx.code.kind.to_string();
    match ctx.restriction_range {
        Some((start, end)) => format!(
            "mixed({}:1-{}, restriction:{}-{})",
            kind,
            start,
            start + 1,
            end + 1
        ),
        None => kind,
    }
}

fn matrix<W: Write>(ctx: &RenderContext, interleave: bool, writer: &mut W) -> std::io::Result<()> {
    if !interleave || ctx.locus_length <= LINE_WIDTH {
        for (taxon, seq) in ctx.rows {
            writer.write_all(format!("{} {}\n", nexus_name(taxon), seq.to_uppercase()).as_ref())?;
        }
        return Ok(());
    }

    for start in (0..ctx.locus_length).step_by(LINE_WIDTH) {
        let end = (start + LINE_WIDTH).min(ctx.locus_length) - 1;
        for (taxon, seq) in ctx.rows {
            writer.write_all(
                format!("{} {}\n", nexus_name(taxon), slice_upper(seq, start, end)).as_ref(),
            )?;
        }
        writer.write_all(b"\n")?;
    }

    Ok(())
}

/// `lset`/`prset` lines of every sub-partition with a model
fn model_block(ctx: &RenderContext) -> Vec<String> {
    let single = !ctx.is_partitioned();
    let mut lines = vec![];
    let mut index = 0;
    for p in ctx.partitions.iter() {
        for params in &p.model.params {
            index += 1;
            if params.is_empty() {
                continue;
            }
            let applyto = if single {
                String::new()
            } else {
                format!(" applyto=({})", index)
            };
            let (lset, prset): (Vec<&String>, Vec<&String>) =
                params.iter().partition(|p| !p.starts_with("statefreqpr"));
            if !lset.is_empty() {
                lines.push(format!(
                    "\tlset{} {};",
                    applyto,
                    lset.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ")
                ));
            }
            if !prset.is_empty() {
                lines.push(format!(
                    "\tprset{} {};",
                    applyto,
                    prset.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ")
                ));
            }
        }
    }

    lines
}

/// Data block, then MrBayes blocks for charsets, models and the outgroup
pub fn nexus<W: Write>(ctx: &RenderContext, opts: &WriteOptions, writer: &mut W) -> Result<()> {
    writer.write_all(
        format!(
            "#NEXUS\n\nBegin data;\n\tdimensions ntax={} nchar={} ;\n\tformat datatype={} interleave={} gap={} missing={} ;\n\tmatrix\n",
            ctx.rows.len(),
            ctx.locus_length,
            datatype(ctx),
            if opts.interleave { "yes" } else { "no" },
            GAP,
            ctx.code.missing.to_ascii_uppercase(),
        )
        .as_ref(),
    )?;
    matrix(ctx, opts.interleave, writer)?;
    writer.write_all(b";\n\tend;\n")?;

    if opts.use_charset && ctx.is_partitioned() {
        writer.write_all(b"\nbegin mrbayes;\n")?;
        let mut charsets: Vec<u8> = vec![];
        ctx.partitions.write_nexus(&mut charsets)?;
        for line in String::from_utf8_lossy(&charsets).lines() {
            writer.write_all(format!("\t{}\n", line).as_ref())?;
        }
        let names = ctx.partitions.partition_names();
        writer.write_all(
            format!(
                "\tpartition part = {}: {};\n\tset partition=part;\nend;\n",
                names.len(),
                names.join(", ")
            )
            .as_ref(),
        )?;
    }

    let models = model_block(ctx);
    if !models.is_empty() {
        writer.write_all(b"\nbegin mrbayes;\n")?;
        for line in models {
            writer.write_all(format!("{}\n", line).as_ref())?;
        }
        writer.write_all(b"end;\n")?;
    }

    let outgroup: Vec<&str> = opts
        .outgroup
        .iter()
        .filter(|t| ctx.rows.iter().any(|(taxon, _)| taxon == *t))
        .map(|t| t.as_str())
        .collect();
    if !outgroup.is_empty() {
        writer.write_all(
            format!("\nbegin mrbayes;\n\toutgroup {}\nend;\n", outgroup.join(" ")).as_ref(),
        )?;
    }

    Ok(())
}

/// The two alleles of a biallelic column, reference first. Two-base
/// ambiguity codes count as heterozygotes of their bases.
pub fn biallelic(column: &[u8], missing: u8) -> Option<(char, char)> {
    let mut order: Vec<char> = vec![];
    let mut alleles = BTreeSet::new();
    for c in column {
        if *c == GAP as u8 || *c == missing {
            continue;
        }
        let c = (*c as char).to_ascii_lowercase();
        let bases: Vec<char> = match c {
            'a' | 'c' | 'g' | 't' => vec![c],
            'r' => vec!['a', 'g'],
            'y' => vec!['c', 't'],
            's' => vec!['c', 'g'],
            'w' => vec!['a', 't'],
            'k' => vec!['g', 't'],
            'm' => vec!['a', 'c'],
            _ => return None,
        };
        for b in bases {
            if alleles.insert(b) {
                order.push(b);
            }
        }
    }

    match order.as_slice() {
        [r, a] => Some((*r, *a)),
        _ => None,
    }
}

/// `0` reference, `1` heterozygote, `2` alternative, `?` missing
fn snapp_code(c: u8, alleles: (char, char), missing: u8) -> char {
    if c == GAP as u8 || c == missing {
        return '?';
    }
    let c = (c as char).to_ascii_lowercase();
    if c == alleles.0 {
        '0'
    } else if c == alleles.1 {
        '2'
    } else if Some(c) == iupac_code(&[alleles.0, alleles.1]) {
        '1'
    } else {
        '?'
    }
}

/// Integer nexus with the first biallelic site of every locus
pub fn snapp<W: Write>(ctx: &RenderContext, writer: &mut W) -> Result<()> {
    debug_assert_eq!(ctx.code.kind, SequenceKind::Dna);
    let missing = ctx.code.missing as u8;

    let mut coded: Vec<String> = vec![String::new(); ctx.rows.len()];
    for (_, start, end) in ctx.loci() {
        let site = (start..=end).find_map(|j| {
            let column: Vec<u8> = ctx
                .rows
                .iter()
                .map(|(_, s)| s.as_bytes().get(j).copied().unwrap_or(missing))
                .collect();
            biallelic(&column, missing).map(|alleles| (column, alleles))
        });
        if let Some((column, alleles)) = site {
            for (i, c) in column.iter().enumerate() {
                coded[i].push(snapp_code(*c, alleles, missing));
            }
        }
    }

    let nchar = coded.first().map_or(0, |s| s.len());
    if nchar == 0 {
        return Err(AlnError::EmptyAlignment(format!(
            "{}: no biallelic site",
            ctx.name
        )));
    }

    writer.write_all(
        format!(
            "#NEXUS\n\nBegin data;\n\tdimensions ntax={} nchar={} ;\n\tformat datatype=integerdata symbols=\"012\" gap=- missing=? ;\n\tmatrix\n",
            ctx.rows.len(),
            nchar
        )
        .as_ref(),
    )?;
    for ((taxon, _), seq) in ctx.rows.iter().zip(&coded) {
        writer.write_all(format!("{} {}\n", nexus_name(taxon), seq).as_ref())?;
    }
    writer.write_all(b";\n\tend;\n")?;

    Ok(())
}
