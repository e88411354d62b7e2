use clap::*;
use std::io::Write;

use alnkit::libs::similarity::PairwiseCache;
use alnkit::libs::stats::Outliers;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("stat")
        .about("Summary statistics of alignments")
        .after_help(
            r###"
Prints one line per alignment, then a `total` line.

Columns:
* name, nsites, taxa
* var - segregating sites
* inf - parsimony informative sites
* gap - columns with a gap
* missing - columns with missing data

Notes:
* `--json` prints the summary as one JSON object instead
* `--outliers` prints, per test, the genes or taxa detected as outliers by
  the median absolute deviation (modified z-score above 3.5)
* `--hide` leaves taxa out of every statistic
* Pairwise comparisons are cached in the store given by `--db`

Examples:
1. Table of statistics:
   alnkit stat tests/aln/gene*.fas

2. JSON summary:
   alnkit stat tests/aln/gene*.fas --json

3. Outlier detection, reusing comparisons across runs:
   alnkit stat tests/aln/gene*.fas --outliers --db stats.sqlite

"###,
        )
        .arg(super::infiles_arg())
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the summary as JSON"),
        )
        .arg(
            Arg::new("outliers")
                .long("outliers")
                .action(ArgAction::SetTrue)
                .help("Print outlier genes and taxa"),
        )
        .arg(
            Arg::new("hide")
                .long("hide")
                .num_args(1..)
                .help("Taxa left out of the statistics"),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .num_args(1)
                .default_value("stdout")
                .help("Output filename. [stdout] for screen"),
        )
        .arg(super::db_arg())
}

fn write_outliers(writer: &mut dyn Write, test: &str, outliers: &Outliers) -> anyhow::Result<()> {
    for (label, value) in &outliers.outliers {
        writer.write_all(format!("{}\t{}\t{:.4}\n", test, label, value).as_ref())?;
    }
    Ok(())
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let workspace = super::Workspace::open(args)?;
    let mut writer = alnkit::writer(args.get_one::<String>("outfile").unwrap())?;

    //----------------------------
    // Operating
    //----------------------------
    let mut list = workspace.load(args)?;
    if let Some(taxa) = args.get_many::<String>("hide") {
        let taxa: Vec<String> = taxa.cloned().collect();
        list.shelve_taxa(&taxa);
    }
    let visibility = list.shelved_taxa.clone();

    //----------------------------
    // Output
    //----------------------------
    if args.get_flag("outliers") {
        let mut cache = PairwiseCache::new(&workspace.store);
        writer.write_all(b"test\tlabel\tvalue\n")?;
        write_outliers(&mut writer, "missing", &list.outlier_missing_data(&visibility)?)?;
        write_outliers(&mut writer, "missing_sp", &list.outlier_missing_data_sp(&visibility)?)?;
        write_outliers(&mut writer, "segregating", &list.outlier_segregating(&visibility)?)?;
        write_outliers(
            &mut writer,
            "segregating_sp",
            &list.outlier_segregating_sp(&visibility, &mut cache)?,
        )?;
        write_outliers(&mut writer, "size", &list.outlier_sequence_size(&visibility)?)?;
        write_outliers(&mut writer, "size_sp", &list.outlier_sequence_size_sp(&visibility)?)?;
        return Ok(());
    }

    let summary = list.summary_stats(&visibility)?;
    if args.get_flag("json") {
        writer.write_all(format!("{}\n", serde_json::to_string(&summary)?).as_ref())?;
        return Ok(());
    }

    writer.write_all(b"name\tnsites\ttaxa\tvar\tinf\tgap\tmissing\n")?;
    for gene in &summary.gene_table {
        writer.write_all(
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                gene.name, gene.nsites, gene.taxa, gene.var, gene.inf, gene.gap, gene.missing
            )
            .as_ref(),
        )?;
    }
    writer.write_all(
        format!(
            "total\t{}\t{}\t{}\t{}\t{}\t{}\n",
            summary.seq_len,
            summary.taxa,
            summary.variable,
            summary.informative,
            summary.gaps,
            summary.missing
        )
        .as_ref(),
    )?;

    Ok(())
}
