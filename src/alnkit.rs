extern crate clap;
use clap::*;

mod cmd_alnkit;

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn main() -> anyhow::Result<()> {
    let app = Command::new("alnkit")
        .version(crate_version!())
        .author(crate_authors!())
        .about("`alnkit` - Partition-aware multiple sequence alignment toolkit")
        .propagate_version(true)
        .arg_required_else_help(true)
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count)
                .global(true)
                .help("Log more. RUST_LOG takes precedence"),
        )
        .subcommand(cmd_alnkit::convert::make_subcommand())
        .subcommand(cmd_alnkit::concat::make_subcommand())
        .subcommand(cmd_alnkit::reverse::make_subcommand())
        .subcommand(cmd_alnkit::filter::make_subcommand())
        .subcommand(cmd_alnkit::collapse::make_subcommand())
        .subcommand(cmd_alnkit::consensus::make_subcommand())
        .subcommand(cmd_alnkit::gapcode::make_subcommand())
        .subcommand(cmd_alnkit::select::make_subcommand())
        .subcommand(cmd_alnkit::stat::make_subcommand())
        .after_help(
            r###"Subcommand groups:

* Formats:
    * convert   - Write alignments in other formats
    * concat    - Concatenate alignments into a supermatrix
    * reverse   - Split a concatenated alignment by its partitions

* Transformations:
    * filter    - Filter alignments, columns and codon positions
    * collapse  - Collapse identical sequences into haplotypes
    * consensus - One consensus sequence per alignment
    * gapcode   - Code indels as binary characters

* Queries:
    * select    - Alignments holding given taxa
    * stat      - Summary statistics and outliers

Input formats (fasta, phylip, nexus, stockholm, loci) are detected from
the file content. Log messages go to stderr; use -v, -vv or RUST_LOG.

"###,
        );

    let matches = app.get_matches();
    setup_logging(matches.get_count("verbose"));

    // Check which subcomamnd the user ran...
    match matches.subcommand() {
        Some(("convert", sub_matches)) => cmd_alnkit::convert::execute(sub_matches),
        Some(("concat", sub_matches)) => cmd_alnkit::concat::execute(sub_matches),
        Some(("reverse", sub_matches)) => cmd_alnkit::reverse::execute(sub_matches),
        Some(("filter", sub_matches)) => cmd_alnkit::filter::execute(sub_matches),
        Some(("collapse", sub_matches)) => cmd_alnkit::collapse::execute(sub_matches),
        Some(("consensus", sub_matches)) => cmd_alnkit::consensus::execute(sub_matches),
        Some(("gapcode", sub_matches)) => cmd_alnkit::gapcode::execute(sub_matches),
        Some(("select", sub_matches)) => cmd_alnkit::select::execute(sub_matches),
        Some(("stat", sub_matches)) => cmd_alnkit::stat::execute(sub_matches),
        _ => unreachable!(),
    }?;

    Ok(())
}
