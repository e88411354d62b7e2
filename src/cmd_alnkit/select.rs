use clap::*;
use std::io::Write;
use std::path::PathBuf;

use alnkit::libs::alignment_list::{SelectMode, TaxaList};

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("select")
        .about("Lists alignments holding given taxa")
        .after_help(
            r###"
Prints the paths of the input alignments whose taxa match the list.

Modes:
* strict    - exactly the listed taxa
* inclusive - at least every listed taxon
* relaxed   - any of the listed taxa

Examples:
1. Alignments with both taxa:
   alnkit select tests/aln/gene*.fas --taxa spa spb

2. Taxa from a file, exact match:
   alnkit select tests/aln/gene*.fas --taxa-file tests/aln/taxa.txt --mode strict

"###,
        )
        .arg(super::infiles_arg())
        .arg(
            Arg::new("taxa")
                .long("taxa")
                .num_args(1..)
                .required_unless_present("taxa_file")
                .help("Taxa to look for"),
        )
        .arg(
            Arg::new("taxa_file")
                .long("taxa-file")
                .num_args(1)
                .conflicts_with("taxa")
                .help("Read the taxa from this file"),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .num_args(1)
                .value_parser(["strict", "inclusive", "relaxed"])
                .default_value("inclusive")
                .help("How taxa are matched"),
        )
        .arg(super::db_arg())
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let workspace = super::Workspace::open(args)?;
    let taxa = match args.get_many::<String>("taxa") {
        Some(taxa) => TaxaList::Names(taxa.cloned().collect()),
        None => TaxaList::File(PathBuf::from(args.get_one::<String>("taxa_file").unwrap())),
    };
    let mode = match args.get_one::<String>("mode").unwrap().as_str() {
        "strict" => SelectMode::Strict,
        "relaxed" => SelectMode::Relaxed,
        _ => SelectMode::Inclusive,
    };

    //----------------------------
    // Operating
    //----------------------------
    let list = workspace.load(args)?;
    let selected = list.select_by_taxa(&taxa, mode)?;

    //----------------------------
    // Output
    //----------------------------
    let mut writer = alnkit::writer("stdout")?;
    for path in selected {
        writer.write_all(format!("{}\n", path.display()).as_ref())?;
    }

    Ok(())
}
