use clap::*;
use std::path::Path;

use alnkit::libs::alignment::{Alignment, VisibilitySet};
use alnkit::libs::cancel::CancelToken;
use alnkit::libs::partition::Partitions;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("reverse")
        .about("Splits a concatenated alignment by its partitions")
        .after_help(
            r###"
Splits one concatenated alignment into one alignment per partition.

Notes:
* Partitions come from the charsets of a nexus input, or from `--partitions`
* `--partitions` accepts RAxML lines (`DNA, gene1 = 1-100`) or nexus
  charsets, in any order
* Codon partitions (`\3`) are split into one alignment per position
* Taxa made only of missing data in a partition are left out of it
* The partitions must cover the whole alignment

Examples:
1. Split by a RAxML partition file:
   alnkit reverse tests/aln/concat.fas --partitions tests/aln/parts.txt -o out

2. Split a nexus file by its own charsets, writing phylip:
   alnkit reverse out/concatenated.nex -f phylip -o out

"###,
        )
        .arg(
            Arg::new("infile")
                .required(true)
                .num_args(1)
                .index(1)
                .help("Concatenated alignment"),
        )
        .arg(
            Arg::new("partitions")
                .long("partitions")
                .short('p')
                .num_args(1)
                .help("Partition file"),
        )
        .args(super::write_args())
        .arg(super::db_arg())
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let workspace = super::Workspace::open(args)?;
    let infile = Path::new(args.get_one::<String>("infile").unwrap());
    let (formats, opts) = super::write_options(args)?;
    let outdir = Path::new(args.get_one::<String>("outdir").unwrap());
    let suffix = args.get_one::<String>("suffix").unwrap();

    //----------------------------
    // Operating
    //----------------------------
    let aln = Alignment::from_file(infile, &workspace.store)?;

    let partitions = match args.get_one::<String>("partitions") {
        Some(file) => {
            let mut partitions = Partitions::new();
            partitions.set_length(aln.locus_length);
            partitions.read_from_file(Path::new(file))?;
            Some(partitions)
        }
        None => None,
    };
    let loci = aln.reverse_concatenate(partitions.as_ref(), &CancelToken::new())?;

    //----------------------------
    // Output
    //----------------------------
    std::fs::create_dir_all(outdir)?;
    let visibility = VisibilitySet::new();
    for locus in &loci {
        let stem = outdir.join(format!("{}{}", locus.sname, suffix));
        for format in &formats {
            for path in locus.write_to_file(*format, &stem, &opts, &visibility)? {
                log::info!("wrote {}", path.display());
            }
        }
    }

    Ok(())
}
