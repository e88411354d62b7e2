use clap::*;
use std::path::Path;

use alnkit::libs::cancel::CancelToken;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("collapse")
        .about("Collapses identical sequences into haplotypes")
        .after_help(
            r###"
Replaces identical sequences of every alignment by one haplotype named
`{prefix}_{n}`, numbered in order of first appearance.

Notes:
* Sequences must be identical, including gaps and missing data
* `{outdir}/{name}{suffix}.haplotypes` maps every haplotype to its taxa:
    Hap_1: taxon_a; taxon_b
    Hap_2: taxon_c

Examples:
1. Collapse and write fasta:
   alnkit collapse tests/aln/gene1.fas -o out

2. Custom prefix, nexus output:
   alnkit collapse tests/aln/gene1.fas --prefix H -f nexus -o out

"###,
        )
        .arg(super::infiles_arg())
        .arg(
            Arg::new("prefix")
                .long("prefix")
                .num_args(1)
                .default_value("Hap")
                .help("Prefix of the haplotype names"),
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
    let prefix = args.get_one::<String>("prefix").unwrap();
    let outdir = Path::new(args.get_one::<String>("outdir").unwrap());
    let suffix = args.get_one::<String>("suffix").unwrap();

    //----------------------------
    // Operating
    //----------------------------
    let mut list = workspace.load(args)?;
    std::fs::create_dir_all(outdir)?;
    let haplotypes = list.collapse(prefix, Some(outdir), suffix, &CancelToken::new())?;
    for (path, haps) in &haplotypes {
        log::info!("{}: {} haplotypes", path.display(), haps.len());
    }

    //----------------------------
    // Output
    //----------------------------
    super::write_list(&list, args)?;

    Ok(())
}
