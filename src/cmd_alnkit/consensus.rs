use clap::*;
use std::io::Write;

use alnkit::libs::alignment::ConsensusMode;
use alnkit::libs::cancel::CancelToken;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("consensus")
        .about("Reduces every alignment to one consensus sequence")
        .after_help(
            r###"
Reduces every alignment to a single sequence named `consensus`.

Modes:
* iupac          - ambiguous columns get their IUPAC code (DNA only)
* soft-mask      - ambiguous columns become missing data
* remove         - ambiguous columns are removed
* first-sequence - the first sequence of the alignment

Notes:
* Gaps and missing data do not make a column ambiguous
* With `--single`, all consensus sequences are printed as one fasta
  file, each named after its alignment, instead of writing files

Examples:
1. IUPAC consensus of every gene:
   alnkit consensus tests/aln/gene*.fas -o out

2. Every consensus into one fasta on stdout:
   alnkit consensus tests/aln/gene*.fas --mode remove --single

"###,
        )
        .arg(super::infiles_arg())
        .arg(
            Arg::new("mode")
                .long("mode")
                .short('m')
                .num_args(1)
                .value_parser(["iupac", "soft-mask", "remove", "first-sequence"])
                .default_value("iupac")
                .help("How ambiguous columns are handled"),
        )
        .arg(
            Arg::new("single")
                .long("single")
                .action(ArgAction::SetTrue)
                .help("Print every consensus as one fasta to stdout"),
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
    let mode = args
        .get_one::<String>("mode")
        .unwrap()
        .parse::<ConsensusMode>()
        .map_err(anyhow::Error::msg)?;
    let is_single = args.get_flag("single");

    //----------------------------
    // Operating
    //----------------------------
    let mut list = workspace.load(args)?;
    let records = list.consensus(mode, is_single, &CancelToken::new())?;

    //----------------------------
    // Output
    //----------------------------
    match records {
        Some(records) => {
            let mut writer = alnkit::writer("stdout")?;
            for (name, seq) in records {
                writer.write_all(format!(">{}\n{}\n", name, seq.to_uppercase()).as_ref())?;
            }
        }
        None => {
            super::write_list(&list, args)?;
        }
    }

    Ok(())
}
