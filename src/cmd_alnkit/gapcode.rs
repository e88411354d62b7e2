use clap::*;
use std::io::Write;

use alnkit::libs::cancel::CancelToken;
use alnkit::libs::writer::OutputFormat;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("gapcode")
        .about("Codes indels as binary characters")
        .after_help(
            r###"
Appends one binary character per distinct indel to every alignment
(simple indel coding). Each taxon gets:

* 1 - the indel spans exactly this gap of the taxon
* 0 - the taxon has data over the indel
* - - the taxon's gap is part of a longer indel

Notes:
* Coded alignments can only be written as nexus, with a mixed datatype
  (`DNA` followed by `restriction`)
* Prints the number of coded indels of every alignment

Examples:
1. Gap-code and write nexus:
   alnkit gapcode tests/aln/gene1.fas -o out

"###,
        )
        .arg(super::infiles_arg())
        .args(super::write_args())
        .arg(super::db_arg())
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let workspace = super::Workspace::open(args)?;
    let (formats, _) = super::write_options(args)?;
    // fasta is the shared default; coded output is nexus only
    let is_default = args.value_source("format") == Some(parser::ValueSource::DefaultValue);
    if !is_default && formats.iter().any(|f| *f != OutputFormat::Nexus) {
        anyhow::bail!("gap-coded alignments can only be written as nexus");
    }

    //----------------------------
    // Operating
    //----------------------------
    let mut list = workspace.load(args)?;
    list.code_gaps(&CancelToken::new())?;

    //----------------------------
    // Output
    //----------------------------
    let (_, opts) = super::write_options(args)?;
    let outdir = std::path::Path::new(args.get_one::<String>("outdir").unwrap());
    let suffix = args.get_one::<String>("suffix").unwrap();
    list.write_to_file(OutputFormat::Nexus, outdir, suffix, &opts)?;

    let mut writer = alnkit::writer("stdout")?;
    for aln in list.iter() {
        let coded = aln.restriction_range.map_or(0, |(s, e)| e + 1 - s);
        writer.write_all(format!("{}\t{}\n", aln.sname, coded).as_ref())?;
    }

    Ok(())
}
