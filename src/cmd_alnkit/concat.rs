use clap::*;
use std::io::Write;
use std::path::Path;

use alnkit::libs::cancel::CancelToken;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("concat")
        .about("Concatenates alignments into a supermatrix")
        .after_help(
            r###"
Concatenates the input alignments, in the given order, into one alignment.

Notes:
* Taxa are the union of all inputs, in order of first appearance
* A taxon absent from a locus is filled with missing data
* Every input becomes a partition named after its file stem
* Nexus output carries the charsets, phylip output a `.partFile`
* `--taxa-file` writes the final taxa list, one per line

Examples:
1. Concatenate into a nexus supermatrix:
   alnkit concat tests/aln/gene1.fas tests/aln/gene2.fas -f nexus -o out

2. Phylip supermatrix with RAxML partitions:
   alnkit concat tests/aln/gene*.fas -f phylip --name matrix -o out

"###,
        )
        .arg(super::infiles_arg())
        .arg(
            Arg::new("name")
                .long("name")
                .num_args(1)
                .default_value("concatenated")
                .help("Stem of the output files"),
        )
        .arg(
            Arg::new("taxa_file")
                .long("taxa-file")
                .num_args(1)
                .help("Also write the taxa list to this file"),
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
    let name = args.get_one::<String>("name").unwrap();
    let (formats, opts) = super::write_options(args)?;
    let outdir = Path::new(args.get_one::<String>("outdir").unwrap());
    let suffix = args.get_one::<String>("suffix").unwrap();

    //----------------------------
    // Operating
    //----------------------------
    let list = workspace.load(args)?;
    let concat = list.concatenate(name, &CancelToken::new())?;

    //----------------------------
    // Output
    //----------------------------
    std::fs::create_dir_all(outdir)?;
    let stem = outdir.join(format!("{}{}", name, suffix));
    for format in formats {
        for path in concat.write_to_file(format, &stem, &opts, &list.shelved_taxa)? {
            log::info!("wrote {}", path.display());
        }
    }

    if let Some(file) = args.get_one::<String>("taxa_file") {
        list.write_taxa_to_file(Path::new(file))?;
    }

    let mut writer = alnkit::writer("stdout")?;
    writer.write_all(
        format!(
            "{}\t{}\t{}\t{}\n",
            name,
            list.len(),
            concat.taxa_list.len(),
            concat.locus_length
        )
        .as_ref(),
    )?;

    Ok(())
}
