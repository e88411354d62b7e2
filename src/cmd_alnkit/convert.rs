use clap::*;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("convert")
        .about("Writes alignments in other formats")
        .after_help(
            r###"
Writes every input alignment to `{outdir}/{name}{suffix}{extension}`.

Notes:
* Input formats are detected from the file content
* Supports both plain text and gzipped (.gz) files
* Files that are not alignments are reported and skipped
* `-f` can be repeated to write several formats
* Partitioned phylip output comes with a RAxML `.partFile`
* ima2 output needs `--ima2-pop` with `taxon population` lines

Examples:
1. Fasta to nexus:
   alnkit convert tests/aln/gene1.fas -f nexus -o out

2. Several files, several formats:
   alnkit convert tests/aln/*.fas -f phylip -f nexus -o out

3. Interleaved phylip with short names:
   alnkit convert tests/aln/gene1.fas -f phylip --interleave --phylip-truncate 10

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

    //----------------------------
    // Operating
    //----------------------------
    let list = workspace.load(args)?;

    //----------------------------
    // Output
    //----------------------------
    for path in super::write_list(&list, args)? {
        log::info!("wrote {}", path.display());
    }

    Ok(())
}
