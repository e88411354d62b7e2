//! Subcommand modules for the `alnkit` binary.

pub mod collapse;
pub mod concat;
pub mod consensus;
pub mod convert;
pub mod filter;
pub mod gapcode;
pub mod reverse;
pub mod select;
pub mod stat;

use std::path::{Path, PathBuf};

use clap::*;

use alnkit::libs::alignment_list::AlignmentList;
use alnkit::libs::cancel::CancelToken;
use alnkit::libs::store::{SharedStore, Store};
use alnkit::libs::writer::{read_populations, Ima2Options, OutputFormat, WriteOptions};

/// Store of one invocation. Without `--db` it lives in a temporary
/// directory removed on drop.
pub struct Workspace {
    pub store: SharedStore,
    _dir: Option<tempfile::TempDir>,
}

impl Workspace {
    pub fn open(args: &ArgMatches) -> anyhow::Result<Self> {
        match args.get_one::<String>("db") {
            Some(path) => Ok(Self {
                store: Store::open(Path::new(path))?,
                _dir: None,
            }),
            None => {
                let dir = tempfile::TempDir::new()?;
                let store = Store::open(&dir.path().join("alnkit.sqlite"))?;
                Ok(Self {
                    store,
                    _dir: Some(dir),
                })
            }
        }
    }

    /// Loads every input file, logging the rejected ones
    pub fn load(&self, args: &ArgMatches) -> anyhow::Result<AlignmentList> {
        let infiles: Vec<PathBuf> = args
            .get_many::<String>("infiles")
            .unwrap()
            .map(PathBuf::from)
            .collect();

        let mut list = AlignmentList::new(&self.store);
        list.add_alignment_files(&infiles, &CancelToken::new())?;
        if list.is_empty() {
            anyhow::bail!("none of the input files is a valid alignment");
        }

        Ok(list)
    }
}

pub fn infiles_arg() -> Arg {
    Arg::new("infiles")
        .required(true)
        .num_args(1..)
        .index(1)
        .help("Input alignment file(s)")
}

pub fn db_arg() -> Arg {
    Arg::new("db")
        .long("db")
        .num_args(1)
        .help("SQLite file holding the sequences. Default: a temporary file")
}

/// Arguments shared by every command writing alignments
pub fn write_args() -> Vec<Arg> {
    vec![
        Arg::new("format")
            .long("format")
            .short('f')
            .num_args(1)
            .action(ArgAction::Append)
            .value_parser(OutputFormat::ALL.map(|f| f.name()))
            .default_value("fasta")
            .help("Output format(s)"),
        Arg::new("outdir")
            .long("outdir")
            .short('o')
            .num_args(1)
            .default_value(".")
            .help("Output directory"),
        Arg::new("suffix")
            .long("suffix")
            .num_args(1)
            .default_value("")
            .help("Appended to every output file stem"),
        Arg::new("interleave")
            .long("interleave")
            .action(ArgAction::SetTrue)
            .help("Wrap sequences in blocks of 90 columns"),
        Arg::new("phylip_truncate")
            .long("phylip-truncate")
            .num_args(1)
            .value_parser(value_parser!(usize))
            .help("Truncate phylip taxon names to this length"),
        Arg::new("model_phylip")
            .long("model-phylip")
            .num_args(1)
            .help("Model written into the phylip partition file"),
        Arg::new("outgroup")
            .long("outgroup")
            .num_args(1..)
            .help("Outgroup taxa of nexus output"),
        Arg::new("no_charset")
            .long("no-charset")
            .action(ArgAction::SetTrue)
            .help("Do not write charsets into nexus output"),
        Arg::new("ima2_pop")
            .long("ima2-pop")
            .num_args(1)
            .help("`taxon population` file, required by ima2 output"),
        Arg::new("ima2_tree")
            .long("ima2-tree")
            .num_args(1)
            .default_value("")
            .help("Population tree of ima2 output"),
    ]
}

pub fn write_options(args: &ArgMatches) -> anyhow::Result<(Vec<OutputFormat>, WriteOptions)> {
    let formats = args
        .get_many::<String>("format")
        .unwrap()
        .map(|f| f.parse::<OutputFormat>().map_err(anyhow::Error::msg))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let ima2 = match args.get_one::<String>("ima2_pop") {
        Some(file) => Some(Ima2Options::new(
            read_populations(Path::new(file))?,
            args.get_one::<String>("ima2_tree").unwrap(),
        )),
        None => None,
    };

    let opts = WriteOptions {
        interleave: args.get_flag("interleave"),
        phylip_truncate: args.get_one::<usize>("phylip_truncate").copied(),
        model_phylip: args.get_one::<String>("model_phylip").cloned(),
        outgroup: args
            .get_many::<String>("outgroup")
            .map(|v| v.cloned().collect())
            .unwrap_or_default(),
        use_charset: !args.get_flag("no_charset"),
        ima2,
        ..Default::default()
    };

    Ok((formats, opts))
}

/// Writes every active alignment in every requested format
pub fn write_list(list: &AlignmentList, args: &ArgMatches) -> anyhow::Result<Vec<PathBuf>> {
    let (formats, opts) = write_options(args)?;
    let outdir = Path::new(args.get_one::<String>("outdir").unwrap());
    let suffix = args.get_one::<String>("suffix").unwrap();

    let mut written = vec![];
    for format in formats {
        written.extend(list.write_to_file(format, outdir, suffix, &opts)?);
    }

    Ok(written)
}
