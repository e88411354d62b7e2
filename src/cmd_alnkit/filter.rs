use clap::*;
use std::io::Write;
use std::path::PathBuf;

use alnkit::libs::alignment_list::{TaxaFilterMode, TaxaList};
use alnkit::libs::cancel::CancelToken;

// Create clap subcommand arguments
pub fn make_subcommand() -> Command {
    Command::new("filter")
        .about("Filters alignments, columns and codon positions")
        .after_help(
            r###"
Applies the requested filters in a fixed order, then writes the alignments
that survived.

Order:
1. --codon            keep the listed codon positions (1-based)
2. --gap / --missing  remove columns above the thresholds
3. --min-taxa         shelve alignments with less than this % of the taxa
4. --contain          shelve alignments lacking any of these taxa
5. --exclude          shelve alignments holding any of these taxa
6. --variable         shelve alignments out of `min,max` segregating sites
7. --informative      shelve alignments out of `min,max` informative sites

Notes:
* Leading and trailing gaps count as missing data for column filters
* Thresholds are percentages, `--gap 0` removes every column with a gap
* Taxa may be listed inline, or read from `--taxa-file` with a bare
  `--contain` / `--exclude`
* An empty bound of `min,max` is open: `--variable 2,`
* The number of alignments shelved by each filter is printed to stdout

Examples:
1. Columns with at most 25% gaps and 50% missing data:
   alnkit filter tests/aln/gene*.fas --gap 25 --missing 50 -o out

2. Alignments with at least 75% of the taxa and 1 informative site:
   alnkit filter tests/aln/gene*.fas --min-taxa 75 --informative 1, -o out

3. First and second codon positions:
   alnkit filter tests/aln/gene1.fas --codon 1,2 -o out

"###,
        )
        .arg(super::infiles_arg())
        .arg(
            Arg::new("codon")
                .long("codon")
                .num_args(1)
                .value_delimiter(',')
                .value_parser(value_parser!(usize))
                .help("Codon positions to keep"),
        )
        .arg(
            Arg::new("gap")
                .long("gap")
                .num_args(1)
                .value_parser(value_parser!(f64))
                .help("Maximum percentage of gaps in a column"),
        )
        .arg(
            Arg::new("missing")
                .long("missing")
                .num_args(1)
                .value_parser(value_parser!(f64))
                .help("Maximum percentage of gaps and missing data in a column"),
        )
        .arg(
            Arg::new("min_taxa")
                .long("min-taxa")
                .num_args(1)
                .value_parser(value_parser!(f64))
                .help("Minimum percentage of the taxa"),
        )
        .arg(
            Arg::new("contain")
                .long("contain")
                .num_args(0..)
                .help("Taxa that must all be present"),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .num_args(0..)
                .help("Taxa that must all be absent"),
        )
        .arg(
            Arg::new("taxa_file")
                .long("taxa-file")
                .num_args(1)
                .help("Read --contain/--exclude taxa from this file"),
        )
        .arg(
            Arg::new("variable")
                .long("variable")
                .num_args(1)
                .help("Bounds of segregating sites, `min,max`"),
        )
        .arg(
            Arg::new("informative")
                .long("informative")
                .num_args(1)
                .help("Bounds of informative sites, `min,max`"),
        )
        .args(super::write_args())
        .arg(super::db_arg())
}

/// `min,max` with either side optional
fn parse_bounds(s: &str) -> anyhow::Result<(Option<usize>, Option<usize>)> {
    let (min, max) = s.split_once(',').unwrap_or((s, ""));
    let bound = |v: &str| -> anyhow::Result<Option<usize>> {
        if v.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(v.trim().parse()?))
        }
    };

    Ok((bound(min)?, bound(max)?))
}

fn taxa_of(args: &ArgMatches, name: &str) -> anyhow::Result<Option<TaxaList>> {
    if !args.contains_id(name) {
        return Ok(None);
    }
    let names: Vec<String> = args
        .get_many::<String>(name)
        .map(|v| v.cloned().collect())
        .unwrap_or_default();

    match (names.is_empty(), args.get_one::<String>("taxa_file")) {
        (false, _) => Ok(Some(TaxaList::Names(names))),
        (true, Some(file)) => Ok(Some(TaxaList::File(PathBuf::from(file)))),
        (true, None) => anyhow::bail!("--{} needs taxa or --taxa-file", name),
    }
}

// command implementation
pub fn execute(args: &ArgMatches) -> anyhow::Result<()> {
    //----------------------------
    // Args
    //----------------------------
    let workspace = super::Workspace::open(args)?;
    let cancel = CancelToken::new();

    let codon = match args.get_many::<usize>("codon") {
        Some(positions) => {
            let mut keep = [false; 3];
            for p in positions {
                if !(1..=3).contains(p) {
                    anyhow::bail!("codon positions are 1, 2 or 3, got {}", p);
                }
                keep[p - 1] = true;
            }
            Some(keep)
        }
        None => None,
    };
    let gap = args.get_one::<f64>("gap").copied();
    let missing = args.get_one::<f64>("missing").copied();
    let variable = args
        .get_one::<String>("variable")
        .map(|s| parse_bounds(s))
        .transpose()?;
    let informative = args
        .get_one::<String>("informative")
        .map(|s| parse_bounds(s))
        .transpose()?;

    //----------------------------
    // Operating
    //----------------------------
    let mut list = workspace.load(args)?;

    if let Some(keep) = codon {
        list.filter_codon_positions(keep, &cancel)?;
    }
    if gap.is_some() || missing.is_some() {
        list.filter_missing_data(gap.unwrap_or(100.0), missing.unwrap_or(100.0), &cancel)?;
    }
    if let Some(pct) = args.get_one::<f64>("min_taxa") {
        list.filter_min_taxa(*pct)?;
    }
    if let Some(taxa) = taxa_of(args, "contain")? {
        list.filter_by_taxa(TaxaFilterMode::Contain, &taxa)?;
    }
    if let Some(taxa) = taxa_of(args, "exclude")? {
        list.filter_by_taxa(TaxaFilterMode::Exclude, &taxa)?;
    }
    if let Some((min, max)) = variable {
        list.filter_segregating_sites(min, max)?;
    }
    if let Some((min, max)) = informative {
        list.filter_informative_sites(min, max)?;
    }

    //----------------------------
    // Output
    //----------------------------
    super::write_list(&list, args)?;

    let mut writer = alnkit::writer("stdout")?;
    for (filter, n) in &list.filtered_alignments {
        writer.write_all(format!("{}\t{}\n", filter, n).as_ref())?;
    }
    writer.write_all(format!("{}\t{}\n", "Active", list.len()).as_ref())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        assert_eq!(parse_bounds("2,5").unwrap(), (Some(2), Some(5)));
        assert_eq!(parse_bounds("2,").unwrap(), (Some(2), None));
        assert_eq!(parse_bounds(",5").unwrap(), (None, Some(5)));
        assert_eq!(parse_bounds("3").unwrap(), (Some(3), None));
        assert!(parse_bounds("x,1").is_err());
    }
}
