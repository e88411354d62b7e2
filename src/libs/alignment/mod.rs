//! One locus held in the row store.
//!
//! Derived operations take an explicit [`TableIo`]: they read every row of
//! `io.input`, compute the new rows in memory and replace `io.output` in one
//! transaction. Only after that commit does the alignment point at the
//! output table.

mod collapse;
mod filter;
mod gapcode;
mod reverse;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::libs::error::{AlnError, Result};
use crate::libs::format::{self, InputFormat};
use crate::libs::partition::{NewPartition, Partitions};
use crate::libs::seqcode::SequenceCode;
use crate::libs::store::{SeqRow, SharedStore, TableHandle, TableIo};
use crate::libs::writer::{self, OutputFormat, RenderContext, WriteOptions};

pub use collapse::{write_haplotypes, ConsensusMode, Haplotype};
pub use filter::{in_range, is_informative, is_segregating, replace_terminal_gaps};
pub use gapcode::{code_sequence, gap_spans};

/// Taxa hidden from statistics and output without being deleted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilitySet {
    hidden: HashSet<String>,
}

impl VisibilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hide(&mut self, taxon: &str) {
        self.hidden.insert(taxon.to_string());
    }

    pub fn show(&mut self, taxon: &str) {
        self.hidden.remove(taxon);
    }

    pub fn is_visible(&self, taxon: &str) -> bool {
        !self.hidden.contains(taxon)
    }

    pub fn hidden(&self) -> impl Iterator<Item = &String> {
        self.hidden.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveMode {
    /// Remove the listed taxa
    Remove,
    /// Keep only the listed taxa
    Inverse,
}

/// State of an alignment before a list-wide operation
#[derive(Debug)]
pub(crate) struct Snapshot {
    active: TableHandle,
    derived: usize,
    locus_length: usize,
    taxa_list: Vec<String>,
    taxa_idx: HashMap<String, usize>,
    partitions: Partitions,
    restriction_range: Option<(usize, usize)>,
}

#[derive(Debug)]
pub struct Alignment {
    store: SharedStore,
    pub path: PathBuf,
    /// File name
    pub name: String,
    /// File stem
    pub sname: String,
    pub input_format: Option<InputFormat>,
    pub sequence_code: SequenceCode,
    pub locus_length: usize,
    pub taxa_list: Vec<String>,
    pub taxa_idx: HashMap<String, usize>,
    pub partitions: Partitions,
    /// Table filled when the alignment was created
    pub table: TableHandle,
    active: TableHandle,
    derived: Vec<TableHandle>,
    /// Gap-coded block, 0-based inclusive
    pub restriction_range: Option<(usize, usize)>,
}

impl Alignment {
    /// Parses a file into its own table
    pub fn from_file(path: &Path, store: &SharedStore) -> Result<Self> {
        let parsed = format::read_alignment(path)?;
        let table = TableHandle::for_path(path);

        let rows: Vec<SeqRow> = parsed
            .records
            .iter()
            .enumerate()
            .map(|(i, (taxon, seq))| SeqRow::new(i, taxon, seq))
            .collect();
        store.replace_rows(&table, &rows)?;
        log::info!(
            "{}: {} taxa, {} sites ({})",
            path.display(),
            rows.len(),
            parsed.locus_length,
            parsed.format
        );

        let mut aln = Self::empty(path, store, table, parsed.code);
        aln.input_format = Some(parsed.format);
        aln.partitions = parsed.partitions;
        aln.set_rows(&rows);

        Ok(aln)
    }

    /// Builds an alignment from computed `(taxon, seq)` records. Without
    /// `partitions` a single partition named after the path is created.
    pub fn from_records(
        path: &Path,
        records: &[(String, String)],
        code: SequenceCode,
        partitions: Option<Partitions>,
        table: TableHandle,
        store: &SharedStore,
    ) -> Result<Self> {
        let first = records
            .first()
            .ok_or_else(|| AlnError::EmptyAlignment(path.display().to_string()))?;
        let len = first.1.len();
        if let Some((taxon, seq)) = records.iter().find(|(_, s)| s.len() != len) {
            return Err(AlnError::unequal_length(
                path,
                format!("{} has {} sites, expected {}", taxon, seq.len(), len),
            ));
        }

        let rows: Vec<SeqRow> = records
            .iter()
            .enumerate()
            .map(|(i, (taxon, seq))| SeqRow::new(i, taxon, seq))
            .collect();
        store.replace_rows(&table, &rows)?;

        let mut aln = Self::empty(path, store, table, code);
        aln.partitions = match partitions {
            Some(p) => p,
            None => {
                let mut p = Partitions::new();
                if len > 0 {
                    p.add_partition(
                        NewPartition::length(&aln.sname, len).file(&path.display().to_string()),
                    )?;
                }
                p
            }
        };
        aln.set_rows(&rows);

        Ok(aln)
    }

    fn empty(path: &Path, store: &SharedStore, table: TableHandle, code: SequenceCode) -> Self {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            store: store.clone(),
            path: path.to_path_buf(),
            name,
            sname: format::locus_name(path),
            input_format: None,
            sequence_code: code,
            locus_length: 0,
            taxa_list: vec![],
            taxa_idx: HashMap::new(),
            partitions: Partitions::new(),
            active: table.clone(),
            table,
            derived: vec![],
            restriction_range: None,
        }
    }

    fn set_rows(&mut self, rows: &[SeqRow]) {
        self.taxa_list = rows.iter().map(|r| r.taxon.clone()).collect();
        self.taxa_idx = rows.iter().map(|r| (r.taxon.clone(), r.row_id)).collect();
        self.locus_length = rows.first().map_or(0, |r| r.seq.len());
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Table holding the latest state of this alignment
    pub fn active_table(&self) -> &TableHandle {
        &self.active
    }

    /// Reads the current state and writes `{table}_{suffix}`. Repeating an
    /// operation alternates with `{table}_{suffix}_1`, so the table being
    /// read is never the one replaced.
    pub fn next_io(&self, suffix: &str) -> TableIo {
        let mut output = self.table.derived(suffix);
        if output == self.active {
            output = self.table.derived(&format!("{}_1", suffix));
        }
        TableIo::new(&self.active, &output)
    }

    /// Columns before the gap-coded block
    pub fn data_length(&self) -> usize {
        self.restriction_range
            .map_or(self.locus_length, |(start, _)| start)
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            active: self.active.clone(),
            derived: self.derived.len(),
            locus_length: self.locus_length,
            taxa_list: self.taxa_list.clone(),
            taxa_idx: self.taxa_idx.clone(),
            partitions: self.partitions.clone(),
            restriction_range: self.restriction_range,
        }
    }

    /// Points back at the snapshot state and drops the tables created since
    pub(crate) fn restore(&mut self, snapshot: Snapshot) -> Result<()> {
        for table in self.derived.drain(snapshot.derived..) {
            self.store.drop_table(&table)?;
        }
        self.active = snapshot.active;
        self.locus_length = snapshot.locus_length;
        self.taxa_list = snapshot.taxa_list;
        self.taxa_idx = snapshot.taxa_idx;
        self.partitions = snapshot.partitions;
        self.restriction_range = snapshot.restriction_range;

        Ok(())
    }

    /// Replaces the output table and makes it the current state
    fn commit(&mut self, io: &TableIo, rows: &[SeqRow]) -> Result<()> {
        self.store.replace_rows(&io.output, rows)?;
        if io.output != self.table && !self.derived.contains(&io.output) {
            self.derived.push(io.output.clone());
        }
        self.active = io.output.clone();
        self.set_rows(rows);

        Ok(())
    }

    pub fn rows(&self, table: &TableHandle) -> Result<Vec<SeqRow>> {
        self.store.rows(table)
    }

    /// Rows of the current state
    pub fn current_rows(&self) -> Result<Vec<SeqRow>> {
        self.store.rows(&self.active)
    }

    /// Visible `(taxon, seq)` pairs of the current state
    pub fn sequences(&self, visibility: &VisibilitySet) -> Result<Vec<(String, String)>> {
        Ok(self
            .current_rows()?
            .into_iter()
            .filter(|r| visibility.is_visible(&r.taxon))
            .map(|r| (r.taxon, r.seq))
            .collect())
    }

    pub fn sequence(&self, taxon: &str) -> Result<Option<String>> {
        self.store.sequence(&self.active, taxon)
    }

    /// Columns of the visible sequences, as bytes
    pub fn columns(&self, visibility: &VisibilitySet) -> Result<Vec<Vec<u8>>> {
        let seqs = self.sequences(visibility)?;
        Ok(columns_of(&seqs))
    }

    pub fn contains_taxon(&self, taxon: &str) -> bool {
        self.taxa_idx.contains_key(taxon)
    }

    /// Removes the listed taxa, or everything but them
    pub fn remove_taxa(&mut self, taxa: &[String], mode: RemoveMode) -> Result<()> {
        let listed: HashSet<&str> = taxa.iter().map(|t| t.as_str()).collect();
        let doomed: Vec<String> = self
            .taxa_list
            .iter()
            .filter(|t| match mode {
                RemoveMode::Remove => listed.contains(t.as_str()),
                RemoveMode::Inverse => !listed.contains(t.as_str()),
            })
            .cloned()
            .collect();
        if doomed.is_empty() {
            return Ok(());
        }

        let io = self.next_io("taxa");
        let rows: Vec<SeqRow> = self
            .rows(&io.input)?
            .into_iter()
            .filter(|r| !doomed.contains(&r.taxon))
            .enumerate()
            .map(|(i, r)| SeqRow::new(i, &r.taxon, &r.seq))
            .collect();
        self.commit(&io, &rows)?;
        log::debug!("{}: removed {} taxa", self.name, doomed.len());

        Ok(())
    }

    /// Renames a taxon in every table of this alignment
    pub fn change_taxon_name(&mut self, old: &str, new: &str) -> Result<()> {
        if !self.taxa_idx.contains_key(old) {
            return Err(AlnError::UnknownTaxon(old.to_string()));
        }
        if old != new && self.taxa_idx.contains_key(new) {
            return Err(AlnError::DuplicateTaxon {
                path: self.path.clone(),
                taxa: vec![new.to_string()],
            });
        }
        for table in std::iter::once(&self.table).chain(self.derived.iter()) {
            if self.store.table_exists(table)? {
                self.store.rename_taxon(table, old, new)?;
            }
        }

        if let Some(t) = self.taxa_list.iter_mut().find(|t| *t == old) {
            *t = new.to_string();
        }
        if let Some(idx) = self.taxa_idx.remove(old) {
            self.taxa_idx.insert(new.to_string(), idx);
        }

        Ok(())
    }

    /// Writes the visible taxa to `{stem}{extension}`
    pub fn write_to_file(
        &self,
        format: OutputFormat,
        stem: &Path,
        opts: &WriteOptions,
        visibility: &VisibilitySet,
    ) -> Result<Vec<PathBuf>> {
        let rows = self.sequences(visibility)?;
        let ctx = RenderContext {
            name: &self.sname,
            rows: &rows,
            partitions: &self.partitions,
            code: self.sequence_code,
            locus_length: self.locus_length,
            restriction_range: self.restriction_range,
        };

        writer::write_file(format, &ctx, opts, stem)
    }

    /// Drops the transient tables and returns to the parsed state
    pub fn reset(&mut self) -> Result<()> {
        for table in self.derived.drain(..) {
            self.store.drop_table(&table)?;
        }
        self.active = self.table.clone();
        let rows = self.store.rows(&self.table)?;
        self.set_rows(&rows);
        self.restriction_range = None;

        Ok(())
    }

    /// Drops every table of this alignment
    pub fn drop_tables(&mut self) -> Result<()> {
        for table in self.derived.drain(..) {
            self.store.drop_table(&table)?;
        }
        self.store.drop_table(&self.table)?;

        Ok(())
    }
}

/// Transposes equal-length sequences
pub fn columns_of(seqs: &[(String, String)]) -> Vec<Vec<u8>> {
    let len = seqs.first().map_or(0, |(_, s)| s.len());
    let bytes: Vec<&[u8]> = seqs.iter().map(|(_, s)| s.as_bytes()).collect();

    (0..len)
        .map(|j| bytes.iter().filter_map(|b| b.get(j).copied()).collect())
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::libs::store::Store;

    pub(crate) fn make(records: &[(&str, &str)]) -> Alignment {
        let store = Store::in_memory().unwrap();
        let records: Vec<(String, String)> = records
            .iter()
            .map(|(t, s)| (t.to_string(), s.to_string()))
            .collect();
        let path = Path::new("test/gene.fas");
        Alignment::from_records(
            path,
            &records,
            SequenceCode::dna(),
            None,
            TableHandle::for_path(path),
            &store,
        )
        .unwrap()
    }

    #[test]
    fn from_records() {
        let aln = make(&[("a", "acgt"), ("b", "acga")]);
        assert_eq!(aln.name, "gene.fas");
        assert_eq!(aln.sname, "gene");
        assert_eq!(aln.locus_length, 4);
        assert_eq!(aln.taxa_list, vec!["a", "b"]);
        assert_eq!(aln.taxa_idx["b"], 1);
        assert_eq!(aln.partitions.get("gene").unwrap().range, (0, 3));
        assert_eq!(aln.sequence("b").unwrap().unwrap(), "acga");
    }

    #[test]
    fn unequal_records() {
        let store = Store::in_memory().unwrap();
        let err = Alignment::from_records(
            Path::new("x"),
            &[("a".to_string(), "acgt".to_string()), ("b".to_string(), "ac".to_string())],
            SequenceCode::dna(),
            None,
            TableHandle::named("x"),
            &store,
        )
        .unwrap_err();
        assert!(err.is_unequal_length());
    }

    #[test]
    fn remove_and_rename() {
        let mut aln = make(&[("a", "acgt"), ("b", "acga"), ("c", "acgg")]);
        aln.remove_taxa(&["b".to_string()], RemoveMode::Remove).unwrap();
        assert_eq!(aln.taxa_list, vec!["a", "c"]);

        aln.remove_taxa(&["c".to_string()], RemoveMode::Inverse).unwrap();
        assert_eq!(aln.taxa_list, vec!["c"]);

        aln.change_taxon_name("c", "z").unwrap();
        assert_eq!(aln.taxa_list, vec!["z"]);
        assert_eq!(aln.sequence("z").unwrap().unwrap(), "acgg");
        assert!(aln.change_taxon_name("nope", "y").is_err());
    }

    #[test]
    fn remove_taxa_keeps_parsed_table() {
        let mut aln = make(&[("a", "acgt"), ("b", "acga"), ("c", "acgg")]);
        aln.remove_taxa(&["b".to_string()], RemoveMode::Remove).unwrap();
        assert_ne!(aln.active_table(), &aln.table);
        assert_eq!(aln.taxa_idx["c"], 1);
        assert_eq!(aln.sequence("c").unwrap().unwrap(), "acgg");
        assert_eq!(aln.rows(&aln.table).unwrap().len(), 3);

        // a second removal reads the first one's output
        aln.remove_taxa(&["a".to_string()], RemoveMode::Remove).unwrap();
        assert_eq!(aln.taxa_list, vec!["c"]);

        aln.reset().unwrap();
        assert_eq!(aln.taxa_list, vec!["a", "b", "c"]);
    }

    #[test]
    fn rename_onto_existing_taxon() {
        let mut aln = make(&[("a", "acgt"), ("b", "acga")]);
        match aln.change_taxon_name("a", "b") {
            Err(AlnError::DuplicateTaxon { taxa, .. }) => assert_eq!(taxa, vec!["b"]),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(aln.sequence("a").unwrap().unwrap(), "acgt");
        assert_eq!(aln.sequence("b").unwrap().unwrap(), "acga");
    }

    #[test]
    fn repeated_operation_never_reads_its_output() {
        let mut aln = make(&[("a", "acgt"), ("b", "acga")]);
        let first = aln.next_io("filter");
        let rows = aln.current_rows().unwrap();
        aln.commit(&first, &rows).unwrap();
        let second = aln.next_io("filter");
        assert_eq!(second.input, first.output);
        assert_ne!(second.output, second.input);

        let snap = aln.snapshot();
        aln.commit(&second, &[SeqRow::new(0, "a", "ac")]).unwrap();
        assert_eq!(aln.locus_length, 2);
        aln.restore(snap).unwrap();
        assert_eq!(aln.locus_length, 4);
        assert_eq!(aln.taxa_list, vec!["a", "b"]);
        assert!(!aln.store().table_exists(&second.output).unwrap());
        assert_eq!(aln.sequence("b").unwrap().unwrap(), "acga");
    }

    #[test]
    fn write_visible() {
        let dir = tempfile::TempDir::new().unwrap();
        let aln = make(&[("a", "acgt"), ("b", "acga")]);
        let mut vis = VisibilitySet::new();
        vis.hide("b");

        let paths = aln
            .write_to_file(OutputFormat::Fasta, &dir.path().join("gene"), &WriteOptions::default(), &vis)
            .unwrap();
        let content = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(content, ">a\nACGT\n");
    }

    #[test]
    fn visibility() {
        let aln = make(&[("a", "acgt"), ("b", "acga")]);
        let mut vis = VisibilitySet::new();
        vis.hide("a");

        let seqs = aln.sequences(&vis).unwrap();
        assert_eq!(seqs, vec![("b".to_string(), "acga".to_string())]);
        assert_eq!(aln.columns(&VisibilitySet::new()).unwrap()[3], b"ta".to_vec());
    }
}
