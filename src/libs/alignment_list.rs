//! An ordered collection of alignments sharing one store and one partition
//! coordinate space.
//!
//! Active and shelved alignments live in two disjoint maps. Shelving an
//! alignment removes its partitions from the shared space; activating it
//! appends them again.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};

use crate::libs::alignment::{
    write_haplotypes, Alignment, ConsensusMode, Haplotype, RemoveMode, VisibilitySet,
};
use crate::libs::cancel::CancelToken;
use crate::libs::error::{AlnError, Result};
use crate::libs::io::{read_first_column, AtomicFile};
use crate::libs::partition::{NameConflict, NewPartition, Partitions};
use crate::libs::seqcode::SequenceCode;
use crate::libs::store::{SharedStore, TableHandle, TableIo};
use crate::libs::writer::{OutputFormat, WriteOptions};

pub const BY_MIN_TAXA: &str = "By minimum taxa";
pub const BY_TAXA: &str = "By taxa";
pub const BY_VARIABLE: &str = "By variable sites";
pub const BY_INFORMATIVE: &str = "By informative sites";

/// Taxa given inline or as a single column file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxaList {
    Names(Vec<String>),
    File(PathBuf),
}

impl TaxaList {
    pub fn resolve(&self) -> Result<Vec<String>> {
        match self {
            TaxaList::Names(names) => Ok(names.clone()),
            TaxaList::File(path) => Ok(read_first_column(&path.to_string_lossy())?),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxaFilterMode {
    /// Keep alignments holding every listed taxon
    Contain,
    /// Keep alignments holding none of the listed taxa
    Exclude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    /// Exactly the listed taxa
    Strict,
    /// At least every listed taxon
    Inclusive,
    /// Any of the listed taxa
    Relaxed,
}

#[derive(Debug)]
pub struct AlignmentList {
    store: SharedStore,
    pub alignments: IndexMap<PathBuf, Alignment>,
    pub shelved: IndexMap<PathBuf, Alignment>,
    /// Taxa of the active alignments, in order of first appearance
    pub taxa_names: Vec<String>,
    pub shelved_taxa: VisibilitySet,
    pub partitions: Partitions,
    pub sequence_code: Option<SequenceCode>,
    /// Alignments shelved by each filter
    pub filtered_alignments: IndexMap<&'static str, usize>,
    /// Files that could not be parsed
    pub bad_alignments: Vec<PathBuf>,
    /// Files whose sequences differ in length
    pub non_alignments: Vec<PathBuf>,
    pub duplicate_alignments: Vec<PathBuf>,
}

impl AlignmentList {
    pub fn new(store: &SharedStore) -> Self {
        Self {
            store: store.clone(),
            alignments: IndexMap::new(),
            shelved: IndexMap::new(),
            taxa_names: vec![],
            shelved_taxa: VisibilitySet::new(),
            partitions: Partitions::new(),
            sequence_code: None,
            filtered_alignments: IndexMap::new(),
            bad_alignments: vec![],
            non_alignments: vec![],
            duplicate_alignments: vec![],
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.alignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alignment> {
        self.alignments.values()
    }

    /// Active or shelved alignment of a path
    pub fn retrieve_alignment(&self, path: &Path) -> Option<&Alignment> {
        self.alignments.get(path).or_else(|| self.shelved.get(path))
    }

    /// Active taxa without the shelved ones
    pub fn active_taxa(&self) -> Vec<String> {
        self.taxa_names
            .iter()
            .filter(|t| self.shelved_taxa.is_visible(t))
            .cloned()
            .collect()
    }

    fn update_taxa(&mut self) {
        let taxa: IndexSet<&String> = self
            .alignments
            .values()
            .flat_map(|a| a.taxa_list.iter())
            .collect();
        self.taxa_names = taxa.into_iter().cloned().collect();
    }

    /// Parses every file, best effort. Unreadable files go to
    /// `bad_alignments`, ragged ones to `non_alignments` and repeated paths
    /// to `duplicate_alignments`. Mixing molecule types is an error.
    pub fn add_alignment_files(&mut self, paths: &[PathBuf], cancel: &CancelToken) -> Result<()> {
        let mut seen: HashSet<&PathBuf> = HashSet::new();
        for path in paths {
            if !seen.insert(path) || self.retrieve_alignment(path).is_some() {
                log::warn!("{}: already loaded", path.display());
                self.duplicate_alignments.push(path.clone());
                continue;
            }
            cancel.check()?;

            match Alignment::from_file(path, &self.store) {
                Ok(aln) => self.add_alignment(aln)?,
                Err(AlnError::UserCancelled) => return Err(AlnError::UserCancelled),
                Err(e @ AlnError::Store(_)) => return Err(e),
                Err(e) if e.is_unequal_length() => {
                    log::warn!("{}", e);
                    self.non_alignments.push(path.clone());
                }
                Err(e) => {
                    log::warn!("{}", e);
                    self.bad_alignments.push(path.clone());
                }
            }
        }
        log::info!(
            "{} alignments loaded, {} bad, {} not aligned, {} duplicated",
            self.alignments.len(),
            self.bad_alignments.len(),
            self.non_alignments.len(),
            self.duplicate_alignments.len()
        );

        Ok(())
    }

    /// Appends an alignment and its partitions
    pub fn add_alignment(&mut self, aln: Alignment) -> Result<()> {
        match self.sequence_code {
            None => self.sequence_code = Some(aln.sequence_code),
            Some(code) if code.kind != aln.sequence_code.kind => {
                return Err(AlnError::MultipleSequenceTypes {
                    path: aln.path.clone(),
                    expected: code.kind.to_string(),
                    found: aln.sequence_code.kind.to_string(),
                })
            }
            Some(_) => {}
        }

        Self::append_partitions(&mut self.partitions, &aln)?;
        self.alignments.insert(aln.path.clone(), aln);
        self.update_taxa();

        Ok(())
    }

    fn append_partitions(partitions: &mut Partitions, aln: &Alignment) -> Result<()> {
        let file = aln.path.display().to_string();
        if aln.partitions.len() <= 1 {
            let mut new = NewPartition::length(&aln.sname, aln.data_length())
                .file(&file)
                .conflict(NameConflict::Suffix);
            if let Some(p) = aln.partitions.iter().next() {
                new = new.model(p.model.clone());
                if p.codon.is_some() {
                    new = new.codon();
                }
            }
            partitions.add_partition(new)?;
            return Ok(());
        }

        for p in aln.partitions.iter() {
            let mut new = NewPartition::length(&p.name, p.len())
                .file(&file)
                .model(p.model.clone())
                .conflict(NameConflict::Suffix);
            if p.codon.is_some() {
                new = new.codon();
            }
            partitions.add_partition(new)?;
        }

        Ok(())
    }

    /// Rebuilds the shared coordinate space from the active alignments
    fn rebuild_partitions(&mut self) -> Result<()> {
        let mut partitions = Partitions::new();
        for aln in self.alignments.values() {
            Self::append_partitions(&mut partitions, aln)?;
        }
        self.partitions = partitions;

        Ok(())
    }

    /// Moves an active alignment to the shelf
    pub fn shelve_file(&mut self, path: &Path) -> Result<()> {
        let Some(aln) = self.alignments.shift_remove(path) else {
            return Ok(());
        };
        if let Err(e) = self.partitions.remove_file(&aln.path.display().to_string()) {
            log::debug!("{}", e);
        }
        self.shelved.insert(path.to_path_buf(), aln);
        self.update_taxa();

        Ok(())
    }

    /// Moves a shelved alignment back to the end of the active ones
    pub fn activate_file(&mut self, path: &Path) -> Result<()> {
        let Some(aln) = self.shelved.shift_remove(path) else {
            return Ok(());
        };
        Self::append_partitions(&mut self.partitions, &aln)?;
        self.alignments.insert(path.to_path_buf(), aln);
        self.update_taxa();

        Ok(())
    }

    /// Hides taxa from output and statistics
    pub fn shelve_taxa(&mut self, taxa: &[String]) {
        for taxon in taxa {
            self.shelved_taxa.hide(taxon);
        }
    }

    pub fn activate_taxa(&mut self, taxa: &[String]) {
        for taxon in taxa {
            self.shelved_taxa.show(taxon);
        }
    }

    /// Drops the alignments of the listed paths
    pub fn remove_file(&mut self, paths: &[PathBuf]) -> Result<()> {
        for path in paths {
            let aln = self
                .alignments
                .shift_remove(path)
                .or_else(|| self.shelved.shift_remove(path));
            if let Some(mut aln) = aln {
                aln.drop_tables()?;
                if let Err(e) = self.partitions.remove_file(&path.display().to_string()) {
                    log::debug!("{}", e);
                }
            }
        }
        self.update_taxa();

        Ok(())
    }

    /// Drops every table and empties the collection
    pub fn clear(&mut self) -> Result<()> {
        for (_, mut aln) in self.alignments.drain(..).chain(self.shelved.drain(..)) {
            aln.drop_tables()?;
        }
        *self = Self::new(&self.store);

        Ok(())
    }

    /// One alignment with the visible taxa of every active alignment. Taxa
    /// absent from a locus get missing data for its length. Gap-coded blocks
    /// follow all the sequence data, in alignment order.
    pub fn concatenate(&self, name: &str, cancel: &CancelToken) -> Result<Alignment> {
        let code = self
            .sequence_code
            .ok_or_else(|| AlnError::EmptyAlignment(name.to_string()))?;
        let taxa = self.active_taxa();
        if self.alignments.is_empty() || taxa.is_empty() {
            return Err(AlnError::EmptyAlignment(name.to_string()));
        }

        let total: usize = self.alignments.values().map(|a| a.data_length()).sum();
        if total != self.partitions.counter {
            return Err(AlnError::PartitionConsistency(format!(
                "concatenated length {} differs from the partitions ({})",
                total, self.partitions.counter
            )));
        }

        let mut seqs: Vec<String> = vec![String::with_capacity(total); taxa.len()];
        let mut coded: Vec<String> = vec![String::new(); taxa.len()];
        for aln in self.alignments.values() {
            cancel.check()?;
            let seq_of: HashMap<String, String> = aln
                .current_rows()?
                .into_iter()
                .map(|r| (r.taxon, r.seq))
                .collect();
            let data_len = aln.data_length();
            let filler = code.missing.to_string().repeat(aln.locus_length);
            for ((taxon, seq), block) in taxa.iter().zip(seqs.iter_mut()).zip(coded.iter_mut()) {
                let full = seq_of.get(taxon).unwrap_or(&filler);
                seq.push_str(&full[..data_len]);
                block.push_str(&full[data_len..]);
            }
        }
        let coded_len = coded.first().map_or(0, |c| c.len());
        for (seq, block) in seqs.iter_mut().zip(&coded) {
            seq.push_str(block);
        }

        let records: Vec<(String, String)> = taxa.into_iter().zip(seqs).collect();
        let mut concat = Alignment::from_records(
            Path::new(name),
            &records,
            code,
            Some(self.partitions.clone()),
            TableHandle::named(name),
            &self.store,
        )?;
        if coded_len > 0 {
            concat.restriction_range = Some((total, total + coded_len - 1));
        }
        log::info!(
            "concatenated {} alignments into {} sites",
            self.alignments.len(),
            concat.locus_length
        );

        Ok(concat)
    }

    fn check_not_empty(&self, filter: &str) -> Result<()> {
        if self.alignments.is_empty() {
            return Err(AlnError::EmptyAlignment(format!(
                "no alignment left after filter {}",
                filter
            )));
        }
        Ok(())
    }

    fn shelve_failing<F>(&mut self, counter: &'static str, mut keep: F) -> Result<()>
    where
        F: FnMut(&Alignment) -> Result<bool>,
    {
        let mut doomed = vec![];
        for (path, aln) in &self.alignments {
            if !keep(aln)? {
                doomed.push(path.clone());
            }
        }
        for path in &doomed {
            self.shelve_file(path)?;
        }
        self.filtered_alignments.insert(counter, doomed.len());
        log::info!("{}: {} alignments shelved", counter, doomed.len());

        self.check_not_empty(counter)
    }

    /// Shelves alignments with fewer than `ceil(pct% * |taxa|)` taxa
    pub fn filter_min_taxa(&mut self, pct: f64) -> Result<()> {
        let threshold = (pct / 100.0 * self.taxa_names.len() as f64).ceil() as usize;
        self.shelve_failing(BY_MIN_TAXA, |aln| Ok(aln.taxa_list.len() >= threshold))
    }

    pub fn filter_by_taxa(&mut self, mode: TaxaFilterMode, taxa: &TaxaList) -> Result<()> {
        let taxa = taxa.resolve()?;
        self.shelve_failing(BY_TAXA, |aln| {
            Ok(match mode {
                TaxaFilterMode::Contain => taxa.iter().all(|t| aln.contains_taxon(t)),
                TaxaFilterMode::Exclude => !taxa.iter().any(|t| aln.contains_taxon(t)),
            })
        })
    }

    pub fn filter_segregating_sites(&mut self, min: Option<usize>, max: Option<usize>) -> Result<()> {
        self.shelve_failing(BY_VARIABLE, |aln| {
            aln.filter_segregating_sites(&TableIo::in_place(aln.active_table()), min, max)
        })
    }

    pub fn filter_informative_sites(&mut self, min: Option<usize>, max: Option<usize>) -> Result<()> {
        self.shelve_failing(BY_INFORMATIVE, |aln| {
            aln.filter_informative_sites(&TableIo::in_place(aln.active_table()), min, max)
        })
    }

    /// Runs `op` on every active alignment. If any call fails, every
    /// alignment is restored to its state before this call.
    fn apply_all<F>(&mut self, cancel: &CancelToken, mut op: F) -> Result<()>
    where
        F: FnMut(&mut Alignment) -> Result<()>,
    {
        let snapshots: Vec<_> = self.alignments.values().map(|a| a.snapshot()).collect();

        let mut failure = None;
        for aln in self.alignments.values_mut() {
            if let Err(e) = cancel.check().and_then(|_| op(aln)) {
                failure = Some(e);
                break;
            }
        }

        match failure {
            None => Ok(()),
            Some(e) => {
                for (aln, snapshot) in self.alignments.values_mut().zip(snapshots) {
                    aln.restore(snapshot)?;
                }
                log::warn!("{}, alignments restored", e);
                Err(e)
            }
        }
    }

    pub fn filter_codon_positions(&mut self, positions: [bool; 3], cancel: &CancelToken) -> Result<()> {
        self.apply_all(cancel, |aln| {
            let io = aln.next_io("codon");
            aln.filter_codon_positions(&io, positions, cancel)
        })?;
        self.rebuild_partitions()
    }

    /// Alignments left without columns are shelved
    pub fn filter_missing_data(
        &mut self,
        gap_threshold: f64,
        missing_threshold: f64,
        cancel: &CancelToken,
    ) -> Result<()> {
        let mut emptied = vec![];
        self.apply_all(cancel, |aln| {
            let io = aln.next_io("filter");
            match aln.filter_missing_data(&io, gap_threshold, missing_threshold, cancel) {
                Err(AlnError::EmptyAlignment(name)) => {
                    log::warn!("{}: no column passes the missing data filter", name);
                    emptied.push(aln.path.clone());
                    Ok(())
                }
                other => other,
            }
        })?;
        for path in &emptied {
            self.shelve_file(path)?;
        }
        self.rebuild_partitions()?;

        self.check_not_empty("missing data")
    }

    /// Collapses every alignment. With `dir`, each writes
    /// `{dir}/{sname}{suffix}.haplotypes` once all of them are collapsed.
    pub fn collapse(
        &mut self,
        prefix: &str,
        dir: Option<&Path>,
        suffix: &str,
        cancel: &CancelToken,
    ) -> Result<IndexMap<PathBuf, Vec<Haplotype>>> {
        let mut result = IndexMap::new();
        self.apply_all(cancel, |aln| {
            let io = aln.next_io("collapsed");
            let haplotypes = aln.collapse(&io, prefix, None, cancel)?;
            result.insert(aln.path.clone(), haplotypes);
            Ok(())
        })?;
        self.update_taxa();

        if let Some(dir) = dir {
            for (path, haplotypes) in &result {
                let Some(aln) = self.alignments.get(path) else {
                    continue;
                };
                let file = dir.join(format!("{}{}.haplotypes", aln.sname, suffix));
                let mut writer = AtomicFile::create(&file)?;
                write_haplotypes(&mut writer, haplotypes)?;
                writer.commit()?;
            }
        }

        Ok(result)
    }

    /// Consensus of every alignment. With `single_file` the consensus rows
    /// are also returned, named after their alignments.
    pub fn consensus(
        &mut self,
        mode: ConsensusMode,
        single_file: bool,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<(String, String)>>> {
        let mut records = vec![];
        self.apply_all(cancel, |aln| {
            let io = aln.next_io("consensus");
            aln.consensus(&io, mode, cancel)?;
            if single_file {
                let seq = aln.sequence("consensus")?.unwrap_or_default();
                records.push((aln.sname.clone(), seq));
            }
            Ok(())
        })?;
        self.rebuild_partitions()?;
        self.update_taxa();

        Ok(single_file.then_some(records))
    }

    /// Gap-codes every alignment. Partitions keep covering only the
    /// sequence data.
    pub fn code_gaps(&mut self, cancel: &CancelToken) -> Result<()> {
        self.apply_all(cancel, |aln| {
            let io = aln.next_io("gaps");
            aln.code_gaps(&io, cancel).map(|_| ())
        })?;
        self.rebuild_partitions()
    }

    pub fn remove_taxa(&mut self, taxa: &TaxaList, mode: RemoveMode) -> Result<()> {
        let taxa = taxa.resolve()?;
        self.apply_all(&CancelToken::new(), |aln| aln.remove_taxa(&taxa, mode))?;
        self.update_taxa();

        Ok(())
    }

    /// Renames a taxon in every alignment holding it
    pub fn change_taxon_name(&mut self, old: &str, new: &str) -> Result<()> {
        let holder = self
            .alignments
            .values()
            .chain(self.shelved.values())
            .find(|a| a.contains_taxon(new));
        if let Some(aln) = holder.filter(|_| old != new) {
            return Err(AlnError::DuplicateTaxon {
                path: aln.path.clone(),
                taxa: vec![new.to_string()],
            });
        }
        let mut found = false;
        for aln in self.alignments.values_mut().chain(self.shelved.values_mut()) {
            if aln.contains_taxon(old) {
                aln.change_taxon_name(old, new)?;
                found = true;
            }
        }
        if !found {
            return Err(AlnError::UnknownTaxon(old.to_string()));
        }
        for t in self.taxa_names.iter_mut().filter(|t| *t == old) {
            *t = new.to_string();
        }
        if !self.shelved_taxa.is_visible(old) {
            self.shelved_taxa.show(old);
            self.shelved_taxa.hide(new);
        }

        Ok(())
    }

    /// Paths of the active alignments matching the taxa
    pub fn select_by_taxa(&self, taxa: &TaxaList, mode: SelectMode) -> Result<Vec<PathBuf>> {
        let taxa: HashSet<String> = taxa.resolve()?.into_iter().collect();

        Ok(self
            .alignments
            .iter()
            .filter(|(_, aln)| {
                let own: HashSet<&String> = aln.taxa_list.iter().collect();
                match mode {
                    SelectMode::Strict => {
                        own.len() == taxa.len() && taxa.iter().all(|t| own.contains(t))
                    }
                    SelectMode::Inclusive => taxa.iter().all(|t| own.contains(t)),
                    SelectMode::Relaxed => taxa.iter().any(|t| own.contains(t)),
                }
            })
            .map(|(path, _)| path.clone())
            .collect())
    }

    /// Concatenates, then splits by `partitions` or the shared partitions
    pub fn reverse_concatenate(
        &self,
        partitions: Option<&Partitions>,
        cancel: &CancelToken,
    ) -> Result<AlignmentList> {
        let concat = self.concatenate("concatenated", cancel)?;
        let loci = concat.reverse_concatenate(partitions, cancel)?;

        let mut list = AlignmentList::new(&self.store);
        for aln in loci {
            list.add_alignment(aln)?;
        }

        Ok(list)
    }

    /// One active taxon per line
    pub fn write_taxa_to_file(&self, path: &Path) -> Result<PathBuf> {
        let mut file = AtomicFile::create(path)?;
        for taxon in self.active_taxa() {
            file.write_all(format!("{}\n", taxon).as_ref())?;
        }

        Ok(file.commit()?)
    }

    /// Writes every active alignment to `{dir}/{sname}{suffix}{extension}`
    pub fn write_to_file(
        &self,
        format: OutputFormat,
        dir: &Path,
        suffix: &str,
        opts: &WriteOptions,
    ) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = vec![];
        for aln in self.alignments.values() {
            let stem = dir.join(format!("{}{}", aln.sname, suffix));
            written.extend(aln.write_to_file(format, &stem, opts, &self.shelved_taxa)?);
        }

        Ok(written)
    }
}
