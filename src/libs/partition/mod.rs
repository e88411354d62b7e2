//! Named partitions over a shared locus coordinate space.
//!
//! Ranges are 0-based and inclusive. Sorted by start, the ranges of one
//! [`Partitions`] are contiguous from `0` to `counter - 1`.

pub mod model;
pub mod reader;

use std::io::Write;

use indexmap::IndexMap;
use intspan::IntSpan;

use crate::libs::error::{AlnError, Result};
pub use model::Model;
pub use reader::{Charset, PartitionFormat};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    pub range: (usize, usize),
    /// Start offsets of the three codon positions
    pub codon: Option<[usize; 3]>,
    pub model: Model,
    /// Alignment files contributing to this partition
    pub files: Vec<String>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.range.1 - self.range.0 + 1
    }

    /// `(name, start, end, stride)` of every sub-partition
    pub fn subparts(&self) -> Vec<(String, usize, usize, usize)> {
        match self.codon {
            Some(codon) => codon
                .iter()
                .enumerate()
                .map(|(i, start)| (format!("{}_{}", self.name, i + 1), *start, self.range.1, 3))
                .collect(),
            None => vec![(self.name.clone(), self.range.0, self.range.1, 1)],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameConflict {
    /// Append `_{n}` to the new name
    #[default]
    Suffix,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    /// Appended after the current counter
    Length(usize),
    /// Explicit inclusive range
    Range(usize, usize),
}

/// Arguments of [`Partitions::add_partition`]
#[derive(Debug, Clone)]
pub struct NewPartition {
    pub name: String,
    pub extent: Extent,
    pub codon: bool,
    pub file: Option<String>,
    pub model: Option<Model>,
    pub conflict: NameConflict,
}

impl NewPartition {
    pub fn length(name: &str, length: usize) -> Self {
        Self {
            name: name.to_string(),
            extent: Extent::Length(length),
            codon: false,
            file: None,
            model: None,
            conflict: NameConflict::default(),
        }
    }

    pub fn range(name: &str, start: usize, end: usize) -> Self {
        Self {
            extent: Extent::Range(start, end),
            ..Self::length(name, 0)
        }
    }

    pub fn file(mut self, file: &str) -> Self {
        self.file = Some(file.to_string());
        self
    }

    pub fn codon(mut self) -> Self {
        self.codon = true;
        self
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn conflict(mut self, conflict: NameConflict) -> Self {
        self.conflict = conflict;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partitions {
    partitions: IndexMap<String, Partition>,
    /// Locus length used to resolve the `.` notation
    pub partition_length: usize,
    /// One past the highest assigned coordinate
    pub counter: usize,
    /// Range of every alignment file in this coordinate space
    pub alignments_range: IndexMap<String, (usize, usize)>,
    /// Ranges of single-file partitions recorded when they were merged
    pub merged_files: IndexMap<String, (usize, usize)>,
    pub format: Option<PartitionFormat>,
}

impl Partitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears partitions, optionally keeping the file ranges
    pub fn reset(&mut self, keep_alignments_range: bool) {
        let alignments_range = std::mem::take(&mut self.alignments_range);
        *self = Self::default();
        if keep_alignments_range {
            self.alignments_range = alignments_range;
        }
    }

    pub fn set_length(&mut self, length: usize) {
        self.partition_length = length;
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.values()
    }

    pub fn get(&self, name: &str) -> Option<&Partition> {
        self.partitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.partitions.contains_key(name)
    }

    /// One partition without codon positions
    pub fn is_single(&self) -> bool {
        self.partitions.len() == 1 && self.iter().all(|p| p.codon.is_none())
    }

    /// Names with codon partitions expanded to `name_1`, `name_2`, `name_3`
    pub fn partition_names(&self) -> Vec<String> {
        self.iter()
            .flat_map(|p| p.subparts().into_iter().map(|s| s.0))
            .collect()
    }

    /// `(partition, subpartition)` pairs in nexus index order
    pub fn subpartition_index(&self) -> Vec<(String, usize)> {
        self.iter()
            .flat_map(|p| {
                let n = if p.codon.is_some() { 3 } else { 1 };
                (0..n).map(move |i| (p.name.clone(), i))
            })
            .collect()
    }

    /// File whose recorded range contains `pos`
    pub fn file_at(&self, pos: usize) -> Option<String> {
        self.alignments_range
            .iter()
            .find(|(_, r)| r.0 <= pos && pos <= r.1)
            .map(|(f, _)| f.clone())
    }

    fn resolve_name(&self, name: &str, conflict: NameConflict) -> Result<String> {
        if !self.partitions.contains_key(name) {
            return Ok(name.to_string());
        }
        match conflict {
            NameConflict::Error => Err(AlnError::PartitionNameConflict(name.to_string())),
            NameConflict::Suffix => {
                let mut c = 1;
                while self.partitions.contains_key(&format!("{}_{}", name, c)) {
                    c += 1;
                }
                Ok(format!("{}_{}", name, c))
            }
        }
    }

    fn record_file_range(&mut self, file: &str, range: (usize, usize)) {
        let entry = self
            .alignments_range
            .entry(file.to_string())
            .or_insert(range);
        entry.0 = entry.0.min(range.0);
        entry.1 = entry.1.max(range.1);
    }

    /// Adds a partition and returns the name it was stored under.
    ///
    /// A range that ends inside the assigned space without the codon flag is
    /// a codon position of the partition ending at the same coordinate.
    pub fn add_partition(&mut self, new: NewPartition) -> Result<String> {
        let (start, end) = match new.extent {
            Extent::Length(0) => {
                return Err(AlnError::PartitionConsistency(format!(
                    "partition {} has zero length",
                    new.name
                )))
            }
            Extent::Length(n) => (self.counter, self.counter + n - 1),
            Extent::Range(start, end) => (start, end),
        };
        if end < start {
            return Err(AlnError::PartitionConsistency(format!(
                "partition {} has a reversed range {}-{}",
                new.name,
                start + 1,
                end + 1
            )));
        }

        if matches!(new.extent, Extent::Range(..)) && !new.codon && end < self.counter {
            return self.add_codon_position(&new.name, start, end);
        }
        if start < self.counter {
            return Err(AlnError::PartitionConsistency(format!(
                "partition {} starts at {} inside a previous partition",
                new.name,
                start + 1
            )));
        }
        if start > self.counter {
            return Err(AlnError::PartitionConsistency(format!(
                "gap between {} and partition {} starting at {}",
                self.counter,
                new.name,
                start + 1
            )));
        }

        let name = self.resolve_name(&new.name, new.conflict)?;
        if let Some(file) = &new.file {
            self.record_file_range(file, (start, end));
        }

        let codon = if new.codon {
            Some([start, start + 1, start + 2])
        } else {
            None
        };
        let model = match (new.model, codon) {
            (Some(model), _) => model,
            (None, Some(_)) => Model::with_subparts(3),
            (None, None) => Model::default(),
        };

        self.partitions.insert(
            name.clone(),
            Partition {
                name: name.clone(),
                range: (start, end),
                codon,
                model,
                files: vec![new.file.unwrap_or_else(|| name.clone())],
            },
        );
        self.counter = end + 1;
        self.partition_length = self.partition_length.max(self.counter);

        Ok(name)
    }

    fn add_codon_position(&mut self, name: &str, start: usize, end: usize) -> Result<String> {
        let parent = self
            .partitions
            .values_mut()
            .find(|p| p.range.1 == end)
            .ok_or_else(|| {
                AlnError::PartitionConsistency(format!(
                    "could not find the parent partition of {}, ranges overlap",
                    name
                ))
            })?;

        let first = parent.range.0;
        if start <= first || start > first + 2 {
            return Err(AlnError::PartitionConsistency(format!(
                "codon partition {} does not start within the first codon of {}",
                name, parent.name
            )));
        }
        if parent.codon.is_none() {
            parent.codon = Some([first, first + 1, first + 2]);
            parent.model.resize(3);
        }

        Ok(parent.name.clone())
    }

    /// Removes a partition and shifts later ranges down to close the gap
    pub fn remove_partition(&mut self, name: &str) -> Result<()> {
        if self.partitions.shift_remove(name).is_none() {
            return Err(AlnError::PartitionConsistency(format!(
                "{} is not a partition name",
                name
            )));
        }
        self.recontiguize();

        Ok(())
    }

    /// Detaches `file` from every partition; a partition left without files
    /// is removed
    pub fn remove_file(&mut self, file: &str) -> Result<()> {
        let mut found = false;
        let mut doomed = vec![];
        for p in self.partitions.values_mut() {
            if let Some(i) = p.files.iter().position(|f| f == file) {
                found = true;
                if p.files.len() == 1 {
                    doomed.push(p.name.clone());
                } else {
                    p.files.remove(i);
                }
            }
        }
        if !found {
            return Err(AlnError::PartitionConsistency(format!(
                "{} does not belong to any partition",
                file
            )));
        }

        for name in &doomed {
            self.partitions.shift_remove(name);
        }
        self.alignments_range.shift_remove(file);
        self.recontiguize();

        Ok(())
    }

    /// Walks partitions in range order with a running offset
    fn recontiguize(&mut self) {
        let mut shifts: Vec<((usize, usize), usize)> = vec![];
        let mut counter = 0;
        for p in self.partitions.values_mut() {
            let len = p.range.1 - p.range.0;
            if p.range.0 != counter {
                shifts.push((p.range, counter));
                p.range = (counter, counter + len);
                if p.codon.is_some() {
                    p.codon = Some([counter, counter + 1, counter + 2]);
                }
            } else {
                shifts.push((p.range, counter));
            }
            counter += len + 1;
        }

        // a range keeps the surviving pieces of itself, closed up
        let relocate = |r: (usize, usize)| -> Option<(usize, usize)> {
            let pieces: Vec<(usize, usize)> = shifts
                .iter()
                .filter_map(|(old, new_start)| {
                    let start = r.0.max(old.0);
                    let end = r.1.min(old.1);
                    (start <= end).then(|| (new_start + start - old.0, new_start + end - old.0))
                })
                .collect();
            let start = pieces.iter().map(|p| p.0).min()?;
            let end = pieces.iter().map(|p| p.1).max()?;
            Some((start, end))
        };
        self.alignments_range = self
            .alignments_range
            .iter()
            .filter_map(|(f, r)| relocate(*r).map(|r| (f.clone(), r)))
            .collect();
        self.merged_files = self
            .merged_files
            .iter()
            .filter_map(|(f, r)| relocate(*r).map(|r| (f.clone(), r)))
            .collect();

        self.counter = counter;
        self.partition_length = counter;
    }

    pub fn change_name(&mut self, old: &str, new: &str) -> Result<()> {
        if self.partitions.contains_key(new) {
            return Err(AlnError::PartitionNameConflict(new.to_string()));
        }
        let idx = self.partitions.get_index_of(old).ok_or_else(|| {
            AlnError::PartitionConsistency(format!("{} is not a partition name", old))
        })?;

        let mut entries: Vec<(String, Partition)> = self.partitions.drain(..).collect();
        entries[idx].0 = new.to_string();
        entries[idx].1.name = new.to_string();
        self.partitions = entries.into_iter().collect();

        Ok(())
    }

    /// Merges adjacent partitions into one named `new_name`
    pub fn merge_partitions(&mut self, names: &[String], new_name: &str) -> Result<()> {
        let mut sources = vec![];
        for name in names {
            let p = self.partitions.get(name).ok_or_else(|| {
                AlnError::PartitionConsistency(format!("{} is not a partition name", name))
            })?;
            sources.push(p.clone());
        }
        if sources.is_empty() {
            return Ok(());
        }
        if self.partitions.contains_key(new_name) && !names.iter().any(|n| n == new_name) {
            return Err(AlnError::PartitionNameConflict(new_name.to_string()));
        }

        let mut ints = IntSpan::new();
        for p in &sources {
            ints.merge(&IntSpan::from_pair(p.range.0 as i32, p.range.1 as i32));
        }
        let spans = ints.spans();
        if spans.len() != 1 {
            let covered = spans
                .iter()
                .map(|(a, b)| format!("{}-{}", a + 1, b + 1))
                .collect::<Vec<_>>()
                .join(",");
            return Err(AlnError::PartitionConsistency(format!(
                "partitions {} are not adjacent: {}",
                names.join(", "),
                covered
            )));
        }
        let range = (spans[0].0 as usize, spans[0].1 as usize);

        let mut files: Vec<String> = vec![];
        for p in &sources {
            if p.files.len() == 1 {
                self.merged_files.insert(p.files[0].clone(), p.range);
            }
            for f in &p.files {
                if !files.contains(f) {
                    files.push(f.clone());
                }
            }
        }

        let merged = Partition {
            name: new_name.to_string(),
            range,
            codon: None,
            model: Model::default(),
            files,
        };
        self.replace_with(names, vec![merged]);

        Ok(())
    }

    /// Splits a partition by explicit ranges, or by the per-file ranges
    /// recorded when it was merged
    pub fn split_partition(
        &mut self,
        name: &str,
        ranges: Option<&[(usize, usize)]>,
        new_names: Option<&[String]>,
    ) -> Result<()> {
        let source = self.partitions.get(name).cloned().ok_or_else(|| {
            AlnError::PartitionConsistency(format!("{} is not a partition name", name))
        })?;

        let mut parts: Vec<Partition> = vec![];
        match ranges {
            Some(ranges) => {
                let new_names = new_names.unwrap_or(&[]);
                if new_names.len() != ranges.len() {
                    return Err(AlnError::PartitionConsistency(format!(
                        "{} ranges but {} names to split {}",
                        ranges.len(),
                        new_names.len(),
                        name
                    )));
                }
                for (n, r) in new_names.iter().zip(ranges) {
                    let files = if source.files.len() == 1 {
                        source.files.clone()
                    } else {
                        source
                            .files
                            .iter()
                            .filter(|f| {
                                self.merged_files
                                    .get(*f)
                                    .map_or(false, |m| m.0 <= r.1 && r.0 <= m.1)
                            })
                            .cloned()
                            .collect()
                    };
                    parts.push(Partition {
                        name: n.clone(),
                        range: *r,
                        codon: None,
                        model: Model::default(),
                        files,
                    });
                }
            }
            None => {
                for f in &source.files {
                    let r = self.merged_files.get(f).ok_or_else(|| {
                        AlnError::PartitionConsistency(format!(
                            "no recorded range for {} in {}",
                            f, name
                        ))
                    })?;
                    let base = std::path::Path::new(f)
                        .file_name()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_else(|| f.clone());
                    parts.push(Partition {
                        name: base,
                        range: *r,
                        codon: None,
                        model: Model::default(),
                        files: vec![f.clone()],
                    });
                }
            }
        }

        parts.sort_by_key(|p| p.range.0);
        let mut cursor = source.range.0;
        for p in &parts {
            if p.range.0 != cursor || p.range.1 < p.range.0 {
                return Err(AlnError::PartitionConsistency(format!(
                    "split of {} leaves a gap or overlap at {}",
                    name,
                    cursor + 1
                )));
            }
            if p.name != name && self.partitions.contains_key(&p.name) {
                return Err(AlnError::PartitionNameConflict(p.name.clone()));
            }
            cursor = p.range.1 + 1;
        }
        if cursor != source.range.1 + 1 {
            return Err(AlnError::PartitionConsistency(format!(
                "split of {} does not cover its range",
                name
            )));
        }

        self.replace_with(&[name.to_string()], parts);

        Ok(())
    }

    /// Removes `names` and puts `parts` where the first of them stood
    fn replace_with(&mut self, names: &[String], parts: Vec<Partition>) {
        let mut entries: Vec<Partition> = self.partitions.drain(..).map(|(_, p)| p).collect();
        let at = entries
            .iter()
            .position(|p| names.contains(&p.name))
            .unwrap_or(entries.len());
        let mut kept: Vec<Partition> = entries.drain(..at).collect();
        kept.extend(parts);
        kept.extend(entries.into_iter().filter(|p| !names.contains(&p.name)));
        kept.sort_by_key(|p| p.range.0);

        self.partitions = kept.into_iter().map(|p| (p.name.clone(), p)).collect();
    }

    /// Rebuilds the coordinate space after columns were removed. `new_len`
    /// gives the surviving length of each partition; emptied partitions are
    /// dropped.
    pub fn resized<F: Fn(&Partition) -> usize>(&self, new_len: F) -> Partitions {
        let mut resized = Partitions::new();
        for p in self.iter() {
            let len = new_len(p);
            if len == 0 {
                continue;
            }
            let start = resized.counter;
            let range = (start, start + len - 1);
            let codon = match p.codon {
                Some(_) if len == p.len() => Some([start, start + 1, start + 2]),
                _ => None,
            };
            for f in &p.files {
                resized.record_file_range(f, range);
            }
            resized.partitions.insert(
                p.name.clone(),
                Partition {
                    name: p.name.clone(),
                    range,
                    codon,
                    model: if codon.is_some() || p.codon.is_none() {
                        p.model.clone()
                    } else {
                        Model::default()
                    },
                    files: p.files.clone(),
                },
            );
            resized.counter += len;
        }
        resized.partition_length = resized.counter;
        resized.format = self.format;

        resized
    }

    /// Sets the models of a partition. One model reverts codon positions,
    /// three models split the partition into codon positions.
    pub fn set_model(
        &mut self,
        name: &str,
        models: &[String],
        links: Option<&[String]>,
    ) -> Result<()> {
        let p = self.partitions.get_mut(name).ok_or_else(|| {
            AlnError::PartitionConsistency(format!("{} is not a partition name", name))
        })?;

        let names: Vec<Option<String>> = models
            .iter()
            .map(|m| if m == "No model" { None } else { Some(m.clone()) })
            .collect();
        let params = names
            .iter()
            .map(|n| {
                n.as_deref()
                    .and_then(model::mrbayes_params)
                    .unwrap_or_default()
            })
            .collect();

        match models.len() {
            1 => {
                p.codon = None;
                p.model = Model {
                    params,
                    names,
                    links: vec![],
                };
            }
            3 => {
                let st = p.range.0;
                p.codon = Some([st, st + 1, st + 2]);
                p.model = Model {
                    params,
                    names,
                    links: links.map(|l| l.to_vec()).unwrap_or_default(),
                };
            }
            n => {
                return Err(AlnError::PartitionConsistency(format!(
                    "{} models given for {}, expected 1 or 3",
                    n, name
                )))
            }
        }

        Ok(())
    }

    /// Applies a `lset`/`prset` command to the indexed subpartitions
    pub fn parse_nexus_model(&mut self, line: &str) {
        let Some(cmd) = model::parse_model_command(line) else {
            return;
        };

        match cmd.applyto {
            None => {
                for p in self.partitions.values_mut() {
                    for i in 0..p.model.params.len() {
                        p.model.push_params(i, &cmd.params);
                    }
                }
            }
            Some(targets) => {
                let index = self.subpartition_index();
                for t in targets {
                    let Some((name, sub)) = t.checked_sub(1).and_then(|i| index.get(i)) else {
                        log::warn!("model applies to unknown partition {}", t);
                        continue;
                    };
                    if let Some(p) = self.partitions.get_mut(name) {
                        p.model.push_params(*sub, &cmd.params);
                    }
                }
            }
        }
    }

    /// RAxML dialect; codon partitions are written per position with `\3`.
    /// Sub-partitions without a named model use `model`.
    pub fn write_raxml<W: Write>(&self, writer: &mut W, model: &str) -> std::io::Result<()> {
        for p in self.iter() {
            for (i, (name, start, end, stride)) in p.subparts().into_iter().enumerate() {
                let model = p
                    .model
                    .names
                    .get(i)
                    .and_then(|n| n.as_deref())
                    .unwrap_or(model);
                let step = if stride > 1 { "\\3" } else { "" };
                writeln!(writer, "{}, {} = {}-{}{}", model, name, start + 1, end + 1, step)?;
            }
        }

        Ok(())
    }

    /// NEXUS `charset` dialect
    pub fn write_nexus<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for p in self.iter() {
            match p.codon {
                Some(_) => {
                    for (name, start, end, _) in p.subparts() {
                        writeln!(writer, "charset {} = {}-{}\\3;", name, start + 1, end + 1)?;
                    }
                }
                None => writeln!(
                    writer,
                    "charset {} = {}-{};",
                    p.name,
                    p.range.0 + 1,
                    p.range.1 + 1
                )?,
            }
        }

        Ok(())
    }
}
