//! Read-only summaries of an [`AlignmentList`].
//!
//! Every query takes the [`VisibilitySet`] of taxa to leave out.

use std::collections::HashMap;

use itertools::Itertools;
use serde::Serialize;

use crate::libs::alignment::{is_informative, is_segregating, Alignment, VisibilitySet};
use crate::libs::alignment_list::AlignmentList;
use crate::libs::error::{AlnError, Result};
use crate::libs::seqcode::GAP;
use crate::libs::similarity::PairwiseCache;

/// Modified z-score above which a point is an outlier
pub const MAD_THRESHOLD: f64 = 3.5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeneStats {
    pub name: String,
    pub nsites: usize,
    pub taxa: usize,
    pub var: usize,
    pub inf: usize,
    /// Columns with at least one gap
    pub gap: usize,
    /// Columns with at least one missing residue
    pub missing: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    pub genes: usize,
    pub taxa: usize,
    pub seq_len: usize,
    pub gaps: usize,
    pub missing: usize,
    pub variable: usize,
    pub informative: usize,
    pub avg_gaps: f64,
    pub avg_missing: f64,
    pub avg_var: f64,
    pub avg_inf: f64,
    pub gene_table: Vec<GeneStats>,
}

/// Upper triangular matrix over taxa; `data[i][j]` is set for `i < j`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxaMatrix {
    pub labels: Vec<String>,
    pub data: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outliers {
    /// Every `(label, value)` point
    pub data: Vec<(String, f64)>,
    pub outliers: Vec<(String, f64)>,
}

impl Outliers {
    fn from_points(data: Vec<(String, f64)>) -> Self {
        let values: Vec<f64> = data.iter().map(|(_, v)| *v).collect();
        let flags = mad_outliers(&values);
        let outliers = data
            .iter()
            .zip(flags)
            .filter(|(_, f)| *f)
            .map(|(p, _)| p.clone())
            .collect();

        Self { data, outliers }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;

    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Flags points whose modified z-score `0.6745 * |x - median| / mad`
/// exceeds [`MAD_THRESHOLD`]. With a zero MAD any deviation is an outlier.
///
/// ```
/// use alnkit::libs::stats::mad_outliers;
/// let flags = mad_outliers(&[1.0, 1.1, 0.9, 1.0, 1.2, 9.0]);
/// assert_eq!(flags, vec![false, false, false, false, false, true]);
/// ```
pub fn mad_outliers(values: &[f64]) -> Vec<bool> {
    let Some(med) = median(values) else {
        return vec![];
    };
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    let mad = median(&deviations).unwrap_or(0.0);

    deviations
        .iter()
        .map(|d| {
            if mad == 0.0 {
                *d > 0.0
            } else {
                0.6745 * d / mad > MAD_THRESHOLD
            }
        })
        .collect()
}

/// Residues of a sequence that are neither gaps nor missing
fn data_len(seq: &str, missing: char) -> usize {
    seq.chars().filter(|c| *c != GAP && *c != missing).count()
}

fn blank_count(seq: &str, missing: char) -> (usize, usize) {
    let gaps = seq.chars().filter(|c| *c == GAP).count();
    let miss = seq.chars().filter(|c| *c == missing).count();
    (gaps, miss)
}

fn missing_of(aln: &Alignment) -> char {
    aln.sequence_code.missing
}

fn gene_stats(aln: &Alignment, visibility: &VisibilitySet) -> Result<GeneStats> {
    let missing = missing_of(aln) as u8;
    let columns = aln.columns(visibility)?;
    let mut stats = GeneStats {
        name: aln.sname.clone(),
        nsites: aln.locus_length,
        taxa: aln.taxa_list.iter().filter(|t| visibility.is_visible(t)).count(),
        ..Default::default()
    };

    for column in &columns {
        if column.contains(&missing) {
            stats.missing += 1;
        }
        if column.contains(&(GAP as u8)) {
            stats.gap += 1;
        }
        if is_segregating(column, missing) {
            stats.var += 1;
        }
        if is_informative(column, missing) {
            stats.inf += 1;
        }
    }

    Ok(stats)
}

impl AlignmentList {
    fn visible_taxa(&self, visibility: &VisibilitySet) -> Vec<String> {
        self.taxa_names
            .iter()
            .filter(|t| visibility.is_visible(t))
            .cloned()
            .collect()
    }

    fn visible_rows(
        aln: &Alignment,
        visibility: &VisibilitySet,
    ) -> Result<HashMap<String, String>> {
        Ok(aln.sequences(visibility)?.into_iter().collect())
    }

    fn check_data(&self) -> Result<()> {
        if self.alignments.is_empty() {
            return Err(AlnError::EmptyAlignment("no active alignment".to_string()));
        }
        Ok(())
    }

    /// Totals over the active alignments, plus one row per gene
    pub fn summary_stats(&self, visibility: &VisibilitySet) -> Result<SummaryStats> {
        self.check_data()?;
        let mut summary = SummaryStats {
            genes: self.alignments.len(),
            taxa: self.visible_taxa(visibility).len(),
            ..Default::default()
        };

        for aln in self.alignments.values() {
            let gene = gene_stats(aln, visibility)?;
            summary.seq_len += gene.nsites;
            summary.gaps += gene.gap;
            summary.missing += gene.missing;
            summary.variable += gene.var;
            summary.informative += gene.inf;
            summary.gene_table.push(gene);
        }

        let avg = |f: fn(&GeneStats) -> usize| {
            let values: Vec<f64> = summary.gene_table.iter().map(|g| f(g) as f64).collect();
            mean(&values).unwrap_or(0.0)
        };
        summary.avg_gaps = avg(|g| g.gap);
        summary.avg_missing = avg(|g| g.missing);
        summary.avg_var = avg(|g| g.var);
        summary.avg_inf = avg(|g| g.inf);
        log::debug!(
            "{} genes, {} taxa, {} sites",
            summary.genes,
            summary.taxa,
            summary.seq_len
        );

        Ok(summary)
    }

    /// Taxa by genes presence matrix
    pub fn gene_occupancy(&self, visibility: &VisibilitySet) -> Result<Vec<Vec<u8>>> {
        self.check_data()?;

        Ok(self
            .visible_taxa(visibility)
            .iter()
            .map(|taxon| {
                self.alignments
                    .values()
                    .map(|aln| aln.contains_taxon(taxon) as u8)
                    .collect()
            })
            .collect())
    }

    /// Mean `[gaps, missing, data]` proportions of every gene. Absent taxa
    /// count as entirely missing.
    pub fn missing_data_distribution(&self, visibility: &VisibilitySet) -> Result<Vec<[f64; 3]>> {
        self.check_data()?;
        let taxa = self.visible_taxa(visibility);

        let mut result = vec![];
        for aln in self.alignments.values() {
            let rows = Self::visible_rows(aln, visibility)?;
            let len = aln.locus_length.max(1) as f64;
            let mut sums = [0.0; 3];
            for taxon in &taxa {
                match rows.get(taxon) {
                    Some(seq) => {
                        let (gaps, miss) = blank_count(seq, missing_of(aln));
                        sums[0] += gaps as f64 / len;
                        sums[1] += miss as f64 / len;
                        sums[2] += (aln.locus_length - gaps - miss) as f64 / len;
                    }
                    None => sums[1] += 1.0,
                }
            }
            let n = taxa.len().max(1) as f64;
            result.push([sums[0] / n, sums[1] / n, sums[2] / n]);
        }

        Ok(result)
    }

    /// Genes lacking each taxon, most missing first
    pub fn missing_genes_per_species(&self, visibility: &VisibilitySet) -> Result<Vec<(String, usize)>> {
        self.check_data()?;

        Ok(self
            .visible_taxa(visibility)
            .into_iter()
            .map(|taxon| {
                let n = self
                    .alignments
                    .values()
                    .filter(|aln| !aln.contains_taxon(&taxon))
                    .count();
                (taxon, n)
            })
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .collect())
    }

    /// Number of absent taxa in every gene
    pub fn missing_genes_average(&self, visibility: &VisibilitySet) -> Result<Vec<usize>> {
        self.check_data()?;
        let taxa = self.visible_taxa(visibility);

        Ok(self
            .alignments
            .values()
            .map(|aln| taxa.iter().filter(|t| !aln.contains_taxon(t)).count())
            .collect())
    }

    /// Mean pairwise similarity of every gene, in percent. Genes without a
    /// comparable pair are left out.
    pub fn sequence_similarity(
        &self,
        visibility: &VisibilitySet,
        cache: &mut PairwiseCache,
    ) -> Result<Vec<f64>> {
        self.check_data()?;

        cache.batch(|cache| {
            let mut data = vec![];
            for aln in self.alignments.values() {
                let seqs = aln.sequences(visibility)?;
                let mut values = vec![];
                for ((_, s1), (_, s2)) in seqs.iter().tuple_combinations() {
                    if let Some((m, e)) = cache.similarity(s1, s2, missing_of(aln))? {
                        values.push(m as f64 / e as f64);
                    }
                }
                if let Some(m) = mean(&values) {
                    data.push(m * 100.0);
                }
            }
            Ok(data)
        })
    }

    /// Runs `value` on every pair of visible taxa in every gene and averages
    /// the results per pair
    fn pairwise_matrix<F>(
        &self,
        visibility: &VisibilitySet,
        cache: &mut PairwiseCache,
        value: F,
    ) -> Result<TaxaMatrix>
    where
        F: Fn(Option<(usize, usize)>) -> Option<f64>,
    {
        self.check_data()?;
        let labels = self.visible_taxa(visibility);
        let n = labels.len();
        let mut values: Vec<Vec<Vec<f64>>> = vec![vec![vec![]; n]; n];

        cache.batch(|cache| {
            for aln in self.alignments.values() {
                let rows = Self::visible_rows(aln, visibility)?;
                for (i, j) in (0..n).tuple_combinations() {
                    let (Some(s1), Some(s2)) = (rows.get(&labels[i]), rows.get(&labels[j])) else {
                        continue;
                    };
                    if let Some(v) = value(cache.similarity(s1, s2, missing_of(aln))?) {
                        values[i][j].push(v);
                    }
                }
            }
            Ok(())
        })?;

        let data = values
            .iter()
            .map(|row| row.iter().map(|v| mean(v).unwrap_or(0.0)).collect())
            .collect();

        Ok(TaxaMatrix { labels, data })
    }

    /// Mean similarity of every pair of taxa
    pub fn sequence_similarity_per_species(
        &self,
        visibility: &VisibilitySet,
        cache: &mut PairwiseCache,
    ) -> Result<TaxaMatrix> {
        self.pairwise_matrix(visibility, cache, |sim| {
            sim.map(|(m, e)| m as f64 / e as f64)
        })
    }

    /// Segregating sites of every gene, or their proportion of the length
    pub fn segregating_sites(&self, visibility: &VisibilitySet, proportions: bool) -> Result<Vec<f64>> {
        self.check_data()?;

        let mut data = vec![];
        for aln in self.alignments.values() {
            let missing = missing_of(aln) as u8;
            let s = aln
                .columns(visibility)?
                .iter()
                .filter(|c| is_segregating(c, missing))
                .count() as f64;
            if proportions {
                data.push(s / aln.locus_length.max(1) as f64);
            } else {
                data.push(s);
            }
        }

        Ok(data)
    }

    /// Mean number of pairwise differences of every pair of taxa
    pub fn segregating_sites_per_species(
        &self,
        visibility: &VisibilitySet,
        cache: &mut PairwiseCache,
    ) -> Result<TaxaMatrix> {
        self.pairwise_matrix(visibility, cache, |sim| {
            Some(sim.map_or(0.0, |(m, e)| (e - m) as f64))
        })
    }

    /// Proportion of segregating sites in consecutive windows of one gene
    pub fn sliding_window(
        &self,
        gene: &std::path::Path,
        window: usize,
        visibility: &VisibilitySet,
    ) -> Result<Vec<f64>> {
        let aln = self
            .retrieve_alignment(gene)
            .ok_or_else(|| AlnError::EmptyAlignment(gene.display().to_string()))?;
        let missing = missing_of(aln) as u8;
        let columns = aln.columns(visibility)?;

        Ok(columns
            .chunks(window.max(1))
            .map(|chunk| {
                let s = chunk.iter().filter(|c| is_segregating(c, missing)).count();
                s as f64 / chunk.len() as f64
            })
            .collect())
    }

    /// Genes by their proportion of gap and missing cells
    pub fn outlier_missing_data(&self, visibility: &VisibilitySet) -> Result<Outliers> {
        self.check_data()?;

        let mut points = vec![];
        for aln in self.alignments.values() {
            let seqs = aln.sequences(visibility)?;
            let total = (aln.locus_length * seqs.len()).max(1) as f64;
            let blank: usize = seqs
                .iter()
                .map(|(_, s)| {
                    let (g, m) = blank_count(s, missing_of(aln));
                    g + m
                })
                .sum();
            points.push((aln.sname.clone(), blank as f64 / total));
        }

        Ok(Outliers::from_points(points))
    }

    /// Taxa by their mean proportion of gap and missing cells, over the
    /// genes holding them
    pub fn outlier_missing_data_sp(&self, visibility: &VisibilitySet) -> Result<Outliers> {
        self.per_species_points(visibility, |aln, seq| {
            let (g, m) = blank_count(seq, missing_of(aln));
            (g + m) as f64 / aln.locus_length.max(1) as f64
        })
    }

    /// Genes by their proportion of segregating sites
    pub fn outlier_segregating(&self, visibility: &VisibilitySet) -> Result<Outliers> {
        let values = self.segregating_sites(visibility, true)?;
        let points = self
            .alignments
            .values()
            .map(|aln| aln.sname.clone())
            .zip(values)
            .collect();

        Ok(Outliers::from_points(points))
    }

    /// Taxa by their mean pairwise proportion of differences
    pub fn outlier_segregating_sp(
        &self,
        visibility: &VisibilitySet,
        cache: &mut PairwiseCache,
    ) -> Result<Outliers> {
        self.check_data()?;
        let labels = self.visible_taxa(visibility);
        let mut values: Vec<Vec<f64>> = vec![vec![]; labels.len()];

        cache.batch(|cache| {
            for aln in self.alignments.values() {
                let rows = Self::visible_rows(aln, visibility)?;
                for (i, j) in (0..labels.len()).tuple_combinations() {
                    let (Some(s1), Some(s2)) = (rows.get(&labels[i]), rows.get(&labels[j])) else {
                        continue;
                    };
                    let d = cache
                        .similarity(s1, s2, missing_of(aln))?
                        .map_or(0.0, |(m, e)| (e - m) as f64 / e as f64);
                    values[i].push(d);
                    values[j].push(d);
                }
            }
            Ok(())
        })?;

        let points = labels
            .into_iter()
            .zip(values)
            .filter_map(|(t, v)| mean(&v).map(|m| (t, m)))
            .collect();

        Ok(Outliers::from_points(points))
    }

    /// Genes by their mean ungapped sequence length
    pub fn outlier_sequence_size(&self, visibility: &VisibilitySet) -> Result<Outliers> {
        self.check_data()?;

        let mut points = vec![];
        for aln in self.alignments.values() {
            let sizes: Vec<f64> = aln
                .sequences(visibility)?
                .iter()
                .map(|(_, s)| data_len(s, missing_of(aln)) as f64)
                .collect();
            if let Some(m) = mean(&sizes) {
                points.push((aln.sname.clone(), m));
            }
        }

        Ok(Outliers::from_points(points))
    }

    /// Taxa by their mean ungapped sequence length
    pub fn outlier_sequence_size_sp(&self, visibility: &VisibilitySet) -> Result<Outliers> {
        self.per_species_points(visibility, |aln, seq| data_len(seq, missing_of(aln)) as f64)
    }

    fn per_species_points<F>(&self, visibility: &VisibilitySet, value: F) -> Result<Outliers>
    where
        F: Fn(&Alignment, &str) -> f64,
    {
        self.check_data()?;
        let labels = self.visible_taxa(visibility);
        let mut values: Vec<Vec<f64>> = vec![vec![]; labels.len()];

        for aln in self.alignments.values() {
            let rows = Self::visible_rows(aln, visibility)?;
            for (i, taxon) in labels.iter().enumerate() {
                if let Some(seq) = rows.get(taxon) {
                    values[i].push(value(aln, seq));
                }
            }
        }

        let points = labels
            .into_iter()
            .zip(values)
            .filter_map(|(t, v)| mean(&v).map(|m| (t, m)))
            .collect();

        Ok(Outliers::from_points(points))
    }
}
