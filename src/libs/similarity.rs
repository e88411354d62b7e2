//! Memoized pairwise comparisons.
//!
//! Results live in `pw_table` of the shared store, keyed by an xxh3 hash of
//! both sequences and the locus length. Lookups between `connect()` and
//! `disconnect()` go through the table; new results are buffered and written
//! in one transaction on `disconnect()`.

use std::collections::HashMap;

use xxhash_rust::xxh3::xxh3_64;

use crate::libs::error::Result;
use crate::libs::seqcode::GAP;
use crate::libs::store::SharedStore;

/// `(matches, effective_len)` of one pair
pub type Similarity = Option<(usize, usize)>;

/// Compares two aligned sequences, skipping columns where either residue is
/// a gap or missing data. `None` when no column is comparable.
///
/// ```
/// use alnkit::libs::similarity::pairwise_similarity;
/// assert_eq!(pairwise_similarity("acgt-", "acct-", 'n'), Some((3, 4)));
/// assert_eq!(pairwise_similarity("nn--", "acgt", 'n'), None);
/// ```
pub fn pairwise_similarity(seq1: &str, seq2: &str, missing: char) -> Similarity {
    let mut matches = 0;
    let mut effective = 0;
    for (c1, c2) in seq1.chars().zip(seq2.chars()) {
        if c1 == GAP || c2 == GAP || c1 == missing || c2 == missing {
            continue;
        }
        effective += 1;
        if c1 == c2 {
            matches += 1;
        }
    }

    if effective == 0 {
        None
    } else {
        Some((matches, effective))
    }
}

fn pair_hash(seq1: &str, seq2: &str) -> String {
    let mut bytes = Vec::with_capacity(seq1.len() + seq2.len() + 1);
    bytes.extend_from_slice(seq1.as_bytes());
    bytes.push(0);
    bytes.extend_from_slice(seq2.as_bytes());

    format!("{:016x}", xxh3_64(&bytes))
}

#[derive(Debug)]
pub struct PairwiseCache {
    store: SharedStore,
    connected: bool,
    memory: HashMap<(String, usize), Similarity>,
    pending: Vec<(String, usize, Similarity)>,
}

impl PairwiseCache {
    pub fn new(store: &SharedStore) -> Self {
        Self {
            store: store.clone(),
            connected: false,
            memory: HashMap::new(),
            pending: vec![],
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Creates `pw_table` when needed and starts a batch
    pub fn connect(&mut self) -> Result<()> {
        let connection = self.store.lock();
        connection.execute(
            "CREATE TABLE IF NOT EXISTS pw_table (hash TEXT, seq_len INTEGER, val INTEGER, effective_len INTEGER, PRIMARY KEY (hash, seq_len))",
            (),
        )?;
        self.connected = true;

        Ok(())
    }

    /// Persists the results computed since `connect()` and ends the batch
    pub fn disconnect(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            let mut connection = self.store.lock();
            let transaction = connection.transaction()?;
            {
                let mut insert = transaction.prepare(
                    "INSERT OR REPLACE INTO pw_table (hash, seq_len, val, effective_len) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (hash, seq_len, sim) in &self.pending {
                    insert.execute((
                        hash,
                        *seq_len as i64,
                        sim.map(|(m, _)| m as i64),
                        sim.map(|(_, e)| e as i64),
                    ))?;
                }
            }
            transaction.commit()?;
            log::debug!("{} pairwise comparisons cached", self.pending.len());
            self.pending.clear();
        }
        self.connected = false;

        Ok(())
    }

    /// Runs `f` between `connect()` and `disconnect()`. The batch is closed
    /// on every path, so results computed before an error are persisted.
    pub fn batch<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.connect()?;
        let result = f(self);
        let closed = self.disconnect();
        let value = result?;
        closed?;

        Ok(value)
    }

    /// Similarity of a pair. Outside a batch the comparison is computed
    /// without touching the store.
    pub fn similarity(&mut self, seq1: &str, seq2: &str, missing: char) -> Result<Similarity> {
        if !self.connected {
            return Ok(pairwise_similarity(seq1, seq2, missing));
        }

        let seq_len = seq1.len();
        let key = (pair_hash(seq1, seq2), seq_len);
        if let Some(sim) = self.memory.get(&key) {
            return Ok(*sim);
        }

        let stored: Option<(Option<i64>, Option<i64>)> = {
            let connection = self.store.lock();
            let mut statement = connection
                .prepare_cached("SELECT val, effective_len FROM pw_table WHERE hash = ?1 AND seq_len = ?2")?;
            let mut rows = statement.query((&key.0, seq_len as i64))?;
            let stored = match rows.next()? {
                Some(row) => Some((row.get(0)?, row.get(1)?)),
                None => None,
            };
            stored
        };

        let sim = match stored {
            Some((Some(m), Some(e))) => Some((m as usize, e as usize)),
            Some(_) => None,
            None => {
                let sim = pairwise_similarity(seq1, seq2, missing);
                self.pending.push((key.0.clone(), seq_len, sim));
                sim
            }
        };
        self.memory.insert(key, sim);

        Ok(sim)
    }
}
