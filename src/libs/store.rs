//! Persistent row store shared by every alignment of a collection.
//!
//! Each alignment owns one table of `(row_id, taxon, seq)` rows. Derived
//! operations read from one table and replace another inside a single
//! transaction, which is the commit point of the operation.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};

use crate::libs::error::{AlnError, Result};

/// One stored sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqRow {
    pub row_id: usize,
    pub taxon: String,
    pub seq: String,
}

impl SeqRow {
    pub fn new(row_id: usize, taxon: &str, seq: &str) -> Self {
        Self {
            row_id,
            taxon: taxon.to_string(),
            seq: seq.to_string(),
        }
    }
}

/// Name of one table in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableHandle {
    name: String,
}

impl TableHandle {
    /// A table name derived from a file path. The path hash keeps files
    /// with the same stem in different directories apart.
    pub fn for_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let hash = xxhash_rust::xxh3::xxh3_64(path.to_string_lossy().as_bytes());

        Self::named(&format!("aln_{}_{:08x}", stem, hash as u32))
    }

    /// Any character outside `[A-Za-z0-9_]` becomes `_`. A rewritten name
    /// gets the xxh3 of the raw name appended, so `gene-1` and `gene_1`
    /// stay apart.
    pub fn named(name: &str) -> Self {
        let clean: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if clean == name {
            return Self { name: clean };
        }
        let hash = xxhash_rust::xxh3::xxh3_64(name.as_bytes());

        Self {
            name: format!("{}_{:08x}", clean, hash as u32),
        }
    }

    pub fn derived(&self, suffix: &str) -> Self {
        Self::named(&format!("{}_{}", self.name, suffix))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn quoted(&self) -> String {
        format!("\"{}\"", self.name)
    }
}

impl std::fmt::Display for TableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The tables an operation reads from and writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIo {
    pub input: TableHandle,
    pub output: TableHandle,
}

impl TableIo {
    pub fn new(input: &TableHandle, output: &TableHandle) -> Self {
        Self {
            input: input.clone(),
            output: output.clone(),
        }
    }

    /// Reads and writes the same table
    pub fn in_place(table: &TableHandle) -> Self {
        Self::new(table, table)
    }
}

/// SQLite-backed store; the mutex serializes every query
#[derive(Debug)]
pub struct Store {
    connection: Mutex<Connection>,
    path: Option<PathBuf>,
}

pub type SharedStore = Arc<Store>;

impl Store {
    pub fn open(path: &Path) -> Result<SharedStore> {
        let connection = Connection::open(path)?;
        log::debug!("opened store {}", path.display());

        Ok(Arc::new(Self {
            connection: Mutex::new(connection),
            path: Some(path.to_path_buf()),
        }))
    }

    pub fn in_memory() -> Result<SharedStore> {
        let connection = Connection::open_in_memory()?;

        Ok(Arc::new(Self {
            connection: Mutex::new(connection),
            path: None,
        }))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        // a panic while holding the lock leaves the connection usable
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn table_exists(&self, table: &TableHandle) -> Result<bool> {
        let connection = self.lock();
        let count: i64 = connection.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            (table.name(),),
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    pub fn create_table(&self, table: &TableHandle) -> Result<()> {
        let connection = self.lock();
        connection.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (row_id INTEGER, taxon TEXT, seq TEXT)",
                table.quoted()
            ),
            (),
        )?;

        Ok(())
    }

    pub fn drop_table(&self, table: &TableHandle) -> Result<()> {
        let connection = self.lock();
        connection.execute(&format!("DROP TABLE IF EXISTS {}", table.quoted()), ())?;

        Ok(())
    }

    /// Replaces the whole content of `table` in one transaction
    pub fn replace_rows(&self, table: &TableHandle, rows: &[SeqRow]) -> Result<()> {
        let mut connection = self.lock();
        let transaction = connection.transaction()?;
        transaction.execute(&format!("DROP TABLE IF EXISTS {}", table.quoted()), ())?;
        transaction.execute(
            &format!(
                "CREATE TABLE {} (row_id INTEGER, taxon TEXT, seq TEXT)",
                table.quoted()
            ),
            (),
        )?;
        {
            let mut insert = transaction.prepare(&format!(
                "INSERT INTO {} (row_id, taxon, seq) VALUES (?1, ?2, ?3)",
                table.quoted()
            ))?;
            for row in rows {
                insert.execute((row.row_id as i64, &row.taxon, &row.seq))?;
            }
        }
        transaction.commit()?;

        Ok(())
    }

    pub fn rows(&self, table: &TableHandle) -> Result<Vec<SeqRow>> {
        if !self.table_exists(table)? {
            return Err(AlnError::MissingTable(table.to_string()));
        }

        let connection = self.lock();
        let mut statement = connection.prepare(&format!(
            "SELECT row_id, taxon, seq FROM {} ORDER BY row_id",
            table.quoted()
        ))?;
        let rows = statement
            .query_map((), |row| {
                Ok(SeqRow {
                    row_id: row.get::<_, i64>(0)? as usize,
                    taxon: row.get(1)?,
                    seq: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn sequence(&self, table: &TableHandle, taxon: &str) -> Result<Option<String>> {
        let connection = self.lock();
        let seq = connection
            .query_row(
                &format!("SELECT seq FROM {} WHERE taxon = ?1", table.quoted()),
                (taxon,),
                |row| row.get(0),
            )
            .optional()?;

        Ok(seq)
    }

    pub fn rename_taxon(&self, table: &TableHandle, old: &str, new: &str) -> Result<usize> {
        let connection = self.lock();
        let n = connection.execute(
            &format!("UPDATE {} SET taxon = ?1 WHERE taxon = ?2", table.quoted()),
            (new, old),
        )?;

        Ok(n)
    }

    pub fn row_count(&self, table: &TableHandle) -> Result<usize> {
        let connection = self.lock();
        let count: i64 = connection.query_row(
            &format!("SELECT count(*) FROM {}", table.quoted()),
            (),
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names() {
        let t = TableHandle::named("my_file");
        assert_eq!(t.name(), "my_file");
        assert_eq!(t.derived("collapse").name(), "my_file_collapse");

        let dashed = TableHandle::named("my-file");
        assert!(dashed.name().starts_with("my_file_"));
        assert_ne!(dashed, t);
        assert_ne!(t.derived("rev_gene-1"), t.derived("rev_gene_1"));

        let a = TableHandle::for_path(Path::new("a/gene.fas"));
        let b = TableHandle::for_path(Path::new("b/gene.fas"));
        assert_ne!(a, b);
        assert!(a.name().starts_with("aln_gene_"));
    }

    #[test]
    fn replace_and_read() {
        let store = Store::in_memory().unwrap();
        let table = TableHandle::named("t");
        assert!(!store.table_exists(&table).unwrap());

        store
            .replace_rows(
                &table,
                &[SeqRow::new(1, "b", "ccgg"), SeqRow::new(0, "a", "aatt")],
            )
            .unwrap();
        assert!(store.table_exists(&table).unwrap());

        let rows = store.rows(&table).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].taxon, "a");
        assert_eq!(store.sequence(&table, "b").unwrap().unwrap(), "ccgg");
        assert!(store.sequence(&table, "z").unwrap().is_none());

        store.replace_rows(&table, &[SeqRow::new(0, "c", "a")]).unwrap();
        assert_eq!(store.row_count(&table).unwrap(), 1);
    }

    #[test]
    fn rename_and_drop() {
        let store = Store::in_memory().unwrap();
        let table = TableHandle::named("t");
        store
            .replace_rows(
                &table,
                &[SeqRow::new(0, "a", "aa"), SeqRow::new(1, "b", "cc")],
            )
            .unwrap();

        assert_eq!(store.rename_taxon(&table, "a", "x").unwrap(), 1);

        let rows = store.rows(&table).unwrap();
        assert_eq!(rows, vec![SeqRow::new(0, "x", "aa"), SeqRow::new(1, "b", "cc")]);

        store.drop_table(&table).unwrap();
        assert!(matches!(store.rows(&table), Err(AlnError::MissingTable(_))));
    }
}
