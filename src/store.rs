use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{SaveOptions, StoreConfig};
use crate::encoding::{self, Appender};
use crate::guard::{FileModeGuard, PermissionGuard};
use crate::record::{Column, ColumnType, Entry, Record, Value};
use crate::result::{StoreError, StoreResult};
use crate::table::Table;

/// An in-memory table backed by a single delimited text file.
///
/// Every mutation is written through to the backing file before it returns,
/// and the file is left read-only between writes.
pub struct RecordStore {
    config: StoreConfig,
    table: Table,
    id_idx: usize,
    guard: Box<dyn PermissionGuard>,
}

impl RecordStore {
    /// Load the backing file described by `config`.
    ///
    /// Fails with [`StoreError::Load`] if the file is missing, malformed, has
    /// no integer id column named `config.id_column`, or lacks a column named
    /// in `config.column_types`.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        Self::with_guard(config, FileModeGuard)
    }

    /// Same as [`RecordStore::open`] with a custom [`PermissionGuard`].
    pub fn with_guard(
        config: StoreConfig,
        guard: impl PermissionGuard + 'static,
    ) -> StoreResult<Self> {
        let path = config.path();
        let table = encoding::read_table(
            &path,
            config.delimiter,
            &config.id_column,
            &config.column_types,
        )?;
        if let Some(name) = config
            .column_types
            .keys()
            .find(|name| table.column_index(name).is_err())
        {
            return Err(StoreError::load(path, format!("no column `{name}` to type")));
        }
        let id_idx = table.column_index(&config.id_column)?;

        info!("Opened {:?} with {} rows", path, table.len());

        Ok(Self {
            config,
            table,
            id_idx,
            guard: Box::new(guard),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> PathBuf {
        self.config.path()
    }

    /// Name of the column holding store assigned ids.
    pub fn id_column(&self) -> &str {
        &self.config.id_column
    }

    /// Columns in file order, with the types fixed at load.
    pub fn columns(&self) -> &[Column] {
        self.table.columns()
    }

    /// All records in table order.
    pub fn records(&self) -> &[Record] {
        self.table.records()
    }

    /// Whether a record with id `value` exists.
    pub fn contains(&self, value: impl Into<Value>) -> bool {
        self.table.matching(self.id_idx, value.into()).next().is_some()
    }

    /// Whether any record holds `value` in `column`.
    pub fn contains_in(&self, value: impl Into<Value>, column: &str) -> StoreResult<bool> {
        let idx = self.table.column_index(column)?;
        Ok(self.table.matching(idx, value.into()).next().is_some())
    }

    /// Number of records holding `value` in `column`.
    pub fn count(&self, value: impl Into<Value>, column: &str) -> StoreResult<usize> {
        let idx = self.table.column_index(column)?;
        Ok(self.table.matching(idx, value.into()).count())
    }

    /// Records holding `value` in `column`, in table order.
    pub fn select_where(
        &self,
        value: impl Into<Value>,
        column: &str,
    ) -> StoreResult<Vec<&Record>> {
        let idx = self.table.column_index(column)?;
        Ok(self.table.matching(idx, value.into()).collect())
    }

    /// The record with the given id, if any.
    pub fn get(&self, id: i64) -> Option<&Record> {
        self.table.matching(self.id_idx, Value::Int(id)).next()
    }

    /// Number of records currently in the table.
    pub fn row_count(&self) -> usize {
        self.table.len()
    }

    /// The last `n` records in table order, or all of them if there are fewer.
    pub fn last_n_rows(&self, n: usize) -> &[Record] {
        let records = self.table.records();
        &records[records.len().saturating_sub(n)..]
    }

    /// Id the next inserted record will get: the largest id plus one.
    pub fn next_id(&self) -> StoreResult<i64> {
        next_id(&self.table, self.id_idx, &self.config.id_column)
    }

    /// Insert `entries` in order, returning the id assigned to the last one.
    ///
    /// Every entry is validated before anything is written. Each row is then
    /// appended to the backing file and flushed before the next id is
    /// computed. If a write fails partway, the rows written before it stay in
    /// memory and on disk.
    pub fn insert(&mut self, entries: impl IntoIterator<Item = Entry>) -> StoreResult<i64> {
        let rows = entries
            .into_iter()
            .map(|entry| self.complete_row(entry))
            .collect::<StoreResult<Vec<_>>>()?;
        if rows.is_empty() {
            return Err(StoreError::MalformedRow("no entries to insert".to_owned()));
        }
        self.next_id()?;

        let path = self.config.path();
        let delimiter = self.config.delimiter;
        let id_idx = self.id_idx;
        let id_column = self.config.id_column.as_str();
        let table = &mut self.table;

        let last = unlocked(self.guard.as_ref(), &path, true, || {
            let mut appender =
                Appender::open(&path, delimiter).map_err(|err| StoreError::write(&path, err))?;
            let mut last = 0;

            for mut values in rows {
                let id = next_id(table, id_idx, id_column)?;
                values[id_idx] = Value::Int(id);

                let record = Record::new(table.header().clone(), values);
                appender
                    .append(&record)
                    .map_err(|err| StoreError::write(&path, err))?;
                table.push(record);

                debug!("Appended row {} to {:?}", id, path);
                last = id;
            }

            Ok(last)
        })?;

        info!("Inserted rows up to id {} into {:?}", last, path);
        Ok(last)
    }

    /// Remove every record holding `value` in `column`.
    ///
    /// Returns `false` without touching the disk when nothing matched,
    /// otherwise rewrites the backing file. Memory only changes once the
    /// rewrite succeeded.
    pub fn delete_where(&mut self, value: impl Into<Value>, column: &str) -> StoreResult<bool> {
        let idx = self.table.column_index(column)?;
        let value = value.into();

        let mut staged = self.table.clone();
        let removed = staged.remove_matching(idx, &value);
        if removed == 0 {
            return Ok(false);
        }

        self.commit(staged)?;
        info!("Deleted {} rows where {} = {}", removed, column, value);
        Ok(true)
    }

    /// Remove the record with the given id.
    pub fn delete(&mut self, id: i64) -> StoreResult<bool> {
        let column = self.config.id_column.clone();
        self.delete_where(id, &column)
    }

    /// Replace the fields named in `entry` on the record with the given id,
    /// then rewrite the backing file. Returns `false` if no record has that id.
    /// Memory only changes once the rewrite succeeded.
    pub fn update(&mut self, id: i64, entry: Entry) -> StoreResult<bool> {
        if entry.is_empty() {
            return Err(StoreError::MalformedRow("no fields to update".to_owned()));
        }
        let fields = self.typed_fields(entry)?;

        let mut staged = self.table.clone();
        let Some(record) = staged.find_mut(self.id_idx, &Value::Int(id)) else {
            return Ok(false);
        };
        for (idx, value) in fields {
            record.set_at(idx, value);
        }

        self.commit(staged)?;
        info!("Updated row {} in {:?}", id, self.config.path());
        Ok(true)
    }

    /// Write the whole table to the file named by `options`, returning its path.
    ///
    /// This never changes which file the store reads and appends to.
    pub fn save(&self, options: SaveOptions) -> StoreResult<PathBuf> {
        let path = options.resolve(&self.config, Local::now().date_naive());
        debug!("Resolved save target {:?}", path);

        unlocked(self.guard.as_ref(), &path, false, || {
            encoding::write_table(&path, self.config.delimiter, &self.table)
                .map_err(|err| StoreError::write(&path, err))
        })?;

        info!("Saved {} rows to {:?}", self.table.len(), path);
        Ok(path)
    }

    /// Discard the in-memory table and load the backing file again.
    ///
    /// Columns keep the types they were loaded with, so a text column whose
    /// remaining values look numeric stays text.
    pub fn reload(&mut self) -> StoreResult<()> {
        let pinned: BTreeMap<String, ColumnType> = self
            .table
            .columns()
            .iter()
            .map(|column| (column.name.clone(), column.kind))
            .collect();

        self.table = encoding::read_table(
            &self.config.path(),
            self.config.delimiter,
            &self.config.id_column,
            &pinned,
        )?;
        self.id_idx = self.table.column_index(&self.config.id_column)?;
        Ok(())
    }

    pub fn info(&self) -> TableInfo {
        TableInfo {
            path: self.config.path(),
            rows: self.table.len(),
            columns: self.table.columns().to_vec(),
        }
    }

    /// Render the table as a JSON array of row arrays.
    pub fn to_json(&self) -> StoreResult<String> {
        let rows: Vec<&[Value]> = self.table.records().iter().map(Record::values).collect();
        Ok(serde_json::to_string(&rows)?)
    }

    /// Rewrite the backing file from `staged`, then make it the in-memory table.
    fn commit(&mut self, staged: Table) -> StoreResult<()> {
        let path = self.config.path();
        let delimiter = self.config.delimiter;
        let table = &mut self.table;

        unlocked(self.guard.as_ref(), &path, true, || {
            encoding::write_table(&path, delimiter, &staged)
                .map_err(|err| StoreError::write(&path, err))?;
            *table = staged;
            Ok(())
        })
    }

    /// Resolve entry fields to column positions and column types.
    fn typed_fields(&self, entry: Entry) -> StoreResult<Vec<(usize, Value)>> {
        entry
            .into_fields()
            .into_iter()
            .map(|(name, value)| {
                let idx = self.table.column_index(&name)?;
                if idx == self.id_idx {
                    return Err(StoreError::MalformedRow(format!(
                        "`{name}` is assigned by the store"
                    )));
                }

                let kind = self.table.columns()[idx].kind;
                let value = kind.coerce(value.clone()).ok_or_else(|| {
                    StoreError::MalformedRow(format!(
                        "{} `{value}` is not a valid {kind} for `{name}`",
                        value.kind()
                    ))
                })?;
                Ok((idx, value))
            })
            .collect()
    }

    /// Build a full row from `entry`, leaving a placeholder in the id slot.
    fn complete_row(&self, entry: Entry) -> StoreResult<Vec<Value>> {
        let mut slots: Vec<Option<Value>> = vec![None; self.table.columns().len()];
        slots[self.id_idx] = Some(Value::Int(0));

        for (idx, value) in self.typed_fields(entry)? {
            slots[idx] = Some(value);
        }

        slots
            .into_iter()
            .zip(self.table.columns())
            .map(|(slot, column)| {
                slot.ok_or_else(|| {
                    StoreError::MalformedRow(format!("missing value for `{}`", column.name))
                })
            })
            .collect()
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("config", &self.config)
            .field("rows", &self.table.len())
            .finish_non_exhaustive()
    }
}

/// Dumps the table with aligned columns.
impl fmt::Display for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.table.header();
        let cells: Vec<Vec<String>> = self
            .table
            .records()
            .iter()
            .map(|record| record.values().iter().map(ToString::to_string).collect())
            .collect();

        let widths: Vec<usize> = header
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                cells
                    .iter()
                    .map(|row| row[idx].len())
                    .fold(name.len(), usize::max)
            })
            .collect();

        write_row(f, &widths, header.iter().map(String::as_str))?;
        for row in &cells {
            write_row(f, &widths, row.iter().map(String::as_str))?;
        }
        Ok(())
    }
}

/// Summary of a store's table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: Vec<Column>,
}

impl fmt::Display for TableInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} rows", self.path.display(), self.rows)?;
        for (idx, column) in self.columns.iter().enumerate() {
            writeln!(f, "  {idx:>2}  {:<16} {}", column.name, column.kind)?;
        }
        Ok(())
    }
}

fn write_row<'a>(
    f: &mut fmt::Formatter<'_>,
    widths: &[usize],
    row: impl Iterator<Item = &'a str>,
) -> fmt::Result {
    let line = row
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(f, "{}", line.trim_end())
}

fn next_id(table: &Table, id_idx: usize, id_column: &str) -> StoreResult<i64> {
    let max = table.max_int(id_idx).ok_or(StoreError::EmptyTable)?;
    max.checked_add(1)
        .ok_or_else(|| StoreError::IdOverflow(id_column.to_owned()))
}

/// Run `write` with `path` unlocked, relocking it afterwards whether or not
/// the write succeeded.
fn unlocked<T>(
    guard: &dyn PermissionGuard,
    path: &Path,
    must_exist: bool,
    write: impl FnOnce() -> StoreResult<T>,
) -> StoreResult<T> {
    let existed = guard
        .make_writable(path)
        .map_err(|err| StoreError::write(path, err))?;
    if must_exist && !existed {
        return Err(StoreError::write(
            path,
            io::Error::new(io::ErrorKind::NotFound, "backing file is missing"),
        ));
    }

    let outcome = write();
    let relocked = guard.make_read_only(path);

    match (outcome, relocked) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(StoreError::write(path, err)),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(lock_err)) => {
            warn!("Failed to relock {:?} after a failed write: {}", path, lock_err);
            Err(err)
        }
    }
}
