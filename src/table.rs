use std::sync::Arc;

use crate::record::{Column, Record, Value};
use crate::result::{StoreError, StoreResult};

/// In-memory rows of one backing file, with the column layout fixed at load.
#[derive(Debug, Clone)]
pub(crate) struct Table {
    header: Arc<[String]>,
    columns: Vec<Column>,
    records: Vec<Record>,
}

impl Table {
    pub(crate) fn new(columns: Vec<Column>, records: Vec<Record>) -> Self {
        let header = columns
            .iter()
            .map(|column| column.name.clone())
            .collect::<Vec<_>>()
            .into();

        Self {
            header,
            columns,
            records,
        }
    }

    pub(crate) fn header(&self) -> &Arc<[String]> {
        &self.header
    }

    pub(crate) fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub(crate) fn records(&self) -> &[Record] {
        &self.records
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Position of `name` in the header.
    pub(crate) fn column_index(&self, name: &str) -> StoreResult<usize> {
        self.header
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| StoreError::ColumnNotFound(name.to_owned()))
    }

    /// Records whose value in column `idx` equals `value`.
    pub(crate) fn matching(
        &self,
        idx: usize,
        value: Value,
    ) -> impl Iterator<Item = &Record> + '_ {
        self.records
            .iter()
            .filter(move |record| *record.value_at(idx) == value)
    }

    /// Largest integer in column `idx`, `None` on an empty table.
    pub(crate) fn max_int(&self, idx: usize) -> Option<i64> {
        self.records
            .iter()
            .filter_map(|record| record.value_at(idx).as_int())
            .max()
    }

    pub(crate) fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Drop every record whose value in column `idx` equals `value`,
    /// returning how many were removed.
    pub(crate) fn remove_matching(&mut self, idx: usize, value: &Value) -> usize {
        let before = self.records.len();
        self.records.retain(|record| record.value_at(idx) != value);
        before - self.records.len()
    }

    pub(crate) fn find_mut(&mut self, idx: usize, value: &Value) -> Option<&mut Record> {
        self.records
            .iter_mut()
            .find(|record| record.value_at(idx) == value)
    }
}
