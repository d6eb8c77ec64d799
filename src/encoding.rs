use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::debug;

use crate::record::{Column, ColumnType, Record};
use crate::result::{StoreError, StoreResult};
use crate::table::Table;

/// Parse the delimited file at `path` into a typed table.
///
/// Columns named in `pinned` keep that type, the rest are inferred from
/// their cells. Pinned names missing from the header are ignored.
///
/// The whole file loads or nothing does: a missing file, a missing header,
/// rows whose arity differs from the header, a cell that does not parse as
/// its column type, a non-integer or duplicated id are all load errors.
pub(crate) fn read_table(
    path: &Path,
    delimiter: u8,
    id_column: &str,
    pinned: &BTreeMap<String, ColumnType>,
) -> StoreResult<Table> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_path(path)
        .map_err(|err| StoreError::load(path, err))?;

    let header = reader
        .headers()
        .map_err(|err| StoreError::load(path, err))?
        .clone();
    if header.is_empty() || header.iter().all(str::is_empty) {
        return Err(StoreError::load(path, "missing header"));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = header.iter().find(|name| !seen.insert(*name)) {
        return Err(StoreError::load(path, format!("duplicate column `{dup}`")));
    }

    let id_idx = header
        .iter()
        .position(|name| name == id_column)
        .ok_or_else(|| StoreError::load(path, format!("no id column `{id_column}`")))?;

    let rows = reader
        .records()
        .collect::<Result<Vec<StringRecord>, _>>()
        .map_err(|err| StoreError::load(path, err))?;

    let columns = header
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let kind = match pinned.get(name) {
                Some(kind) => *kind,
                None if rows.is_empty() && idx == id_idx => ColumnType::Int,
                None if rows.is_empty() => ColumnType::Text,
                None => ColumnType::infer(rows.iter().map(|row| &row[idx])),
            };
            Column {
                name: name.to_owned(),
                kind,
            }
        })
        .collect::<Vec<_>>();

    if columns[id_idx].kind != ColumnType::Int {
        return Err(StoreError::load(
            path,
            format!("id column `{id_column}` holds non-integer values"),
        ));
    }

    let mut table = Table::new(columns, Vec::with_capacity(rows.len()));
    let mut ids = HashSet::with_capacity(rows.len());

    for row in &rows {
        let values = table
            .columns()
            .iter()
            .zip(row.iter())
            .map(|(column, raw)| {
                column.kind.parse(raw).ok_or_else(|| {
                    StoreError::load(
                        path,
                        format!("`{raw}` is not a valid {} for `{}`", column.kind, column.name),
                    )
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        if let Some(id) = values[id_idx].as_int() {
            if !ids.insert(id) {
                return Err(StoreError::load(path, format!("duplicate id {id}")));
            }
        }

        let record = Record::new(table.header().clone(), values);
        table.push(record);
    }

    debug!("Parsed {} rows from {:?}", table.len(), path);
    Ok(table)
}

/// Overwrite `path` with the header and every record of `table`.
pub(crate) fn write_table(path: &Path, delimiter: u8, table: &Table) -> io::Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_path(path)?;

    writer.write_record(table.header().iter())?;
    for record in table.records() {
        writer.write_record(record.values().iter().map(ToString::to_string))?;
    }
    writer.flush()
}

/// Appends single rows to an existing file, flushing after each one.
pub(crate) struct Appender {
    writer: csv::Writer<File>,
}

impl Appender {
    pub(crate) fn open(path: &Path, delimiter: u8) -> io::Result<Self> {
        let mut file = OpenOptions::new().read(true).append(true).open(path)?;

        // A hand edited file may lack the final newline.
        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
            }
        }

        Ok(Self {
            writer: WriterBuilder::new()
                .delimiter(delimiter)
                .has_headers(false)
                .from_writer(file),
        })
    }

    pub(crate) fn append(&mut self, record: &Record) -> io::Result<()> {
        self.writer
            .write_record(record.values().iter().map(ToString::to_string))?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::fixture;
    use crate::record::Value;

    fn read(path: &Path, delimiter: u8, id_column: &str) -> StoreResult<Table> {
        read_table(path, delimiter, id_column, &BTreeMap::new())
    }

    #[test]
    fn read_fixture_types_columns() {
        let (_dir, path) = fixture::defects();
        let table = read(&path, b',', "uid").unwrap();

        assert_eq!(table.len(), fixture::ROWS);
        let kinds: Vec<_> = table.columns().iter().map(|column| column.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnType::Text,
                ColumnType::Text,
                ColumnType::Text,
                ColumnType::Text,
                ColumnType::Text,
                ColumnType::Date,
                ColumnType::Int,
            ]
        );
        assert_eq!(table.records()[4].get("uid"), Some(&Value::Int(5)));
    }

    #[test]
    fn read_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = read(&dir.path().join("nope.csv"), b',', "uid");

        assert!(matches!(result, Err(StoreError::Load { .. })));
    }

    #[test]
    fn read_rejects_malformed_tables() {
        for contents in [
            "",
            "a,uid\n1,2,3\n",
            "a,b\nx,1\n",
            "a,uid\nx,one\n",
            "a,uid\nx,1\ny,1\n",
            "a,a,uid\nx,y,1\n",
        ] {
            let (_dir, path) = fixture::with_contents(contents);
            assert!(
                matches!(read(&path, b',', "uid"), Err(StoreError::Load { .. })),
                "{contents:?} should not load"
            );
        }
    }

    #[test]
    fn read_header_only_table() {
        let (_dir, path) = fixture::with_contents("cause,uid\n");
        let table = read(&path, b',', "uid").unwrap();

        assert_eq!(table.len(), 0);
        assert_eq!(table.columns()[0].kind, ColumnType::Text);
        assert_eq!(table.columns()[1].kind, ColumnType::Int);
    }

    #[test]
    fn read_custom_delimiter() {
        let (_dir, path) = fixture::with_contents("cause;id\nMachine;4\n");
        let table = read(&path, b';', "id").unwrap();

        assert_eq!(table.records()[0].get("id"), Some(&Value::Int(4)));
    }

    #[test]
    fn read_pinned_types_override_inference() {
        let (_dir, path) = fixture::with_contents("panel_id,uid\n12,1\n13,2\n");
        let pinned = BTreeMap::from([("panel_id".to_owned(), ColumnType::Text)]);

        let table = read_table(&path, b',', "uid", &pinned).unwrap();
        assert_eq!(table.columns()[0].kind, ColumnType::Text);
        assert_eq!(table.records()[0].get("panel_id"), Some(&Value::from("12")));

        let pinned = BTreeMap::from([
            ("uid".to_owned(), ColumnType::Date),
            ("gone".to_owned(), ColumnType::Int),
        ]);
        assert!(matches!(
            read_table(&path, b',', "uid", &pinned),
            Err(StoreError::Load { .. })
        ));
    }

    #[test]
    fn append_repairs_missing_newline() {
        let (_dir, path) = fixture::with_contents("cause,uid\nMachine,1");
        let table = read(&path, b',', "uid").unwrap();
        let record = Record::new(table.header().clone(), vec!["Operator".into(), 2.into()]);

        Appender::open(&path, b',').unwrap().append(&record).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "cause,uid\nMachine,1\nOperator,2\n"
        );
    }

    #[test]
    fn write_then_read_preserves_order() {
        let (_dir, path) = fixture::defects();
        let table = read(&path, b',', "uid").unwrap();
        let copy = path.with_file_name("copy.csv");

        write_table(&copy, b',', &table).unwrap();
        let reloaded = read(&copy, b',', "uid").unwrap();

        assert_eq!(reloaded.records(), table.records());
        assert_eq!(fs::read_to_string(&copy).unwrap(), fixture::DEFECTS);
    }
}
