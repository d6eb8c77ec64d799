use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::{ColumnType, DATE_FORMAT};

pub const DEFAULT_ID_COLUMN: &str = "uid";
pub const DEFAULT_DELIMITER: u8 = b',';
pub const BACKUP_EXTENSION: &str = "bak";

/// Where a store's backing file lives and how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub file_name: String,
    pub dir: PathBuf,
    /// Column holding the store assigned unique integer id. It must be
    /// present in the file's header.
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: u8,
    /// Column types that override inference. Pin a column whose values only
    /// look numeric (`"12"`) as `text` so it keeps its type after rows are
    /// deleted and the file is reopened.
    #[serde(default)]
    pub column_types: BTreeMap<String, ColumnType>,
}

fn default_id_column() -> String {
    DEFAULT_ID_COLUMN.to_owned()
}

fn default_delimiter() -> u8 {
    DEFAULT_DELIMITER
}

impl StoreConfig {
    pub fn new(file_name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            dir: dir.into(),
            id_column: default_id_column(),
            delimiter: DEFAULT_DELIMITER,
            column_types: BTreeMap::new(),
        }
    }

    pub fn id_column(mut self, id_column: impl Into<String>) -> Self {
        self.id_column = id_column.into();
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load `column` as `kind` instead of inferring its type.
    pub fn column_type(mut self, column: impl Into<String>, kind: ColumnType) -> Self {
        self.column_types.insert(column.into(), kind);
        self
    }

    /// Full path of the backing file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// Target naming for [`crate::RecordStore::save`].
///
/// The default writes `{dir}/{YYYY-MM-DD}-{file_name}` next to the backing
/// file, using the store's own name and directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    file_name: Option<String>,
    dir: Option<PathBuf>,
    date_stamp: bool,
    as_backup: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            file_name: None,
            dir: None,
            date_stamp: true,
            as_backup: false,
        }
    }
}

impl SaveOptions {
    /// Target the backing file itself.
    pub fn exact() -> Self {
        Self::default().date_stamp(false)
    }

    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn date_stamp(mut self, date_stamp: bool) -> Self {
        self.date_stamp = date_stamp;
        self
    }

    pub fn as_backup(mut self, as_backup: bool) -> Self {
        self.as_backup = as_backup;
        self
    }

    /// Resolve the file to write, stamping with `today` when requested.
    pub(crate) fn resolve(&self, config: &StoreConfig, today: NaiveDate) -> PathBuf {
        let dir = self.dir.as_ref().unwrap_or(&config.dir);
        let name = self.file_name.as_deref().unwrap_or(&config.file_name);

        let mut file_name = if self.date_stamp {
            format!("{}-{}", today.format(DATE_FORMAT), name)
        } else {
            name.to_owned()
        };
        if self.as_backup {
            file_name = format!("{file_name}.{BACKUP_EXTENSION}");
        }

        dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn config() -> StoreConfig {
        StoreConfig::new("defects.csv", "data")
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 10, 22).unwrap()
    }

    #[test]
    fn config_defaults() {
        let config = config();

        assert_eq!(config.id_column, "uid");
        assert_eq!(config.delimiter, b',');
        assert_eq!(config.path(), Path::new("data/defects.csv"));
    }

    #[test]
    fn config_deserialize_fills_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"file_name":"defects.csv","dir":"data"}"#).unwrap();
        assert_eq!(config, self::config());

        let config: StoreConfig = serde_json::from_str(
            r#"{"file_name":"defects.csv","dir":"data","id_column":"id","delimiter":59}"#,
        )
        .unwrap();
        assert_eq!(config.id_column, "id");
        assert_eq!(config.delimiter, b';');

        let config: StoreConfig = serde_json::from_str(
            r#"{"file_name":"defects.csv","dir":"data","column_types":{"panel_id":"text"}}"#,
        )
        .unwrap();
        assert_eq!(config, self::config().column_type("panel_id", ColumnType::Text));
    }

    #[test]
    fn save_options_naming() {
        let config = config();

        assert_eq!(
            SaveOptions::default().resolve(&config, today()),
            Path::new("data/2021-10-22-defects.csv")
        );
        assert_eq!(
            SaveOptions::exact().resolve(&config, today()),
            Path::new("data/defects.csv")
        );
        assert_eq!(
            SaveOptions::default()
                .as_backup(true)
                .resolve(&config, today()),
            Path::new("data/2021-10-22-defects.csv.bak")
        );
        assert_eq!(
            SaveOptions::exact()
                .as_backup(true)
                .file_name("archive.csv")
                .dir("/tmp/elsewhere")
                .resolve(&config, today()),
            Path::new("/tmp/elsewhere/archive.csv.bak")
        );
    }
}
