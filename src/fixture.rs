use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

pub(crate) const FILE_NAME: &str = "defects.csv";

/// 13 defects, uid 1..=13, 4 `MS` defect types and 3 `Machine` causes.
pub(crate) const DEFECTS: &str = "\
panel_id,location,defect_type,cause,origin,found_on,uid
SP-1001,A1,CC,Operator,Bussing Station,2021-10-18,1
SP-1001,B4,MS,Machine,Stringer 2,2021-10-18,2
SP-1002,C2,CC,Supplier,Layup,2021-10-18,3
SP-1003,A6,MS,Operator,Bussing Station,2021-10-19,4
SP-1004,D3,BB,Machine,Stringer 1,2021-10-19,5
SP-1004,D4,CC,Operator,Layup,2021-10-19,6
SP-1005,F1,SD,Supplier,Incoming,2021-10-20,7
SP-1006,B2,MS,Operator,Stringer 1,2021-10-20,8
SP-1007,E5,CC,Unknown,Laminator,2021-10-20,9
SP-1008,A2,FM,Operator,Layup,2021-10-21,10
SP-1008,A3,MS,Operator,Bussing Station,2021-10-21,11
SP-1009,C6,CC,Machine,Stringer 2,2021-10-21,12
SP-1010,B1,SD,Supplier,Incoming,2021-10-22,13
";

pub(crate) const ROWS: usize = 13;

/// Write `contents` as `defects.csv` into a fresh temporary directory.
pub(crate) fn with_contents(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(FILE_NAME);
    fs::write(&path, contents).unwrap();
    (dir, path)
}

pub(crate) fn defects() -> (TempDir, PathBuf) {
    with_contents(DEFECTS)
}
