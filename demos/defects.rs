use std::fs;

use csvbase::{Entry, FileModeGuard, PermissionGuard, RecordStore, SaveOptions, StoreConfig};

const DATA_DIR: &str = "data";
const DATA_FILE: &str = "datatable.csv";

fn main() {
    // Work on a scratch copy so the demo can be run repeatedly.
    let scratch = std::env::temp_dir().join("csvbase-demo");
    fs::create_dir_all(&scratch).unwrap();
    let target = scratch.join(DATA_FILE);
    if target.exists() {
        FileModeGuard.make_writable(&target).unwrap();
    }
    fs::copy(format!("{DATA_DIR}/{DATA_FILE}"), &target).unwrap();

    let mut db = RecordStore::open(StoreConfig::new(DATA_FILE, &scratch)).unwrap();

    println!("{}", db.info());
    println!("Starting dataset: {} rows.\n\n{}", db.row_count(), db);

    db.delete(5).unwrap();
    db.delete_where("Machine", "cause").unwrap();

    println!(
        "After deleting uid 5 and every Machine defect: {} rows left.\n\n{}",
        db.row_count(),
        db
    );

    let id = db
        .insert([Entry::new()
            .set("panel_id", "21432009999")
            .set("location", "A1")
            .set("defect_type", "CC")
            .set("cause", "Operator")
            .set("origin", "Bussing Station")])
        .unwrap();
    println!("Recorded a new defect with uid {id}.");

    let backup = db.save(SaveOptions::default().as_backup(true)).unwrap();
    println!("Backup written to {}", backup.display());
}
