#![allow(missing_docs)]

use std::fs;

use graphcache::storage::{ConfigError, RecordStore, RecordWriter, StoreOptions};
use graphcache::types::StoreError;
use tempfile::tempdir;

#[test]
fn load_reads_the_store_table() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[store]
client_id_prefix = "tmp:"
node_root_calls = ["node", "entity"]
"#,
    )?;
    let options = StoreOptions::load(Some(path))?;
    assert_eq!(options.client_id_prefix, "tmp:");
    assert_eq!(options.node_root_calls, ["node", "entity"]);

    let mut store = RecordStore::new(options);
    assert_eq!(store.generate_client_id().as_str(), "tmp:1");
    let mut writer = RecordWriter::committed(&mut store, None);
    assert_eq!(
        writer.put_record("tmp:1", Some("Draft"), None),
        Err(StoreError::ClientRecordPathMissing { id: "tmp:1".into() })
    );
    writer.put_record("client:1", Some("Draft"), None)?;
    writer.put_data_id("entity", Some("7"), "7")?;
    assert!(store.root_calls().is_empty());
    Ok(())
}

#[test]
fn missing_file_yields_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let options = StoreOptions::load(Some(dir.path().join("absent.toml")))?;
    assert_eq!(options.client_id_prefix, "client:");
    Ok(())
}

#[test]
fn malformed_file_reports_its_path() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("config.toml");
    fs::write(&path, "[store\nclient_id_prefix = 1")?;
    match StoreOptions::load(Some(path.clone())) {
        Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("malformed config accepted"),
    }
    Ok(())
}
