#![allow(missing_docs)]

use graphcache::{
    storage::{
        CacheLog, CacheWrite, FieldValue, RecordPath, RecordState, RecordStore, RecordWriter,
    },
    types::{DataId, Result, StoreError},
};
use serde_json::json;

#[test]
fn record_lifecycle_moves_through_three_states() -> Result<()> {
    let mut store = RecordStore::default();
    assert_eq!(store.get_record_state("1"), RecordState::Unknown);

    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("1", Some("User"), None)?;
    assert_eq!(writer.get_record_state("1"), RecordState::Existent);
    writer.delete_record("1");
    assert_eq!(writer.get_record_state("1"), RecordState::Nonexistent);
    assert_eq!(writer.get_record_state("2"), RecordState::Unknown);
    Ok(())
}

#[test]
fn root_calls_treat_missing_argument_as_empty_string() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_data_id("viewer", None, "client:viewer")?;
    assert_eq!(
        writer.get_data_id("viewer", Some(""))?,
        Some(DataId::from("client:viewer"))
    );
    writer.put_data_id("username", Some("zuck"), "4")?;
    assert_eq!(writer.get_data_id("username", Some("zuck"))?, Some(DataId::from("4")));
    assert_eq!(writer.get_data_id("username", Some("other"))?, None);
    Ok(())
}

#[test]
fn scalar_fields_round_trip_and_clear_to_null() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("1", Some("User"), None)?;
    writer.put_field("1", "name", "Alice")?;
    writer.put_field("1", "age", 30_i64)?;
    assert_eq!(writer.get_field("1", "name"), Some(&FieldValue::from("Alice")));
    writer.delete_field("1", "name")?;
    assert_eq!(writer.get_field("1", "name"), Some(&FieldValue::Null));
    assert_eq!(
        writer.get_field("1", "age").and_then(FieldValue::as_scalar),
        Some(&json!(30))
    );
    Ok(())
}

#[test]
fn put_record_twice_is_a_no_op() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("1", Some("User"), None)?;
    writer.put_field("1", "name", "Alice")?;
    writer.put_record("1", Some("User"), None)?;
    assert_eq!(writer.get_field("1", "name"), Some(&FieldValue::from("Alice")));
    assert_eq!(writer.store().get_type("1"), Some("User"));
    Ok(())
}

#[test]
fn deleted_records_come_back_empty() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("1", Some("User"), None)?;
    writer.put_field("1", "name", "Alice")?;
    writer.delete_record("1");
    assert_eq!(writer.get_field("1", "name"), Some(&FieldValue::Null));
    writer.put_record("1", Some("User"), None)?;
    assert_eq!(writer.get_record_state("1"), RecordState::Existent);
    assert_eq!(writer.get_field("1", "name"), None);
    Ok(())
}

#[test]
fn plural_links_keep_their_order() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    for id in ["1", "2", "3"] {
        writer.put_record(id, Some("User"), None)?;
    }
    writer.put_linked_record_ids("1", "friends", vec!["3".into(), "2".into()])?;
    writer.put_linked_record_id("1", "best_friend", "2")?;
    assert_eq!(
        writer.get_linked_record_ids("1", "friends")?,
        Some(&[DataId::from("3"), DataId::from("2")][..])
    );
    assert_eq!(writer.get_linked_record_id("1", "best_friend")?, Some(&DataId::from("2")));
    Ok(())
}

#[test]
fn plural_link_write_fails_when_any_target_is_missing() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("1", Some("User"), None)?;
    writer.put_record("2", Some("User"), None)?;
    let err = writer
        .put_linked_record_ids("1", "friends", vec!["2".into(), "9".into()])
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::LinkedRecordMissing {
            parent: DataId::from("1"),
            id: DataId::from("9"),
            field: "friends".to_owned(),
        }
    );
    assert_eq!(writer.get_field("1", "friends"), None);
    Ok(())
}

#[test]
fn linked_read_of_a_plural_field_is_malformed() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("1", Some("User"), None)?;
    writer.put_record("2", Some("User"), None)?;
    writer.put_linked_record_ids("1", "friends", vec!["2".into()])?;
    assert!(matches!(
        writer.get_linked_record_id("1", "friends"),
        Err(StoreError::MalformedField { .. })
    ));
    Ok(())
}

#[test]
fn collaborator_sees_committed_writes_in_order() -> Result<()> {
    let mut store = RecordStore::default();
    let mut log = CacheLog::new();
    {
        let mut writer = RecordWriter::committed(&mut store, Some(&mut log));
        writer.put_record(
            "client:1",
            Some("Viewer"),
            Some(RecordPath::new("client:root").child("viewer")),
        )?;
        writer.put_data_id("viewer", None, "client:1")?;
        writer.put_field("client:1", "count", 2_i64)?;
        writer.delete_record("client:1");
    }
    let keys: Vec<String> = log
        .writes()
        .iter()
        .map(|write| match write {
            CacheWrite::Field { field_key, .. } => field_key.clone(),
            CacheWrite::Node { .. } => "<node>".to_owned(),
            CacheWrite::RootCall { storage_key, .. } => format!("<root:{storage_key}>"),
        })
        .collect();
    assert_eq!(keys, ["__id", "__path", "<root:viewer>", "count", "<node>"]);
    assert_eq!(
        log.last_field("client:1", "__path"),
        Some(&json!({ "root": "client:root", "fields": ["viewer"] }))
    );
    Ok(())
}

#[test]
fn snapshot_renders_tombstones_as_null() -> Result<()> {
    let mut store = RecordStore::default();
    {
        let mut writer = RecordWriter::committed(&mut store, None);
        writer.put_record("1", Some("User"), None)?;
        writer.put_field("1", "name", "Alice")?;
        writer.put_record("2", Some("User"), None)?;
        writer.delete_record("2");
        writer.put_data_id("me", None, "1")?;
    }
    let snapshot = store.to_wire_snapshot();
    assert_eq!(snapshot["records"]["1"]["name"], "Alice");
    assert_eq!(snapshot["records"]["1"]["__typename"], "User");
    assert!(snapshot["records"]["2"].is_null());
    assert_eq!(snapshot["root_calls"]["me"][""], "1");
    Ok(())
}
