#![allow(missing_docs)]

use std::sync::atomic::Ordering;
use std::sync::Arc;

use graphcache::{
    storage::{
        calls::Call, CounterMetrics, PageInfo, RangeOperation, RecordStore, RecordWriter,
        StoreOptions, EDGE_CURSOR_FIELD, EDGE_NODE_FIELD,
    },
    types::{DataId, Result, StoreError},
};

fn seeded_store(metrics: Option<Arc<CounterMetrics>>) -> Result<RecordStore> {
    let mut options = StoreOptions::new();
    if let Some(metrics) = metrics {
        options = options.metrics(metrics);
    }
    let mut store = RecordStore::new(options);
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("conn", Some("CommentsConnection"), None)?;
    writer.put_range("conn", &[], None)?;
    for n in 1..=2 {
        let (edge, node) = (format!("e{n}"), format!("n{n}"));
        writer.put_record(&node, Some("Comment"), None)?;
        writer.put_record(&edge, Some("CommentEdge"), None)?;
        writer.put_field(&edge, EDGE_CURSOR_FIELD, format!("c{n}"))?;
        writer.put_linked_record_id(&edge, EDGE_NODE_FIELD, &node)?;
    }
    writer.put_range_edges("conn", &[], PageInfo::default(), &[DataId::from("e1")])?;
    Ok(store)
}

fn range_edges(store: &RecordStore) -> Vec<String> {
    store
        .get_range("conn")
        .and_then(|range| range.segment(&[]))
        .map(|segment| {
            segment
                .edges()
                .iter()
                .map(|edge| edge.edge_id.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn queued_updates_leave_the_range_untouched() -> Result<()> {
    let mut store = seeded_store(None)?;
    let mut writer = RecordWriter::optimistic(&mut store, Some("mutation:1".to_owned()));
    writer.apply_range_update("conn", "e2", RangeOperation::Append)?;
    writer.apply_range_update("conn", "e1", RangeOperation::Remove)?;

    assert!(store.has_range("conn"));
    assert_eq!(range_edges(&store), ["e1"]);
    let queued = store.get_queued_range_ops("conn").unwrap();
    assert_eq!(queued.get(RangeOperation::Append), [DataId::from("e2")]);
    assert_eq!(queued.get(RangeOperation::Remove), [DataId::from("e1")]);
    assert!(store.get_connection_ids_for_record("n2").is_none());
    assert_eq!(
        store.get_client_mutation_ids("conn"),
        Some(&["mutation:1".to_owned()][..])
    );

    let mut writer = RecordWriter::committed(&mut store, None);
    writer.apply_range_update("conn", "e2", RangeOperation::Append)?;
    assert_eq!(range_edges(&store), ["e1", "e2"]);
    assert!(store.get_connection_ids_for_record("n2").is_some());
    Ok(())
}

#[test]
fn repeated_mutation_ids_are_recorded_once() -> Result<()> {
    let mut store = seeded_store(None)?;
    for id in ["m1", "m2", "m1"] {
        let mut writer = RecordWriter::optimistic(&mut store, Some(id.to_owned()));
        writer.put_field("n1", "body", "pending")?;
    }
    assert_eq!(
        store.get_client_mutation_ids("n1"),
        Some(&["m1".to_owned(), "m2".to_owned()][..])
    );
    assert!(store.has_optimistic_update("n1"));
    assert!(!store.has_optimistic_update("n2"));
    Ok(())
}

#[test]
fn optimistic_writers_never_reach_the_range() -> Result<()> {
    let mut store = seeded_store(None)?;
    let mut writer = RecordWriter::optimistic(&mut store, None);
    assert!(matches!(
        writer.put_range("conn", &[Call::new("orderby", "new")], None),
        Err(StoreError::OptimisticRange { .. })
    ));
    assert!(matches!(
        writer.put_range_edges("conn", &[], PageInfo::default(), &[DataId::from("e2")]),
        Err(StoreError::OptimisticRange { .. })
    ));
    assert_eq!(range_edges(&store), ["e1"]);
    Ok(())
}

#[test]
fn metrics_count_both_modes() -> Result<()> {
    let metrics = Arc::new(CounterMetrics::default());
    let mut store = seeded_store(Some(metrics.clone()))?;
    let created = metrics.records_created.load(Ordering::Relaxed);
    assert_eq!(created, 5);
    assert_eq!(metrics.range_pages_merged.load(Ordering::Relaxed), 1);

    let mut writer = RecordWriter::optimistic(&mut store, None);
    writer.apply_range_update("fresh", "e2", RangeOperation::Prepend)?;
    writer.delete_record("n2");
    assert_eq!(metrics.range_updates_queued.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.records_created.load(Ordering::Relaxed), created + 1);
    assert_eq!(metrics.records_deleted.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.range_updates_applied.load(Ordering::Relaxed), 0);
    Ok(())
}
