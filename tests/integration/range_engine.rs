#![allow(missing_docs)]

use graphcache::{
    storage::{
        calls::Call, CommittedWriter, PageInfo, RangeOperation, RecordStore, RecordWriter,
        EDGE_CURSOR_FIELD, EDGE_NODE_FIELD,
    },
    types::{DataId, Result},
};

fn put_edge(writer: &mut CommittedWriter<'_, '_>, n: u32) -> Result<DataId> {
    let node = format!("n{n}");
    let edge = format!("e{n}");
    writer.put_record(&node, Some("Story"), None)?;
    writer.put_record(&edge, Some("StoryEdge"), None)?;
    writer.put_field(&edge, EDGE_CURSOR_FIELD, format!("c{n}"))?;
    writer.put_linked_record_id(&edge, EDGE_NODE_FIELD, &node)?;
    Ok(DataId::from(edge))
}

fn edges(writer: &mut CommittedWriter<'_, '_>, ns: &[u32]) -> Result<Vec<DataId>> {
    ns.iter().map(|n| put_edge(writer, *n)).collect()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn orderby() -> Call {
    Call::new("orderby", "top")
}

fn ids(store: &RecordStore, conn: &str, calls: &[Call]) -> Vec<String> {
    store
        .get_range_metadata(conn, calls)
        .map(|meta| {
            meta.requested_edge_ids()
                .into_iter()
                .map(|id| id.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn filter_calls_never_include_pagination() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("conn1", Some("StoriesConnection"), None)?;
    writer.put_range("conn1", &[orderby()], Some(0))?;
    let page = edges(&mut writer, &[1, 2])?;
    writer.put_range_edges(
        "conn1",
        &[orderby(), Call::new("first", 2_i64)],
        PageInfo::new(true, false),
        &page,
    )?;
    assert_eq!(writer.get_range_filter_calls("conn1"), Some(&[orderby()][..]));
    assert!(writer.has_range("conn1"));
    assert_eq!(writer.get_range_force_index("conn1"), 0);
    Ok(())
}

#[test]
fn empty_calls_select_the_unfiltered_segment() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("conn", None, None)?;
    writer.put_range("conn", &[], None)?;
    let page = edges(&mut writer, &[1])?;
    writer.put_range_edges("conn", &[], PageInfo::default(), &page)?;
    let connections = store.get_connection_ids_for_record("n1").unwrap();
    assert!(connections.contains("conn"));

    let mut writer = RecordWriter::committed(&mut store, None);
    writer.apply_range_update("conn", "e1", RangeOperation::Remove)?;
    assert!(store.get_connection_ids_for_record("n1").is_none());
    Ok(())
}

#[test]
fn forward_pages_append_after_the_cursor() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("conn", None, None)?;
    writer.put_range("conn", &[orderby()], None)?;
    let first_page = edges(&mut writer, &[1, 2])?;
    let second_page = edges(&mut writer, &[3, 4])?;
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("first", 2_i64)],
        PageInfo::new(true, false),
        &first_page,
    )?;
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("first", 2_i64), Call::new("after", "c2")],
        PageInfo::new(false, true),
        &second_page,
    )?;
    let all = [orderby(), Call::new("first", 10_i64)];
    assert_eq!(ids(&store, "conn", &all), ["e1", "e2", "e3", "e4"]);
    let meta = store.get_range_metadata("conn", &all).unwrap();
    assert!(!meta.page_info.has_next_page);
    assert_eq!(meta.filter_calls, [orderby()]);

    let after = [orderby(), Call::new("first", 1_i64), Call::new("after", "c2")];
    assert_eq!(ids(&store, "conn", &after), ["e3"]);
    Ok(())
}

#[test]
fn refetched_edges_collapse_to_their_newest_position() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("conn", None, None)?;
    writer.put_range("conn", &[orderby()], None)?;
    let page = edges(&mut writer, &[1, 2, 3])?;
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("first", 3_i64)],
        PageInfo::new(true, false),
        &page,
    )?;
    let moved = vec![DataId::from("e1")];
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("first", 1_i64), Call::new("after", "c3")],
        PageInfo::new(false, true),
        &moved,
    )?;
    let all = [orderby(), Call::new("first", 10_i64)];
    assert_eq!(ids(&store, "conn", &all), ["e2", "e3", "e1"]);
    assert!(store
        .get_connection_ids_for_record("n1")
        .is_some_and(|set| set.contains("conn")));
    Ok(())
}

#[test]
fn higher_force_index_overrides_earlier_ordering() -> Result<()> {
    init_tracing();
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("conn", None, None)?;
    writer.put_range("conn", &[orderby()], Some(0))?;
    let old = edges(&mut writer, &[1, 2])?;
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("first", 2_i64)],
        PageInfo::new(true, false),
        &old,
    )?;

    writer.put_range("conn", &[orderby()], Some(1))?;
    let fresh = vec![put_edge(&mut writer, 3)?, DataId::from("e1")];
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("first", 2_i64)],
        PageInfo::new(false, false),
        &fresh,
    )?;
    let all = [orderby(), Call::new("first", 10_i64)];
    assert_eq!(ids(&store, "conn", &all), ["e3", "e1"]);
    assert!(store.get_connection_ids_for_record("n2").is_none());
    assert!(store.get_connection_ids_for_record("n3").is_some());
    Ok(())
}

#[test]
fn pages_with_unknown_cursors_are_dropped() -> Result<()> {
    init_tracing();
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("conn", None, None)?;
    writer.put_range("conn", &[orderby()], None)?;
    let first_page = edges(&mut writer, &[1])?;
    let stray = edges(&mut writer, &[2])?;
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("first", 1_i64)],
        PageInfo::new(true, false),
        &first_page,
    )?;
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("first", 1_i64), Call::new("after", "nowhere")],
        PageInfo::new(false, true),
        &stray,
    )?;
    let all = [orderby(), Call::new("first", 10_i64)];
    assert_eq!(ids(&store, "conn", &all), ["e1"]);
    assert!(store.get_connection_ids_for_record("n2").is_none());
    Ok(())
}

#[test]
fn committed_append_and_prepend_use_stored_filter_calls() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("conn", None, None)?;
    writer.put_range("conn", &[orderby(), Call::new("first", 5_i64)], None)?;
    let seed = edges(&mut writer, &[1])?;
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("first", 5_i64)],
        PageInfo::default(),
        &seed,
    )?;
    put_edge(&mut writer, 2)?;
    put_edge(&mut writer, 3)?;
    writer.apply_range_update("conn", "e2", RangeOperation::Append)?;
    writer.apply_range_update("conn", "e3", RangeOperation::Prepend)?;
    let all = [orderby(), Call::new("first", 10_i64)];
    assert_eq!(ids(&store, "conn", &all), ["e3", "e1", "e2"]);
    assert!(store.get_connection_ids_for_record("n3").is_some());
    Ok(())
}

#[test]
fn removing_one_of_two_edges_to_a_node_keeps_membership() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("conn", None, None)?;
    writer.put_range("conn", &[], None)?;
    let page = edges(&mut writer, &[1])?;
    writer.put_record("e1b", Some("StoryEdge"), None)?;
    writer.put_field("e1b", EDGE_CURSOR_FIELD, "c1b")?;
    writer.put_linked_record_id("e1b", EDGE_NODE_FIELD, "n1")?;
    let mut both = page.clone();
    both.push(DataId::from("e1b"));
    writer.put_range_edges("conn", &[], PageInfo::default(), &both)?;

    writer.apply_range_update("conn", "e1", RangeOperation::Remove)?;
    assert!(store
        .get_connection_ids_for_record("n1")
        .is_some_and(|set| set.contains("conn")));
    Ok(())
}

#[test]
fn backward_pages_prepend_before_the_cursor() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("conn", None, None)?;
    writer.put_range("conn", &[orderby()], None)?;
    let older = edges(&mut writer, &[1, 2])?;
    let newest = edges(&mut writer, &[3, 4])?;
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("last", 2_i64)],
        PageInfo::new(false, true),
        &newest,
    )?;
    let all = [orderby(), Call::new("last", 10_i64)];
    assert_eq!(ids(writer.store(), "conn", &all), ["e3", "e4"]);
    let meta = writer.store().get_range_metadata("conn", &all).unwrap();
    assert!(meta.page_info.has_previous_page);
    assert!(!meta.page_info.has_next_page);
    assert!(writer.store().get_connection_ids_for_record("n1").is_none());

    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("last", 2_i64), Call::new("before", "c3")],
        PageInfo::new(false, false),
        &older,
    )?;
    assert_eq!(ids(&store, "conn", &all), ["e1", "e2", "e3", "e4"]);
    let meta = store.get_range_metadata("conn", &all).unwrap();
    assert!(!meta.page_info.has_previous_page);
    assert!(!meta.page_info.has_next_page);
    for node in ["n1", "n2", "n3", "n4"] {
        assert!(store.node_index().contains(node, "conn"), "{node} not indexed");
    }

    let before = [orderby(), Call::new("last", 1_i64), Call::new("before", "c3")];
    assert_eq!(ids(&store, "conn", &before), ["e2"]);
    Ok(())
}

#[test]
fn backward_pages_only_move_the_head_flag_when_they_reach_the_head() -> Result<()> {
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("conn", None, None)?;
    writer.put_range("conn", &[orderby()], None)?;
    let tail = edges(&mut writer, &[3, 4])?;
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("last", 2_i64)],
        PageInfo::new(false, true),
        &tail,
    )?;

    let whole = edges(&mut writer, &[1, 2, 3, 4])?;
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("last", 10_i64)],
        PageInfo::new(false, false),
        &whole,
    )?;
    let all = [orderby(), Call::new("last", 10_i64)];
    assert_eq!(ids(writer.store(), "conn", &all), ["e1", "e2", "e3", "e4"]);
    let meta = writer.store().get_range_metadata("conn", &all).unwrap();
    assert!(!meta.page_info.has_previous_page);

    let middle = vec![DataId::from("e3")];
    writer.put_range_edges(
        "conn",
        &[orderby(), Call::new("last", 1_i64), Call::new("before", "c4")],
        PageInfo::new(false, true),
        &middle,
    )?;
    assert_eq!(ids(&store, "conn", &all), ["e1", "e2", "e3", "e4"]);
    let meta = store.get_range_metadata("conn", &all).unwrap();
    assert!(!meta.page_info.has_previous_page);
    assert!(store.node_index().contains("n3", "conn"));
    Ok(())
}

#[test]
fn dropped_pages_leave_no_segment_behind() -> Result<()> {
    init_tracing();
    let mut store = RecordStore::default();
    let mut writer = RecordWriter::committed(&mut store, None);
    writer.put_record("conn", None, None)?;
    writer.put_range("conn", &[orderby()], None)?;
    let stray = edges(&mut writer, &[1])?;
    let other = Call::new("orderby", "new");
    writer.put_range_edges(
        "conn",
        &[other.clone(), Call::new("first", 1_i64), Call::new("after", "c0")],
        PageInfo::default(),
        &stray,
    )?;
    assert!(store
        .get_range_metadata("conn", &[other, Call::new("first", 1_i64)])
        .is_none());
    assert!(store.get_connection_ids_for_record("n1").is_none());
    Ok(())
}
