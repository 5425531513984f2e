//! Integration tests for treesplit-scan.

use std::fs;

use tempfile::TempDir;
use treesplit_scan::{
    AggregateSource, EntryKind, JwalkScanner, Metric, ScanConfig, TreeSource, load_snapshot,
    save_snapshot,
};

fn media_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir_all(root.join("tv/show1")).unwrap();
    fs::create_dir_all(root.join("films")).unwrap();
    fs::create_dir_all(root.join("empty")).unwrap();

    fs::write(root.join("tv/show1/ep1.mkv"), vec![0u8; 300]).unwrap();
    fs::write(root.join("tv/show1/ep2.mkv"), vec![0u8; 200]).unwrap();
    fs::write(root.join("films/a.mkv"), vec![0u8; 400]).unwrap();
    fs::write(root.join("films/b.mkv"), vec![0u8; 50]).unwrap();
    fs::write(root.join("films/c.mkv"), vec![0u8; 25]).unwrap();
    fs::write(root.join("notes.txt"), "hello").unwrap();

    temp
}

#[test]
fn test_scanned_tree_answers_aggregate_queries() {
    let temp = media_tree();
    let tree = JwalkScanner::new()
        .scan(&ScanConfig::new(temp.path()))
        .unwrap();
    let source = TreeSource::new(tree);

    let root = source.aggregate("/", Metric::Capacity).unwrap();
    assert_eq!(root.total, 980);
    assert!(root.is_consistent());
    let names: Vec<&str> = root.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["tv", "films", "notes.txt", "empty"]);
    assert_eq!(root.entries[3].kind, EntryKind::Directory);
    assert_eq!(root.entries[3].size, 0);

    let films = source.aggregate("/films/", Metric::Files).unwrap();
    assert_eq!(films.total, 3);
    assert!(films.entries.iter().all(|e| e.size == 1));

    let show = source.aggregate("tv/show1", Metric::Capacity).unwrap();
    assert_eq!(show.total, 500);
    assert_eq!(show.entries[0].name.as_str(), "ep1.mkv");
}

#[test]
fn test_capped_listing_through_scan() {
    let temp = media_tree();
    let tree = JwalkScanner::new()
        .scan(&ScanConfig::new(temp.path()))
        .unwrap();
    let source = TreeSource::new(tree).with_max_entries(1);

    let films = source.aggregate("/films", Metric::Capacity).unwrap();
    assert_eq!(films.entries.len(), 1);
    assert_eq!(films.entries[0].name.as_str(), "a.mkv");
    assert_eq!(films.extra, 75);
}

#[test]
fn test_snapshot_round_trip_keeps_queries_identical() {
    let temp = media_tree();
    let tree = JwalkScanner::new()
        .scan(&ScanConfig::new(temp.path()))
        .unwrap();
    let leaves = tree.leaves();

    let out = TempDir::new().unwrap();
    let snapshot = out.path().join("media.json");
    save_snapshot(&tree, &snapshot).unwrap();

    let loaded = load_snapshot(&snapshot).unwrap();
    assert_eq!(loaded.leaves(), leaves);
    assert!(leaves.contains(&"empty/".to_string()));
    assert!(leaves.contains(&"tv/show1/ep2.mkv".to_string()));

    let before = TreeSource::new(tree).aggregate("/tv", Metric::Capacity).unwrap();
    let after = TreeSource::from_snapshot(&snapshot)
        .unwrap()
        .aggregate("/tv", Metric::Capacity)
        .unwrap();
    assert_eq!(before.total, after.total);
    assert_eq!(before.entries, after.entries);
}

#[test]
fn test_hidden_entries_can_be_skipped() {
    let temp = media_tree();
    fs::write(temp.path().join(".cache"), vec![0u8; 1000]).unwrap();

    let all = JwalkScanner::new()
        .scan(&ScanConfig::new(temp.path()))
        .unwrap();
    assert_eq!(all.total_size(), 1980);

    let config = ScanConfig::builder()
        .root(temp.path())
        .include_hidden(false)
        .build()
        .unwrap();
    let visible = JwalkScanner::new().scan(&config).unwrap();
    assert_eq!(visible.total_size(), 980);
}
