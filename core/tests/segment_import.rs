//! Segment import: JSON-lines segment dumps become a messaging export.

use reach_core::{
    config::{ExportLayout, LayoutConfig},
    messaging_loader::load_messaging_file,
    segment_import::{
        build_messaging_rows, import_invalid_users, import_segments, read_segment_dir, SegmentKey,
    },
};
use std::fs;
use std::path::Path;

fn dump(root: &Path, segment: &str, file: &str, lines: &[&str]) {
    let dir = root.join(segment);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), lines.join("\n")).unwrap();
}

#[test]
fn channel_segments_flag_valid_ids() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    dump(root, "validUsers", "part-0.txt", &[
        r#"{"external_id":"A_1"}"#,
        r#"{"external_id":"B_2"}"#,
        "",
        r#"{"external_id":"C_3"}"#,
    ]);
    dump(root, "emailAvailableUsers", "part-0.txt", &[r#"{"external_id":"A_1"}"#]);
    dump(root, "pushAvailableUsers", "part-0.txt", &[
        r#"{"external_id":"A_1"}"#,
        r#"{"external_id":"C_3"}"#,
        r#"{"external_id":"NOT_VALID"}"#,
    ]);

    let (rows, stats) = build_messaging_rows(root).unwrap().unwrap();

    let ids: Vec<_> = rows.iter().map(|r| r.external_id.as_str()).collect();
    assert_eq!(ids, vec!["A_1", "B_2", "C_3"]);
    assert!(rows[0].availability.email && rows[0].availability.push);
    assert!(!rows[1].availability.any());
    assert!(rows[2].availability.push && !rows[2].availability.email);
    assert_eq!(stats.valid_ids, 3);
    assert_eq!(stats.email_ids, 1);
    assert_eq!(stats.push_ids, 3);
    assert_eq!(stats.phone_ids, 0);
}

#[test]
fn bad_lines_are_counted_and_duplicates_collapsed() {
    let tmp = tempfile::tempdir().unwrap();
    dump(tmp.path(), "validUsers", "a.txt", &[
        r#"{"external_id":"A_1"}"#,
        "not json",
        r#"{"braze_id":"xyz"}"#,
    ]);
    dump(tmp.path(), "validUsers", "b.txt", &[r#"{"external_id":"A_1"}"#]);
    dump(tmp.path(), "validUsers", "ignored.csv", &[r#"{"external_id":"Z_9"}"#]);

    let seg = read_segment_dir(&tmp.path().join("validUsers"), SegmentKey::ExternalId).unwrap();

    assert_eq!(seg.ids, vec!["A_1".to_string()]);
    assert_eq!(seg.files_read, 2);
    assert_eq!(seg.malformed_lines, 2);
}

#[test]
fn missing_segment_dir_reads_as_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let seg = read_segment_dir(&tmp.path().join("validUsers"), SegmentKey::ExternalId).unwrap();
    assert!(seg.ids.is_empty());
}

#[test]
fn imported_export_loads_back() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = ExportLayout::new(
        tmp.path().join("exports"),
        tmp.path().join("results"),
        "2024-01-01",
        LayoutConfig::default(),
    );
    let raw = layout.segment_dump_dir("DE");
    dump(&raw, "validUsers", "0.txt", &[r#"{"external_id":"A_1"}"#, r#"{"external_id":"A_2"}"#]);
    dump(&raw, "phoneAvailableUsers", "0.txt", &[r#"{"external_id":"A_2"}"#]);

    let stats = import_segments("DE", &layout).unwrap().unwrap();
    assert_eq!(stats.valid_ids, 2);

    let text = fs::read_to_string(layout.messaging_file("DE")).unwrap();
    assert_eq!(
        text,
        "external_id,emailAvailable,phoneAvailable,inAppAvailable,pushAvailable,Reachable\n\
         A_1,FALSE,FALSE,FALSE,FALSE,FALSE\n\
         A_2,FALSE,TRUE,FALSE,FALSE,TRUE\n"
    );

    let accounts = load_messaging_file("DE", &layout.messaging_file("DE")).unwrap();
    let a = accounts.get("A").unwrap();
    assert_eq!(a.occurrence_count, 2);
    assert!(a.availability.phone);
}

fn layout(root: &Path) -> ExportLayout {
    ExportLayout::new(
        root.join("exports"),
        root.join("results"),
        "2024-01-01",
        LayoutConfig::default(),
    )
}

#[test]
fn no_valid_dumps_leaves_existing_export_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    let export = layout.messaging_file("DE");
    fs::create_dir_all(export.parent().unwrap()).unwrap();
    let existing =
        "external_id,emailAvailable,phoneAvailable,inAppAvailable,pushAvailable\nA,TRUE,FALSE,FALSE,FALSE\n";
    fs::write(&export, existing).unwrap();
    // Channel dumps alone do not make an export.
    dump(&layout.segment_dump_dir("DE"), "emailAvailableUsers", "0.txt", &[r#"{"external_id":"A_1"}"#]);

    assert_eq!(import_segments("DE", &layout).unwrap(), None);
    assert_eq!(fs::read_to_string(&export).unwrap(), existing);

    assert_eq!(import_segments("FR", &layout).unwrap(), None);
    assert!(!layout.messaging_file("FR").exists());
}

#[test]
fn invalid_users_become_braze_id_table() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    let raw = layout.segment_dump_dir("DE");
    dump(&raw, "invalidUsers", "0.txt", &[
        r#"{"braze_id":"5f1a"}"#,
        r#"{"braze_id":"5f1b","external_id":"A_1"}"#,
        r#"{"external_id":"B_2"}"#,
    ]);
    dump(&raw, "invalidUsers", "1.txt", &[r#"{"braze_id":"5f1a"}"#]);

    assert_eq!(import_invalid_users("DE", &layout).unwrap(), Some(2));
    assert_eq!(
        fs::read_to_string(layout.invalid_users_file("DE")).unwrap(),
        "braze_id\n5f1a\n5f1b\n"
    );
    assert!(layout
        .invalid_users_file("DE")
        .ends_with("braze-processed/braze-invalid-users.csv"));

    let seg = read_segment_dir(&raw.join("invalidUsers"), SegmentKey::BrazeId).unwrap();
    assert_eq!(seg.malformed_lines, 1);
}

#[test]
fn no_invalid_dumps_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    assert_eq!(import_invalid_users("DE", &layout).unwrap(), None);
    assert!(!layout.invalid_users_file("DE").exists());
}
