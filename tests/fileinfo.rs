use bids_ingest::fileinfo::parse_entry_name;
use bids_ingest::sidecar::{SidecarScope, derive_meta_fields, derive_tags};
use serde_json::{Value, json};

#[test]
fn entities_and_suffix_extracted() {
    let info = parse_entry_name("sub-01_ses-pre_task-nback_acq-mb_run-2_bold.nii.gz");
    let fields = info.fields().collect::<Vec<_>>();
    assert_eq!(
        fields,
        vec![
            ("sub", "01"),
            ("ses", "pre"),
            ("task", "nback"),
            ("acq", "mb"),
            ("run", "2")
        ]
    );
    assert_eq!(info.filename(), Some("bold.nii.gz"));
    assert_eq!(info.full_name(), "sub-01_ses-pre_task-nback_acq-mb_run-2_bold.nii.gz");
}

#[test]
fn last_suffix_token_wins() {
    let info = parse_entry_name("sub-01_T1w_defaced.nii.gz");
    assert_eq!(info.filename(), Some("defaced.nii.gz"));
}

#[test]
fn unknown_keys_pass_through() {
    let info = parse_entry_name("sub-01_foo-bar_echo-1_T2w.nii.gz");
    let meta = derive_meta_fields(&info);
    assert_eq!(
        Value::Object(meta),
        json!({"subject": "01", "foo": "bar", "echo": "1"})
    );
    assert_eq!(derive_tags(&info), vec!["foo-bar", "echo-1"]);
}

#[test]
fn scope_snapshot_does_not_leak() {
    let temp = tempfile::tempdir().unwrap();
    let root = camino::Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let child = root.join("sub-01");
    std::fs::create_dir_all(&child).unwrap();
    std::fs::write(child.join("bold.json"), r#"{"A": 1}"#).unwrap();

    let parent = SidecarScope::new();
    let scope = parent.descend(&child).unwrap();
    assert_eq!(scope.len(), 1);
    assert!(parent.is_empty());
}
