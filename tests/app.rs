use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use bids_ingest::app::{App, ProgressEvent, ProgressSink, build_plan};
use bids_ingest::config::{Config, ConfigLoader, DatatypeEntry, ResolvedConfig};
use bids_ingest::error::BidsError;
use bids_ingest::output::JsonOutput;

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

fn study_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    touch(&root, "sub-01/anat/sub-01_T1w.nii.gz");
    touch(&root, "sub-01/dwi/sub-01_acq-ap_dwi.nii.gz");
    touch(&root, "sub-01/dwi/sub-01_acq-ap_dwi.bval");
    touch(&root, "sub-01/dwi/sub-01_acq-ap_dwi.bvec");
    (temp, root)
}

fn touch(root: &Utf8Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "").unwrap();
}

fn config() -> ResolvedConfig {
    let mut config = Config {
        project: Some("proj-1".to_string()),
        tags: vec!["site-a".to_string()],
        ..Config::default()
    };
    config.datatypes.insert(
        "neuro/dwi".to_string(),
        DatatypeEntry::Shorthand("dt-dwi".to_string()),
    );
    ConfigLoader::resolve_config(config).unwrap()
}

#[test]
fn scan_reports_progress() {
    let (_temp, root) = study_root();
    let sink = RecordingSink::default();

    let study = App::new().scan(&root, &sink).unwrap();
    assert_eq!(study.datasets.len(), 2);

    let messages = sink.messages.lock().unwrap();
    assert!(messages[0].starts_with("phase=Scan"));
    assert_eq!(messages.last().unwrap(), "phase=Done; 2 datasets");
}

#[test]
fn plan_maps_datatypes_and_skips_unmapped() {
    let (_temp, root) = study_root();
    let plan = App::new().plan(&root, &config(), &JsonOutput).unwrap();

    assert_eq!(plan.project, "proj-1");
    assert_eq!(plan.records.len(), 1);
    let record = &plan.records[0];
    assert_eq!(record.datatype, "dt-dwi");
    assert_eq!(record.tags, vec!["acq-ap", "site-a"]);
    assert_eq!(record.meta["acquisition"], "ap");
    assert_eq!(record.files.len(), 3);

    assert_eq!(plan.skipped.len(), 1);
    assert_eq!(plan.skipped[0].datatype, "neuro/anat/t1w");
}

#[test]
fn plan_requires_project() {
    let (_temp, root) = study_root();
    let err = App::new()
        .plan(&root, &ResolvedConfig::default(), &JsonOutput)
        .unwrap_err();
    assert_matches!(err, BidsError::MissingProject);
}

#[test]
fn plan_appends_configured_datatype_tags() {
    let (_temp, root) = study_root();
    let config: Config = serde_json::from_str(
        r#"{"project": "p", "datatypes": {"neuro/anat/t1w": {"id": "dt-t1", "tags": ["defaced"]}}}"#,
    )
    .unwrap();
    let config = ConfigLoader::resolve_config(config).unwrap();

    let study = bids_ingest::walker::walk(&root).unwrap();
    let plan = build_plan(&study, "p", &config);
    assert_eq!(plan.records.len(), 1);
    assert_eq!(plan.records[0].datatype_tags, vec!["defaced"]);
}

#[test]
fn scan_rejects_missing_root() {
    let (_temp, root) = study_root();
    let err = App::new()
        .scan(&root.join("nope"), &JsonOutput)
        .unwrap_err();
    assert_matches!(err, BidsError::InvalidRoot(_));
}

#[test]
fn study_serializes_with_upload_field_names() {
    let (_temp, root) = study_root();
    let study = App::new().scan(&root, &JsonOutput).unwrap();
    let json = JsonOutput::to_string(&study).unwrap();
    assert!(json.contains("\"datatype_tags\""));
    assert!(json.contains("\"participants_column_defs\""));
    assert!(json.contains("\"dwi.bvecs\""));
}
