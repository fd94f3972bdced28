use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::warn;

use crate::config::ResolvedConfig;
use crate::domain::BidsStudy;
use crate::error::BidsError;
use crate::fs_util;
use crate::sidecar::Metadata;
use crate::walker::BidsWalker;

/// Record registered with the warehouse for one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct UploadRecord {
    pub project: String,
    pub datatype: String,
    pub datatype_tags: Vec<String>,
    pub desc: String,
    pub tags: Vec<String>,
    pub meta: Metadata,
    pub files: BTreeMap<String, Utf8PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedDataset {
    pub desc: String,
    pub datatype: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadPlan {
    pub project: String,
    pub records: Vec<UploadRecord>,
    pub skipped: Vec<SkippedDataset>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Default)]
pub struct App;

impl App {
    pub fn new() -> Self {
        Self
    }

    /// Walks the study at `root`.
    pub fn scan(&self, root: &Utf8Path, sink: &dyn ProgressSink) -> Result<BidsStudy, BidsError> {
        let root = canonical_root(root)?;
        sink.event(ProgressEvent {
            message: format!("phase=Scan; walking {root}"),
            elapsed: None,
        });

        let started = Instant::now();
        let study = BidsWalker::new(root).walk()?;

        sink.event(ProgressEvent {
            message: format!("phase=Done; {} datasets", study.datasets.len()),
            elapsed: Some(started.elapsed()),
        });
        Ok(study)
    }

    /// Walks the study and turns every dataset into an upload record.
    pub fn plan(
        &self,
        root: &Utf8Path,
        config: &ResolvedConfig,
        sink: &dyn ProgressSink,
    ) -> Result<UploadPlan, BidsError> {
        let project = config.project.clone().ok_or(BidsError::MissingProject)?;
        let study = self.scan(root, sink)?;

        sink.event(ProgressEvent {
            message: "phase=Resolve; mapping datatypes".to_string(),
            elapsed: None,
        });
        Ok(build_plan(&study, &project, config))
    }
}

pub fn build_plan(study: &BidsStudy, project: &str, config: &ResolvedConfig) -> UploadPlan {
    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for dataset in &study.datasets {
        let Some(target) = config.datatypes.get(&dataset.datatype) else {
            warn!("no datatype mapping for {}; skipping {}", dataset.datatype, dataset.desc);
            skipped.push(SkippedDataset {
                desc: dataset.desc.clone(),
                datatype: dataset.datatype.clone(),
                reason: "no datatype mapping".to_string(),
            });
            continue;
        };

        let mut datatype_tags = dataset.datatype_tags.clone();
        for tag in &target.tags {
            if !datatype_tags.contains(tag) {
                datatype_tags.push(tag.clone());
            }
        }

        let tags = dataset
            .tags
            .iter()
            .chain(config.tags.iter())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        records.push(UploadRecord {
            project: project.to_string(),
            datatype: target.id.clone(),
            datatype_tags,
            desc: dataset.desc.clone(),
            tags,
            meta: dataset.meta.clone(),
            files: dataset.files.clone(),
        });
    }

    UploadPlan {
        project: project.to_string(),
        records,
        skipped,
    }
}

fn canonical_root(root: &Utf8Path) -> Result<Utf8PathBuf, BidsError> {
    let path = std::fs::canonicalize(root.as_std_path())
        .map_err(|_| BidsError::InvalidRoot(root.as_std_path().to_path_buf()))?;
    fs_util::to_utf8(path)
}
