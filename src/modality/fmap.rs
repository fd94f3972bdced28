//! Fieldmaps.
//!
//! Files are first bucketed by their `sub`/`ses`/`run`/`acq` entities, then
//! each bucket is classified by the suffixes it holds. [`STRATEGIES`] is
//! checked in order and the first matching strategy builds the datasets.

use std::collections::BTreeMap;

use camino::Utf8Path;
use tracing::{debug, warn};

use crate::domain::{Dataset, Modality};
use crate::error::BidsError;
use crate::fileinfo::FileInfo;
use crate::sidecar::{Metadata, SidecarScope, derive_tags, overlay};

use super::{ModalityHandler, entity_meta, leaf_entries, resolve_sidecar};

const DATATYPE: &str = "neuro/fmap";

/// Files of one fmap directory sharing `sub`, `ses`, `run` and `acq`.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    pub key: String,
    pub members: Vec<FileInfo>,
}

impl Cluster {
    pub fn find(&self, filename: &str) -> Option<&FileInfo> {
        self.members
            .iter()
            .find(|info| info.filename().map(canonical_filename).as_deref() == Some(filename))
    }

    pub fn find_all<'a>(&'a self, filename: &'a str) -> impl Iterator<Item = &'a FileInfo> + 'a {
        self.members
            .iter()
            .filter(move |info| info.filename().map(canonical_filename).as_deref() == Some(filename))
    }

    pub fn has(&self, filename: &str) -> bool {
        self.find(filename).is_some()
    }
}

/// `.nii` and `.nii.gz` are interchangeable for classification.
fn canonical_filename(filename: &str) -> String {
    match filename.strip_suffix(".nii") {
        Some(stem) => format!("{stem}.nii.gz"),
        None => filename.to_string(),
    }
}

pub fn cluster_key(info: &FileInfo) -> String {
    ["sub", "ses", "run", "acq"]
        .iter()
        .map(|key| format!("{key}-{}", info.field(key).unwrap_or("")))
        .collect::<Vec<_>>()
        .join(".")
}

pub fn cluster_entries(infos: impl IntoIterator<Item = FileInfo>) -> Vec<Cluster> {
    let mut clusters: BTreeMap<String, Cluster> = BTreeMap::new();
    for info in infos {
        let key = cluster_key(&info);
        clusters
            .entry(key.clone())
            .or_insert_with(|| Cluster {
                key,
                members: Vec::new(),
            })
            .members
            .push(info);
    }
    clusters.into_values().collect()
}

pub struct Strategy {
    pub name: &'static str,
    pub matches: fn(&Cluster) -> bool,
    pub build: fn(&SidecarScope, &Utf8Path, &Cluster) -> Vec<Dataset>,
}

pub const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "single",
        matches: is_single,
        build: build_single,
    },
    Strategy {
        name: "phasediff",
        matches: is_phasediff,
        build: build_phasediff,
    },
    Strategy {
        name: "2phasemag",
        matches: is_two_phase,
        build: build_two_phase,
    },
    Strategy {
        name: "pepolar",
        matches: is_pepolar,
        build: build_pepolar,
    },
    Strategy {
        name: "b0",
        matches: is_b0,
        build: build_b0,
    },
];

fn is_single(cluster: &Cluster) -> bool {
    cluster.has("fieldmap.nii.gz")
}

fn is_phasediff(cluster: &Cluster) -> bool {
    cluster.has("phasediff.nii.gz")
}

fn is_two_phase(cluster: &Cluster) -> bool {
    cluster.has("phase1.nii.gz") && cluster.has("phase2.nii.gz")
}

fn is_pepolar(cluster: &Cluster) -> bool {
    cluster.has("epi.nii.gz") && !cluster.has("epi.bvec")
}

fn is_b0(cluster: &Cluster) -> bool {
    cluster.has("epi.nii.gz") && cluster.has("epi.bvec")
}

pub fn classify(cluster: &Cluster) -> Option<&'static Strategy> {
    STRATEGIES.iter().find(|strategy| (strategy.matches)(cluster))
}

pub struct FmapHandler;

impl ModalityHandler for FmapHandler {
    fn modality(&self) -> Modality {
        Modality::Fmap
    }

    fn handle(&self, scope: &SidecarScope, dir: &Utf8Path) -> Result<Vec<Dataset>, BidsError> {
        let infos = leaf_entries(dir)?.into_iter().map(|(_, info)| info);
        let mut datasets = Vec::new();
        for cluster in cluster_entries(infos) {
            match classify(&cluster) {
                Some(strategy) => {
                    debug!("fmap cluster {} is {}", cluster.key, strategy.name);
                    datasets.extend((strategy.build)(scope, dir, &cluster));
                }
                None => {
                    let names = cluster
                        .members
                        .iter()
                        .map(FileInfo::full_name)
                        .collect::<Vec<_>>();
                    warn!("odd fmap in {dir}, skipping: {}", names.join(", "));
                }
            }
        }
        Ok(datasets)
    }
}

fn add_if_exists(dataset: &mut Dataset, dir: &Utf8Path, role: &str, name: &str) {
    let path = dir.join(name);
    if path.as_std_path().exists() {
        dataset.add_file(role, path);
    }
}

fn add_member(dataset: &mut Dataset, dir: &Utf8Path, cluster: &Cluster, role: &str, filename: &str) {
    if let Some(info) = cluster.find(filename) {
        dataset.add_file(role, dir.join(info.full_name()));
    }
}

fn fmap_dataset(primary: &FileInfo, meta_source: Metadata, dtag: &str) -> Dataset {
    let mut dataset = Dataset::new(DATATYPE, primary.full_name()).with_datatype_tags([dtag]);
    dataset.meta = entity_meta(meta_source, primary);
    dataset.tags = derive_tags(primary).into_iter().collect();
    dataset
}

fn build_single(scope: &SidecarScope, dir: &Utf8Path, cluster: &Cluster) -> Vec<Dataset> {
    let Some(primary) = cluster.find("fieldmap.nii.gz") else {
        return Vec::new();
    };
    let sidecar = resolve_sidecar(scope, dir, primary, "fieldmap.json");
    let mut dataset = fmap_dataset(primary, sidecar, "single");
    dataset.add_file("fieldmap.nii.gz", dir.join(primary.full_name()));
    add_if_exists(&mut dataset, dir, "fieldmap.json", &primary.sibling("fieldmap.json"));
    add_member(&mut dataset, dir, cluster, "magnitude.nii.gz", "magnitude.nii.gz");
    vec![dataset]
}

fn build_phasediff(scope: &SidecarScope, dir: &Utf8Path, cluster: &Cluster) -> Vec<Dataset> {
    let Some(primary) = cluster.find("phasediff.nii.gz") else {
        return Vec::new();
    };
    let sidecar = resolve_sidecar(scope, dir, primary, "phasediff.json");
    let mut dataset = fmap_dataset(primary, sidecar, "phasediff");
    dataset.add_file("phasediff.nii.gz", dir.join(primary.full_name()));
    add_if_exists(&mut dataset, dir, "phasediff.json", &primary.sibling("phasediff.json"));
    add_member(&mut dataset, dir, cluster, "magnitude1.nii.gz", "magnitude1.nii.gz");
    add_member(&mut dataset, dir, cluster, "magnitude2.nii.gz", "magnitude2.nii.gz");
    vec![dataset]
}

fn build_two_phase(scope: &SidecarScope, dir: &Utf8Path, cluster: &Cluster) -> Vec<Dataset> {
    let Some(primary) = cluster.find("phase1.nii.gz") else {
        return Vec::new();
    };
    // Metadata comes from the scope only; the phase1/phase2 JSON files travel
    // as files but are not merged into meta.
    // TODO: decide whether phase1.json should be merged like the other fieldmap kinds.
    let mut sidecar = scope.get("phase1.json").cloned().unwrap_or_default();
    if let Some(name) = primary.sidecar_name() {
        overlay(&mut sidecar, scope.merge_ancestor_sidecar(&name));
    }
    let mut dataset = fmap_dataset(primary, sidecar, "2phasemag");
    dataset.desc = cluster
        .members
        .iter()
        .filter(|info| info.filename().is_some_and(|name| name.contains(".nii")))
        .map(FileInfo::full_name)
        .collect::<Vec<_>>()
        .join(" ");
    for (role, filename) in [
        ("phase1.nii.gz", "phase1.nii.gz"),
        ("phase1.json", "phase1.json"),
        ("phase2.nii.gz", "phase2.nii.gz"),
        ("phase2.json", "phase2.json"),
        ("magnitude1.nii.gz", "magnitude1.nii.gz"),
        ("magnitude2.nii.gz", "magnitude2.nii.gz"),
    ] {
        add_member(&mut dataset, dir, cluster, role, filename);
    }
    vec![dataset]
}

fn build_pepolar(scope: &SidecarScope, dir: &Utf8Path, cluster: &Cluster) -> Vec<Dataset> {
    let epis = cluster.find_all("epi.nii.gz").collect::<Vec<_>>();
    if epis.is_empty() {
        return Vec::new();
    }

    let mut dataset = Dataset::new(DATATYPE, "").with_datatype_tags(["pepolar"]);
    let mut directions: Vec<String> = Vec::new();
    let mut names = Vec::new();

    for info in &epis {
        let direction = info.field("dir").unwrap_or("").to_string();
        let index = match directions.iter().position(|seen| *seen == direction) {
            Some(pos) => pos + 1,
            None => {
                directions.push(direction);
                directions.len()
            }
        };

        let role = format!("epi{index}.nii.gz");
        if let Some(kept) = dataset.files.get(&role) {
            warn!(
                "pepolar {}: {role} already taken by {kept}, skipping",
                dir.join(info.full_name())
            );
            continue;
        }
        dataset.add_file(role, dir.join(info.full_name()));
        add_if_exists(
            &mut dataset,
            dir,
            &format!("epi{index}.json"),
            &info.sibling("epi.json"),
        );

        let sidecar = resolve_sidecar(scope, dir, info, "epi.json");
        overlay(&mut dataset.meta, entity_meta(sidecar, info));
        dataset.tags.extend(derive_tags(info));
        names.push(info.full_name().to_string());
    }

    dataset.meta.remove("dir");
    dataset.desc = names.join(" ");
    vec![dataset]
}

fn build_b0(scope: &SidecarScope, dir: &Utf8Path, cluster: &Cluster) -> Vec<Dataset> {
    let mut datasets = Vec::new();
    for info in cluster.find_all("epi.nii.gz") {
        let bvec = info.sibling("epi.bvec");
        let bval = info.sibling("epi.bval");
        if !dir.join(&bvec).as_std_path().exists() || !dir.join(&bval).as_std_path().exists() {
            warn!("skipping b0 fieldmap {}: missing bvec/bval", dir.join(info.full_name()));
            continue;
        }

        let mut datatype_tags = vec!["fmap".to_string(), "b0".to_string()];
        if let Some(direction) = info.field("dir") {
            datatype_tags.push(direction.to_string());
        }

        let sidecar = resolve_sidecar(scope, dir, info, "epi.json");
        let mut dataset = Dataset::new("neuro/dwi", info.full_name()).with_datatype_tags(datatype_tags);
        dataset.meta = entity_meta(sidecar, info);
        dataset.tags = derive_tags(info).into_iter().collect();
        dataset.add_file("dwi.nii.gz", dir.join(info.full_name()));
        dataset.add_file("dwi.bvecs", dir.join(bvec));
        dataset.add_file("dwi.bvals", dir.join(bval));
        add_if_exists(&mut dataset, dir, "dwi.json", &info.sibling("epi.json"));
        datasets.push(dataset);
    }
    datasets
}
