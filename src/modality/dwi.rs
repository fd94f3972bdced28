use camino::Utf8Path;

use crate::domain::{Dataset, Modality};
use crate::error::BidsError;
use crate::sidecar::SidecarScope;

use super::{Companion, CompanionGroup, ModalityHandler, SuffixRule, handle_with_rules};

pub(crate) const GRADIENTS: CompanionGroup = CompanionGroup {
    mandatory: true,
    subject_fallback: false,
    members: &[
        Companion::required("dwi.bvecs", &["dwi.bvec"]),
        Companion::required("dwi.bvals", &["dwi.bval"]),
    ],
};

pub(crate) const SBREF: CompanionGroup = CompanionGroup {
    mandatory: false,
    subject_fallback: false,
    members: &[
        Companion::required("sbref.nii.gz", &["sbref.nii.gz", "sbref.nii"]),
        Companion::optional("sbref.json", &["sbref.json"]),
    ],
};

const RULES: &[SuffixRule] = &[SuffixRule {
    filenames: &["dwi.nii.gz", "dwi.nii"],
    role: "dwi.nii.gz",
    generic_sidecar: "dwi.json",
    dtag: "",
    companions: &[GRADIENTS, SBREF],
}];

pub struct DwiHandler;

impl ModalityHandler for DwiHandler {
    fn modality(&self) -> Modality {
        Modality::Dwi
    }

    fn handle(&self, scope: &SidecarScope, dir: &Utf8Path) -> Result<Vec<Dataset>, BidsError> {
        handle_with_rules(scope, dir, RULES, |_rule, _info| {
            ("neuro/dwi".to_string(), Vec::new())
        })
    }
}
