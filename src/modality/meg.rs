use camino::Utf8Path;

use crate::domain::{Dataset, Modality};
use crate::error::BidsError;
use crate::sidecar::SidecarScope;

use super::eeg::{CHANNELS, ELECTRODES, EVENTS};
use super::{ModalityHandler, SuffixRule, handle_with_rules, task_tag};

const RULES: &[SuffixRule] = &[
    // CTF recordings are directories named `*_meg.ds`.
    SuffixRule {
        filenames: &["meg.ds"],
        role: "meg.ds",
        generic_sidecar: "meg.json",
        dtag: "ctf",
        companions: &[CHANNELS, EVENTS, ELECTRODES],
    },
    SuffixRule {
        filenames: &["meg.fif"],
        role: "meg.fif",
        generic_sidecar: "meg.json",
        dtag: "fif",
        companions: &[CHANNELS, EVENTS, ELECTRODES],
    },
];

pub struct MegHandler;

impl ModalityHandler for MegHandler {
    fn modality(&self) -> Modality {
        Modality::Meg
    }

    fn handle(&self, scope: &SidecarScope, dir: &Utf8Path) -> Result<Vec<Dataset>, BidsError> {
        handle_with_rules(scope, dir, RULES, |rule, info| {
            ("neuro/meg".to_string(), vec![rule.dtag.to_string(), task_tag(info)])
        })
    }
}
