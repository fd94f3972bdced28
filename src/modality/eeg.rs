use camino::Utf8Path;

use crate::domain::{Dataset, Modality};
use crate::error::BidsError;
use crate::sidecar::SidecarScope;

use super::{Companion, CompanionGroup, ModalityHandler, SuffixRule, handle_with_rules, task_tag};

/// Companions shared by the electrophysiology modalities.
pub(crate) const CHANNELS: CompanionGroup = CompanionGroup {
    mandatory: false,
    subject_fallback: false,
    members: &[Companion::required("channels.tsv", &["channels.tsv"])],
};

pub(crate) const EVENTS: CompanionGroup = CompanionGroup {
    mandatory: false,
    subject_fallback: false,
    members: &[Companion::required("events.tsv", &["events.tsv"])],
};

// Electrode positions are often recorded once per subject or session.
pub(crate) const ELECTRODES: CompanionGroup = CompanionGroup {
    mandatory: false,
    subject_fallback: true,
    members: &[
        Companion::required("electrodes.tsv", &["electrodes.tsv"]),
        Companion {
            role: None,
            suffixes: &["coordsystem.json", "coordsystem.tsv"],
            required: true,
        },
    ],
};

const RULES: &[SuffixRule] = &[
    SuffixRule {
        filenames: &["eeg.edf"],
        role: "eeg.edf",
        generic_sidecar: "eeg.json",
        dtag: "edf",
        companions: &[CHANNELS, EVENTS, ELECTRODES],
    },
    SuffixRule {
        filenames: &["eeg.eeg"],
        role: "eeg.eeg",
        generic_sidecar: "eeg.json",
        dtag: "brainvision",
        companions: &[
            CompanionGroup {
                mandatory: true,
                subject_fallback: false,
                members: &[
                    Companion::required("eeg.vhdr", &["eeg.vhdr"]),
                    Companion::required("eeg.vmrk", &["eeg.vmrk"]),
                ],
            },
            CHANNELS,
            EVENTS,
            ELECTRODES,
        ],
    },
    SuffixRule {
        filenames: &["eeg.fdt"],
        role: "eeg.fdt",
        generic_sidecar: "eeg.json",
        dtag: "eeglab",
        companions: &[
            CompanionGroup {
                mandatory: true,
                subject_fallback: false,
                members: &[Companion::required("eeg.set", &["eeg.set"])],
            },
            CHANNELS,
            EVENTS,
            ELECTRODES,
        ],
    },
];

pub struct EegHandler;

impl ModalityHandler for EegHandler {
    fn modality(&self) -> Modality {
        Modality::Eeg
    }

    fn handle(&self, scope: &SidecarScope, dir: &Utf8Path) -> Result<Vec<Dataset>, BidsError> {
        handle_with_rules(scope, dir, RULES, |rule, info| {
            ("neuro/eeg".to_string(), vec![rule.dtag.to_string(), task_tag(info)])
        })
    }
}
