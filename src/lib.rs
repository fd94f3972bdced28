pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fileinfo;
pub mod fs_util;
pub mod modality;
pub mod output;
pub mod participants;
pub mod sidecar;
pub mod walker;
