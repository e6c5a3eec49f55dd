pub mod arc_params;
pub mod association;
pub mod calibkit;
pub mod calibkit_errors;
pub mod classify;
pub mod conditions;
pub mod config;
pub mod constants;
pub mod detector;
pub mod frame_type;
pub mod header_keys;
pub mod match_criteria;
pub mod metadata;
pub mod spectrographs;
