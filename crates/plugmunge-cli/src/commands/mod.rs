pub mod config;
pub mod merge_config;
pub mod prepare;
pub mod queue;
pub mod status;
