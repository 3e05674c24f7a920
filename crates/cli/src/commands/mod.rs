pub mod config_cmd;
pub mod demand;
pub mod history;
pub mod orchestrate;
