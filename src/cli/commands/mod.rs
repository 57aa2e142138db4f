//! Command implementation modules

pub mod ls;
pub mod merge;
pub mod render;

pub use ls::run_ls_command;
pub use merge::{run_merge_all_command, run_merge_command};
pub use render::{run_generate_command, run_render_command, GenerateParams};
