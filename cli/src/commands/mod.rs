mod dashboard;
mod entry;
mod helpers;
mod import;
mod stats;

pub(crate) use dashboard::{Source, cmd_dashboard};
pub(crate) use entry::{cmd_add, cmd_list, cmd_show};
pub(crate) use import::cmd_import;
pub(crate) use stats::cmd_stats;
