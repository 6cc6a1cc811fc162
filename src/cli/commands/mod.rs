//! One module per subcommand, each exposing `execute`.

pub mod completions;
pub mod create;
pub mod export;
pub mod format;
pub mod import;
pub mod init;
pub mod list;
pub mod show;
