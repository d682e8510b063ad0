//! Subcommands other than `run`.

pub mod preview;

pub use preview::{PreviewArgs, execute as preview};
