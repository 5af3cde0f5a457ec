//! Database installation: bundled `GO`-delimited scripts and the runner that applies them.

pub mod embedded;
pub mod installer;
pub mod script;

pub use embedded::{script_names, unpack_embedded_script};
pub use installer::{InstallError, ScriptError, install, script_batches, split_to_dir};
pub use script::{Batch, parse_scripts};
