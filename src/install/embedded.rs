//! Installation scripts compiled into the binary.

use include_dir::{Dir, include_dir};

static SCRIPTS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/installation");

/// Text of the bundled script called `name`, if there is one.
pub fn unpack_embedded_script(name: &str) -> Option<&'static str> {
    SCRIPTS.get_file(name)?.contents_utf8()
}

/// Names of every bundled script in installation order.
pub fn script_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = SCRIPTS
        .files()
        .filter_map(|file| file.path().to_str())
        .filter(|name| name.ends_with(".sql"))
        .collect();
    names.sort_unstable();
    names
}
