//! Splitting of `GO`-delimited installation scripts into executable batches.

use tracing::warn;

/// One statement group of an installation script, executed as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    text: String,
}

impl Batch {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

fn is_separator(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("GO")
}

/// Split `script` at every line consisting solely of `GO` (any case, any
/// surrounding whitespace). Blank batches are skipped; anything after the
/// final separator is not a batch.
pub fn parse_scripts(script: &str) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut current = String::new();

    // Lines keep their own endings so CRLF scripts come back unchanged.
    for line in script.split_inclusive('\n') {
        if is_separator(line) {
            let text = current.trim();
            if !text.is_empty() {
                batches.push(Batch {
                    text: text.to_string(),
                });
            }
            current.clear();
        } else {
            current.push_str(line);
        }
    }

    if !current.trim().is_empty() {
        warn!(
            target = "lectern::install::script",
            trailing_bytes = current.trim().len(),
            "script text after the final GO separator was ignored"
        );
    }

    batches
}
