//! Fake loader scripts for integration tests.

use std::path::Path;

/// Write a `/bin/sh` script standing in for `edne-correios-loader` and return
/// a loader command line that runs it.
///
/// `load --help` prints a usage line and exits 0 unless `help_exit` says
/// otherwise; `load ...` echoes each argument as `arg:<value>` and runs
/// `load_tail`.
pub fn fake_loader(dir: &Path, help_exit: i32, load_tail: &str) -> String {
    let path = dir.join("fake-loader.sh");
    let script = format!(
        r#"if [ "$1" = "load" ] && [ "$2" = "--help" ]; then
  echo "Usage: edne-correios-loader load [OPTIONS]"
  exit {help_exit}
fi
echo "cwd:$(pwd)"
for a in "$@"; do printf 'arg:%s\n' "$a"; done
echo "loading" >&2
{load_tail}
"#
    );
    std::fs::write(&path, script).expect("failed to write fake loader");
    format!("sh {}", shell_words::quote(&path.display().to_string()))
}
