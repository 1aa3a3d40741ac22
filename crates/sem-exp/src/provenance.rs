use std::path::Path;
use std::process::Command;

use tracing::warn;

/// Fingerprint recorded when the simulator tree is not a git checkout.
pub const UNKNOWN_REVISION: &str = "unknown";

/// Revision of the simulator source tree at `path`, suffixed with `-dirty`
/// when the working tree has uncommitted changes.
pub fn source_fingerprint(path: &Path) -> String {
    let Some(head) = git(path, &["rev-parse", "HEAD"]) else {
        warn!(path = %path.display(), "simulator tree is not a git checkout");
        return UNKNOWN_REVISION.into();
    };
    match git(path, &["status", "--porcelain", "--untracked-files=no"]) {
        Some(status) if !status.is_empty() => format!("{head}-dirty"),
        _ => head,
    }
}

fn git(path: &Path, args: &[&str]) -> Option<String> {
    Command::new("git")
        .arg("-C")
        .arg(path)
        .args(args)
        .output()
        .ok()
        .and_then(|out| {
            if out.status.success() {
                Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
            } else {
                None
            }
        })
}
