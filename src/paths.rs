use std::path::PathBuf;

/// Default locations of Claude Code transcript logs, existing ones only.
///
/// May legitimately be empty on a machine that has never run Claude Code;
/// scans over an absent root degrade to zero records anyway, this just
/// avoids pointless walks.
pub fn default_log_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    if let Some(home) = home::home_dir() {
        roots.push(home.join(".claude").join("projects"));
        roots.push(home.join(".config").join("claude").join("projects"));
    }

    roots.into_iter().filter(|path| path.exists()).collect()
}
