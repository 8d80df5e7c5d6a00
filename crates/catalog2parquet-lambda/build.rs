use std::process::Command;

/// Short commit hash, preferring an explicit `GIT_HASH` from CI (container
/// builds often have no `.git` directory).
fn git_hash() -> String {
    if let Ok(hash) = std::env::var("GIT_HASH") {
        if !hash.trim().is_empty() {
            return hash.trim().to_string();
        }
    }

    Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() {
    println!("cargo:rustc-env=GIT_HASH={}", git_hash());
    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        chrono::Utc::now().to_rfc3339()
    );

    println!("cargo:rerun-if-env-changed=GIT_HASH");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
}
