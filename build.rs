//! Embeds build metadata shown by `openstack-secret --version`.

fn main() {
    let datetime = std::env::var("BUILD_DATETIME").unwrap_or_else(|_| {
        chrono::Utc::now()
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
    });

    let git_hash = std::env::var("BUILD_GIT_HASH")
        .ok()
        .or_else(git_hash)
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=BUILD_DATETIME={datetime}");
    println!("cargo:rustc-env=BUILD_GIT_HASH={git_hash}");

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=BUILD_DATETIME");
    println!("cargo:rerun-if-env-changed=BUILD_GIT_HASH");
}

/// Abbreviated commit, suffixed `-dirty` when the work tree has changes
fn git_hash() -> Option<String> {
    // Command-line git keeps libgit2/OpenSSL out of the build graph
    let output = std::process::Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8", "--exclude=*"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;

    String::from_utf8(output.stdout)
        .ok()
        .map(|described| described.trim().to_string())
        .filter(|described| !described.is_empty())
}
