use std::process::Command;

/// First line of `git <args>` output, if git ran and printed anything.
fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let line = String::from_utf8(out.stdout).ok()?;
    let line = line.lines().next()?.trim().to_owned();
    (!line.is_empty()).then_some(line)
}

fn main() {
    let commit = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".into());
    // Commit date as YYYY-MM-DD; `--version` prints it as the build date.
    let day = git(&["log", "-1", "--format=%cs"]).unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env=GIT_SHA={commit}");
    println!("cargo:rustc-env=BUILD_DATE={day}");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=build.rs");
}
