fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let git = |args: &[&str]| {
        std::process::Command::new("git")
            .args(args)
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
    };

    let package = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let on_tag = git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();
    let version = match git(&["rev-parse", "--short", "HEAD"]) {
        _ if on_tag => package,
        Some(hash) if !hash.is_empty() => format!("{package}+{hash}"),
        _ => format!("{package}+dev"),
    };
    println!("cargo:rustc-env=MOUNTER_VERSION={version}");
}
