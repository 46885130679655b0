// Put data in the binary at compile time, for example a calculated version:
// VERSION=1.1.0-rc20250129 cargo build

fn main() {
    let version = std::env::var("VERSION").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-env=version={}", version);
}
