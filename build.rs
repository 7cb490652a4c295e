use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=build.rs");

    // Only the Darwin probe talks to system frameworks directly.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("macos") {
        return Ok(());
    }

    println!("cargo:rustc-link-search=framework=/System/Library/Frameworks");

    // IOKit for the SMC connection, CoreFoundation for the matching dictionary it consumes
    println!("cargo:rustc-link-lib=framework=IOKit");
    println!("cargo:rustc-link-lib=framework=CoreFoundation");

    Ok(())
}
