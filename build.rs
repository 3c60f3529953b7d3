use anyhow::*;
use std::env;
use std::path::PathBuf;

fn main() -> Result<()> {
    // This tells Cargo to rerun this script if something in /assets/ changes.
    println!("cargo:rerun-if-changed=assets");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let assets = manifest_dir.join("assets");
    // Native builds read `img/green-apple3d/...` relative to this directory.
    println!("cargo:rustc-env=GREEN_APPLE_ASSET_DIR={}", assets.display());

    let model = assets.join("img/green-apple3d/apple02.obj");
    if !model.exists() {
        println!(
            "cargo:warning=no model at {}, the viewer will show \"Load failed\" unless GREEN_APPLE_ASSET_DIR points elsewhere",
            model.display()
        );
    }

    Ok(())
}
