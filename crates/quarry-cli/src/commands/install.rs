use super::{json_pretty, with_spinner, EXIT_SUCCESS};
use quarry_core::Installation;
use quarry_schema::Manifest;
use std::path::Path;

pub fn run(installation: &Installation, manifest: &Path, json: bool) -> Result<u8, String> {
    let manifest =
        Manifest::read_from_file(manifest).map_err(|e| format!("manifest error: {e}"))?;

    let result = with_spinner(
        json,
        "resolving artifacts...",
        "installation recorded",
        "install failed",
        || installation.install(&manifest),
    )?;

    if json {
        println!("{}", json_pretty(&result)?);
    } else {
        println!(
            "installed {} artifact(s) as revision {}",
            result.artifacts.len(),
            result.revision.id
        );
        for a in &result.artifacts {
            println!("  {} (from {})", a.coordinate, a.repository);
        }
    }
    Ok(EXIT_SUCCESS)
}
