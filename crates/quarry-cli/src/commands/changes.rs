use super::{describe, json_pretty, EXIT_SUCCESS};
use quarry_core::Installation;
use quarry_store::ChannelChangeKind;

pub fn run(installation: &Installation, revision: &str, json: bool) -> Result<u8, String> {
    let artifacts = installation.changes(revision).map_err(|e| describe(&e))?;
    let channels = installation
        .channel_changes(revision)
        .map_err(|e| describe(&e))?;

    if json {
        let payload = serde_json::json!({
            "revision": revision,
            "artifacts": artifacts,
            "channels": channels,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    if artifacts.is_empty() && channels.is_empty() {
        println!("no changes since revision {revision}");
        return Ok(EXIT_SUCCESS);
    }
    println!("changes since revision {revision}:");
    for c in &artifacts {
        let old = c.old_version.as_deref().unwrap_or_default();
        let new = c.new_version.as_deref().unwrap_or_default();
        if c.is_install() {
            println!("  + {} {new}", c.artifact_name);
        } else if c.is_removed() {
            println!("  - {} {old}", c.artifact_name);
        } else {
            println!("  ~ {} {old} -> {new}", c.artifact_name);
        }
    }
    for c in &channels {
        match c.kind {
            ChannelChangeKind::Added => println!("  + channel {}", c.name),
            ChannelChangeKind::Removed => println!("  - channel {}", c.name),
            ChannelChangeKind::Modified => {
                println!("  ~ channel {}", c.name);
                if c.old_manifest != c.new_manifest {
                    println!(
                        "      manifest {} -> {}",
                        c.old_manifest.as_deref().unwrap_or_default(),
                        c.new_manifest.as_deref().unwrap_or_default()
                    );
                }
                for r in &c.added_repositories {
                    println!("      + repository {} ({})", r.id, r.url);
                }
                for r in &c.removed_repositories {
                    println!("      - repository {} ({})", r.id, r.url);
                }
                if c.reordered {
                    println!("      repositories reordered");
                }
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
