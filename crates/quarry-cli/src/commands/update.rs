use super::{
    describe, downgrade_marker, json_pretty, with_spinner, EXIT_RESOLUTION_ERROR, EXIT_SUCCESS,
};
use quarry_core::{Installation, UpdateSet};

fn print_updates(updates: &UpdateSet) {
    for u in &updates.artifacts {
        println!(
            "  {}  {} -> {}{}",
            u.artifact_name,
            u.old_version,
            u.new_version,
            downgrade_marker(u.downgrade)
        );
    }
    for c in &updates.channels {
        let logical = c
            .new_logical_version
            .as_deref()
            .map(|l| format!(" ({l})"))
            .unwrap_or_default();
        println!(
            "  channel {}  {} -> {}{logical}{}",
            c.channel,
            c.old_version,
            c.new_version,
            downgrade_marker(c.downgrade)
        );
    }
}

fn print_failures(updates: &UpdateSet) {
    if updates.failures.is_empty() {
        return;
    }
    eprintln!("could not check {} artifact(s):", updates.failures.len());
    for f in &updates.failures {
        eprintln!("  {} [{}]: {}", f.subject, f.kind, f.message);
    }
}

fn status(updates: &UpdateSet) -> u8 {
    if updates.failures.is_empty() {
        EXIT_SUCCESS
    } else {
        EXIT_RESOLUTION_ERROR
    }
}

pub fn list(installation: &Installation, json: bool) -> Result<u8, String> {
    let updates = with_spinner(
        json,
        "checking for updates...",
        "update check complete",
        "update check failed",
        || installation.find_updates(),
    )?;

    if json {
        println!("{}", json_pretty(&updates)?);
    } else {
        if updates.is_empty() {
            println!("no updates available");
        } else {
            println!("{} update(s) available:", updates.len());
            print_updates(&updates);
        }
        print_failures(&updates);
    }
    Ok(status(&updates))
}

pub fn perform(
    installation: &Installation,
    allow_downgrades: bool,
    json: bool,
) -> Result<u8, String> {
    let updates = installation.find_updates().map_err(|e| describe(&e))?;

    let applied = with_spinner(
        json,
        "applying updates...",
        "updates applied",
        "update failed",
        || installation.apply_updates(&updates, allow_downgrades),
    )?;

    if json {
        let payload = serde_json::json!({
            "applied": applied,
            "failures": updates.failures,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        match &applied {
            Some(result) => {
                println!(
                    "applied {} update(s) as revision {}",
                    updates.len(),
                    result.revision.id
                );
                print_updates(&updates);
            }
            None => println!("no updates available"),
        }
        print_failures(&updates);
    }
    Ok(status(&updates))
}
