use super::{colorize_kind, describe, format_timestamp, json_pretty, EXIT_SUCCESS};
use quarry_core::Installation;

pub fn run(installation: &Installation, json: bool) -> Result<u8, String> {
    let revisions = installation.history().map_err(|e| describe(&e))?;

    if json {
        println!("{}", json_pretty(&revisions)?);
    } else if revisions.is_empty() {
        println!("no revisions recorded");
    } else {
        println!("{:<10} {:<10} TIMESTAMP", "REVISION", "TYPE");
        for r in &revisions {
            let kind = r.kind.as_str();
            println!(
                "{:<10} {}{} {}",
                r.id.as_str(),
                colorize_kind(kind),
                " ".repeat(10usize.saturating_sub(kind.len())),
                format_timestamp(r.timestamp)
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
