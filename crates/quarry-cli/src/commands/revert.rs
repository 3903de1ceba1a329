use super::{json_pretty, with_spinner, EXIT_SUCCESS};
use quarry_core::Installation;

pub fn run(installation: &Installation, revision: &str, json: bool) -> Result<u8, String> {
    let saved = with_spinner(
        json,
        "reverting...",
        "revert recorded",
        "revert failed",
        || installation.revert(revision),
    )?;

    if json {
        println!("{}", json_pretty(&saved)?);
    } else {
        println!("reverted to {revision} as revision {}", saved.id);
    }
    Ok(EXIT_SUCCESS)
}
