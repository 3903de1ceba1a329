use super::{describe, json_pretty, EXIT_STORE_ERROR, EXIT_SUCCESS};
use quarry_core::Installation;

pub fn run(installation: &Installation, json: bool) -> Result<u8, String> {
    let report = installation.verify().map_err(|e| describe(&e))?;

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        println!(
            "history integrity: {} revision(s), {}/{} snapshots passed",
            report.records_checked, report.objects_passed, report.objects_checked
        );
        if report.working_copy_matches_head == Some(false) {
            println!("  working copy differs from the head revision");
        }
        for f in &report.failed {
            println!("  FAIL {}: {}", f.subject, f.reason);
        }
    }

    if report.is_clean() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_STORE_ERROR)
    }
}
