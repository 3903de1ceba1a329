use super::{describe, json_pretty, EXIT_SUCCESS};
use quarry_core::{ChannelVersionMode, Installation};

pub fn run(
    installation: &Installation,
    channel: &str,
    mode: ChannelVersionMode,
    json: bool,
) -> Result<u8, String> {
    let versions = installation
        .channel_versions(channel, mode)
        .map_err(|e| describe(&e))?;

    if json {
        let payload = serde_json::json!({
            "channel": channel,
            "versions": versions,
        });
        println!("{}", json_pretty(&payload)?);
    } else if versions.is_empty() {
        println!("no newer versions of channel {channel}");
    } else {
        for v in &versions {
            match &v.logical {
                Some(l) => println!("{}  {l}", v.physical),
                None => println!("{}", v.physical),
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
