//! List command implementation.

use filesync_engine::StoreTransport;
use serde::Serialize;
use std::time::Duration;

/// One listed file.
#[derive(Debug, Serialize)]
pub struct ListedFile {
    /// File name.
    pub name: String,
    /// Hex digest, absent if the server could not read the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Prints the server's listing.
pub fn run(server: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let transport = super::http_transport(server, Duration::from_secs(30))?;
    let listing = transport.list()?;

    let files: Vec<ListedFile> = listing
        .iter()
        .map(|(name, fp)| ListedFile {
            name: name.to_string(),
            digest: fp.digest().map(|d| d.to_hex()),
        })
        .collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&files)?),
        _ => {
            for file in &files {
                let digest = file.digest.as_deref().unwrap_or("<unreadable>");
                println!("{:<64}  {}", digest, file.name);
            }
            println!("{} files", files.len());
        }
    }
    Ok(())
}
