use anyhow::Result;
use metr::models::location::Location;

use crate::configuration::LocationSettings;

pub async fn execute(settings: &LocationSettings) -> Result<()> {
    let location = match settings.resolver()? {
        Some(resolver) => resolver.resolve().await,
        None => Location::default(),
    };
    println!("{}", serde_json::to_string_pretty(&location)?);
    Ok(())
}
