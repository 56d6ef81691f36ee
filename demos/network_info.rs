use casambi_cloud::{CasambiError, Config, PrivateApi, DEFAULT_CONFIG_FILE};

const OUTPUT_FILE: &str = "network.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let config = Config::load(&path)?;
    let uuid = config
        .network_uuid
        .as_deref()
        .ok_or_else(|| CasambiError::Config("network_uuid is not present in configuration".to_string()))?;

    let mut api = PrivateApi::new()?;
    let network_id = api
        .network_id_from_uuid(uuid)
        .await?
        .ok_or_else(|| CasambiError::Protocol(format!("no network id known for {}", uuid)))?;
    println!("Network {} has id {}", uuid, network_id);

    let session = api.login(&network_id, &config.network_password).await?;
    println!("Session valid until {}", session.expires());

    let info = api.network_information(&network_id).await?;
    std::fs::write(OUTPUT_FILE, serde_json::to_string_pretty(&info)?)?;
    println!("Wrote {}", OUTPUT_FILE);
    Ok(())
}
