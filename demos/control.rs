use casambi_cloud::{CasambiClient, ColorTemperatureSource, Config, DEFAULT_CONFIG_FILE};
use serde_json::Value;
use std::time::Duration;

const PAUSE: Duration = Duration::from_secs(5);

async fn print_unit_information(client: &CasambiClient, unit: &Value) -> Result<(), Box<dyn std::error::Error>> {
    let state = client.unit_state(unit).await?;
    println!(
        "Unit {} ({}):\n{}",
        unit,
        state.name().unwrap_or("unnamed"),
        serde_json::to_string_pretty(state.raw_json())?
    );

    if let Some(fixture) = state.fixture_id() {
        let fixture = client.fixture_info(fixture).await?;
        println!("Fixture:\n{}", serde_json::to_string_pretty(&fixture)?);
    }

    println!("  supports rgb: {}", state.supports_rgb());
    println!("  supports rgbw: {}", state.supports_rgbw());
    println!("  supports color temperature: {}", state.supports_color_temperature());
    if state.supports_color_temperature() {
        let (min, max) = state.supported_color_temperature_range();
        println!("  color temperature range: {} K - {} K", min, max);
    }
    Ok(())
}

async fn exercise_unit(client: &mut CasambiClient, unit: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("Turn unit {} on", unit);
    client.turn_on(unit).await?;
    tokio::time::sleep(PAUSE).await;

    if client.unit_supports_color_temperature(unit).await? {
        let kelvin = client
            .set_color_temperature(unit, 250, ColorTemperatureSource::Mired)
            .await?;
        println!("Set unit {} to {} K", unit, kelvin);
        tokio::time::sleep(PAUSE).await;
    }

    if client.unit_supports_rgb(unit).await? {
        client.set_rgb(unit, (255, 80, 0), false).await?;
        tokio::time::sleep(PAUSE).await;
    }

    client.set_dimmer(unit, 0.3).await?;
    tokio::time::sleep(PAUSE).await;

    println!("Turn unit {} off", unit);
    client.turn_off(unit).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let config = Config::load(&path)?;

    let mut client = CasambiClient::connect(&config).await?;
    println!("Connected to network {}", client.session().network_id());

    let units = client.unit_list().await?;
    println!("Units:\n{}", serde_json::to_string_pretty(&units)?);

    let scenes = client.scene_list().await?;
    println!("Scenes:\n{}", serde_json::to_string_pretty(&scenes)?);

    for unit in config.target_units() {
        print_unit_information(&client, &unit).await?;
        exercise_unit(&mut client, &unit).await?;
    }

    if let Some(scene) = &config.scene_id {
        println!("Scene {} on", scene);
        client.turn_scene_on(scene).await?;
        tokio::time::sleep(PAUSE).await;
        println!("Scene {} off", scene);
        client.turn_scene_off(scene).await?;
    }

    for event in client.drain().await? {
        println!("Event: {:?} {}", event.kind(), event.raw_json());
    }

    client.close().await?;
    Ok(())
}
