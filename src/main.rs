use anyhow::{Context, Result};
use charlie_core::Config;
use charlie_weather::{Phase, Session};

#[tokio::main]
async fn main() -> Result<()> {
    charlie_core::init()?;

    let (config, _validation) = Config::load_validated()?;
    tracing::info!("Using provider at {}", config.api.base_url);

    let session = Session::from_config(&config).context("Failed to build weather session")?;
    session.start().await;
    session.wait_for_directory().await;

    let state = session.snapshot();

    println!("Challenge Charlie");
    println!("  Config directory: {}", config.config_dir.display());

    match (state.phase(), state.location()) {
        (Phase::Ready, Some(location)) => {
            println!(
                "  Location: {}, {}",
                location.city.as_deref().unwrap_or("-"),
                location.state.as_deref().unwrap_or("-")
            );
        }
        _ => println!("  Location: not resolved (set location.latitude/longitude in config.toml)"),
    }

    if let Some(weather) = state.weather() {
        println!(
            "  Now: {} ({}), humidity {}%, wind {} m/s",
            state.temperature_display().unwrap_or("-"),
            weather.description,
            weather.humidity,
            weather.wind_speed
        );
    }

    if let Some(forecast) = state.forecast() {
        let unit = state.temperature_unit();
        for entry in forecast {
            println!("  {}  {}", entry.timestamp, unit.display(entry.temperature_raw));
        }
    }

    if let Some(notice) = session.take_notice() {
        println!("  ! {}", notice);
    }

    match state.city_names() {
        Some(names) => println!("  Municipalities loaded: {}", names.len()),
        None => println!("  Municipality directory unavailable"),
    }

    Ok(())
}
