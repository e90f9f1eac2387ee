use std::sync::Arc;

use tcl_hvac::{ClientConfig, FileStore, TclClientBuilder};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> tcl_hvac::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };
    let state_dir = ClientConfig::state_dir_from_env();

    let mut client = TclClientBuilder::from_config(config)
        .store(Arc::new(FileStore::new(&state_dir)))
        .on_event(|event| {
            println!("{event:?}");
        })
        .on_snapshot(|device| {
            let mode = device.mode().map(|m| m.as_str()).unwrap_or("-");
            let target = device
                .data
                .target_celsius()
                .map(|t| format!("{t:.1}\u{00b0}C"))
                .unwrap_or_else(|| "-".into());
            let current = device
                .data
                .current_celsius()
                .map(|t| format!("{t:.1}\u{00b0}C"))
                .unwrap_or_else(|| "-".into());
            println!(
                "[{}] {} | {} | mode: {mode} | target: {target} | current: {current}{}",
                device.name,
                device.family.as_str(),
                if device.is_on() { "on" } else { "off" },
                if device.is_online { "" } else { " | OFFLINE" },
            );
        })
        .build()?;

    println!("Connecting (state in {})...", state_dir.display());
    client.connect().await?;
    println!("Connected. Polling every {}s, Ctrl-C to stop.", client.config().poll_interval.as_secs());
    client.start_polling()?;

    tokio::signal::ctrl_c().await?;
    println!("Stopping...");
    client.disconnect().await;
    Ok(())
}
