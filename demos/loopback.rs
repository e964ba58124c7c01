//! Serve a few variables over in-process mailboxes and query them.
//!
//! Run with: `RUST_LOG=debug cargo run --example loopback`

use std::sync::Arc;
use std::time::Duration;

use simbridge::{
    Bridge, BridgeConfig, Client, ClientConfig, Error, LocalBackend, MemoryStore, PLUGIN_INFO,
    Status, Value,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("{} ({})", PLUGIN_INFO.name, PLUGIN_INFO.signature);

    let store = Arc::new(
        MemoryStore::new()
            .with("sim/altitude", Value::Float(1500.0))
            .with("sim/heading", Value::Double(271.5))
            .with("sim/gear", Value::IntArray(vec![1, 1, 1]))
            .with("sim/tailnum", Value::Bytes(vec![0; 40])),
    );

    let backend = LocalBackend::new();
    let mut bridge = Bridge::new(
        backend.clone(),
        Arc::clone(&store),
        BridgeConfig {
            poll_interval: Duration::from_millis(100),
            ..BridgeConfig::default()
        },
    );
    bridge.start()?;

    let mut client = Client::attach(&backend, ClientConfig::default())?;

    println!("altitude: {}", client.read_float("sim/altitude")?);
    println!("heading:  {}", client.read_double("sim/heading")?);
    println!("gear:     {:?}", client.read_ints("sim/gear", 3)?);

    client.write_bytes("sim/tailnum", b"N172SP")?;
    let tail = client.read_bytes("sim/tailnum", 6)?;
    println!("tail:     {}", String::from_utf8_lossy(&tail));

    client.write_float("sim/altitude", 2500.0)?;
    println!("altitude: {}", client.read_float("sim/altitude")?);

    match client.read_int("sim/missing") {
        Err(Error::Rejected {
            status: Status::VariableNotFound,
        }) => println!("sim/missing: not found"),
        other => println!("sim/missing: unexpected {other:?}"),
    }

    bridge.stop()?;
    println!("{:#?}", bridge.metrics());
    Ok(())
}
