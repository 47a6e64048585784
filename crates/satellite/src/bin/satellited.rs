use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::{App, Arg};
use serde_derive::Deserialize;

use satellite::broadcaster_client::BroadcasterClientConfig;
use satellite::registry::TaskRegistry;
use satellite::Context;

/// On-disk configuration for one `satellited` process. Deserialized straight off the config file
/// named on the command line, the same `serdeconv` convention the rest of the workspace uses.
#[derive(Deserialize, Clone)]
struct SatelliteConfig {
    bind_address: SocketAddr,
    conninfo: String,
    db_handles: usize,
    task_buffers: usize,
    paquet_buffers: usize,
    broadcast_wait_secs: u64,
    broadcaster_address: SocketAddr,
    log_level: plat_log::logging::LogLevel,
}

fn main() {
    let matches = App::new("Satellite")
        .version("1.0")
        .author("Bush Hammer Industries")
        .about("Runs the per-connection task engine that services client paquets.")
        .arg(
            Arg::with_name("CONFIG_FILE")
                .help("Path to the config file")
                .required(true),
        )
        .get_matches();

    let config_file_path = matches.value_of("CONFIG_FILE").unwrap();
    let config: SatelliteConfig = serdeconv::from_json_file(config_file_path).expect("failed to parse config file");

    let logger = plat_log::logging::init("satellite", config.log_level.clone());

    let pool = Arc::new(mmps::standard_pool(config.task_buffers, config.paquet_buffers).expect("failed to build buffer pool"));
    let db = Arc::new(
        dbpool::Chain::init_chain("satellite", config.db_handles, &config.conninfo, logger.clone())
            .expect("failed to connect the database chain"),
    );
    let registry = Arc::new(TaskRegistry::new());

    let ctx = Context {
        pool,
        db,
        registry,
        logger: logger.clone(),
        broadcast_wait: Duration::from_secs(config.broadcast_wait_secs),
    };

    plat_log::logging::info!(logger, "starting satellite"; "bind_address" => %config.bind_address);

    let broadcaster_shutdown = Arc::new(AtomicBool::new(false));
    {
        let registry = Arc::clone(&ctx.registry);
        let logger = logger.clone();
        let client_config = BroadcasterClientConfig {
            broadcaster_address: config.broadcaster_address,
            ..BroadcasterClientConfig::default()
        };
        std::thread::Builder::new()
            .name("satellite-broadcast-consumer".into())
            .spawn(move || satellite::broadcaster_client::run(registry, logger, client_config, broadcaster_shutdown))
            .expect("failed to spawn the broadcast consumer thread");
    }

    satellite::serve(ctx, config.bind_address).expect("satellite listener failed");
}
