use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::{App, Arg};
use serde_derive::Deserialize;

use broadcaster::listener::ListenerConfig;
use broadcaster::producer::ProducerConfig;
use broadcaster::Board;

/// On-disk configuration for one `broadcasterd` process, the same `serdeconv`-off-a-config-file
/// convention `satellited` uses.
#[derive(Deserialize, Clone)]
struct BroadcasterConfig {
    bind_address: SocketAddr,
    conninfo: String,
    db_handles: usize,
    idle_interval_ms: u64,
    busy_interval_ms: u64,
    ack_timeout_secs: u64,
    log_level: plat_log::logging::LogLevel,
}

fn main() {
    let matches = App::new("Broadcaster")
        .version("1.0")
        .author("Bush Hammer Industries")
        .about("Polls the database for revised sessions and fans them out to the connected Satellite.")
        .arg(
            Arg::with_name("CONFIG_FILE")
                .help("Path to the config file")
                .required(true),
        )
        .get_matches();

    let config_file_path = matches.value_of("CONFIG_FILE").unwrap();
    let config: BroadcasterConfig = serdeconv::from_json_file(config_file_path).expect("failed to parse config file");

    let logger = plat_log::logging::init("broadcaster", config.log_level.clone());

    let pool = Arc::new(mmps::standard_pool(8, 0).expect("failed to build buffer pool"));
    let db = Arc::new(
        dbpool::Chain::init_chain("broadcaster", config.db_handles, &config.conninfo, logger.clone())
            .expect("failed to connect the database chain"),
    );
    let board = Arc::new(Board::new());
    let shutdown = Arc::new(AtomicBool::new(false));

    let producer_config = ProducerConfig {
        idle_interval: Duration::from_millis(config.idle_interval_ms),
        busy_interval: Duration::from_millis(config.busy_interval_ms),
    };
    let listener_config = ListenerConfig {
        bind_address: config.bind_address,
        ack_timeout: Duration::from_secs(config.ack_timeout_secs),
        ..ListenerConfig::default()
    };

    plat_log::logging::info!(logger, "starting broadcaster"; "bind_address" => %config.bind_address);

    let producer_handle = {
        let db = Arc::clone(&db);
        let board = Arc::clone(&board);
        let logger = logger.clone();
        let shutdown = Arc::clone(&shutdown);
        std::thread::Builder::new()
            .name("broadcaster-producer".into())
            .spawn(move || broadcaster::producer::run(db, board, logger, producer_config, shutdown))
            .expect("failed to spawn the producer thread")
    };

    std::thread::Builder::new()
        .name("broadcaster-listener".into())
        .spawn(move || broadcaster::listener::run(board, pool, logger, listener_config, shutdown))
        .expect("failed to spawn the listener thread")
        .join()
        .expect("listener thread panicked")
        .expect("listener thread failed");

    producer_handle.join().expect("producer thread panicked");
}
