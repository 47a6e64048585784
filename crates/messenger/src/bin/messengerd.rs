use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::{App, Arg};
use serde_derive::Deserialize;

use messenger::apns::{ApnsConfig, SendMode};
use messenger::pipeline::PipelineConfig;
use messenger::Chalkboard;

/// On-disk configuration for one `messengerd` process, the same `serdeconv`-off-a-config-file
/// convention `satellited`/`broadcasterd` use.
#[derive(Deserialize, Clone)]
struct MessengerConfig {
    conninfo: String,
    db_handles: usize,
    notification_buffers: usize,
    tick_interval_ms: u64,
    apns_gateway_host: String,
    apns_gateway_port: u16,
    apns_disconnect_if_idle_secs: u64,
    apns_send_mode: ApnsSendMode,
    apns_identity_path: String,
    apns_identity_password: String,
    log_level: plat_log::logging::LogLevel,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum ApnsSendMode {
    Legacy,
    Framed,
}

impl From<ApnsSendMode> for SendMode {
    fn from(mode: ApnsSendMode) -> Self {
        match mode {
            ApnsSendMode::Legacy => SendMode::Legacy,
            ApnsSendMode::Framed => SendMode::Framed,
        }
    }
}

fn main() {
    let matches = App::new("Messenger")
        .version("1.0")
        .author("Bush Hammer Industries")
        .about("Delivers outstanding notifications to Apple Push Notification service.")
        .arg(
            Arg::with_name("CONFIG_FILE")
                .help("Path to the config file")
                .required(true),
        )
        .get_matches();

    let config_file_path = matches.value_of("CONFIG_FILE").unwrap();
    let config: MessengerConfig = serdeconv::from_json_file(config_file_path).expect("failed to parse config file");

    let logger = plat_log::logging::init("messenger", config.log_level.clone());

    let mut pool = mmps::Pool::new();
    pool.add_bank(mmps::Bank::new_heap(mmps::BankId(0), 2048, 0, config.notification_buffers))
        .expect("failed to build the notifications bank");
    let pool = Arc::new(pool);

    let db = Arc::new(
        dbpool::Chain::init_chain("messenger", config.db_handles, &config.conninfo, logger.clone())
            .expect("failed to connect the database chain"),
    );
    let board = Arc::new(Chalkboard::new());
    let shutdown = Arc::new(AtomicBool::new(false));

    let identity_der = std::fs::read(&config.apns_identity_path).expect("failed to read the APNS identity file");
    let identity =
        native_tls::Identity::from_pkcs12(&identity_der, &config.apns_identity_password).expect("failed to load the APNS identity");

    let pipeline_config = PipelineConfig {
        tick_interval: Duration::from_millis(config.tick_interval_ms),
    };
    let apns_config = ApnsConfig {
        gateway_host: config.apns_gateway_host,
        gateway_port: config.apns_gateway_port,
        disconnect_if_idle: Duration::from_secs(config.apns_disconnect_if_idle_secs),
        send_mode: config.apns_send_mode.into(),
    };

    plat_log::logging::info!(logger, "starting messenger");

    let pipeline_handle = {
        let pool = Arc::clone(&pool);
        let db = Arc::clone(&db);
        let board = Arc::clone(&board);
        let logger = logger.clone();
        let shutdown = Arc::clone(&shutdown);
        std::thread::Builder::new()
            .name("messenger-pipeline".into())
            .spawn(move || messenger::pipeline::run(pool, db, board, logger, pipeline_config, shutdown))
            .expect("failed to spawn the pipeline thread")
    };

    std::thread::Builder::new()
        .name("messenger-apns".into())
        .spawn(move || messenger::apns::run(board, identity, logger, apns_config, shutdown))
        .expect("failed to spawn the apns thread")
        .join()
        .expect("apns thread panicked");

    pipeline_handle.join().expect("pipeline thread panicked");
}
