use osc_link::logging::{ConsoleLogger, LogLevel, OscLogger};
use osc_link::utilities;
use osc_link::{HostMode, LocalHostMode, OscMessage, OscRuntime, SystemConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args.get(1).map(String::as_str).unwrap_or("osc.json");
    let address = args.get(2).map(String::as_str).unwrap_or("/heartbeat");

    let logger = ConsoleLogger::new();
    let config = match SystemConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            logger.log(LogLevel::Error, "Main", &format!("Cannot load {}: {}", config_path, e));
            std::process::exit(1);
        }
    };
    let mut rt = match OscRuntime::from_config(config, logger.clone()) {
        Ok(rt) => rt,
        Err(e) => {
            logger.log(LogLevel::Error, "Main", &format!("Invalid config {}: {}", config_path, e));
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    let l = logger.clone();
    ctrlc::set_handler(move || {
        l.log(LogLevel::Info, "Main", "Shutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .ok();

    let failed = rt.start(HostMode::Playing);
    if !failed.is_empty() {
        logger.log(LogLevel::Warn, "Main", &format!("Not connected: {}", failed.join(", ")));
    }

    for (name, rx) in rt.receivers() {
        let host = match rx.local_host_mode() {
            LocalHostMode::Any => utilities::local_host().to_string(),
            LocalHostMode::Custom { host } => host,
        };
        logger.log(LogLevel::Info, "Main", &format!("Receiver '{}' reachable at {}:{}", name, host, rx.local_port()));
    }

    let mut counter: i32 = 0;
    let mut next_beat = Instant::now();
    while running.load(Ordering::Relaxed) {
        if Instant::now() >= next_beat {
            for (name, tx) in rt.transmitters_mut() {
                if !tx.is_available() {
                    continue;
                }
                if let Err(e) = tx.send(OscMessage::new(address).with_arg(counter)) {
                    logger.log(LogLevel::Warn, "Main", &format!("'{}': {}", name, e));
                }
            }
            rt.flush();
            counter = counter.wrapping_add(1);
            next_beat += Duration::from_secs(1);
        }

        for (name, rx) in rt.receivers() {
            if !rx.is_available() {
                continue;
            }
            match rx.receive() {
                Ok(Some((packet, from))) => {
                    logger.log(LogLevel::Info, "Main", &format!("'{}' <- {}: {:?}", name, from, packet))
                }
                Ok(None) => {}
                Err(e) => logger.log(LogLevel::Warn, "Main", &format!("'{}': {}", name, e)),
            }
        }

        thread::sleep(Duration::from_millis(10));
    }

    rt.stop();
}
