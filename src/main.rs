#[macro_use]
extern crate log;

use std::env;
use std::io;
use std::net::SocketAddr;
use std::process;
use std::sync::{Arc, Mutex};

use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, TermLogger, TerminalMode};

use dht_find_node::{ClosestNodes, Config, FindNodeTask, RoutingTable, Scheduler, UdpWireSink};

fn init_logger(level: LevelFilter) {
    let logger_config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .set_location_level(LevelFilter::Off)
        .build();
    let result = CombinedLogger::init(vec![TermLogger::new(
        level,
        logger_config,
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
    if let Err(e) = result {
        eprintln!("Error: could not initialize logger: {}", e);
    }
}

fn main() {
    let path = env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = Config::from_file(&path);
    init_logger(config.as_ref().map(|c| c.log_level).unwrap_or(LevelFilter::Info));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Error: could not load {}: {}", path, e);
            process::exit(1);
        },
    };

    let ports = if config.ports.is_empty() {
        vec![0; config.node_ids.len()]
    } else {
        config.ports.clone()
    };
    let sink = match UdpWireSink::bind(config.bind_ip, &ports) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Error: could not bind sockets: {}", e);
            process::exit(1);
        },
    };

    // one routing table per local identity, seeded from the configured known nodes
    let known_nodes = config.known_node_data();
    let routing_tables: Vec<Arc<dyn ClosestNodes>> = config
        .node_ids
        .iter()
        .map(|id| {
            Arc::new(Mutex::new(RoutingTable::seeded(*id, &known_nodes))) as Arc<dyn ClosestNodes>
        })
        .collect();

    let task = match FindNodeTask::new(&config, routing_tables, Arc::new(sink)) {
        Ok(task) => task,
        Err(e) => {
            error!("Error: could not start: {}", e);
            process::exit(1);
        },
    };

    let scheduler = Scheduler::new(task.shutdown_signal());
    task.schedule(&scheduler);
    for addr in config.resolve_init_addresses() {
        task.put(addr);
    }
    task.start();

    let input = io::stdin();
    loop {
        let mut buffer = String::new();
        match input.read_line(&mut buffer) {
            Ok(0) | Err(_) => {
                // detached from a terminal: run until killed
                scheduler.join();
                return;
            },
            Ok(_) => {},
        }
        let args: Vec<&str> = buffer.trim_end().split(' ').collect();
        match args[0] {
            "put" => match args.get(1).and_then(|s| s.parse::<SocketAddr>().ok()) {
                Some(addr) => task.put(addr),
                None => warn!("usage: put <ip:port>"),
            },
            "size" => info!("{} pending", task.size()),
            "target" => info!("target id {}", task.target_id()),
            "quit" => break,
            _ => {},
        }
    }

    task.shutdown();
    scheduler.shutdown();
}
