use std::{env, fs, process};
use zw101::codegen::generate;
use zw101::config::DeviceConfig;

mod pc_utils;
use pc_utils::init_logging;

fn main() {
    init_logging();
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        panic!("Usage: pc_codegen config.json");
    }

    let text = fs::read_to_string(&args[1]).unwrap();
    let config: DeviceConfig = match serde_json::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Malformed configuration: {}", e);
            process::exit(1);
        }
    };

    match config.validate() {
        Ok(validated) => print!("{}", generate(&validated)),
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            process::exit(1);
        }
    }
}
