use std::{env, fs, process};

use track_racer::{run_headless, RaceConfig};

const DEFAULT_TIME_LIMIT: f32 = 600.0;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match env::args().nth(1) {
        Some(path) => {
            let json = match fs::read_to_string(&path) {
                Ok(json) => json,
                Err(e) => {
                    log::error!("Cannot read config {}: {}", path, e);
                    process::exit(1);
                }
            };
            match RaceConfig::from_json(&json) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("{}", e);
                    process::exit(1);
                }
            }
        }
        None => RaceConfig::default(),
    };

    match run_headless(config, DEFAULT_TIME_LIMIT) {
        Ok(outcome) => match serde_json::to_string_pretty(&outcome.results) {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("Cannot serialize results: {}", e),
        },
        Err(e) => {
            log::error!("Race failed to start: {}", e);
            process::exit(1);
        }
    }
}
