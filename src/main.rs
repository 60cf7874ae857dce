//! SEDIMENT - Append-Only Log-Structured Key-Value Store
//! Interactive shell over the embedded engine.

use std::io::{self, BufRead, Write};

use sediment::config::Config;
use sediment::engine::Sediment;
use sediment::error::SedimentError;

fn main() {
    env_logger::init();

    println!();
    println!("  ╔═══════════════════════════════════════════╗");
    println!("  ║         SEDIMENT Storage Engine           ║");
    println!("  ║    Append-Only Key-Value Store v1.0.0     ║");
    println!("  ╚═══════════════════════════════════════════╝");
    println!();
    println!("  Commands:");
    println!("    set <key> <value>  - Store a key-value pair");
    println!("    get <key>          - Retrieve a value by key");
    println!("    size               - Current segment write offset");
    println!("    info               - Show engine statistics");
    println!("    exit               - Shutdown engine");
    println!();

    let config = Config::default();
    let store = match Sediment::open(config) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("[ERROR] Failed to open store: {}", err);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("sediment> ");
        stdout.flush().unwrap();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap() == 0 {
            break; // EOF
        }

        let parts: Vec<&str> = line.trim().split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0].to_lowercase().as_str() {
            "set" | "put" => {
                if parts.len() < 3 {
                    println!("  Usage: set <key> <value>");
                    continue;
                }
                let key = parts[1].as_bytes().to_vec();
                let value = parts[2..].join(" ").as_bytes().to_vec();
                match store.put(key, value) {
                    Ok(()) => println!("  OK"),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "get" => {
                if parts.len() < 2 {
                    println!("  Usage: get <key>");
                    continue;
                }
                match store.get(parts[1].as_bytes()) {
                    Ok(value) => match String::from_utf8(value) {
                        Ok(s) => println!("  \"{}\"", s),
                        Err(_) => println!("  <binary data>"),
                    },
                    Err(SedimentError::KeyNotFound) => println!("  (nil)"),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "size" => {
                println!("  Current segment offset: {} bytes", store.size());
            }
            "info" | "stats" => {
                println!("{}", store.metrics().report());
            }
            "exit" | "quit" | "q" => {
                println!("  Shutting down SEDIMENT...");
                if let Err(e) = store.close() {
                    eprintln!("  ERROR during close: {}", e);
                }
                break;
            }
            _ => {
                println!("  Unknown command: '{}'. Type 'exit' to quit.", parts[0]);
            }
        }
    }
}
