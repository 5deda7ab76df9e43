//! Outil CLI pour sceller/ouvrir des secrets de config.yaml
//!
//! Usage:
//!   cargo run --example seal_secret -- seal "client_secret_or_refresh_token"
//!   cargo run --example seal_secret -- open "encrypted:ABC123..."
//!
//! Set PMOSPOTIFY_SECRET_KEY to seal for a host other than this one.

use anyhow::Result;
use pmoconfig::encryption::{is_sealed, open_secret, seal_secret};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "seal" => {
            let sealed = seal_secret(&args[2])?;
            println!("Sealed: {}", sealed);
            println!("\nAdd this to your config.yaml (sources.spotify):");
            println!("refresh_token: \"{}\"", sealed);
        }

        "open" => {
            let sealed = &args[2];
            if !is_sealed(sealed) {
                eprintln!("Error: Value does not start with 'encrypted:'");
                return Ok(());
            }

            match open_secret(sealed) {
                Ok(plain) => println!("Opened: {}", plain),
                Err(e) => {
                    eprintln!("Error: Failed to open secret");
                    eprintln!("It was sealed on another machine or with another PMOSPOTIFY_SECRET_KEY.");
                    eprintln!("Details: {}", e);
                }
            }
        }

        _ => print_usage(),
    }

    Ok(())
}

fn print_usage() {
    println!("Usage:");
    println!("  seal_secret seal <plaintext>");
    println!("  seal_secret open <encrypted:...>");
}
