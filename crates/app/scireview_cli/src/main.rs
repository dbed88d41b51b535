// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::{Cli, Commands};

mod cli;
mod commands;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let args = Cli::parse();

    match &args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::GenKey { length } => {
            println!("{}", commands::gen_key(*length)?);
        }
        Commands::HashPassword { password, cost } => {
            println!("{}", commands::hash_password(password, *cost)?);
        }
        Commands::VerifyToken { token } => {
            println!("{}", commands::verify_token(token)?);
        }
        Commands::CreateAdmin {
            name,
            email,
            password,
            database_url,
        } => {
            if commands::create_admin(name, email, password, database_url)? {
                log::info!("admin {email} created");
            } else {
                log::info!("admin {email} already exists");
            }
        }
    }

    Ok(())
}
