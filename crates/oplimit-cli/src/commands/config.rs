use anyhow::Result;

use crate::config::{self, Config};

/// Show the current effective configuration.
pub fn show_config(rate: Option<u32>, burst: Option<usize>) -> Result<()> {
    let config = Config::load()?.with_overrides(rate, burst);

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    println!("  limit_rate: {}", config.limit_rate);
    println!("  max_burst: {}", config.max_burst);
    println!("  chunk_size: {}", config.chunk_size);

    match config.limits() {
        Ok(limits) => {
            println!("\nPacing:");
            println!("  cycle: {}s", limits.cycle().as_secs());
            match limits.effective_rate() {
                Some(rate) => println!("  effective rate: {:.2} operations/s", rate),
                None => println!("  effective rate: unpaced (limit_rate > 100)"),
            }
        }
        Err(e) => println!("\nInvalid settings: {:#}", e),
    }

    println!("\nPriority: CLI args > ENV vars (OPLIMIT_*) > Config file > Defaults");

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure oplimit.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
