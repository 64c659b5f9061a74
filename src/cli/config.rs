use crate::config::default_config_paths;
use crate::config::generate::generate_starter_config;
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();
    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    let config_path = writable_config_path()?;
    if config_path.exists() {
        return Err(format!(
            "config file already exists at {}; remove it first or use --stdout",
            config_path.display()
        )
        .into());
    }

    fs::write(&config_path, config_content)?;
    println!("Config file written to {}", config_path.display());
    Ok(())
}

/// First default location whose directory exists or can be created
fn writable_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
    for path in default_config_paths() {
        let Some(parent) = path.parent() else {
            continue;
        };
        match fs::create_dir_all(parent) {
            Ok(()) => return Ok(path),
            Err(e) => eprintln!("Warning: could not create {}: {}", parent.display(), e),
        }
    }
    Err("no writable config location, use --stdout".into())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());
    crate::config::load_config(&path)?;
    println!("{} Config is valid", console::style("✓").green());
    Ok(())
}
