use std::process::exit;
use wave_conf::cli::Args;
use wave_conf::config::{self, ConfigError, Settings};
use wave_conf::utils::logger;

fn load_layers(args: &Args) -> Result<(Settings, Settings), ConfigError> {
    let file = match args.flag_config {
        Some(ref path) => Settings::from_toml_file(path)?,
        None => Settings::new(),
    };
    // Flags win over the environment.
    let overrides = Settings::from_env()?.overlay(args.overrides());
    Ok((file, overrides))
}

/// The `main()` method. Resolves the configuration and prints it.
fn main() {
    let args = Args::from_env();
    logger::init();

    let resolved = load_layers(&args)
        .and_then(|(file, overrides)| config::resolve(&Settings::defaults(), &file, &overrides));
    let conf = match resolved {
        Ok(resolved) => resolved.conf,
        Err(err) => {
            log::error!("{err}");
            exit(1);
        }
    };

    if conf.debug {
        logger::enable_debug();
        log::debug!("Resolved configuration: {conf:?}");
    }

    if args.flag_json {
        match serde_json::to_string_pretty(&conf.to_json()) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                log::error!("Could not serialize configuration: {err}");
                exit(1);
            }
        }
    } else {
        println!("{conf}");
    }
}
