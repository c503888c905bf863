use npg_domain::config::{validate_services, ConfigSeverity, RuntimeConfig, ServicesConfig};

/// Parse and validate the services config, printing any issues. Returns
/// `true` when startup would succeed (no `Error`-severity issues).
pub fn validate(services: &ServicesConfig) -> bool {
    let issues = validate_services(services.services());

    if issues.is_empty() {
        println!("Config OK ({})", services.path().display());
        return true;
    }

    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!(
        "\n{error_count} error(s), {warning_count} warning(s) in {}",
        services.path().display()
    );

    error_count == 0
}

/// Dump the resolved runtime config and services list as JSON.
pub fn show(runtime: &RuntimeConfig, services: &ServicesConfig) {
    let dump = serde_json::json!({
        "runtime": runtime,
        "services_path": services.path(),
        "services": services.services(),
    });
    match serde_json::to_string_pretty(&dump) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("failed to serialize config: {e}");
            std::process::exit(1);
        }
    }
}
