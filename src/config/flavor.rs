use log::info;

fn flavor_label(environment: &str) -> &str {
    match environment {
        "dev" => "Development",
        "prod" => "Production",
        "test" => "Test",
        _ => "Unknown",
    }
}

/// Resolves the config file stem (without `.toml`) from the `FLAVOR`
/// environment variable, defaulting to `dev`.
pub fn config_file_stem() -> String {
    let environment = std::env::var("FLAVOR").unwrap_or_else(|_| "dev".to_string());
    info!(
        "proxy starting in {} mode (FLAVOR={})",
        flavor_label(&environment),
        environment
    );
    environment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_known_flavors() {
        assert_eq!(flavor_label("dev"), "Development");
        assert_eq!(flavor_label("prod"), "Production");
        assert_eq!(flavor_label("bogus"), "Unknown");
    }
}
