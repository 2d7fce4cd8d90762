use crate::config::Config;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load, parse and validate a planner configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration '{}'", config_path.display()))?;

    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration '{}'", config_path.display()))?;

    config.validate()?;

    info!(
        "Loaded {}/{}: {} spoke(s), hub ASN {}",
        config.project,
        config.stack,
        config.spokes.len(),
        config.hub.asn
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
project: transit-lab
hub:
  asn: 64512
  availability_zones: [us-east-1a, us-east-1b]
spokes:
  lab:
    cidr_block: 10.200.0.0/16
  dev:
    cidr_block: 10.201.0.0/16
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.project, "transit-lab");
        assert_eq!(config.spokes.len(), 2);
    }

    #[test]
    fn test_load_invalid_config() {
        let yaml = r#"
hub:
  asn: 100
  availability_zones: [us-east-1a, us-east-1b]
spokes:
  lab:
    cidr_block: 10.200.0.0/16
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("asn 100"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/hubnet.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to open configuration"));
    }
}
