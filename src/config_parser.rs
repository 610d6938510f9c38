use crate::{BoxOfficeError, Result, SelectionPolicyKind, ServiceConfig, StoreBackendKind};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::warn;

fn read_properties<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>> {
    let file = File::open(&path).map_err(|e| {
        BoxOfficeError::InvalidArgument(format!("Failed to open config file {:?}: {}", path.as_ref(), e))
    })?;

    java_properties::read(BufReader::new(file))
        .map_err(|e| BoxOfficeError::InvalidArgument(format!("Failed to parse properties: {}", e)))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        BoxOfficeError::InvalidArgument(format!("Invalid value for {}: {}", key, value))
    })
}

fn apply_properties(config: &mut ServiceConfig, properties: HashMap<String, String>) -> Result<()> {
    for (key, value) in properties {
        match key.as_str() {
            "state.dir" => config.state_dir = value,
            "http.port" => config.http_port = parse_number(&key, &value)?,
            "store.backend" => config.store_backend = StoreBackendKind::parse(&value)?,
            "booking.max.seats.per.order" => {
                config.booking.max_seats_per_order = parse_number(&key, &value)?
            }
            "booking.selection.policy" => {
                config.booking.selection_policy = SelectionPolicyKind::parse(&value)?
            }
            "refund.full.window.minutes" => {
                config.booking.full_refund_window_minutes = parse_number(&key, &value)?
            }
            "refund.partial.percent" => {
                config.booking.partial_refund_percent = parse_number(&key, &value)?
            }
            _ => warn!("Ignoring unknown config property: {}", key),
        }
    }
    config.booking.validate()
}

/// Parse a properties file into ServiceConfig
pub fn parse_properties_file<P: AsRef<Path>>(path: P, application_id: &str) -> Result<ServiceConfig> {
    let properties = read_properties(path)?;

    let mut config = ServiceConfig {
        application_id: application_id.to_string(),
        ..ServiceConfig::default()
    };
    apply_properties(&mut config, properties)?;

    Ok(config)
}

/// Parse an override properties file and merge it over a base config
pub fn merge_properties<P: AsRef<Path>>(mut config: ServiceConfig, path: P) -> Result<ServiceConfig> {
    let properties = read_properties(path)?;
    apply_properties(&mut config, properties)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_and_merges_properties() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("box-office.properties");
        std::fs::write(
            &base,
            "state.dir=/var/lib/box-office\nhttp.port=9090\nbooking.selection.policy=reject_at_cap\n",
        )
        .unwrap();

        let config = parse_properties_file(&base, "ticket-service").unwrap();
        assert_eq!(config.application_id, "ticket-service");
        assert_eq!(config.state_dir, "/var/lib/box-office");
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.booking.selection_policy, SelectionPolicyKind::RejectAtCap);
        assert_eq!(config.booking.max_seats_per_order, 4);

        let overlay = dir.path().join("refund.properties");
        std::fs::write(&overlay, "refund.partial.percent=50\nstore.backend=rocksdb\n").unwrap();

        let merged = merge_properties(config, &overlay).unwrap();
        assert_eq!(merged.booking.partial_refund_percent, 50);
        assert_eq!(merged.store_backend, StoreBackendKind::Rocksdb);
        assert_eq!(merged.http_port, 9090);
    }

    #[test]
    fn rejects_out_of_range_refund_percent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.properties");
        std::fs::write(&path, "refund.partial.percent=150\n").unwrap();

        assert!(matches!(
            parse_properties_file(&path, "ticket-service"),
            Err(BoxOfficeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(parse_properties_file("/nonexistent/box-office.properties", "svc").is_err());
    }
}
