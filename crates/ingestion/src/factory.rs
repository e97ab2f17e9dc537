//! Source factory - builds sources from `SourceConfig`

use std::sync::Arc;

use contracts::{DistributionSource, SourceConfig, SourceType};
use tracing::instrument;

use crate::error::IngestionError;
use crate::mock::{MockSource, MockSourceConfig};
use crate::tcp_lines::TcpLineSource;

/// Create a source from configuration
#[instrument(
    name = "ingestion_create_source",
    skip(config),
    fields(source_name = %config.name, source_type = ?config.source_type)
)]
pub fn create_source(config: &SourceConfig) -> Result<Arc<dyn DistributionSource>, IngestionError> {
    match config.source_type {
        SourceType::TcpLines => {
            let bind = config.param("bind").ok_or_else(|| {
                IngestionError::invalid_param(&config.name, "bind", "missing 'bind' parameter")
            })?;
            Ok(Arc::new(TcpLineSource::new(&config.name, bind)))
        }
        SourceType::Mock => {
            let mock = MockSourceConfig::from_source_config(config)?;
            Ok(Arc::new(MockSource::new(&config.name, mock)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(source_type: SourceType, params: &[(&str, &str)]) -> SourceConfig {
        SourceConfig {
            name: "src".to_string(),
            source_type,
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_create_sources() {
        let lines = create_source(&config(SourceType::TcpLines, &[("bind", "127.0.0.1:0")])).unwrap();
        assert_eq!(lines.name(), "src");
        assert!(!lines.is_open());

        let mock = create_source(&config(SourceType::Mock, &[("count", "3")])).unwrap();
        assert_eq!(mock.name(), "src");
    }

    #[test]
    fn test_tcp_lines_requires_bind() {
        let err = create_source(&config(SourceType::TcpLines, &[])).err().unwrap();
        assert!(matches!(err, IngestionError::InvalidParam { param: "bind", .. }));
    }
}
