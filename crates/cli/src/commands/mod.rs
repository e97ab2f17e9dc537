//! Command implementations.

mod bench;
mod info;
mod run;
mod validate;

pub use bench::run_bench;
pub use info::run_info;
pub use run::run_distributor;
pub use validate::run_validate;

use std::path::Path;

use contracts::DistributorBlueprint;

use crate::error::{CliError, Result};

/// Load and validate a configuration file
fn load_blueprint(path: &Path) -> Result<DistributorBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    config_loader::ConfigLoader::load_from_path(path)
        .map_err(|e| CliError::config_load(path.display().to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_blueprint_missing_file() {
        let err = load_blueprint(Path::new("/nonexistent/distributor.toml")).unwrap_err();
        assert!(matches!(err, CliError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_blueprint_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(b"[[targets]]\nname = \"t\"\ntarget_type = \"log\"\n")
            .unwrap();

        let err = load_blueprint(file.path()).unwrap_err();
        assert!(matches!(err, CliError::ConfigLoad { .. }));
    }
}
