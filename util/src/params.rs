//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable (VEH_SW_ROOT) is not set")]
    SwRootNotSet,

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the `$VEH_SW_ROOT/params` directory
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    let mut path = crate::host::get_sw_root().map_err(|_| LoadError::SwRootNotSet)?;
    path.push("params");
    path.push(param_file_path);

    load_path(&path)
}

/// Load a parameter file from an explicit path
pub fn load_path<P>(path: &Path) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    let params_str = read_to_string(path).map_err(LoadError::FileLoadError)?;

    toml::from_str(params_str.as_str()).map_err(LoadError::DeserialiseError)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct TestParams {
        threshold: f64,
        #[serde(default)]
        label: String,
    }

    #[test]
    fn test_load_path() {
        let path = std::env::temp_dir().join("util_params_test_load_path.toml");
        std::fs::write(&path, "threshold = 50.0\n").unwrap();

        let params: TestParams = load_path(&path).unwrap();
        assert_eq!(
            params,
            TestParams {
                threshold: 50.0,
                label: String::new()
            }
        );

        std::fs::write(&path, "threshold = \"far\"\n").unwrap();
        assert!(matches!(
            load_path::<TestParams>(&path),
            Err(LoadError::DeserialiseError(_))
        ));

        std::fs::remove_file(&path).ok();
        assert!(matches!(
            load_path::<TestParams>(&path),
            Err(LoadError::FileLoadError(_))
        ));
    }
}
