//! Load `.conveyor.toml` from the scanned directory (CLI only). The library takes its settings
//! from code.

use serde::Deserialize;
use std::path::Path;

use super::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct ConveyorToml {
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    pub parallelism: Option<usize>,
    pub port_capacity: Option<usize>,
    pub follow_links: Option<bool>,
    pub verbose: Option<bool>,
}

/// Parse the settings file contents.
pub fn parse_conveyor_toml(s: &str) -> Result<ConveyorToml, toml::de::Error> {
    toml::from_str(s)
}

/// Load the settings file from `dir` if present. `None` when missing, unreadable or invalid
/// (invalid files are logged).
pub fn load_conveyor_toml(dir: &Path) -> Option<ConveyorToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_conveyor_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_parse() {
        let file = parse_conveyor_toml("[settings]\nparallelism = 3\n").unwrap();
        assert_eq!(file.settings.parallelism, Some(3));
        assert_eq!(file.settings.port_capacity, None);
    }

    #[test]
    fn empty_file_is_default() {
        let file = parse_conveyor_toml("").unwrap();
        assert!(file.settings.verbose.is_none());
    }
}
