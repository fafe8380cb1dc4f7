//! Configuration File Discovery and Resolution
//!
//! Candidate files are named after the camera's chip id, model and vendor
//! (in that order) with a `.conf` extension. The current working directory
//! is searched first, then the directory named by `IIDC_CONF`.

use std::io::Write;
use std::path::{Path, PathBuf};

use config::{Config, Environment};
use iidc_protocol::{CameraBus, DeviceIdentity};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::guess::{synthesize, write_report};
use crate::hardware::HardwareConfig;

/// Extension of hardware configuration files
pub const EXTENSION: &str = "conf";

/// Environment prefix; `IIDC_CONF` names the secondary search directory
pub const ENV_PREFIX: &str = "IIDC";

#[derive(Debug, Default, Deserialize)]
struct SearchSettings {
    conf: Option<String>,
}

/// `<chip>.conf`, `<model>.conf` and `<vendor>.conf`, in search order
pub fn candidate_filenames(identity: &DeviceIdentity) -> Vec<String> {
    [&identity.chip, &identity.model, &identity.vendor]
        .into_iter()
        .filter(|name| !name.is_empty())
        .map(|name| format!("{name}.{EXTENSION}"))
        .collect()
}

/// Ordered list of directories searched for configuration files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPaths {
    dirs: Vec<PathBuf>,
}

impl SearchPaths {
    /// Explicit directories, searched in the given order
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Current working directory followed by `IIDC_CONF` if it is set
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings: SearchSettings = Config::builder()
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        Ok(Self::with_env_dir(settings.conf))
    }

    fn with_env_dir(env_dir: Option<String>) -> Self {
        let mut dirs = vec![PathBuf::new()];
        if let Some(dir) = env_dir.filter(|dir| !dir.is_empty()) {
            dirs.push(PathBuf::from(dir));
        }
        Self { dirs }
    }

    /// Searched directories; an empty path is the working directory
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Every candidate path in search order
    pub fn candidates(&self, identity: &DeviceIdentity) -> Vec<PathBuf> {
        let names = candidate_filenames(identity);
        self.dirs
            .iter()
            .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
            .collect()
    }

    /// First candidate that exists
    pub fn find(&self, identity: &DeviceIdentity) -> Option<PathBuf> {
        self.candidates(identity).into_iter().find(|path| {
            let found = path.is_file();
            debug!("Config candidate {}: {}", path.display(), if found { "found" } else { "absent" });
            found
        })
    }

    pub(crate) fn describe(&self) -> String {
        self.dirs
            .iter()
            .map(|dir| display_dir(dir))
            .collect::<Vec<_>>()
            .join(", then ")
    }
}

fn display_dir(dir: &Path) -> String {
    if dir.as_os_str().is_empty() {
        "the current working directory".to_string()
    } else {
        dir.display().to_string()
    }
}

/// Locates and loads the hardware configuration of a camera
#[derive(Debug, Clone)]
pub struct Resolver {
    paths: SearchPaths,
}

impl Resolver {
    pub fn new(paths: SearchPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &SearchPaths {
        &self.paths
    }

    /// Find and parse the camera's configuration file
    ///
    /// The first existing candidate decides the outcome: a file that fails
    /// to parse or validate is reported as invalid without trying the
    /// remaining names. When no file exists a best guess is synthesized
    /// from the camera, printed to `report` and returned inside
    /// `ConfigError::NotFound`.
    pub fn resolve<B: CameraBus>(
        &self,
        bus: &mut B,
        report: &mut dyn Write,
    ) -> Result<HardwareConfig, ConfigError> {
        let identity = bus.identity()?;

        if let Some(path) = self.paths.find(&identity) {
            info!("Reading hardware configuration {}", path.display());
            return HardwareConfig::read_from_file(&path).map_err(|e| {
                warn!("Hardware configuration {} is unusable: {}", path.display(), e);
                e
            });
        }

        warn!(
            vendor = %identity.vendor,
            model = %identity.model,
            chip = %identity.chip,
            "No hardware configuration file found, generating a default"
        );
        let guess = synthesize(bus)?;
        if let Err(e) = write_report(report, &guess, &identity, &self.paths) {
            warn!("Failed to print configuration guess: {}", e);
        }
        Err(ConfigError::NotFound {
            guess: Box::new(guess),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iidc_protocol::MockBus;
    use std::fs;
    use tempfile::TempDir;

    fn config_text(bus_speed: u32, device: &str) -> String {
        format!(
            "IEEE 1394 IIDC DCAM hardware configuration:\n\
             \x20 bus_speed:           {bus_speed}\n\
             \x20 format:              0\n\
             \x20 mode:                5\n\
             \x20 max_packets:         4095\n\
             \x20 min_pixels:          1\n\
             \x20 trig_setup_time:     0\n\
             \x20 exposure_quantum:    0.00002\n\
             \x20 exposure_offset:     0\n\
             \x20 line_transfer_time:  0\n\
             \x20 transmit_setup_time: 0\n\
             \x20 transmit_overlap:    0\n\
             \x20 drop_frames:         0\n\
             \x20 dma_device_name:     {device}\n"
        )
    }

    fn write(dir: &Path, name: &str, text: &str) {
        fs::write(dir.join(format!("{name}.conf")), text).unwrap();
    }

    #[test]
    fn test_candidate_order() {
        let identity = DeviceIdentity::new("Acme", "Cam-1", 42);
        assert_eq!(
            candidate_filenames(&identity),
            vec!["42.conf", "Cam-1.conf", "Acme.conf"]
        );

        let paths = SearchPaths::new(["/a", "/b"]);
        let candidates = paths.candidates(&identity);
        assert_eq!(candidates.len(), 6);
        assert_eq!(candidates[0], PathBuf::from("/a/42.conf"));
        assert_eq!(candidates[3], PathBuf::from("/b/42.conf"));
    }

    #[test]
    fn test_env_dir_follows_working_directory() {
        let paths = SearchPaths::with_env_dir(Some("/etc/iidc".to_string()));
        assert_eq!(paths.dirs(), &[PathBuf::new(), PathBuf::from("/etc/iidc")]);

        let paths = SearchPaths::with_env_dir(Some(String::new()));
        assert_eq!(paths.dirs(), &[PathBuf::new()]);
    }

    #[test]
    fn test_chip_file_beats_vendor_file() {
        let dir = TempDir::new().unwrap();
        let mut bus = MockBus::new();
        write(dir.path(), &bus.identity.vendor, &config_text(400, "vendor"));
        write(dir.path(), &bus.identity.chip, &config_text(800, "chip"));

        let resolver = Resolver::new(SearchPaths::new([dir.path()]));
        let config = resolver.resolve(&mut bus, &mut Vec::new()).unwrap();
        assert_eq!(config.bus_speed, 800);
        assert_eq!(config.dma_device_name, "chip");
    }

    #[test]
    fn test_first_directory_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let mut bus = MockBus::new();
        write(first.path(), &bus.identity.vendor, &config_text(200, "first"));
        write(second.path(), &bus.identity.chip, &config_text(400, "second"));

        let resolver = Resolver::new(SearchPaths::new([first.path(), second.path()]));
        let config = resolver.resolve(&mut bus, &mut Vec::new()).unwrap();
        assert_eq!(config.dma_device_name, "first");
    }

    #[test]
    fn test_invalid_file_stops_search() {
        let dir = TempDir::new().unwrap();
        let mut bus = MockBus::new();
        write(dir.path(), &bus.identity.chip, &config_text(300, "bad"));
        write(dir.path(), &bus.identity.vendor, &config_text(400, "good"));

        let resolver = Resolver::new(SearchPaths::new([dir.path()]));
        let err = resolver.resolve(&mut bus, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBusSpeed(300)));
    }

    #[test]
    fn test_missing_file_reports_guess() {
        let dir = TempDir::new().unwrap();
        let mut bus = MockBus::new();
        let mut report = Vec::new();

        let resolver = Resolver::new(SearchPaths::new([dir.path()]));
        let err = resolver.resolve(&mut bus, &mut report).unwrap_err();
        let guess = match err {
            ConfigError::NotFound { guess } => guess,
            other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(guess.bus_speed, 400);
        assert_eq!((guess.format, guess.mode), (0, 5));

        let report = String::from_utf8(report).unwrap();
        assert!(report.contains(&guess.to_string()));
        assert!(report.contains(&format!("{}.conf", bus.identity.chip)));
        assert!(report.contains(&format!("{}.conf", bus.identity.vendor)));

        // the printed guess can be saved and read back
        let saved = dir.path().join(format!("{}.conf", bus.identity.model));
        guess.write_to_file(&saved).unwrap();
        let config = resolver.resolve(&mut bus, &mut Vec::new()).unwrap();
        assert_eq!(config, *guess);
    }

    /// Serializes tests that modify `IIDC_CONF`
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn test_from_env_reads_conf_variable() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = TempDir::new().unwrap();
        let var = format!("{ENV_PREFIX}_CONF");

        std::env::set_var(&var, dir.path());
        let paths = SearchPaths::from_env();
        std::env::remove_var(&var);
        assert_eq!(
            paths.unwrap().dirs(),
            &[PathBuf::new(), dir.path().to_path_buf()]
        );

        std::env::set_var(&var, "");
        let paths = SearchPaths::from_env();
        std::env::remove_var(&var);
        assert_eq!(paths.unwrap().dirs(), &[PathBuf::new()]);

        assert_eq!(SearchPaths::from_env().unwrap().dirs(), &[PathBuf::new()]);
    }
}
