// config.rs
//
// Viewer configuration:
// - JSON file: --config <path>, otherwise assets/viewer.json (exe dir first, then working dir)
// - Env: PANORAMA_IMAGE overrides the image path from the file
// - CLI: --image <path> or a bare path overrides everything, --no-vsync turns vsync off

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ViewerError;
use crate::panorama::ControlSettings;

pub const IMAGE_ENV: &str = "PANORAMA_IMAGE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub image: PathBuf,
    pub window_width: u32,
    pub window_height: u32,
    pub vsync: bool,
    pub controls: ControlSettings,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            image: PathBuf::from("assets").join("panorama.jpg"),
            window_width: 1280,
            window_height: 720,
            vsync: true,
            controls: ControlSettings::default(),
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config: Option<PathBuf>,
    image: Option<PathBuf>,
    no_vsync: bool,
}

impl CliArgs {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, ViewerError> {
        let mut out = CliArgs::default();
        let mut it = args.into_iter();
        while let Some(a) = it.next() {
            match a.as_str() {
                "--config" => {
                    let v = it.next().ok_or_else(|| ViewerError::MissingArgValue(a.clone()))?;
                    out.config = Some(PathBuf::from(v));
                }
                "--image" => {
                    let v = it.next().ok_or_else(|| ViewerError::MissingArgValue(a.clone()))?;
                    out.image = Some(PathBuf::from(v));
                }
                "--no-vsync" => out.no_vsync = true,
                other if other.starts_with("--") => {
                    return Err(ViewerError::UnknownArgument(other.to_string()))
                }
                other => out.image = Some(PathBuf::from(other)),
            }
        }
        Ok(out)
    }
}

impl ViewerConfig {
    /// Resolve from the process arguments and environment.
    pub fn resolve() -> Result<Self, ViewerError> {
        Self::from_sources(std::env::args().skip(1), std::env::var(IMAGE_ENV).ok())
    }

    pub fn from_sources<I: IntoIterator<Item = String>>(
        args: I,
        env_image: Option<String>,
    ) -> Result<Self, ViewerError> {
        let args = CliArgs::parse(args)?;

        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => match find_config_file() {
                Some(path) => Self::load(&path).unwrap_or_else(|err| {
                    log::warn!("ignoring {err}");
                    Self::default()
                }),
                None => Self::default(),
            },
        };

        if let Some(v) = env_image {
            if !v.trim().is_empty() {
                config.image = PathBuf::from(v);
            }
        }
        if let Some(image) = args.image {
            config.image = image;
        }
        if args.no_vsync {
            config.vsync = false;
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ViewerError> {
        let text = std::fs::read_to_string(path).map_err(|source| ViewerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ViewerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        // serde_json rejects NaN/inf, but the ranges still need checking
        config
            .controls
            .validate()
            .map_err(|reason| ViewerError::InvalidControls {
                path: path.to_path_buf(),
                reason,
            })?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }
}

/// Find assets/viewer.json by searching:
/// 1) <exe_dir>/assets/viewer.json
/// 2) ./assets/viewer.json
fn find_config_file() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join("assets").join("viewer.json");
            if p.exists() {
                return Some(p);
            }
        }
    }

    let p = PathBuf::from("assets").join("viewer.json");
    if p.exists() {
        return Some(p);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_cli() {
        let parsed = CliArgs::parse(args(&["--config", "a.json", "--no-vsync", "pano.png"])).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("a.json")));
        assert_eq!(parsed.image, Some(PathBuf::from("pano.png")));
        assert!(parsed.no_vsync);
    }

    #[test]
    fn test_parse_cli_errors() {
        assert!(matches!(
            CliArgs::parse(args(&["--image"])),
            Err(ViewerError::MissingArgValue(_))
        ));
        assert!(matches!(
            CliArgs::parse(args(&["--fullscreen"])),
            Err(ViewerError::UnknownArgument(_))
        ));
    }

    #[test]
    fn test_config_file_with_overrides() {
        let path = write_temp(
            "sphere_panorama_config_overrides.json",
            r#"{ "image": "from_file.jpg", "window_width": 800, "controls": { "idle_drift": 0.0 } }"#,
        );
        let cfg_arg = path.to_string_lossy().to_string();

        let config = ViewerConfig::from_sources(args(&["--config", &cfg_arg]), None).unwrap();
        assert_eq!(config.image, PathBuf::from("from_file.jpg"));
        assert_eq!(config.window_width, 800);
        assert_eq!(config.window_height, 720);
        assert_eq!(config.controls.idle_drift, 0.0);
        assert_eq!(config.controls.max_fov, 75.0);

        let config =
            ViewerConfig::from_sources(args(&["--config", &cfg_arg]), Some("env.jpg".into())).unwrap();
        assert_eq!(config.image, PathBuf::from("env.jpg"));

        let config = ViewerConfig::from_sources(
            args(&["--config", &cfg_arg, "--image", "cli.jpg"]),
            Some("env.jpg".into()),
        )
        .unwrap();
        assert_eq!(config.image, PathBuf::from("cli.jpg"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let path = write_temp("sphere_panorama_config_blank_env.json", "{}");
        let cfg_arg = path.to_string_lossy().to_string();

        let config = ViewerConfig::from_sources(args(&["--config", &cfg_arg]), Some("  ".into())).unwrap();
        assert_eq!(config, ViewerConfig::default());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_explicit_bad_config_is_error() {
        let path = write_temp("sphere_panorama_config_bad.json", "{ not json");
        let cfg_arg = path.to_string_lossy().to_string();

        let err = ViewerConfig::from_sources(args(&["--config", &cfg_arg]), None).unwrap_err();
        assert!(matches!(err, ViewerError::ConfigParse { .. }));

        let missing = std::env::temp_dir().join("sphere_panorama_config_missing.json");
        let err = ViewerConfig::load(&missing).unwrap_err();
        assert!(matches!(err, ViewerError::ConfigRead { .. }));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_inverted_fov_range_is_error() {
        let path = write_temp(
            "sphere_panorama_config_inverted_fov.json",
            r#"{ "controls": { "min_fov": 80 } }"#,
        );
        let cfg_arg = path.to_string_lossy().to_string();

        let err = ViewerConfig::from_sources(args(&["--config", &cfg_arg]), None).unwrap_err();
        match err {
            ViewerError::InvalidControls { reason, .. } => assert!(reason.contains("min_fov")),
            other => panic!("unexpected error {other}"),
        }

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_negative_lat_limit_is_error() {
        let path = write_temp(
            "sphere_panorama_config_negative_lat.json",
            r#"{ "controls": { "lat_limit": -10 } }"#,
        );

        let err = ViewerConfig::load(&path).unwrap_err();
        match err {
            ViewerError::InvalidControls { reason, .. } => assert!(reason.contains("lat_limit")),
            other => panic!("unexpected error {other}"),
        }

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_overflowing_number_is_rejected() {
        // 1e400 is out of f64 range and must not reach the controls as inf
        let path = write_temp(
            "sphere_panorama_config_overflow.json",
            r#"{ "controls": { "max_fov": 1e400 } }"#,
        );

        let err = ViewerConfig::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ViewerError::ConfigParse { .. } | ViewerError::InvalidControls { .. }
        ));

        let _ = std::fs::remove_file(&path);
    }
}
