//! Settings for the static asset host that serves the web app over TLS.
//!
//! The certificate is described by JSON files in the publish directory:
//!
//! ```text
//! <publish dir>/certificate.json         # required
//! <publish dir>/certificate.<env>.json   # optional, wins field by field
//! ```
//!
//! where `<env>` comes from `PROXIMITY_ALARM_ENVIRONMENT`. Both hold
//! `{"certificateSettings": {"filename": "...", "password": "..."}}`.

use std::{
    fmt, fs, io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

pub const ENVIRONMENT_VAR: &str = "PROXIMITY_ALARM_ENVIRONMENT";

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("couldn't read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("couldn't parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("certificateSettings:{0} is not set")]
    Missing(&'static str),
    #[error("certificate file {} doesn't exist", .0.display())]
    CertificateMissing(PathBuf),
}

/// Where the host listens and where it finds the published app.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct HostConfig {
    pub address: IpAddr,
    pub port: u16,
    /// defaults to `publish` next to the executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_dir: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 39)),
            port: 5001,
            publish_dir: None,
        }
    }
}

impl HostConfig {
    #[must_use]
    pub const fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// # Errors
    /// when no directory was configured and the executable's can't be found
    pub fn publish_dir(&self) -> io::Result<PathBuf> {
        if let Some(dir) = &self.publish_dir {
            return Ok(dir.clone());
        }
        let exe = std::env::current_exe()?;
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(dir.join("publish"))
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct CertificateSettings {
    pub filename: String,
    pub password: String,
}

// keeps the password out of logs
impl fmt::Debug for CertificateSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateSettings")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CertificateFile {
    #[serde(default)]
    certificate_settings: PartialSettings,
}

#[derive(Debug, Default, Deserialize)]
struct PartialSettings {
    filename: Option<String>,
    password: Option<String>,
}

impl PartialSettings {
    fn overlay(self, over: Self) -> Self {
        Self {
            filename: over.filename.or(self.filename),
            password: over.password.or(self.password),
        }
    }
}

fn read_settings(path: &Path, required: bool) -> Result<PartialSettings, HostError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if !required && e.kind() == io::ErrorKind::NotFound => {
            return Ok(PartialSettings::default())
        }
        Err(source) => {
            return Err(HostError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let file: CertificateFile =
        serde_json::from_str(&contents).map_err(|source| HostError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(file.certificate_settings)
}

/// Everything the host needs at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSettings {
    pub publish_dir: PathBuf,
    pub certificate: CertificateSettings,
    pub listen: SocketAddr,
}

impl HostSettings {
    /// Resolves the certificate settings in `publish_dir` for `environment`.
    ///
    /// # Errors
    /// when `certificate.json` is missing or either file is malformed or
    /// incomplete
    pub fn load(
        publish_dir: &Path,
        environment: Option<&str>,
        config: &HostConfig,
    ) -> Result<Self, HostError> {
        let mut settings = read_settings(&publish_dir.join("certificate.json"), true)?;
        if let Some(environment) = environment.filter(|e| !e.is_empty()) {
            let path = publish_dir.join(format!("certificate.{environment}.json"));
            settings = settings.overlay(read_settings(&path, false)?);
        }
        let certificate = CertificateSettings {
            filename: settings.filename.ok_or(HostError::Missing("filename"))?,
            password: settings.password.ok_or(HostError::Missing("password"))?,
        };
        log::debug!("host certificate {certificate:?}");
        Ok(Self {
            publish_dir: publish_dir.to_path_buf(),
            certificate,
            listen: config.listen_addr(),
        })
    }

    #[must_use]
    pub fn certificate_path(&self) -> PathBuf {
        self.publish_dir.join(&self.certificate.filename)
    }

    /// # Errors
    /// when the certificate file isn't there
    pub fn check(&self) -> Result<(), HostError> {
        let path = self.certificate_path();
        if path.is_file() {
            Ok(())
        } else {
            Err(HostError::CertificateMissing(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn publish(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    const BASE: &str =
        r#"{"certificateSettings": {"filename": "cert.pfx", "password": "base-secret"}}"#;

    #[test]
    fn base_file_alone() {
        let dir = publish(&[("certificate.json", BASE), ("cert.pfx", "")]);
        let settings = HostSettings::load(dir.path(), None, &HostConfig::default()).unwrap();
        assert_eq!(settings.certificate.filename, "cert.pfx");
        assert_eq!(settings.certificate.password, "base-secret");
        assert_eq!(settings.listen.to_string(), "192.168.1.39:5001");
        assert_eq!(settings.certificate_path(), dir.path().join("cert.pfx"));
        settings.check().unwrap();
    }

    #[test]
    fn environment_file_overrides_field_by_field() {
        let dir = publish(&[
            ("certificate.json", BASE),
            (
                "certificate.Production.json",
                r#"{"certificateSettings": {"password": "prod-secret"}}"#,
            ),
        ]);
        let settings =
            HostSettings::load(dir.path(), Some("Production"), &HostConfig::default()).unwrap();
        assert_eq!(settings.certificate.filename, "cert.pfx");
        assert_eq!(settings.certificate.password, "prod-secret");
        assert!(matches!(
            settings.check(),
            Err(HostError::CertificateMissing(_))
        ));
    }

    #[test]
    fn missing_environment_file_is_fine() {
        let dir = publish(&[("certificate.json", BASE)]);
        let settings =
            HostSettings::load(dir.path(), Some("Staging"), &HostConfig::default()).unwrap();
        assert_eq!(settings.certificate.password, "base-secret");
    }

    #[test]
    fn base_file_is_required() {
        let dir = publish(&[]);
        assert!(matches!(
            HostSettings::load(dir.path(), None, &HostConfig::default()),
            Err(HostError::Io { .. })
        ));
    }

    #[test]
    fn incomplete_settings() {
        let dir = publish(&[(
            "certificate.json",
            r#"{"certificateSettings": {"filename": "cert.pfx"}}"#,
        )]);
        assert!(matches!(
            HostSettings::load(dir.path(), None, &HostConfig::default()),
            Err(HostError::Missing("password"))
        ));
    }

    #[test]
    fn password_stays_out_of_debug() {
        let settings = CertificateSettings {
            filename: "cert.pfx".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    #[test]
    fn publish_dir_override() {
        let config = HostConfig {
            publish_dir: Some(PathBuf::from("/srv/app")),
            ..HostConfig::default()
        };
        assert_eq!(config.publish_dir().unwrap(), PathBuf::from("/srv/app"));
        assert!(HostConfig::default().publish_dir().unwrap().ends_with("publish"));
    }
}
