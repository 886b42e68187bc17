use crate::{
    access::EventCalendar,
    deployment::{self, DEFAULT_GATEWAY_SUFFIXES, RemotePath},
    validation::UploadLimits,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::{env, fmt::Display, str::FromStr, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub local_dir: String,
    pub database_url: Option<String>,
    pub gateway_url: Option<String>,
    pub deployment: Option<String>,
    pub site_host: String,
    pub remote_timeout: Duration,
    pub notify_webhook: Option<String>,
    pub admin_pin: String,
    pub calendar: EventCalendar,
    pub limits: UploadLimits,
}

/// What the binary should do after loading configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Serve,
    Migrate,
    Diagnose,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Wedding site storage gateway")]
pub struct Args {
    /// Host to bind to (overrides WEDDING_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides WEDDING_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory for the local cache store (overrides WEDDING_LOCAL_DIR)
    #[arg(long)]
    pub local_dir: Option<String>,

    /// Remote datastore URL (overrides WEDDING_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Base URL of the remote function gateway (overrides WEDDING_GATEWAY_URL)
    #[arg(long)]
    pub gateway_url: Option<String>,

    /// Force the remote path: `direct` or `gateway` (overrides WEDDING_DEPLOYMENT)
    #[arg(long)]
    pub deployment: Option<String>,

    /// Public host name the site is served from (overrides WEDDING_SITE_HOST)
    #[arg(long)]
    pub site_host: Option<String>,

    /// Apply the remote schema and exit
    #[arg(long, conflicts_with = "diagnose")]
    pub migrate: bool,

    /// Probe every storage backend, print a report and exit
    #[arg(long)]
    pub diagnose: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, Mode)> {
        Self::resolve(Args::parse(), |key| env::var(key))
    }

    /// Merge already-parsed args with an environment lookup.
    pub fn resolve(
        args: Args,
        env: impl Fn(&str) -> Result<String, env::VarError>,
    ) -> Result<(Self, Mode)> {
        let text = |key: &str| env(key).ok().filter(|v| !v.trim().is_empty());

        // --- Environment fallback ---
        let env_port = parse_env(&env, "WEDDING_PORT", 3000u16)?;
        let timeout_ms = parse_env(&env, "WEDDING_REMOTE_TIMEOUT_MS", 5000u64)?;
        let defaults = UploadLimits::default();
        let limits = UploadLimits {
            max_photo_bytes: parse_env(&env, "WEDDING_MAX_PHOTO_BYTES", defaults.max_photo_bytes)?,
            max_invitation_bytes: parse_env(
                &env,
                "WEDDING_MAX_INVITATION_BYTES",
                defaults.max_invitation_bytes,
            )?,
        };
        let default_calendar = EventCalendar::default();
        let calendar = EventCalendar {
            sangeet: parse_env::<NaiveDate>(
                &env,
                "WEDDING_SANGEET_DATE",
                default_calendar.sangeet,
            )?,
            haldi: parse_env::<NaiveDate>(&env, "WEDDING_HALDI_DATE", default_calendar.haldi)?,
        };

        // --- Merge ---
        let cfg = Self {
            host: args
                .host
                .or_else(|| text("WEDDING_HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: args.port.unwrap_or(env_port),
            local_dir: args
                .local_dir
                .or_else(|| text("WEDDING_LOCAL_DIR"))
                .unwrap_or_else(|| "./data/local".into()),
            database_url: args.database_url.or_else(|| text("WEDDING_DATABASE_URL")),
            gateway_url: args.gateway_url.or_else(|| text("WEDDING_GATEWAY_URL")),
            deployment: args.deployment.or_else(|| text("WEDDING_DEPLOYMENT")),
            site_host: args
                .site_host
                .or_else(|| text("WEDDING_SITE_HOST"))
                .unwrap_or_else(|| "localhost".into()),
            remote_timeout: Duration::from_millis(timeout_ms),
            notify_webhook: text("WEDDING_NOTIFY_WEBHOOK"),
            admin_pin: text("WEDDING_ADMIN_PIN").unwrap_or_else(|| "2580".into()),
            calendar,
            limits,
        };

        let mode = if args.migrate {
            Mode::Migrate
        } else if args.diagnose {
            Mode::Diagnose
        } else {
            Mode::Serve
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The remote path for this deployment, resolved once.
    pub fn remote_path(&self) -> RemotePath {
        deployment::detect(
            self.deployment.as_deref(),
            &self.site_host,
            &DEFAULT_GATEWAY_SUFFIXES,
        )
    }
}

fn parse_env<T>(
    env: &impl Fn(&str) -> Result<String, env::VarError>,
    key: &str,
    default: T,
) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env(key) {
        Ok(value) if value.trim().is_empty() => Ok(default),
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn defaults_without_env_or_flags() {
        let args = Args::parse_from(["wedding-store"]);
        let (cfg, mode) = AppConfig::resolve(args, lookup(&[])).unwrap();
        assert_eq!(mode, Mode::Serve);
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.remote_timeout, Duration::from_secs(5));
        assert_eq!(cfg.remote_path(), RemotePath::Direct);
    }

    #[test]
    fn flags_override_env() {
        let args = Args::parse_from(["wedding-store", "--port", "8080", "--migrate"]);
        let env = lookup(&[
            ("WEDDING_PORT", "9000"),
            ("WEDDING_HOST", "127.0.0.1"),
            ("WEDDING_SITE_HOST", "ours.netlify.app"),
        ]);
        let (cfg, mode) = AppConfig::resolve(args, env).unwrap();
        assert_eq!(mode, Mode::Migrate);
        assert_eq!(cfg.addr(), "127.0.0.1:8080");
        assert_eq!(cfg.remote_path(), RemotePath::Gateway);
    }

    #[test]
    fn malformed_numbers_are_errors() {
        let args = Args::parse_from(["wedding-store"]);
        let err = AppConfig::resolve(args, lookup(&[("WEDDING_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("WEDDING_PORT"));
    }

    #[test]
    fn event_dates_come_from_env() {
        let args = Args::parse_from(["wedding-store"]);
        let env = lookup(&[("WEDDING_HALDI_DATE", "2027-01-02")]);
        let (cfg, _) = AppConfig::resolve(args, env).unwrap();
        assert_eq!(cfg.calendar.haldi, NaiveDate::from_ymd_opt(2027, 1, 2).unwrap());
    }
}
