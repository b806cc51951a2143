//!
//! serieshub configuration
//! -----------------------
//! Server settings resolved from command-line flags first, then `SERIESHUB_*`
//! environment variables, then built-in defaults.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_MEDIA_URL: &str = "/media/";

pub const USAGE: &str = "serieshub\n\nUSAGE:\n  serieshub [--port N] [--bind ADDR] [--data-dir PATH | --in-memory] [--access-ttl SECS] [--refresh-ttl SECS]\n\nOPTIONS:\n  --port N            HTTP port (env: SERIESHUB_HTTP_PORT, default 8000)\n  --bind ADDR         Bind address (env: SERIESHUB_BIND, default 0.0.0.0)\n  --data-dir PATH     Snapshot directory (env: SERIESHUB_DATA_DIR, default data)\n  --in-memory         Keep the catalog in memory only\n  --access-ttl SECS   Access token lifetime (env: SERIESHUB_ACCESS_TTL_SECS, default 3600)\n  --refresh-ttl SECS  Refresh token lifetime (env: SERIESHUB_REFRESH_TTL_SECS, default 86400)\n\nENVIRONMENT:\n  SERIESHUB_MEDIA_URL                              Prefix for image and avatar URLs (default /media/)\n  SERIESHUB_ADMIN_USER, SERIESHUB_ADMIN_PASSWORD   Bootstrap admin account\n";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub http_port: u16,
    /// `None` keeps the catalog in memory.
    pub data_dir: Option<PathBuf>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub media_url: String,
    pub admin: Option<(String, String)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: DEFAULT_HTTP_PORT,
            data_dir: Some(PathBuf::from(DEFAULT_DATA_DIR)),
            access_ttl: Duration::from_secs(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: Duration::from_secs(DEFAULT_REFRESH_TTL_SECS),
            media_url: DEFAULT_MEDIA_URL.to_string(),
            admin: None,
        }
    }
}

impl ServerConfig {
    /// In-memory settings for tests and embedding: ephemeral port on loopback.
    pub fn ephemeral() -> Self {
        Self { bind: IpAddr::V4(Ipv4Addr::LOCALHOST), http_port: 0, data_dir: None, ..Self::default() }
    }

    pub fn from_env_and_args(args: &[String]) -> Self {
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Flags win over the environment; malformed values fall back to the next source.
    pub fn resolve<F: Fn(&str) -> Option<String>>(args: &[String], env_lookup: F) -> Self {
        let d = Self::default();
        let http_port = parse_arg::<u16>(args, "--port")
            .or_else(|| env_lookup("SERIESHUB_HTTP_PORT").and_then(|v| v.trim().parse().ok()))
            .unwrap_or(d.http_port);
        let bind = parse_arg::<IpAddr>(args, "--bind")
            .or_else(|| env_lookup("SERIESHUB_BIND").and_then(|v| v.trim().parse().ok()))
            .unwrap_or(d.bind);
        let data_dir = if has_flag(args, "--in-memory") {
            None
        } else {
            arg_value(args, "--data-dir")
                .or_else(|| env_lookup("SERIESHUB_DATA_DIR"))
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .or(d.data_dir)
        };
        let access_ttl = parse_arg::<u64>(args, "--access-ttl")
            .or_else(|| env_lookup("SERIESHUB_ACCESS_TTL_SECS").and_then(|v| v.trim().parse().ok()))
            .map(Duration::from_secs)
            .unwrap_or(d.access_ttl);
        let refresh_ttl = parse_arg::<u64>(args, "--refresh-ttl")
            .or_else(|| env_lookup("SERIESHUB_REFRESH_TTL_SECS").and_then(|v| v.trim().parse().ok()))
            .map(Duration::from_secs)
            .unwrap_or(d.refresh_ttl);
        let media_url = env_lookup("SERIESHUB_MEDIA_URL").map(normalize_media_url).unwrap_or(d.media_url);
        let admin = match (env_lookup("SERIESHUB_ADMIN_USER"), env_lookup("SERIESHUB_ADMIN_PASSWORD")) {
            (user, Some(pw)) if !pw.is_empty() => {
                Some((user.filter(|u| !u.trim().is_empty()).unwrap_or_else(|| "admin".to_string()), pw))
            }
            _ => None,
        };
        Self { bind, http_port, data_dir, access_ttl, refresh_ttl, media_url, admin }
    }

    pub fn addr(&self) -> SocketAddr { SocketAddr::new(self.bind, self.http_port) }

    /// Public URL of a stored image or avatar reference.
    pub fn media_url_for(&self, name: &str) -> String { format!("{}{}", self.media_url, name) }
}

fn normalize_media_url(raw: String) -> String {
    if raw.ends_with('/') { raw } else { format!("{raw}/") }
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    arg_value(args, flag).and_then(|v| v.parse::<T>().ok())
}
