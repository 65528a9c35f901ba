use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::path::Path;
use std::path::PathBuf;

use toml_edit::DocumentMut;
use toml_edit::Item as TomlItem;
use toml_edit::value;

use crate::atomic_write::write_atomic_text;

/// Settings read from `config.toml`. Every field is optional; CLI flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HushConfig {
    /// Name offered on the welcome screen.
    pub username: Option<String>,
    /// `[network] group`
    pub group: Option<Ipv4Addr>,
    /// `[network] port`
    pub port: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the config file. A missing file yields the defaults; invalid TOML falls back to a
    /// line-based scan for the known keys.
    pub fn load(&self) -> anyhow::Result<HushConfig> {
        let Some(content) = read_document_string(&self.path)? else {
            return Ok(HushConfig::default());
        };

        let raw = match content.parse::<DocumentMut>() {
            Ok(doc) => RawConfig::from_document(&doc),
            Err(err) => {
                tracing::warn!(
                    "config {} is not valid TOML, reading known keys only: {err}",
                    self.path.display()
                );
                RawConfig::from_lines(&content)
            }
        };

        Ok(raw.into_config())
    }

    /// Remembers `username` as the name offered next time.
    pub fn set_username(&self, username: &str) -> anyhow::Result<()> {
        let content = read_document_string(&self.path)?.unwrap_or_default();

        let updated = match content.parse::<DocumentMut>() {
            Ok(mut doc) => {
                doc["username"] = value(username);
                doc.to_string()
            }
            Err(_) => prepend_username_fallback(&content, username),
        };

        write_atomic_text(&self.path, &updated)
    }
}

pub fn default_config_path(home: &Path) -> PathBuf {
    hush_home(home).join("config.toml")
}

pub fn default_log_path(home: &Path) -> PathBuf {
    hush_home(home).join("log").join("hush.log")
}

fn hush_home(home: &Path) -> PathBuf {
    home.join(".hush")
}

/// Config values before validation.
#[derive(Debug, Default)]
struct RawConfig {
    username: Option<String>,
    group: Option<String>,
    port: Option<i64>,
}

impl RawConfig {
    fn from_document(doc: &DocumentMut) -> Self {
        let network = doc.get("network").and_then(TomlItem::as_table);
        Self {
            username: doc
                .get("username")
                .and_then(TomlItem::as_str)
                .map(str::to_string),
            group: network
                .and_then(|network| network.get("group"))
                .and_then(TomlItem::as_str)
                .map(str::to_string),
            port: network
                .and_then(|network| network.get("port"))
                .and_then(TomlItem::as_integer),
        }
    }

    fn from_lines(contents: &str) -> Self {
        let mut raw = Self::default();
        let mut table: Option<&str> = None;

        for line in contents.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with('[') {
                table = parse_table_header_name(trimmed);
                continue;
            }

            let Some(line) = strip_toml_comment(trimmed) else {
                continue;
            };
            let Some((key, token)) = line.split_once('=') else {
                continue;
            };
            let token = token.trim();

            match (table, key.trim()) {
                (None, "username") => raw.username = Some(unquote(token).to_string()),
                (Some("network"), "group") => raw.group = Some(unquote(token).to_string()),
                (Some("network"), "port") => raw.port = token.parse().ok(),
                _ => {}
            }
        }

        raw
    }

    fn into_config(self) -> HushConfig {
        let group = self.group.and_then(|group| match group.parse::<Ipv4Addr>() {
            Ok(addr) if addr.is_multicast() => Some(addr),
            _ => {
                tracing::warn!("ignoring [network] group {group:?}: not an IPv4 multicast address");
                None
            }
        });
        let port = self.port.and_then(|port| match u16::try_from(port) {
            Ok(port) if port != 0 => Some(port),
            _ => {
                tracing::warn!("ignoring [network] port {port}: out of range");
                None
            }
        });
        let username = self
            .username
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        HushConfig {
            username,
            group,
            port,
        }
    }
}

fn parse_table_header_name(line: &str) -> Option<&str> {
    let line = line.trim_start();
    if !line.starts_with('[') {
        return None;
    }
    let end = line.find(']')?;
    if end <= 1 {
        return None;
    }
    let name = line[1..end].trim();
    if name.is_empty() {
        return None;
    }
    Some(name)
}

fn strip_toml_comment(line: &str) -> Option<&str> {
    let line = line.split_once('#').map_or(line, |(head, _)| head).trim();
    if line.is_empty() { None } else { Some(line) }
}

fn unquote(token: &str) -> &str {
    token
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(token)
}

/// Top-level keys must come before the first table header, so the key goes first.
fn prepend_username_fallback(existing: &str, username: &str) -> String {
    let mut kept = String::new();
    for line in existing.lines() {
        let is_username = strip_toml_comment(line.trim_start())
            .and_then(|line| line.split_once('='))
            .is_some_and(|(key, _)| key.trim() == "username");
        if !is_username {
            kept.push_str(line);
            kept.push('\n');
        }
    }

    let mut doc = DocumentMut::new();
    doc["username"] = value(username);
    format!("{doc}{kept}")
}

fn read_document_string(path: &Path) -> anyhow::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(anyhow::Error::new(err).context("read config.toml")),
    }
}
