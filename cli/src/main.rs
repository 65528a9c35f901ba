mod atomic_write;
mod config;
mod lan;
mod logging;

use std::net::Ipv4Addr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use hush_tui::Connection;
use hush_tui::ExitReason;
use hush_tui::HushTui;
use hush_tui::USERNAME_CHAR_LIMIT;

use crate::config::ConfigStore;
use crate::config::HushConfig;
use crate::lan::LanConfig;
use crate::lan::LanTransport;

#[derive(Parser, Debug)]
#[command(
    name = "hush",
    version,
    about = "Talk to anyone on your local network. No servers, no trace."
)]
struct Cli {
    /// Join with this name and skip the welcome screen.
    #[arg(short, long, env = "HUSH_USERNAME")]
    username: Option<String>,

    /// IPv4 multicast group shared by all peers.
    #[arg(long, value_parser = parse_multicast_group)]
    group: Option<Ipv4Addr>,

    /// UDP port of the multicast group.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Append logs here instead of `~/.hush/log/hush.log`. Filter with `HUSH_LOG`.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Read settings from this file instead of `~/.hush/config.toml`.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    /// CLI flags win over the config file, which wins over the built-in defaults.
    fn lan_config(&self, file: &HushConfig) -> LanConfig {
        let defaults = LanConfig::default();
        LanConfig {
            group: self.group.or(file.group).unwrap_or(defaults.group),
            port: self.port.or(file.port).unwrap_or(defaults.port),
        }
    }
}

fn parse_multicast_group(value: &str) -> Result<Ipv4Addr, String> {
    let addr: Ipv4Addr = value
        .parse()
        .map_err(|err| format!("invalid IPv4 address: {err}"))?;
    if !addr.is_multicast() {
        return Err(format!("{addr} is not a multicast address (224.0.0.0/4)"));
    }
    Ok(addr)
}

/// Normalizes a name given on the command line the same way the welcome screen does.
fn cli_username(name: &str) -> String {
    let name: String = name
        .trim()
        .chars()
        .filter(|ch| !ch.is_control())
        .take(USERNAME_CHAR_LIMIT)
        .collect();
    hush_tui::resolve_username(&name)
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let home = dirs::home_dir();
    let store = match (&cli.config, &home) {
        (Some(path), _) => ConfigStore::new(path.clone()),
        (None, Some(home)) => ConfigStore::new(config::default_config_path(home)),
        (None, None) => anyhow::bail!("cannot determine home directory; pass --config"),
    };
    let log_path = match (&cli.log_file, &home) {
        (Some(path), _) => path.clone(),
        (None, Some(home)) => config::default_log_path(home),
        (None, None) => anyhow::bail!("cannot determine home directory; pass --log-file"),
    };
    logging::init(&log_path)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "hush starting");

    let file_config = match store.load() {
        Ok(file_config) => file_config,
        Err(err) => {
            tracing::warn!("failed to read {}: {err:#}", store.path().display());
            HushConfig::default()
        }
    };

    let lan_config = cli.lan_config(&file_config);
    let mut connection = Connection::spawn(async move {
        LanTransport::bind(lan_config, "").await.with_context(|| {
            format!(
                "join multicast group {}:{}",
                lan_config.group, lan_config.port
            )
        })
    });

    let mut ui = HushTui::new()?;

    let username = match cli.username.as_deref() {
        Some(name) => cli_username(name),
        None => match ui
            .prompt_username(file_config.username.as_deref(), &mut connection)
            .await?
        {
            Some(name) => name,
            None => {
                tracing::info!("welcome screen cancelled");
                return Ok(());
            }
        },
    };
    if let Err(err) = store.set_username(&username) {
        tracing::warn!("failed to remember username: {err:#}");
    }

    let exit_info = ui.run_chat(username, connection).await?;
    drop(ui);

    tracing::info!(?exit_info, "hush exiting");
    if exit_info.exit_reason == ExitReason::InputClosed {
        eprintln!("terminal input closed");
    }
    println!(
        "👻 {} faded away ({} received, {} sent)",
        exit_info.username, exit_info.messages_received, exit_info.messages_sent
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_all_flags() {
        let cli = Cli::try_parse_from([
            "hush",
            "-u",
            "casper",
            "--group",
            "239.1.1.1",
            "--port",
            "5000",
            "--log-file",
            "/tmp/hush.log",
            "--config",
            "/tmp/hush.toml",
        ])
        .expect("parse");
        assert_eq!(cli.username.as_deref(), Some("casper"));
        assert_eq!(cli.group, Some(Ipv4Addr::new(239, 1, 1, 1)));
        assert_eq!(cli.port, Some(5000));
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/hush.log")));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/hush.toml")));
    }

    #[test]
    fn rejects_unicast_group_and_zero_port() {
        assert!(Cli::try_parse_from(["hush", "--group", "192.168.1.1"]).is_err());
        assert!(Cli::try_parse_from(["hush", "--port", "0"]).is_err());
    }

    #[test]
    fn flags_override_config_file_and_defaults() {
        let cli = Cli::try_parse_from(["hush", "--port", "6000"]).expect("parse");
        let file = HushConfig {
            username: None,
            group: Some(Ipv4Addr::new(239, 9, 9, 9)),
            port: Some(4000),
        };
        assert_eq!(
            cli.lan_config(&file),
            LanConfig {
                group: Ipv4Addr::new(239, 9, 9, 9),
                port: 6000,
            }
        );
        assert_eq!(
            cli.lan_config(&HushConfig::default()),
            LanConfig {
                port: 6000,
                ..LanConfig::default()
            }
        );

        let flagless = Cli::try_parse_from(["hush"]).expect("parse");
        assert_eq!(
            flagless.lan_config(&HushConfig::default()),
            LanConfig::default()
        );
    }

    #[test]
    fn cli_username_is_trimmed_and_limited() {
        assert_eq!(cli_username("  casper  "), "casper");
        assert_eq!(
            cli_username(&"x".repeat(40)).chars().count(),
            USERNAME_CHAR_LIMIT
        );
        assert!(cli_username("   ").starts_with("Ghost-"));
    }
}
