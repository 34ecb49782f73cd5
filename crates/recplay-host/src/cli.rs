use std::path::PathBuf;

use clap::Parser;
use recplay_core::{Polarity, RecPlayConfig, RemoteConfig};

use crate::buttons::ButtonScript;
use crate::config;
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON config file; flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory acting as the storage card. Must exist.
    #[arg(long, default_value = "card")]
    pub store: PathBuf,

    /// Storage card size in bytes
    #[arg(long, default_value_t = 8 * 1024 * 1024)]
    pub capacity: u64,

    /// Button presses, e.g. "record@500,play@12000+300"
    #[arg(long, default_value = "record@500,play@12000")]
    pub script: ButtonScript,

    /// Contact chatter after each scripted transition, in ms
    #[arg(long, default_value_t = 8)]
    pub bounce_ms: u64,

    /// Keep running this long after the last scripted press, in ms
    #[arg(long, default_value_t = 1000)]
    pub linger_ms: u64,

    #[arg(long)]
    pub record_timeout_ms: Option<u64>,

    #[arg(long)]
    pub play_timeout_ms: Option<u64>,

    /// Buttons pull the line high when pressed
    #[arg(long)]
    pub active_high: bool,

    /// Frequency of the simulated microphone tone
    #[arg(long, default_value_t = 440.0)]
    pub tone_hz: f32,

    /// Seconds of audio the microphone delivers before running dry
    #[arg(long)]
    pub mic_seconds: Option<u64>,

    /// Raw PCM file receiving everything played
    #[arg(long)]
    pub speaker: Option<PathBuf>,

    /// Run transfers as fast as possible instead of in real time
    #[arg(long)]
    pub unpaced: bool,

    /// Directory shared with the peer device, enables remote sync
    #[arg(long, requires = "device_id", requires = "peer_id")]
    pub remote: Option<PathBuf>,

    #[arg(long)]
    pub device_id: Option<String>,

    #[arg(long)]
    pub peer_id: Option<String>,

    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
}

impl Cli {
    /// The config file (or defaults) with command line overrides applied,
    /// validated.
    pub fn resolve_config(&self) -> Result<RecPlayConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load(path)?,
            None => RecPlayConfig::default(),
        };
        if let Some(ms) = self.record_timeout_ms {
            cfg.record_timeout_ms = ms;
        }
        if let Some(ms) = self.play_timeout_ms {
            cfg.play_timeout_ms = ms;
        }
        if self.active_high {
            cfg.button_polarity = Polarity::ActiveHigh;
        }
        if let (Some(device), Some(peer)) = (&self.device_id, &self.peer_id) {
            let mut remote =
                RemoteConfig::new(config::device_id(device)?, config::device_id(peer)?);
            if let Some(existing) = &cfg.remote {
                remote.upload_after_capture = existing.upload_after_capture;
                remote.poll_interval_ms = existing.poll_interval_ms;
            }
            cfg.remote = Some(remote);
        }
        if let (Some(ms), Some(remote)) = (self.poll_interval_ms, cfg.remote.as_mut()) {
            remote.poll_interval_ms = ms;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use recplay_core::ConfigError;

    #[test]
    fn defaults_resolve_to_default_config() {
        let cli = Cli::parse_from(["recplay-sim"]);
        assert_eq!(cli.resolve_config().unwrap(), RecPlayConfig::default());
        assert_eq!(cli.script.presses().len(), 2);
    }

    #[test]
    fn flags_override_config_fields() {
        let cli = Cli::parse_from([
            "recplay-sim",
            "--record-timeout-ms",
            "3000",
            "--active-high",
            "--remote",
            "shared",
            "--device-id",
            "kitchen",
            "--peer-id",
            "garage",
            "--poll-interval-ms",
            "5000",
        ]);
        let cfg = cli.resolve_config().unwrap();
        assert_eq!(cfg.record_timeout_ms, 3000);
        assert_eq!(cfg.button_polarity, Polarity::ActiveHigh);
        let remote = cfg.remote.unwrap();
        assert_eq!(remote.device_id.as_str(), "kitchen");
        assert_eq!(remote.poll_interval_ms, 5000);
    }

    #[test]
    fn remote_dir_needs_both_ids() {
        let parsed = Cli::try_parse_from(["recplay-sim", "--remote", "shared"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn overrides_are_validated() {
        let cli = Cli::parse_from(["recplay-sim", "--play-timeout-ms", "0"]);
        assert!(matches!(
            cli.resolve_config(),
            Err(Error::Config(ConfigError::ZeroTimeout))
        ));
    }
}
