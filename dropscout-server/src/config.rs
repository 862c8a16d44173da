// dropscout-server/src/config.rs

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use dropscout_core::monitor::MonitorConfig;
use dropscout_core::notifier::NotifierConfig;
use dropscout_core::platforms::twitch::TwitchConfig;
use dropscout_core::render::RenderOptions;

#[derive(Parser, Debug, Clone)]
#[command(name = "dropscout")]
#[command(author, version, about = "DropScout - Twitch Drops campaign monitor for Discord")]
pub struct Args {
    /// Discord bot token.
    #[arg(long, env = "DISCORD_TOKEN")]
    pub discord_token: String,

    /// Twitch access token from a first-party (Android) authorization.
    #[arg(long, env = "TWITCH_ACCESS_TOKEN", default_value = "", hide_env_values = true)]
    pub twitch_access_token: String,

    /// Twitch refresh token paired with the access token.
    #[arg(long, env = "TWITCH_REFRESH_TOKEN", default_value = "", hide_env_values = true)]
    pub twitch_refresh_token: String,

    /// Fallback refresh token from a second first-party authorization.
    #[arg(long, env = "TWITCH_ALT_REFRESH_TOKEN", default_value = "", hide_env_values = true)]
    pub twitch_alt_refresh_token: String,

    /// Client id to use for Helix calls; defaults to the Android client id.
    #[arg(long, env = "TWITCH_HELIX_CLIENT_ID")]
    pub helix_client_id: Option<String>,

    /// User agent sent on Twitch GQL requests.
    #[arg(long, env = "TWITCH_USER_AGENT")]
    pub twitch_user_agent: Option<String>,

    /// Minutes between polling cycles; clamped to at least 1.
    #[arg(long, env = "DROPS_INTERVAL_MINUTES", default_value_t = 30)]
    pub interval_minutes: u64,

    /// Whether the first cycle after start may post notifications.
    #[arg(long, env = "DROPS_NOTIFY_ON_BOOT", default_value_t = false)]
    pub notify_on_boot: bool,

    /// Directory for the on-disk JSON documents.
    #[arg(long, env = "DROPS_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Collage renders allowed per notification batch; 0 is unbounded.
    #[arg(long, env = "DROPS_MAX_ATTACHMENTS", default_value_t = 1)]
    pub max_attachments: usize,

    /// Milliseconds to pause between consecutive notification sends.
    #[arg(long, env = "DROPS_SEND_DELAY_MS", default_value_t = 350)]
    pub send_delay_ms: u64,

    /// Seconds a condensed campaign fetch stays fresh for commands.
    #[arg(long, env = "DROPS_FETCH_TTL_SECS", default_value_t = 120)]
    pub fetch_ttl_secs: u64,

    /// Max benefit icons per collage; 0 means all.
    #[arg(long, env = "DROPS_ICON_LIMIT", default_value_t = 9)]
    pub icon_limit: usize,

    /// Square collage icon edge in pixels.
    #[arg(long, env = "DROPS_ICON_SIZE", default_value_t = 96)]
    pub icon_size: u32,

    /// Collage grid columns.
    #[arg(long, env = "DROPS_ICON_COLUMNS", default_value_t = 3)]
    pub icon_columns: u32,

    /// Bound on concurrently remembered pagination sessions.
    #[arg(long, env = "DROPS_SESSION_CAPACITY", default_value_t = 64)]
    pub session_capacity: usize,
}

impl Args {
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("drops_state.json")
    }

    pub fn guild_config_path(&self) -> PathBuf {
        self.data_dir.join("guild_config.json")
    }

    pub fn favorites_path(&self) -> PathBuf {
        self.data_dir.join("favorites.json")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("game_catalog.json")
    }

    pub fn fetch_ttl(&self) -> Duration {
        Duration::from_secs(self.fetch_ttl_secs)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            icon_limit: self.icon_limit,
            icon_size: self.icon_size,
            columns: self.icon_columns.max(1),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_secs(self.interval_minutes.max(1) * 60),
            notify_on_boot: self.notify_on_boot,
        }
    }

    pub fn notifier_config(&self) -> NotifierConfig {
        NotifierConfig {
            max_attachments: self.max_attachments,
            send_delay: Duration::from_millis(self.send_delay_ms),
            render_opts: self.render_options(),
        }
    }

    pub fn twitch_config(&self) -> TwitchConfig {
        TwitchConfig {
            access_token: self.twitch_access_token.clone(),
            refresh_token: self.twitch_refresh_token.clone(),
            alt_refresh_token: self.twitch_alt_refresh_token.clone(),
            helix_client_id: self.helix_client_id.clone(),
            user_agent: self.twitch_user_agent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["dropscout", "--discord-token", "tok"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let args = parse(&[]);
        assert_eq!(args.interval_minutes, 30);
        assert!(!args.notify_on_boot);
        assert_eq!(args.max_attachments, 1);
        assert_eq!(args.send_delay_ms, 350);
        assert_eq!(args.fetch_ttl_secs, 120);
        assert_eq!(args.session_capacity, 64);
        assert_eq!(args.state_path(), PathBuf::from("data/drops_state.json"));
        assert_eq!(args.catalog_path(), PathBuf::from("data/game_catalog.json"));
    }

    #[test]
    fn interval_is_clamped_to_one_minute() {
        let args = parse(&["--interval-minutes", "0"]);
        assert_eq!(args.monitor_config().interval, Duration::from_secs(60));
    }

    #[test]
    fn notifier_config_carries_the_render_knobs() {
        let args = parse(&["--icon-limit", "4", "--icon-columns", "0"]);
        let config = args.notifier_config();
        assert_eq!(config.render_opts.icon_limit, 4);
        assert_eq!(config.render_opts.columns, 1);
        assert_eq!(config.send_delay, Duration::from_millis(350));
    }
}
