use chrono::NaiveTime;
use chrono_tz::Tz;
use color_eyre::eyre::{Result, WrapErr};
use poise::serenity_prelude::{ChannelId, RoleId};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, DurationSeconds, serde_as};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Deserialize, Serialize, Debug, PartialEq)]
pub struct Config {
    /// The id of the guild the bot is in. Commands are registered here.
    pub guild_id: u64,
    /// Prefix for text commands, which autoclean removes.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Members holding any of these roles count as staff.
    #[serde(default)]
    pub admin_role_names: Vec<String>,
    /// Where moderation actions are logged. Disabled when unset.
    pub modlog_channel_id: Option<ChannelId>,
    /// Where warnings and birthdays are stored.
    #[serde(default = "default_warn_db_path")]
    pub warn_db_path: PathBuf,
    /// Pinned at startup, see [`Config::reload`].
    #[serde(default)]
    pub linkfix: LinkfixConfig,
    /// Pinned at startup, see [`Config::reload`].
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub automod: AutomodConfig,
    #[serde(default)]
    pub autoclean: AutocleanConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub birthday: BirthdayConfig,
    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LinkfixConfig {
    /// Channels where links are fixed. Threads follow their parent.
    pub channel_ids: HashSet<ChannelId>,
    /// Name given to webhooks the bot creates for reposts.
    pub webhook_name: String,
}

impl LinkfixConfig {
    pub fn allows(&self, channel_id: ChannelId, parent_id: Option<ChannelId>) -> bool {
        self.channel_ids.contains(&channel_id)
            || parent_id.is_some_and(|parent| self.channel_ids.contains(&parent))
    }
}

impl Default for LinkfixConfig {
    fn default() -> Self {
        Self {
            channel_ids: HashSet::new(),
            webhook_name: "FixEmbed Bridge".to_owned(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MediaConfig {
    pub yt_dlp_path: PathBuf,
    /// Netscape cookie file for sites that want a login.
    pub cookies_file: Option<PathBuf>,
    /// Discord's upload limit for servers without boosts.
    pub max_filesize_bytes: u64,
    pub max_concurrent_downloads: usize,
    pub temp_prefix: String,
    /// Defaults to the system temp directory.
    pub temp_root: Option<PathBuf>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: PathBuf::from("yt-dlp"),
            cookies_file: None,
            max_filesize_bytes: 24_000_000,
            max_concurrent_downloads: 2,
            temp_prefix: "cheshire_media_".to_owned(),
            temp_root: None,
        }
    }
}

#[serde_as]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AutomodConfig {
    pub block_invites: bool,
    pub block_mass_mentions: bool,
    /// User plus role mentions at which a message is removed.
    pub max_mentions: usize,
    pub antispam: bool,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub spam_window: Duration,
    pub spam_max_messages: usize,
    pub repeat: bool,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub repeat_window: Duration,
    pub repeat_threshold: usize,
    /// How long the in-channel notice stays up.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub notice_seconds: Duration,
    /// Nothing is checked or deleted in these.
    pub exempt_channel_ids: HashSet<ChannelId>,
}

impl Default for AutomodConfig {
    fn default() -> Self {
        Self {
            block_invites: true,
            block_mass_mentions: true,
            max_mentions: 6,
            antispam: true,
            spam_window: Duration::from_secs(6),
            spam_max_messages: 6,
            repeat: true,
            repeat_window: Duration::from_secs(10),
            repeat_threshold: 3,
            notice_seconds: Duration::from_secs(10),
            exempt_channel_ids: HashSet::new(),
        }
    }
}

#[serde_as]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AutocleanConfig {
    #[serde_as(as = "DurationSeconds<u64>")]
    pub delay: Duration,
    pub exempt_channel_ids: HashSet<ChannelId>,
}

impl Default for AutocleanConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(6),
            exempt_channel_ids: HashSet::new(),
        }
    }
}

/// Edit and delete logging into the mod-log channel.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AuditConfig {
    pub log_edits: bool,
    pub log_deletes: bool,
    /// How many recent messages are remembered so deletions can show what
    /// was said.
    pub journal_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_edits: true,
            log_deletes: true,
            journal_capacity: 5_000,
        }
    }
}

#[serde_as]
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BirthdayConfig {
    /// `/birthday set` only works here, and public confirmations land here.
    pub set_channel_id: Option<ChannelId>,
    /// Daily announcements. Disabled when unset.
    pub announce_channel_id: Option<ChannelId>,
    /// `/birthday today` only works here.
    pub staff_channel_id: Option<ChannelId>,
    /// Role required for `/birthday today`.
    pub staff_role_name: String,
    #[serde_as(as = "DisplayFromStr")]
    pub timezone: Tz,
    /// Local time of the daily announcement, `HH:MM:SS`.
    #[serde_as(as = "DisplayFromStr")]
    pub announce_at: NaiveTime,
}

impl Default for BirthdayConfig {
    fn default() -> Self {
        Self {
            set_channel_id: None,
            announce_channel_id: None,
            staff_channel_id: None,
            staff_role_name: "Doomed Rabbit".to_owned(),
            timezone: chrono_tz::Europe::Luxembourg,
            announce_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
        }
    }
}

/// Reaction roles offered by `/post_roles`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RolesConfig {
    /// Reactions only count in this channel. Disabled when unset.
    pub channel_id: Option<ChannelId>,
    #[serde(rename = "reaction")]
    pub reactions: Vec<ReactionRole>,
}

impl RolesConfig {
    /// The role offered for `emoji` in `channel_id`, if any.
    pub fn reaction_role(&self, channel_id: ChannelId, emoji: &str) -> Option<&ReactionRole> {
        if self.channel_id != Some(channel_id) {
            return None;
        }

        self.reactions.iter().find(|reaction| reaction.emoji == emoji)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ReactionRole {
    /// A unicode emoji or a custom one written as `<:name:id>`.
    pub emoji: String,
    /// Shown next to the emoji in the role menu.
    pub label: String,
    /// Takes precedence over `role_name`.
    pub role_id: Option<RoleId>,
    /// Looked up in the guild when `role_id` is unset.
    pub role_name: Option<String>,
}

fn default_command_prefix() -> String {
    "!".to_owned()
}

fn default_warn_db_path() -> PathBuf {
    PathBuf::from("cheshire.db")
}

impl Config {
    pub fn create_from_file(config_path: impl AsRef<Path>) -> Result<Config> {
        let file = std::fs::read_to_string(config_path).wrap_err("Could not read config file")?;

        Config::from_toml(&file)
    }

    pub fn from_toml(toml: &str) -> Result<Config> {
        toml::from_str(toml).wrap_err("Could not parse config file")
    }

    /// Re-reads the config file. The link-fix allow-list and the media
    /// settings stay as they were at startup; a broken file is ignored.
    pub fn reload(&mut self, config_path: impl AsRef<Path>) {
        match Config::create_from_file(config_path) {
            Ok(mut config) => {
                config.linkfix = std::mem::take(&mut self.linkfix);
                config.media = std::mem::take(&mut self.media);
                *self = config;
            }
            Err(e) => tracing::warn!("Keeping old config: {:?}", e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const FULL: &str = r#"
        guild_id = 1251693839249313863
        admin_role_names = ["Doomed Rabbit", "Madness Warden"]
        modlog_channel_id = 1444159488054792273

        [linkfix]
        channel_ids = [1255281446697042061, 1254679880482820157]

        [media]
        cookies_file = "cookies.txt"
        max_concurrent_downloads = 4

        [automod]
        max_mentions = 8
        spam_window = 3
        exempt_channel_ids = [1428352638998544475]

        [autoclean]
        delay = 2

        [birthday]
        set_channel_id = 1251693839962607672
        announce_channel_id = 1251693840604332077
        timezone = "America/Denver"
        announce_at = "08:30:00"

        [roles]
        channel_id = 1421819010055671868

        [[roles.reaction]]
        emoji = "🎥"
        label = "movies"
        role_id = 1421818572849680497

        [[roles.reaction]]
        emoji = "<:kekw:1259303576233054289>"
        label = "sussy-humour"
        role_name = "sussy-humour"
    "#;

    #[test]
    fn parses_full_config() {
        let config = Config::from_toml(FULL).unwrap();

        assert_eq!(config.guild_id, 1251693839249313863);
        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.admin_role_names.len(), 2);
        assert_eq!(
            config.modlog_channel_id,
            Some(ChannelId::new(1444159488054792273))
        );
        assert!(config.linkfix.allows(ChannelId::new(1254679880482820157), None));
        assert_eq!(config.linkfix.webhook_name, "FixEmbed Bridge");
        assert_eq!(config.media.cookies_file, Some(PathBuf::from("cookies.txt")));
        assert_eq!(config.media.max_concurrent_downloads, 4);
        assert_eq!(config.media.max_filesize_bytes, 24_000_000);
        assert_eq!(config.automod.max_mentions, 8);
        assert_eq!(config.automod.spam_window, Duration::from_secs(3));
        assert_eq!(config.automod.repeat_window, Duration::from_secs(10));
        assert_eq!(config.autoclean.delay, Duration::from_secs(2));
        assert_eq!(config.birthday.timezone, chrono_tz::America::Denver);
        assert_eq!(
            config.birthday.announce_at,
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
        assert_eq!(config.birthday.staff_role_name, "Doomed Rabbit");
        assert_eq!(config.roles.reactions.len(), 2);
        assert_eq!(
            config.roles.reactions[1].role_name.as_deref(),
            Some("sussy-humour")
        );
    }

    #[test]
    fn reaction_roles_only_count_in_their_channel() {
        let config = Config::from_toml(FULL).unwrap();
        let roles_channel = ChannelId::new(1421819010055671868);

        let movies = config.roles.reaction_role(roles_channel, "🎥").unwrap();
        assert_eq!(movies.role_id, Some(RoleId::new(1421818572849680497)));
        assert!(
            config
                .roles
                .reaction_role(roles_channel, "<:kekw:1259303576233054289>")
                .is_some()
        );
        assert!(config.roles.reaction_role(roles_channel, "🦎").is_none());
        assert!(config.roles.reaction_role(ChannelId::new(5), "🎥").is_none());
        assert!(
            RolesConfig::default()
                .reaction_role(roles_channel, "🎥")
                .is_none()
        );
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_toml("guild_id = 1").unwrap();

        assert!(config.linkfix.channel_ids.is_empty());
        assert_eq!(config.media, MediaConfig::default());
        assert_eq!(config.automod, AutomodConfig::default());
        assert_eq!(config.autoclean, AutocleanConfig::default());
        assert_eq!(config.modlog_channel_id, None);
        assert_eq!(config.audit, AuditConfig::default());
        assert_eq!(config.birthday, BirthdayConfig::default());
        assert_eq!(config.birthday.timezone, chrono_tz::Europe::Luxembourg);
        assert!(config.roles.reactions.is_empty());
    }

    #[test]
    fn thread_parents_are_allowed() {
        let config = Config::from_toml(FULL).unwrap();

        assert!(config.linkfix.allows(
            ChannelId::new(42),
            Some(ChannelId::new(1255281446697042061))
        ));
        assert!(!config.linkfix.allows(ChannelId::new(42), Some(ChannelId::new(43))));
        assert!(!config.linkfix.allows(ChannelId::new(42), None));
    }

    #[test]
    fn reload_keeps_linkfix_and_media() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("config.toml");
        std::fs::write(&path, FULL).unwrap();

        let mut config = Config::create_from_file(&path).unwrap();
        let pinned_linkfix = config.linkfix.clone();
        let pinned_media = config.media.clone();

        std::fs::write(
            &path,
            r#"
            guild_id = 2
            [linkfix]
            channel_ids = [7]
            [media]
            max_filesize_bytes = 1
            [automod]
            max_mentions = 3
            "#,
        )
        .unwrap();
        config.reload(&path);

        assert_eq!(config.guild_id, 2);
        assert_eq!(config.automod.max_mentions, 3);
        assert_eq!(config.linkfix, pinned_linkfix);
        assert_eq!(config.media, pinned_media);

        std::fs::write(&path, "this is not toml = = =").unwrap();
        config.reload(&path);
        assert_eq!(config.guild_id, 2);
    }
}
