use crate::{
    audit::MessageJournal,
    automod::BurstTracker,
    config::{Config, LinkfixConfig},
    linkfix::{media::YtDlp, webhook::WebhookRegistry},
};
use cheshire_db::{BirthdayDb, CheshireDb, WarnDb};
use color_eyre::eyre::{Error, Result, WrapErr};
use std::{fmt, path::Path, sync::Arc};
use tokio::sync::RwLock;

/// The global state of the bot
pub type State = Arc<AppState>;

pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    /// Config file watcher that refreshes the config if it changes
    ///
    /// Attached to the AppState to keep the watcher alive
    _watcher: notify::RecommendedWatcher,
    pub config_path: Box<Path>,
    /// The allow-list as it was at startup. Reloads never touch it.
    pub linkfix: LinkfixConfig,
    pub media: YtDlp,
    pub webhooks: WebhookRegistry,
    pub bursts: BurstTracker,
    pub journal: MessageJournal,
    pub warns: WarnDb,
    pub birthdays: BirthdayDb,
}

impl AppState {
    pub fn new(config: Config, config_path: impl AsRef<Path>) -> Result<AppState> {
        let db = CheshireDb::open(&config.warn_db_path)?;
        let warns = WarnDb::new(&db)?;
        let birthdays = BirthdayDb::new(&db)?;
        let journal = MessageJournal::new(config.audit.journal_capacity);

        let linkfix = config.linkfix.clone();
        let media = YtDlp::new(config.media.clone());

        let config = Arc::new(RwLock::new(config));

        use notify::{
            Event, EventKind, RecursiveMode, Watcher,
            event::{AccessKind, AccessMode},
        };

        let config_clone = Arc::clone(&config);
        let config_path: Box<Path> = config_path.as_ref().into();
        let reload_config_path = config_path.clone();

        let mut watcher = notify::recommended_watcher(move |res| match res {
            Ok(Event {
                kind: EventKind::Access(AccessKind::Close(AccessMode::Write)),
                ..
            }) => {
                tracing::info!("config changed, reloading...");

                config_clone.blocking_write().reload(&reload_config_path);
            }
            Err(e) => tracing::error!("watch error: {:?}", e),
            _ => {}
        })
        .wrap_err("Failed to create file watcher")?;

        watcher
            .watch(&config_path, RecursiveMode::NonRecursive)
            .wrap_err("Failed to watch config file")?;

        Ok(AppState {
            config,
            _watcher: watcher,
            config_path,
            linkfix,
            media,
            webhooks: WebhookRegistry::default(),
            bursts: BurstTracker::default(),
            journal,
            warns,
            birthdays,
        })
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("config_path", &self.config_path)
            .field("linkfix", &self.linkfix)
            .finish_non_exhaustive()
    }
}

// User data, which is stored and accessible in all command invocations
pub type PoiseContext<'a> = poise::Context<'a, State, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn debug_shows_where_config_lives() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "guild_id = 1\n")?;

        let mut config = Config::from_toml("guild_id = 1")?;
        config.warn_db_path = dir.path().join("cheshire.db");

        let state = AppState::new(config, &config_path)?;
        let debug = format!("{:?}", state);

        assert!(debug.starts_with("AppState {"));
        assert!(debug.contains("config.toml"));
        assert!(debug.contains("FixEmbed Bridge"));
        assert!(debug.ends_with(".. }"));

        Ok(())
    }
}
