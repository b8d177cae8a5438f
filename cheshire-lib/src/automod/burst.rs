use crate::config::AutomodConfig;
use ahash::AHashMap;
use parking_lot::Mutex;
use poise::serenity_prelude::UserId;
use std::time::Duration;

/// What a user's recent messages add up to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Burst {
    /// Too many messages inside the spam window.
    Spam,
    /// The same text too many times inside the repeat window.
    Repeat,
}

impl Burst {
    pub fn action(self) -> &'static str {
        match self {
            Burst::Spam => "Spam burst",
            Burst::Repeat => "Repeated content",
        }
    }
}

/// Recent `(timestamp_secs, content)` per user.
#[derive(Default)]
pub struct BurstTracker {
    history: Mutex<AHashMap<UserId, Vec<(i64, String)>>>,
}

impl BurstTracker {
    /// Records a message and reports whether the user is now bursting.
    ///
    /// History older than the longer of the two windows is dropped first.
    /// Both checks count the messages already seen, so the limits are how
    /// many messages a user may send before the next one trips them. A spam
    /// burst hides any repeat.
    pub fn observe(
        &self,
        user_id: UserId,
        now: i64,
        content: &str,
        config: &AutomodConfig,
    ) -> Option<Burst> {
        if !config.antispam && !config.repeat {
            return None;
        }

        let keep = config.spam_window.max(config.repeat_window).as_secs() as i64;

        let mut history = self.history.lock();
        let recent = history.entry(user_id).or_default();
        recent.retain(|(timestamp, _)| now - timestamp <= keep);

        let burst = if config.antispam
            && count_within(recent, now, config.spam_window, None) >= config.spam_max_messages
        {
            Some(Burst::Spam)
        } else if config.repeat
            && !content.is_empty()
            && count_within(recent, now, config.repeat_window, Some(content))
                >= config.repeat_threshold
        {
            Some(Burst::Repeat)
        } else {
            None
        };

        recent.push((now, content.to_owned()));

        burst
    }

    /// Drops users who have been quiet for longer than `max_age` seconds.
    pub fn prune(&self, now: i64, max_age: i64) {
        self.history.lock().retain(|_, recent| {
            recent
                .last()
                .is_some_and(|(timestamp, _)| now - timestamp <= max_age)
        });
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.history.lock().len()
    }
}

fn count_within(
    recent: &[(i64, String)],
    now: i64,
    window: Duration,
    content: Option<&str>,
) -> usize {
    let window = window.as_secs() as i64;

    recent
        .iter()
        .filter(|(timestamp, _)| now - timestamp <= window)
        .filter(|(_, seen)| content.is_none_or(|content| seen == content))
        .count()
}
