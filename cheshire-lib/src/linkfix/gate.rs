use super::{classify::classify, scan::candidate_urls};
use crate::config::LinkfixConfig;
use cheshire_traits::ForwardRefToTracing;
use color_eyre::eyre::Result;
use poise::serenity_prelude::{ChannelId, ChannelType, GuildChannel, Permissions, WebhookId};

/// Where a message was posted. Threads remember their parent, which is
/// where webhooks and permissions live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub channel_id: ChannelId,
    pub parent_id: Option<ChannelId>,
}

impl Origin {
    pub fn of(channel: &GuildChannel) -> Self {
        let is_thread = matches!(
            channel.kind,
            ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
        );

        Self {
            channel_id: channel.id,
            parent_id: channel.parent_id.filter(|_| is_thread),
        }
    }

    /// The channel that owns webhooks for this origin.
    pub fn home(&self) -> ChannelId {
        self.parent_id.unwrap_or(self.channel_id)
    }

    pub fn thread(&self) -> Option<ChannelId> {
        self.parent_id.map(|_| self.channel_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Proceed(Permissions),
    NotAllowListed,
    /// Reposting without removing the original would duplicate it.
    CannotDelete,
}

/// Bots and webhooks (including our own reposts) are never touched.
pub fn is_automated(author_is_bot: bool, webhook_id: Option<WebhookId>) -> bool {
    author_is_bot || webhook_id.is_some()
}

/// Whether `content` holds a link the pipeline would act on. This runs
/// before any channel lookup, so ordinary chatter costs nothing.
pub fn has_fixable_links(content: &str) -> bool {
    candidate_urls(content)
        .iter()
        .map(|span| classify(span.url))
        .any(|kind| kind.is_media() || kind.replacement_host().is_some())
}

/// `permissions` is only evaluated for allow-listed channels.
pub fn check(
    config: &LinkfixConfig,
    origin: Origin,
    permissions: impl FnOnce() -> Result<Permissions>,
) -> Verdict {
    if !config.allows(origin.channel_id, origin.parent_id) {
        return Verdict::NotAllowListed;
    }

    match permissions().trace_warn_ok("Could not resolve channel permissions") {
        Some(permissions) if permissions.contains(Permissions::MANAGE_MESSAGES) => {
            Verdict::Proceed(permissions)
        }
        _ => Verdict::CannotDelete,
    }
}
