//! Message-level moderation: invite links, mass mentions, spam bursts and
//! repeated content.

mod burst;

pub use burst::{Burst, BurstTracker};

use crate::{
    config::AutomodConfig,
    data::State,
    modlog::{action_embed, modlog},
    permissions::Standing,
};
use cheshire_traits::ForwardRefToTracing;
use color_eyre::eyre::{Result, WrapErr};
use poise::serenity_prelude::{Context, CreateMessage, Mentionable, Message};
use regex::Regex;
use std::sync::LazyLock;

static INVITE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:discord\.gg/|discord\.com/invite/)[A-Za-z0-9-]+")
        .expect("invite pattern is valid")
});

/// Something that gets a message removed on sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Invite,
    MassMention,
}

impl Violation {
    pub fn action(self) -> &'static str {
        match self {
            Violation::Invite => "Blocked invite",
            Violation::MassMention => "Mass mention",
        }
    }

    pub fn notice(self, mention: &str) -> String {
        match self {
            Violation::Invite => format!("{mention} Discord invites aren’t allowed here."),
            Violation::MassMention => format!("{mention} that’s a few too many mentions."),
        }
    }
}

pub fn contains_invite(content: &str) -> bool {
    INVITE_RE.is_match(content)
}

/// Role mentions only count once somebody is mentioned directly.
pub fn is_mass_mention(user_mentions: usize, role_mentions: usize, max_mentions: usize) -> bool {
    user_mentions > 0 && user_mentions + role_mentions >= max_mentions
}

pub fn find_violation(
    content: &str,
    user_mentions: usize,
    role_mentions: usize,
    config: &AutomodConfig,
) -> Option<Violation> {
    if config.block_invites && contains_invite(content) {
        return Some(Violation::Invite);
    }

    if config.block_mass_mentions
        && is_mass_mention(user_mentions, role_mentions, config.max_mentions)
    {
        return Some(Violation::MassMention);
    }

    None
}

/// Runs every automod check on `message`. Returns whether the message was
/// removed, in which case nothing else should act on it.
#[tracing::instrument(skip_all, fields(message_link = %message.link()))]
pub async fn automod(ctx: &Context, data: &State, message: &Message) -> Result<bool> {
    if message.guild_id.is_none() || message.author.bot {
        return Ok(false);
    }

    let (config, admin_role_names, modlog_channel) = {
        let config = data.config.read().await;
        (
            config.automod.clone(),
            config.admin_role_names.clone(),
            config.modlog_channel_id,
        )
    };

    if config.exempt_channel_ids.contains(&message.channel_id) {
        return Ok(false);
    }

    let member = message
        .member(ctx)
        .await
        .wrap_err("Failed to fetch message author")?;

    if Standing::of(&ctx.cache, &member).is_some_and(|standing| standing.is_mod(&admin_role_names))
    {
        return Ok(false);
    }

    let me = ctx.cache.current_user().id;

    if let Some(violation) = find_violation(
        &message.content,
        message.mentions.len(),
        message.mention_roles.len(),
        &config,
    ) {
        if message
            .delete(ctx)
            .await
            .wrap_err_with(|| format!("Failed to remove {:?}", violation))
            .trace_warn_ok("Automod")
            .is_none()
        {
            return Ok(false);
        }

        tracing::info!("{} from {}", violation.action(), message.author.tag());

        let notice = message
            .channel_id
            .send_message(
                ctx,
                CreateMessage::new()
                    .content(violation.notice(&message.author.mention().to_string())),
            )
            .await
            .wrap_err("Failed to post automod notice")
            .trace_err_ok();

        if let Some(notice) = notice {
            let ctx = ctx.clone();
            let lifetime = config.notice_seconds;

            tokio::spawn(async move {
                tokio::time::sleep(lifetime).await;
                notice.delete(&ctx).await.ok();
            });
        }

        modlog(
            ctx,
            modlog_channel,
            action_embed(&message.author, me, violation.action(), None),
        )
        .await;

        return Ok(true);
    }

    if let Some(burst) = data.bursts.observe(
        message.author.id,
        message.timestamp.unix_timestamp(),
        &message.content,
        &config,
    ) {
        tracing::info!("{} from {}", burst.action(), message.author.tag());

        modlog(
            ctx,
            modlog_channel,
            action_embed(&message.author, me, burst.action(), None),
        )
        .await;
    }

    Ok(false)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invites_are_found_anywhere() {
        assert!(contains_invite("join us at discord.gg/teaparty"));
        assert!(contains_invite("https://DISCORD.COM/invite/abc-123 !"));
        assert!(!contains_invite("discord.gg/"));
        assert!(!contains_invite("https://discord.com/channels/1/2/3"));
    }

    #[test]
    fn mass_mentions_need_a_user() {
        assert!(is_mass_mention(6, 0, 6));
        assert!(is_mass_mention(1, 5, 6));
        assert!(!is_mass_mention(0, 10, 6));
        assert!(!is_mass_mention(3, 2, 6));
    }

    #[test]
    fn invites_take_priority() {
        let config = AutomodConfig::default();

        assert_eq!(
            find_violation("discord.gg/abc", 10, 0, &config),
            Some(Violation::Invite)
        );
        assert_eq!(
            find_violation("hey", 10, 0, &config),
            Some(Violation::MassMention)
        );
        assert_eq!(find_violation("hey", 1, 0, &config), None);
    }

    #[test]
    fn disabled_filters_let_everything_through() {
        let config = AutomodConfig {
            block_invites: false,
            block_mass_mentions: false,
            ..Default::default()
        };

        assert_eq!(find_violation("discord.gg/abc", 10, 10, &config), None);
    }

    #[test]
    fn notices_mention_the_author() {
        assert_eq!(
            Violation::Invite.notice("<@1>"),
            "<@1> Discord invites aren’t allowed here."
        );
        assert_eq!(
            Violation::MassMention.notice("<@1>"),
            "<@1> that’s a few too many mentions."
        );
    }
}
