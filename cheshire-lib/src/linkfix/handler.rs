use super::{
    gate::{self, Origin, Verdict},
    pipeline,
    repost::DiscordReposter,
};
use crate::data::State;
use color_eyre::eyre::{OptionExt, Result};
use poise::serenity_prelude::{Context, Message};

/// Fixes Twitter/X/Reddit links and re-uploads Instagram/Facebook media for
/// messages in allow-listed channels.
///
/// Everything up to the first repost is answered from the message text and
/// the cache.
#[tracing::instrument(skip_all, fields(message_link = %message.link()))]
pub async fn fix_links(ctx: &Context, data: &State, message: &Message) -> Result<()> {
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };

    if gate::is_automated(message.author.bot, message.webhook_id)
        || !gate::has_fixable_links(&message.content)
    {
        return Ok(());
    }

    let me = ctx.cache.current_user().id;

    let (origin, verdict) = {
        let Some(guild) = ctx.cache.guild(guild_id) else {
            tracing::debug!("Guild {} not cached, not fixing links", guild_id);
            return Ok(());
        };

        let Some(origin) = guild
            .channels
            .get(&message.channel_id)
            .or_else(|| {
                guild
                    .threads
                    .iter()
                    .find(|thread| thread.id == message.channel_id)
            })
            .map(Origin::of)
        else {
            tracing::debug!("Channel {} not cached, not fixing links", message.channel_id);
            return Ok(());
        };

        let verdict = gate::check(&data.linkfix, origin, || {
            let home = guild
                .channels
                .get(&origin.home())
                .ok_or_eyre("channel not cached")?;
            let member = guild.members.get(&me).ok_or_eyre("own member not cached")?;

            Ok(guild.user_permissions_in(home, member))
        });

        (origin, verdict)
    };

    let permissions = match verdict {
        Verdict::Proceed(permissions) => permissions,
        Verdict::NotAllowListed => return Ok(()),
        Verdict::CannotDelete => {
            tracing::debug!("Missing MANAGE_MESSAGES in {}, not fixing links", origin.home());
            return Ok(());
        }
    };

    let reposter = DiscordReposter::new(
        ctx,
        message,
        origin,
        permissions,
        &data.webhooks,
        &data.linkfix.webhook_name,
    );

    let outcome = pipeline::run(&message.content, &data.media, &reposter).await;

    if outcome.reposted() {
        tracing::info!(
            "Reposted {} for {} ({} media, text: {}, deleted: {})",
            message.link(),
            message.author.tag(),
            outcome.media_reposted,
            outcome.text_reposted,
            outcome.deleted
        );
    }

    Ok(())
}
