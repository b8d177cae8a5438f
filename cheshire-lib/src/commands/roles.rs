use crate::{commands::is_mod, data::PoiseContext, roles::menu, utils::SendReplyEphemeral};
use cheshire_traits::ForwardRefToTracing;
use color_eyre::eyre::{Result, WrapErr};
use poise::serenity_prelude::{Colour, CreateEmbed, CreateMessage, ReactionType};

const MENU_COLOUR: Colour = Colour::new(0x5865F2);

/// Post the reaction role menu
#[poise::command(slash_command, guild_only, check = is_mod)]
pub async fn post_roles(ctx: PoiseContext<'_>) -> Result<()> {
    let roles = ctx.data().config.read().await.roles.clone();

    if roles.channel_id != Some(ctx.channel_id()) {
        return ctx
            .reply_ephemeral("Run this in the pick-your-roles channel.")
            .await;
    }

    ctx.defer_ephemeral().await?;

    let embed = CreateEmbed::new()
        .title("Choose your chaos")
        .description(menu(&roles.reactions))
        .colour(MENU_COLOUR);

    let posted = ctx
        .channel_id()
        .send_message(ctx, CreateMessage::new().embed(embed))
        .await
        .wrap_err("Failed to post role menu")?;

    for offered in &roles.reactions {
        let Ok(emoji) = ReactionType::try_from(offered.emoji.as_str()) else {
            tracing::warn!("`{}` is not an emoji, skipping", offered.emoji);
            continue;
        };

        posted
            .react(ctx, emoji)
            .await
            .trace_warn_ok(&format!("Could not react with {}", offered.emoji));
    }

    ctx.reply_ephemeral("Role menus posted.").await
}
