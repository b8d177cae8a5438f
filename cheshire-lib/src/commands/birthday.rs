use crate::{
    birthday::{
        SAVED_PRIVATELY, day_month, guest_list, guest_mentions, ledger, parse_day_month,
        saved_message,
    },
    data::PoiseContext,
    permissions::{Standing, has_any_role},
    utils::{SendReplyEphemeral, shorten},
};
use cheshire_traits::ForwardRefToTracing;
use color_eyre::eyre::{OptionExt, Result, WrapErr};
use poise::serenity_prelude::{Mentionable, UserId};

/// Discord's message length limit.
const MAX_MESSAGE_CHARS: usize = 2000;

/// Manage birthdays
#[poise::command(
    slash_command,
    guild_only,
    subcommands("set", "check", "today"),
    subcommand_required
)]
pub async fn birthday(_ctx: PoiseContext<'_>) -> Result<()> {
    Ok(())
}

/// Set your birthday (DD/MM)
#[poise::command(slash_command, guild_only)]
pub async fn set(
    ctx: PoiseContext<'_>,
    #[description = "Your birthday as DD/MM"] date: String,
) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or_eyre("No guild ID?")?;

    let set_channel = ctx.data().config.read().await.birthday.set_channel_id;
    if set_channel != Some(ctx.channel_id()) {
        return ctx
            .reply_ephemeral("Use this in the birthday channel.")
            .await;
    }

    let Some(birthday) = parse_day_month(&date) else {
        return ctx
            .reply_ephemeral("Format must be **DD/MM** (e.g. 07/04).")
            .await;
    };

    ctx.data()
        .birthdays
        .set(guild_id.get(), ctx.author().id.get(), birthday)?;

    tracing::info!(
        "{} set their birthday to {}",
        ctx.author().tag(),
        day_month(birthday)
    );

    ctx.reply_ephemeral(SAVED_PRIVATELY).await?;

    ctx.channel_id()
        .say(ctx, saved_message(&ctx.author().mention().to_string()))
        .await
        .wrap_err("Failed to post birthday confirmation")
        .trace_err_ok();

    Ok(())
}

/// List known birthdays in this server
#[poise::command(slash_command, guild_only)]
pub async fn check(ctx: PoiseContext<'_>) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or_eyre("No guild ID?")?;
    let birthdays = ctx.data().birthdays.in_guild(guild_id.get())?;

    let entries = {
        let guild = ctx.guild().ok_or_eyre("Guild not cached")?;

        birthdays
            .into_iter()
            .filter_map(|(user_id, birthday)| {
                guild
                    .members
                    .get(&UserId::new(user_id))
                    .map(|member| (member.display_name().to_owned(), birthday))
            })
            .collect::<Vec<_>>()
    };

    ctx.say(shorten(&ledger(&entries), MAX_MESSAGE_CHARS))
        .await?;

    Ok(())
}

/// Show today’s birthdays (staff only)
#[poise::command(slash_command, guild_only)]
pub async fn today(ctx: PoiseContext<'_>) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or_eyre("No guild ID?")?;

    let (staff_channel, staff_role, timezone) = {
        let config = ctx.data().config.read().await;
        (
            config.birthday.staff_channel_id,
            config.birthday.staff_role_name.clone(),
            config.birthday.timezone,
        )
    };

    if staff_channel != Some(ctx.channel_id()) {
        return ctx.reply_ephemeral("Wrong channel.").await;
    }

    let is_rabbit = match ctx.author_member().await {
        Some(member) => Standing::of(ctx.cache(), &member)
            .is_some_and(|standing| has_any_role(&standing.role_names, &[staff_role])),
        None => false,
    };

    if !is_rabbit {
        return ctx.reply_ephemeral("Not enough rabbit.").await;
    }

    let mentions = guest_mentions(ctx.serenity_context(), ctx.data(), guild_id, timezone)?;

    ctx.say(shorten(&guest_list(&mentions), MAX_MESSAGE_CHARS))
        .await?;

    Ok(())
}
