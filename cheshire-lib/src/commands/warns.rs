use crate::{
    commands::is_mod,
    data::PoiseContext,
    modlog::{action_embed, modlog},
    permissions::Standing,
    utils::{SendReplyEphemeral, shorten},
};
use cheshire_db::Warn;
use cheshire_traits::ForwardRefToTracing;
use color_eyre::eyre::{OptionExt, Result};
use itertools::Itertools;
use poise::{
    CreateReply,
    serenity_prelude::{Colour, CreateEmbed, CreateEmbedFooter, CreateMessage, Member, Mentionable},
};

const MAX_LISTING_CHARS: usize = 4000;

fn reason_or_default(reason: &str) -> &str {
    match reason.trim() {
        "" => "No reason provided.",
        reason => reason,
    }
}

fn confirmation(mention: &str, count: usize, reason: &str) -> String {
    format!("🌹 Careful where you paint, {mention}. Warning noted. (Warn #{count}: {reason})")
}

fn listing(warns: &[Warn]) -> String {
    let lines = warns
        .iter()
        .enumerate()
        .map(|(i, warn)| format!("**#{}** – {} *(by <@{}>)*", i + 1, warn.reason, warn.actor))
        .join("\n");

    shorten(&lines, MAX_LISTING_CHARS)
}

/// Warn a member and keep a record of it
#[poise::command(slash_command, guild_only, check = is_mod)]
pub async fn warn(
    ctx: PoiseContext<'_>,
    #[description = "Member to warn"] member: Member,
    #[description = "Reason for the warning"] reason: String,
) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or_eyre("No guild ID?")?;

    if member.user.bot {
        return ctx.reply_ephemeral("You can’t warn bots.").await;
    }

    let admin_role_names = ctx.data().config.read().await.admin_role_names.clone();
    if Standing::of(ctx.cache(), &member).is_some_and(|standing| standing.is_mod(&admin_role_names))
    {
        return ctx
            .reply_ephemeral("That member is considered staff / immune and cannot be warned.")
            .await;
    }

    if member.user.id == ctx.author().id {
        return ctx.reply_ephemeral("You can’t warn yourself.").await;
    }

    let reason = reason_or_default(&reason);
    let count = ctx.data().warns.add(
        guild_id.get(),
        member.user.id.get(),
        &Warn {
            reason: reason.to_owned(),
            actor: ctx.author().id.get(),
        },
    )?;

    tracing::info!(
        "{} warned {} (#{}): {}",
        ctx.author().tag(),
        member.user.tag(),
        count,
        reason
    );

    ctx.say(confirmation(&member.mention().to_string(), count, reason))
        .await?;

    let guild_name = ctx
        .guild()
        .map(|guild| guild.name.clone())
        .unwrap_or_else(|| "the server".to_owned());

    member
        .user
        .direct_message(
            ctx,
            CreateMessage::new().content(format!(
                "You have received a warning in **{guild_name}**:\nReason: {reason}\nTotal warns: {count}"
            )),
        )
        .await
        .trace_warn_ok("Could not DM warned member");

    let modlog_channel = ctx.data().config.read().await.modlog_channel_id;
    modlog(
        ctx,
        modlog_channel,
        action_embed(&member.user, ctx.author().id, &format!("Warn #{count}"), Some(reason)),
    )
    .await;

    Ok(())
}

/// Show a member's warnings
#[poise::command(slash_command, guild_only, check = is_mod)]
pub async fn warnings(
    ctx: PoiseContext<'_>,
    #[description = "Member whose warnings to show"] member: Member,
) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or_eyre("No guild ID?")?;
    let warns = ctx.data().warns.get(guild_id.get(), member.user.id.get())?;

    if warns.is_empty() {
        return ctx
            .reply_ephemeral(format!("{} has no stored warnings.", member.mention()))
            .await;
    }

    let embed = CreateEmbed::new()
        .title(format!("Warnings for {}", member.user.tag()))
        .description(listing(&warns))
        .colour(Colour::ORANGE)
        .footer(CreateEmbedFooter::new(format!("Total warns: {}", warns.len())));

    ctx.send(CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Forget all of a member's warnings
#[poise::command(slash_command, guild_only, check = is_mod)]
pub async fn clearwarns(
    ctx: PoiseContext<'_>,
    #[description = "Member whose warnings to clear"] member: Member,
) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or_eyre("No guild ID?")?;
    let count = ctx.data().warns.clear(guild_id.get(), member.user.id.get())?;

    if count == 0 {
        return ctx
            .reply_ephemeral(format!("{} has no stored warnings.", member.mention()))
            .await;
    }

    ctx.reply_ephemeral(format!(
        "Cleared **{count}** warning(s) for {}.",
        member.mention()
    ))
    .await?;

    let modlog_channel = ctx.data().config.read().await.modlog_channel_id;
    modlog(
        ctx,
        modlog_channel,
        action_embed(
            &member.user,
            ctx.author().id,
            "Cleared warns",
            Some(&format!("{count} warn(s) cleared.")),
        ),
    )
    .await;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blank_reasons_get_a_default() {
        assert_eq!(reason_or_default("   "), "No reason provided.");
        assert_eq!(reason_or_default(" painting roses "), "painting roses");
    }

    #[test]
    fn confirmation_counts_the_warn() {
        assert_eq!(
            confirmation("<@7>", 2, "painting roses"),
            "🌹 Careful where you paint, <@7>. Warning noted. (Warn #2: painting roses)"
        );
    }

    #[test]
    fn listing_numbers_from_one() {
        let warns = vec![
            Warn {
                reason: "white roses".to_owned(),
                actor: 9,
            },
            Warn {
                reason: "late for tea".to_owned(),
                actor: 10,
            },
        ];

        assert_eq!(
            listing(&warns),
            "**#1** – white roses *(by <@9>)*\n**#2** – late for tea *(by <@10>)*"
        );
    }

    #[test]
    fn long_listings_are_cut() {
        let warns = vec![
            Warn {
                reason: "x".repeat(300),
                actor: 1,
            };
            20
        ];

        assert_eq!(listing(&warns).chars().count(), MAX_LISTING_CHARS);
    }
}
