use crate::{commands::is_admin, data::PoiseContext, utils::SendReplyEphemeral};
use color_eyre::eyre::Result;

/// Check the bot is alive
#[poise::command(slash_command, guild_only, check = is_admin)]
pub async fn ping(ctx: PoiseContext<'_>) -> Result<()> {
    ctx.reply_ephemeral("Pong! 🏓").await
}
