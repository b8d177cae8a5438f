use crate::utils::shorten;
use cheshire_traits::ForwardRefToTracing;
use color_eyre::eyre::WrapErr;
use poise::serenity_prelude::{
    CacheHttp, ChannelId, Colour, CreateEmbed, CreateMessage, Mentionable, Timestamp, User, UserId,
};

const MAX_REASON_CHARS: usize = 1000;
pub const ACTION_RED: Colour = Colour::new(0xED4245);

/// Posts `embed` to the mod-log channel, if one is configured. Failures are
/// only logged.
pub async fn modlog(ctx: impl CacheHttp, channel_id: Option<ChannelId>, embed: CreateEmbed) {
    let Some(channel_id) = channel_id else {
        return;
    };

    channel_id
        .send_message(ctx, CreateMessage::new().embed(embed))
        .await
        .wrap_err("Failed to post to the mod log")
        .trace_err_ok();
}

/// The red "something happened to someone" embed.
pub fn action_embed(user: &User, actor: UserId, action: &str, reason: Option<&str>) -> CreateEmbed {
    let embed = CreateEmbed::new()
        .title(action)
        .colour(ACTION_RED)
        .timestamp(Timestamp::now());

    let actor = format!("{} ({})", actor.mention(), actor);

    action_fields(&user.mention().to_string(), user.id.get(), &actor, reason)
        .into_iter()
        .fold(embed, |embed, (name, value)| embed.field(name, value, false))
}

fn action_fields(
    mention: &str,
    user_id: u64,
    actor: &str,
    reason: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("User", format!("{mention} ({user_id})")),
        ("By", actor.to_owned()),
    ];

    if let Some(reason) = reason.filter(|reason| !reason.trim().is_empty()) {
        fields.push(("Reason", shorten(reason, MAX_REASON_CHARS)));
    }

    fields
}
