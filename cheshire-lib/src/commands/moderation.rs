use crate::{
    commands::is_mod,
    data::PoiseContext,
    modlog::{action_embed, modlog},
    utils::SendReplyEphemeral,
};
use cheshire_traits::ForwardRefToTracing;
use color_eyre::eyre::{OptionExt, Result, WrapErr};
use poise::serenity_prelude::{
    EditChannel, EditMember, GetMessages, Member, Mentionable, Message, MessageId,
    PermissionOverwrite, PermissionOverwriteType, Permissions, Timestamp, User,
};
use std::time::Duration;

/// Discord refuses to bulk delete anything older than this.
const BULK_DELETE_MAX_AGE: Duration = Duration::from_secs(14 * 24 * 60 * 60);
const QUICK_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// The user and text filters of `/purge`, all optional.
struct PurgeFilter<'a> {
    user: Option<&'a User>,
    contains: Option<String>,
}

impl<'a> PurgeFilter<'a> {
    fn new(user: Option<&'a User>, contains: Option<&str>) -> Self {
        Self {
            user,
            contains: contains
                .filter(|text| !text.is_empty())
                .map(str::to_lowercase),
        }
    }

    fn matches(&self, message: &Message) -> bool {
        self.user.is_none_or(|user| message.author.id == user.id)
            && self
                .contains
                .as_ref()
                .is_none_or(|text| message.content.to_lowercase().contains(text))
    }
}

/// Delete recent messages, optionally only from one user or containing some text
#[poise::command(slash_command, guild_only, check = is_mod)]
pub async fn purge(
    ctx: PoiseContext<'_>,
    #[description = "How many to scan (max 200)"]
    #[min = 1]
    #[max = 200]
    count: u8,
    #[description = "Only delete messages from this user"] user: Option<User>,
    #[description = "Only delete messages containing this text"] contains: Option<String>,
) -> Result<()> {
    ctx.defer_ephemeral().await?;

    let channel_id = ctx.channel_id();
    let filter = PurgeFilter::new(user.as_ref(), contains.as_deref());
    let oldest_allowed = Timestamp::now().unix_timestamp() - BULK_DELETE_MAX_AGE.as_secs() as i64;

    let mut scanned = 0;
    let mut before: Option<MessageId> = None;
    let mut doomed = Vec::new();

    while scanned < count {
        let mut query = GetMessages::new().limit((count - scanned).min(100));
        if let Some(before) = before {
            query = query.before(before);
        }

        let page = channel_id
            .messages(ctx, query)
            .await
            .wrap_err("Failed to fetch channel history")?;

        let Some(last) = page.last() else {
            break;
        };
        before = Some(last.id);
        scanned += page.len() as u8;

        doomed.extend(
            page.iter()
                .filter(|message| message.timestamp.unix_timestamp() > oldest_allowed)
                .filter(|message| filter.matches(message))
                .map(|message| message.id),
        );
    }

    let mut deleted = 0;
    for chunk in doomed.chunks(100) {
        if channel_id
            .delete_messages(ctx, chunk)
            .await
            .wrap_err("Failed to delete messages")
            .trace_warn_ok("Purge")
            .is_none()
        {
            return ctx
                .reply_ephemeral(format!(
                    "Deleted {deleted} messages before I was stopped. Do I have permission to delete messages here?"
                ))
                .await;
        }
        deleted += chunk.len();
    }

    tracing::info!(
        "{} purged {} messages in {}",
        ctx.author().tag(),
        deleted,
        channel_id
    );

    ctx.reply_ephemeral(format!("Deleted {deleted} messages.")).await
}

/// Set channel slowmode in seconds, 0 to clear it
#[poise::command(slash_command, guild_only, check = is_mod)]
pub async fn slowmode(
    ctx: PoiseContext<'_>,
    #[description = "Seconds between messages (max 6 hours)"]
    #[min = 0]
    #[max = 21600]
    seconds: u16,
) -> Result<()> {
    if ctx
        .channel_id()
        .edit(ctx, EditChannel::new().rate_limit_per_user(seconds))
        .await
        .wrap_err("Failed to set slowmode")
        .trace_warn_ok("Slowmode")
        .is_none()
    {
        return ctx
            .reply_ephemeral("I don’t have permission to change slowmode here.")
            .await;
    }

    match seconds {
        0 => ctx.reply_ephemeral("Slowmode cleared.").await,
        seconds => {
            ctx.reply_ephemeral(format!("Slowmode set to {seconds} seconds."))
                .await
        }
    }
}

/// Lock this channel for @everyone
#[poise::command(slash_command, guild_only, check = is_mod)]
pub async fn lock(ctx: PoiseContext<'_>) -> Result<()> {
    set_lock(ctx, true).await
}

/// Unlock this channel for @everyone
#[poise::command(slash_command, guild_only, check = is_mod)]
pub async fn unlock(ctx: PoiseContext<'_>) -> Result<()> {
    set_lock(ctx, false).await
}

/// `@everyone`'s overwrite with only SEND_MESSAGES changed. Locked means
/// denied, unlocked means explicitly allowed.
fn toggle_send_messages(
    existing: Option<&PermissionOverwrite>,
    everyone: PermissionOverwriteType,
    lock: bool,
) -> PermissionOverwrite {
    let (mut allow, mut deny) = existing.map_or_else(
        || (Permissions::empty(), Permissions::empty()),
        |overwrite| (overwrite.allow, overwrite.deny),
    );

    if lock {
        allow.remove(Permissions::SEND_MESSAGES);
        deny.insert(Permissions::SEND_MESSAGES);
    } else {
        deny.remove(Permissions::SEND_MESSAGES);
        allow.insert(Permissions::SEND_MESSAGES);
    }

    PermissionOverwrite {
        allow,
        deny,
        kind: everyone,
    }
}

async fn set_lock(ctx: PoiseContext<'_>, lock: bool) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or_eyre("No guild ID?")?;
    let channel = ctx
        .channel_id()
        .to_channel(ctx)
        .await?
        .guild()
        .ok_or_eyre("Not in a guild channel")?;
    let everyone = PermissionOverwriteType::Role(guild_id.everyone_role());

    let existing = channel
        .permission_overwrites
        .iter()
        .find(|overwrite| overwrite.kind == everyone);
    let overwrite = toggle_send_messages(existing, everyone, lock);

    if channel
        .create_permission(ctx, overwrite)
        .await
        .wrap_err("Failed to edit channel permissions")
        .trace_warn_ok("Lock")
        .is_none()
    {
        return ctx
            .reply_ephemeral("I don’t have permission to adjust channel permissions.")
            .await;
    }

    tracing::info!(
        "{} {} {}",
        ctx.author().tag(),
        if lock { "locked" } else { "unlocked" },
        channel.name
    );

    if lock {
        ctx.reply_ephemeral("Channel locked for @everyone.").await
    } else {
        ctx.reply_ephemeral("Channel unlocked for @everyone.").await
    }
}

/// Time out a member for 10 minutes
#[poise::command(slash_command, guild_only, check = is_mod)]
pub async fn quick_timeout(
    ctx: PoiseContext<'_>,
    #[description = "Member to put on a 10 minute timeout"] member: Member,
) -> Result<()> {
    let guild_id = ctx.guild_id().ok_or_eyre("No guild ID?")?;
    let timeout_end = chrono::Utc::now() + QUICK_TIMEOUT;

    if guild_id
        .edit_member(
            ctx,
            member.user.id,
            EditMember::new()
                .disable_communication_until(timeout_end.to_rfc3339())
                .audit_log_reason("Quick 10m timeout"),
        )
        .await
        .wrap_err("Failed to edit member")
        .trace_warn_ok("Quick timeout")
        .is_none()
    {
        return ctx
            .reply_ephemeral("I lack permission to timeout that member.")
            .await;
    }

    tracing::info!(
        "{} timed out {} until {}",
        ctx.author().tag(),
        member.user.tag(),
        timeout_end
    );

    ctx.say(format!(
        "🫖 Time-out tea is served, {}. Back in 10m.",
        member.mention()
    ))
    .await?;

    let modlog_channel = ctx.data().config.read().await.modlog_channel_id;
    modlog(
        ctx,
        modlog_channel,
        action_embed(&member.user, ctx.author().id, "Timeout 10m", None),
    )
    .await;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use poise::serenity_prelude::RoleId;

    #[test]
    fn locking_only_touches_send_messages() {
        let everyone = PermissionOverwriteType::Role(RoleId::new(1));
        let existing = PermissionOverwrite {
            allow: Permissions::SEND_MESSAGES | Permissions::ADD_REACTIONS,
            deny: Permissions::ATTACH_FILES,
            kind: everyone,
        };

        let locked = toggle_send_messages(Some(&existing), everyone, true);
        assert_eq!(locked.allow, Permissions::ADD_REACTIONS);
        assert_eq!(
            locked.deny,
            Permissions::ATTACH_FILES | Permissions::SEND_MESSAGES
        );

        let unlocked = toggle_send_messages(Some(&locked), everyone, false);
        assert_eq!(
            unlocked.allow,
            Permissions::ADD_REACTIONS | Permissions::SEND_MESSAGES
        );
        assert_eq!(unlocked.deny, Permissions::ATTACH_FILES);
    }

    #[test]
    fn locking_without_an_overwrite_creates_one() {
        let everyone = PermissionOverwriteType::Role(RoleId::new(1));
        let locked = toggle_send_messages(None, everyone, true);

        assert_eq!(locked.allow, Permissions::empty());
        assert_eq!(locked.deny, Permissions::SEND_MESSAGES);
    }
}
