use crate::{
    config::AuditConfig,
    data::State,
    modlog::{ACTION_RED, modlog},
    utils::shorten,
};
use ahash::AHashMap;
use color_eyre::eyre::Result;
use itertools::Itertools;
use parking_lot::Mutex;
use poise::serenity_prelude::{
    ChannelId, Colour, Context, CreateEmbed, GuildId, Mentionable, Message, MessageId,
    MessageUpdateEvent, Timestamp, UserId,
    model::guild::audit_log::{Action, MessageAction},
};
use std::collections::VecDeque;

const MAX_DELETED_CHARS: usize = 1900;
const MAX_EDITED_CHARS: usize = 900;
const MAX_FIELD_CHARS: usize = 1024;
const LISTED_ATTACHMENTS: usize = 5;
/// Audit log entries older than this are not about the deletion at hand.
const DELETER_WINDOW_SECS: i64 = 15;

/// What the journal remembers about a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub author_id: UserId,
    pub channel_id: ChannelId,
    pub content: String,
    pub attachments: Vec<String>,
    pub created_at: i64,
}

impl Snapshot {
    pub fn of(message: &Message) -> Self {
        Self {
            author_id: message.author.id,
            channel_id: message.channel_id,
            content: message.content.clone(),
            attachments: message
                .attachments
                .iter()
                .map(|attachment| attachment.filename.clone())
                .collect(),
            created_at: message.id.created_at().unix_timestamp(),
        }
    }
}

#[derive(Default)]
struct Entries {
    snapshots: AHashMap<MessageId, Snapshot>,
    /// Oldest first. May hold ids that were already taken.
    order: VecDeque<MessageId>,
}

/// The last `capacity` messages, kept so edits and deletions can show what
/// was there before. Discord only sends ids for deletions.
pub struct MessageJournal {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl MessageJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn record(&self, id: MessageId, snapshot: Snapshot) {
        if self.capacity == 0 {
            return;
        }

        let mut entries = self.entries.lock();

        if entries.snapshots.insert(id, snapshot).is_none() {
            entries.order.push_back(id);
        }

        while entries.snapshots.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.snapshots.remove(&oldest);
        }

        if entries.order.len() > self.capacity * 2 {
            let Entries { snapshots, order } = &mut *entries;
            order.retain(|id| snapshots.contains_key(id));
        }
    }

    /// Swaps in the edited content and returns the snapshot as it was.
    pub fn edit(&self, id: MessageId, content: &str) -> Option<Snapshot> {
        let mut entries = self.entries.lock();
        let snapshot = entries.snapshots.get_mut(&id)?;
        let before = snapshot.clone();
        content.clone_into(&mut snapshot.content);

        Some(before)
    }

    pub fn take(&self, id: MessageId) -> Option<Snapshot> {
        self.entries.lock().snapshots.remove(&id)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().snapshots.len()
    }
}

/// Messages in the mod-log channel, or in threads under it, are never
/// logged.
pub fn is_log_channel(
    channel_id: ChannelId,
    parent_id: Option<ChannelId>,
    modlog_channel: ChannelId,
) -> bool {
    channel_id == modlog_channel || parent_id == Some(modlog_channel)
}

fn code_block(text: &str, max_chars: usize) -> String {
    let text = match text.trim() {
        "" => "*no content*",
        _ => text,
    };

    format!("```{}```", shorten(text, max_chars))
}

/// The first few file names, then how many were left out.
pub fn attachment_summary(names: &[String]) -> Option<String> {
    if names.is_empty() {
        return None;
    }

    let mut summary = names.iter().take(LISTED_ATTACHMENTS).join(", ");
    if names.len() > LISTED_ATTACHMENTS {
        summary.push_str(&format!(" (+{} more)", names.len() - LISTED_ATTACHMENTS));
    }

    Some(shorten(&summary, MAX_FIELD_CHARS))
}

fn author_field(author_id: UserId) -> String {
    format!("{} (`{}`)", author_id.mention(), author_id)
}

/// `(name, value, inline)` fields of the deletion embed.
pub fn deleted_fields(
    snapshot: &Snapshot,
    message_id: MessageId,
    deleted_by: Option<UserId>,
) -> Vec<(&'static str, String, bool)> {
    let mut fields = vec![
        ("Author", author_field(snapshot.author_id), true),
        ("Channel", snapshot.channel_id.mention().to_string(), true),
        ("Message ID", format!("`{message_id}`"), true),
    ];

    if let Some(attachments) = attachment_summary(&snapshot.attachments) {
        fields.push(("Attachments", attachments, false));
    }

    let deleted_by = match deleted_by {
        Some(actor) => format!("{} ({})", actor.mention(), actor),
        None => "Unknown / self-delete".to_owned(),
    };
    fields.push(("Deleted by", deleted_by, true));
    fields.push(("Created at", format!("<t:{}:F>", snapshot.created_at), true));

    fields
}

pub fn edit_description(before: &str, after: &str) -> String {
    format!(
        "**Before:**\n{}\n**After:**\n{}",
        code_block(before, MAX_EDITED_CHARS),
        code_block(after, MAX_EDITED_CHARS)
    )
}

pub fn edited_fields(
    author_id: UserId,
    channel_id: ChannelId,
    message_id: MessageId,
    link: &str,
) -> Vec<(&'static str, String, bool)> {
    vec![
        ("Author", author_field(author_id), true),
        ("Channel", channel_id.mention().to_string(), true),
        ("Message ID", format!("`{message_id}`"), true),
        ("Jump", format!("[Jump to message]({link})"), false),
    ]
}

/// One message-delete entry of the guild's audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteRecord {
    pub actor: UserId,
    pub author: Option<UserId>,
    pub channel_id: Option<ChannelId>,
    pub age_secs: i64,
}

/// Who most likely deleted someone else's message. Self-deletes leave no
/// audit log entry, so `None` usually means the author did it.
pub fn deleter(records: &[DeleteRecord], author: UserId, channel_id: ChannelId) -> Option<UserId> {
    records
        .iter()
        .filter(|record| record.age_secs <= DELETER_WINDOW_SECS)
        .filter(|record| record.author == Some(author))
        .find(|record| record.channel_id.is_none_or(|channel| channel == channel_id))
        .map(|record| record.actor)
}

async fn find_deleter(ctx: &Context, guild_id: GuildId, snapshot: &Snapshot) -> Option<UserId> {
    let logs = match guild_id
        .audit_logs(
            ctx,
            Some(Action::Message(MessageAction::Delete)),
            None,
            None,
            Some(6),
        )
        .await
    {
        Ok(logs) => logs,
        Err(e) => {
            tracing::debug!("Audit log unavailable: {:?}", e);
            return None;
        }
    };

    let now = Timestamp::now().unix_timestamp();
    let records = logs
        .entries
        .iter()
        .map(|entry| DeleteRecord {
            actor: entry.user_id,
            author: entry.target_id.map(|id| UserId::new(id.get())),
            channel_id: entry.options.as_ref().and_then(|options| options.channel_id),
            age_secs: now - entry.id.created_at().unix_timestamp(),
        })
        .collect::<Vec<_>>();

    deleter(&records, snapshot.author_id, snapshot.channel_id)
}

fn embed_with(embed: CreateEmbed, fields: Vec<(&'static str, String, bool)>) -> CreateEmbed {
    fields
        .into_iter()
        .fold(embed, |embed, (name, value, inline)| embed.field(name, value, inline))
}

/// The mod-log channel, unless logging is off or the message lives in it.
async fn log_target(
    ctx: &Context,
    data: &State,
    guild_id: GuildId,
    channel_id: ChannelId,
    enabled: impl FnOnce(&AuditConfig) -> bool,
) -> Option<ChannelId> {
    let modlog_channel = {
        let config = data.config.read().await;
        config
            .modlog_channel_id
            .filter(|_| config.guild_id == guild_id.get() && enabled(&config.audit))?
    };

    let parent_id = ctx.cache.guild(guild_id).and_then(|guild| {
        guild
            .threads
            .iter()
            .find(|thread| thread.id == channel_id)
            .and_then(|thread| thread.parent_id)
    });

    (!is_log_channel(channel_id, parent_id, modlog_channel)).then_some(modlog_channel)
}

/// Remembers a member's guild message for later edit and delete logs.
pub fn remember(data: &State, message: &Message) {
    if message.guild_id.is_none() || message.author.bot {
        return;
    }

    data.journal.record(message.id, Snapshot::of(message));
}

#[tracing::instrument(skip_all, fields(message_id = %event.id))]
pub async fn log_edit(
    ctx: &Context,
    data: &State,
    old_if_available: Option<&Message>,
    event: &MessageUpdateEvent,
) -> Result<()> {
    let Some(guild_id) = event.guild_id else {
        return Ok(());
    };

    // Embed resolution also sends updates, without content.
    let Some(after) = event.content.as_deref() else {
        return Ok(());
    };

    if event.author.as_ref().is_some_and(|author| author.bot) {
        return Ok(());
    }

    let before = data
        .journal
        .edit(event.id, after)
        .or_else(|| old_if_available.map(Snapshot::of));

    let Some(before) = before else {
        tracing::debug!("Edited message was not remembered");
        return Ok(());
    };

    if before.content == after {
        return Ok(());
    }

    let Some(modlog_channel) =
        log_target(ctx, data, guild_id, event.channel_id, |audit| audit.log_edits).await
    else {
        return Ok(());
    };

    let embed = CreateEmbed::new()
        .title("✏️ Message edited")
        .description(edit_description(&before.content, after))
        .colour(Colour::ORANGE)
        .timestamp(Timestamp::now());

    let fields = edited_fields(
        before.author_id,
        event.channel_id,
        event.id,
        &event.id.link(event.channel_id, Some(guild_id)),
    );

    modlog(ctx, Some(modlog_channel), embed_with(embed, fields)).await;

    Ok(())
}

#[tracing::instrument(skip(ctx, data))]
pub async fn log_delete(
    ctx: &Context,
    data: &State,
    guild_id: Option<GuildId>,
    channel_id: ChannelId,
    message_id: MessageId,
) -> Result<()> {
    let Some(snapshot) = data.journal.take(message_id) else {
        return Ok(());
    };

    let Some(guild_id) = guild_id else {
        return Ok(());
    };

    let Some(modlog_channel) =
        log_target(ctx, data, guild_id, channel_id, |audit| audit.log_deletes).await
    else {
        return Ok(());
    };

    let deleted_by = find_deleter(ctx, guild_id, &snapshot).await;

    let embed = CreateEmbed::new()
        .title("🗑 Message deleted")
        .description(code_block(&snapshot.content, MAX_DELETED_CHARS))
        .colour(ACTION_RED)
        .timestamp(Timestamp::now());

    let fields = deleted_fields(&snapshot, message_id, deleted_by);

    modlog(ctx, Some(modlog_channel), embed_with(embed, fields)).await;

    Ok(())
}

/// Bulk deletions come from `/purge` and are already in the mod log.
pub fn forget(data: &State, message_ids: &[MessageId]) {
    for message_id in message_ids {
        data.journal.take(*message_id);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ALICE: UserId = UserId::new(1);
    const QUEEN: UserId = UserId::new(2);
    const GARDEN: ChannelId = ChannelId::new(10);
    const LOG: ChannelId = ChannelId::new(20);

    fn snapshot(content: &str) -> Snapshot {
        Snapshot {
            author_id: ALICE,
            channel_id: GARDEN,
            content: content.to_owned(),
            attachments: Vec::new(),
            created_at: 1_700_000_000,
        }
    }

    fn names(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("rose{i}.png")).collect()
    }

    #[test]
    fn journal_forgets_the_oldest() {
        let journal = MessageJournal::new(2);

        journal.record(MessageId::new(1), snapshot("one"));
        journal.record(MessageId::new(2), snapshot("two"));
        journal.record(MessageId::new(3), snapshot("three"));

        assert_eq!(journal.len(), 2);
        assert_eq!(journal.take(MessageId::new(1)), None);
        assert_eq!(journal.take(MessageId::new(3)), Some(snapshot("three")));
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn journal_tracks_edits() {
        let journal = MessageJournal::new(10);
        journal.record(MessageId::new(1), snapshot("white roses"));

        let before = journal.edit(MessageId::new(1), "red roses").unwrap();
        assert_eq!(before.content, "white roses");
        assert_eq!(
            journal.take(MessageId::new(1)).unwrap().content,
            "red roses"
        );
        assert_eq!(journal.edit(MessageId::new(2), "anything"), None);
    }

    #[test]
    fn journal_stays_bounded_through_deletes() {
        let journal = MessageJournal::new(3);

        for id in 1..=50 {
            journal.record(MessageId::new(id), snapshot("tea"));
            journal.take(MessageId::new(id));
        }

        assert_eq!(journal.len(), 0);
        assert!(journal.entries.lock().order.len() <= 6);
    }

    #[test]
    fn empty_journal_records_nothing() {
        let journal = MessageJournal::new(0);
        journal.record(MessageId::new(1), snapshot("tea"));

        assert_eq!(journal.len(), 0);
    }

    #[test]
    fn log_channel_and_its_threads_are_skipped() {
        assert!(is_log_channel(LOG, None, LOG));
        assert!(is_log_channel(ChannelId::new(21), Some(LOG), LOG));
        assert!(!is_log_channel(GARDEN, None, LOG));
        assert!(!is_log_channel(ChannelId::new(21), Some(GARDEN), LOG));
    }

    #[test]
    fn attachments_are_summarised() {
        assert_eq!(attachment_summary(&[]), None);
        assert_eq!(
            attachment_summary(&names(2)).unwrap(),
            "rose1.png, rose2.png"
        );
        assert_eq!(
            attachment_summary(&names(7)).unwrap(),
            "rose1.png, rose2.png, rose3.png, rose4.png, rose5.png (+2 more)"
        );
    }

    #[test]
    fn deletion_fields() {
        let mut deleted = snapshot("off with her head");
        deleted.attachments = names(1);

        let fields = deleted_fields(&deleted, MessageId::new(99), Some(QUEEN));
        let field_names = fields.iter().map(|(name, _, _)| *name).collect::<Vec<_>>();

        assert_eq!(
            field_names,
            [
                "Author",
                "Channel",
                "Message ID",
                "Attachments",
                "Deleted by",
                "Created at"
            ]
        );
        assert_eq!(fields[0].1, "<@1> (`1`)");
        assert_eq!(fields[2].1, "`99`");
        assert_eq!(fields[4].1, "<@2> (2)");
        assert_eq!(fields[5].1, "<t:1700000000:F>");

        let fields = deleted_fields(&snapshot("tea"), MessageId::new(99), None);
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[3], ("Deleted by", "Unknown / self-delete".to_owned(), true));
    }

    #[test]
    fn edits_show_both_versions() {
        assert_eq!(
            edit_description("white", ""),
            "**Before:**\n```white```\n**After:**\n```*no content*```"
        );

        let long = "a".repeat(2000);
        assert!(edit_description(&long, &long).chars().count() < 2 * 910 + 30);
    }

    #[test]
    fn edit_fields_link_back() {
        let link = "https://discord.com/channels/1/10/5";
        let fields = edited_fields(ALICE, GARDEN, MessageId::new(5), link);

        assert_eq!(fields[1].1, "<#10>");
        assert_eq!(
            fields[3],
            (
                "Jump",
                "[Jump to message](https://discord.com/channels/1/10/5)".to_owned(),
                false
            )
        );
    }

    #[test]
    fn deleter_must_match_author_channel_and_time() {
        let record = DeleteRecord {
            actor: QUEEN,
            author: Some(ALICE),
            channel_id: Some(GARDEN),
            age_secs: 3,
        };

        assert_eq!(deleter(&[record], ALICE, GARDEN), Some(QUEEN));
        assert_eq!(deleter(&[record], QUEEN, GARDEN), None);
        assert_eq!(deleter(&[record], ALICE, LOG), None);
        assert_eq!(
            deleter(&[DeleteRecord { age_secs: 60, ..record }], ALICE, GARDEN),
            None
        );
        assert_eq!(
            deleter(&[DeleteRecord { channel_id: None, ..record }], ALICE, LOG),
            Some(QUEEN)
        );
    }
}
