use crate::data::State;
use cheshire_db::Birthday;
use cheshire_traits::ForwardRefToTracing;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use color_eyre::eyre::{Result, WrapErr};
use itertools::Itertools;
use poise::serenity_prelude::{Context, GuildId, Mentionable, UserId};
use rand::seq::IndexedRandom;

const BIRTHDAY_MESSAGES: &[&str] = &[
    "🎂 Down the rabbit hole we go! Today is {mention}’s very real birthday (not an unbirthday at all). Shower them with curious wishes! 🫖🃏",
    "🫖 A very merry birthday to {mention}! The teacups are spinning, the hatter is shouting, and the cards are cheering – may your day be wonderfully mad.",
    "⏱️ The White Rabbit checked his watch: today belongs to {mention}! Happy birthday – may your path through Wonderland be strange in all the best ways.",
    "🎉 No unbirthdays here – today is {mention}’s true day. Cake, chaos and a little bit of magic are in order.",
    "🃏 The Queen has declared: today we celebrate {mention}! Happy birthday, you delightful creature of Wonderland.",
    "🌹 The roses are painted and the table is set – happy birthday, {mention}! May your year be curiouser and curiouser.",
];

const SAVED_MESSAGES: &[&str] = &[
    "🎂 Birthday saved, {mention}. Try not to embarrass Wonderland on the day.",
    "🫖 Your birthday’s logged, {mention}. Even the teacups groaned.",
    "♠️ Birthday noted, {mention}. The cards demanded hazard pay.",
    "⏱️ The Rabbit wrote your birthday down, {mention}. He immediately regretted it.",
    "🃏 Your birthday’s in the ledger, {mention}. Wonderland is bracing itself.",
    "🌙 Birthday recorded, {mention}. The Cheshire Cat muttered ‘yikes’.",
    "🎩 Birthday filed, {mention}. The hatbox asked why it had to be you.",
    "🪶 Your birthday’s inked, {mention}. The quill tried to resign.",
];

pub const SAVED_PRIVATELY: &str =
    "Done! When the clock strikes your day, I’ll shout it across Wonderland.";

fn pick(lines: &[&str], mention: &str) -> String {
    lines
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or("{mention}")
        .replace("{mention}", mention)
}

pub fn birthday_message(mention: &str) -> String {
    pick(BIRTHDAY_MESSAGES, mention)
}

pub fn saved_message(mention: &str) -> String {
    pick(SAVED_MESSAGES, mention)
}

/// Reads `DD/MM` (or `D/M`, spaces ignored). 29/02 is accepted.
pub fn parse_day_month(input: &str) -> Option<Birthday> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let (day, month) = compact.split_once('/')?;
    let (day, month) = (day.parse::<u32>().ok()?, month.parse::<u32>().ok()?);

    // 2000 is a leap year.
    NaiveDate::from_ymd_opt(2000, month, day)?;

    Some(Birthday {
        month: u8::try_from(month).ok()?,
        day: u8::try_from(day).ok()?,
    })
}

pub fn day_month(birthday: Birthday) -> String {
    format!("{:02}/{:02}", birthday.day, birthday.month)
}

pub fn birthday_of<T: TimeZone>(now: &DateTime<T>) -> Birthday {
    Birthday {
        month: now.month() as u8,
        day: now.day() as u8,
    }
}

/// `(display name, birthday)` pairs in calendar order, as one message.
pub fn ledger(entries: &[(String, Birthday)]) -> String {
    if entries.is_empty() {
        return "No birthdays are written yet.".to_owned();
    }

    let lines = entries
        .iter()
        .map(|(name, birthday)| format!("• {} — {}", name, day_month(*birthday)))
        .join("\n");

    format!("⏱️ The ledger opens:\n{lines}")
}

pub fn guest_list(mentions: &[String]) -> String {
    if mentions.is_empty() {
        return "No birthdays today.".to_owned();
    }

    format!("Today’s tea party guests: {}", mentions.join(" "))
}

/// The first `at` strictly after `now`, in `now`'s timezone. Days where `at`
/// falls into a DST gap are skipped.
pub fn next_announcement(now: DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let timezone = now.timezone();

    now.date_naive()
        .iter_days()
        .filter_map(|date| timezone.from_local_datetime(&date.and_time(at)).earliest())
        .find(|candidate| *candidate > now)
        .unwrap_or(now)
}

/// Users with a stored birthday today who are still in the guild.
fn todays_guests(
    ctx: &Context,
    data: &State,
    guild_id: GuildId,
    today: Birthday,
) -> Result<Vec<UserId>> {
    let user_ids = data.birthdays.on(guild_id.get(), today)?;

    let Some(guild) = ctx.cache.guild(guild_id) else {
        return Ok(Vec::new());
    };

    Ok(user_ids
        .into_iter()
        .map(UserId::new)
        .filter(|user_id| guild.members.contains_key(user_id))
        .collect())
}

pub fn guest_mentions(
    ctx: &Context,
    data: &State,
    guild_id: GuildId,
    timezone: Tz,
) -> Result<Vec<String>> {
    let today = birthday_of(&Utc::now().with_timezone(&timezone));

    Ok(todays_guests(ctx, data, guild_id, today)?
        .into_iter()
        .map(|user_id| user_id.mention().to_string())
        .collect())
}

async fn announce(ctx: &Context, data: &State) -> Result<()> {
    let (guild_id, channel_id, timezone) = {
        let config = data.config.read().await;
        (
            GuildId::new(config.guild_id),
            config.birthday.announce_channel_id,
            config.birthday.timezone,
        )
    };

    let Some(channel_id) = channel_id else {
        return Ok(());
    };

    let mentions = guest_mentions(ctx, data, guild_id, timezone)?;

    for mention in &mentions {
        channel_id
            .say(ctx, birthday_message(mention))
            .await
            .wrap_err("Failed to announce birthday")
            .trace_err_ok();
    }

    if !mentions.is_empty() {
        tracing::info!("Announced {} birthday(s)", mentions.len());
    }

    Ok(())
}

/// Announces the day's birthdays once a day, forever.
pub async fn announce_birthdays(ctx: Context, data: State) {
    loop {
        let (timezone, at) = {
            let config = data.config.read().await;
            (config.birthday.timezone, config.birthday.announce_at)
        };

        let now = Utc::now().with_timezone(&timezone);
        let next = next_announcement(now, at);
        tracing::debug!("Next birthday announcement at {}", next);

        tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;

        announce(&ctx, &data).await.trace_err_ok();
    }
}
