use super::{gate::Origin, pipeline::Reposter, webhook::WebhookRegistry};
use crate::utils::report_http_status;
use cheshire_traits::ForwardRefToTracing;
use color_eyre::eyre::{Result, WrapErr};
use poise::serenity_prelude::{
    ChannelId, Context, CreateAllowedMentions, CreateAttachment, CreateMessage, ExecuteWebhook,
    Mentionable, Message, Permissions, Webhook,
};
use regex::Regex;
use std::{path::Path, sync::LazyLock};
use tokio::sync::OnceCell;

/// Discord's limit for webhook usernames.
const MAX_USERNAME_CHARS: usize = 80;

/// Used when every name the author has is made of reserved words.
const FALLBACK_NAME: &str = "Wonderland guest";

/// Discord refuses webhook usernames containing these.
static RESERVED_NAME_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)discord|clyde").expect("reserved word pattern is valid"));

/// How the original author looks in a repost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    pub avatar_url: String,
}

impl Persona {
    pub fn of(message: &Message) -> Self {
        let nick = message.member.as_ref().and_then(|m| m.nick.as_deref());

        Self {
            name: display_name(
                nick,
                message.author.global_name.as_deref(),
                &message.author.name,
            ),
            avatar_url: message.author.face(),
        }
    }
}

/// Server nickname, then global name, then username, with the words
/// Discord reserves taken out.
pub fn display_name(nick: Option<&str>, global_name: Option<&str>, username: &str) -> String {
    [nick, global_name, Some(username)]
        .into_iter()
        .flatten()
        .map(without_reserved_words)
        .find(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_NAME.to_owned())
        .chars()
        .take(MAX_USERNAME_CHARS)
        .collect()
}

fn without_reserved_words(name: &str) -> String {
    let mut name = name.to_owned();

    // "clclydeyde" only shows its reserved word once the inner one is gone.
    while RESERVED_NAME_WORDS.is_match(&name) {
        name = RESERVED_NAME_WORDS.replace_all(&name, "").into_owned();
    }

    name.trim().to_owned()
}

/// The url is wrapped in `<>` so the platform doesn't add a second embed
/// next to the uploaded file.
pub fn media_caption(author_mention: &str, url: &str) -> String {
    format!("{} shared: <{}>", author_mention, url)
}

/// Reposts may ping users but never roles or everyone.
fn user_mentions_only() -> CreateAllowedMentions {
    CreateAllowedMentions::new()
        .all_users(true)
        .all_roles(false)
        .everyone(false)
}

pub struct Post {
    pub content: String,
    pub attachment: Option<CreateAttachment>,
}

pub trait Delivery {
    async fn deliver(&self, ctx: &Context, persona: &Persona, post: Post) -> Result<()>;
}

/// Posts through a webhook wearing the author's name and avatar.
pub struct WebhookDelivery {
    webhook: Webhook,
    thread: Option<ChannelId>,
}

impl Delivery for WebhookDelivery {
    async fn deliver(&self, ctx: &Context, persona: &Persona, post: Post) -> Result<()> {
        let mut builder = ExecuteWebhook::new()
            .content(post.content)
            .username(&persona.name)
            .avatar_url(&persona.avatar_url)
            .allowed_mentions(user_mentions_only());

        if let Some(attachment) = post.attachment {
            builder = builder.add_file(attachment);
        }

        if let Some(thread) = self.thread {
            builder = builder.in_thread(thread);
        }

        self.webhook
            .execute(ctx, false, builder)
            .await
            .wrap_err("Failed to execute webhook")
            .map(|_| ())
    }
}

/// Plain post as the bot itself.
pub struct ChannelDelivery {
    channel_id: ChannelId,
}

impl Delivery for ChannelDelivery {
    async fn deliver(&self, ctx: &Context, _persona: &Persona, post: Post) -> Result<()> {
        let mut builder = CreateMessage::new()
            .content(post.content)
            .allowed_mentions(user_mentions_only());

        if let Some(attachment) = post.attachment {
            builder = builder.add_file(attachment);
        }

        self.channel_id
            .send_message(ctx, builder)
            .await
            .wrap_err("Failed to send message")
            .map(|_| ())
    }
}

/// Where a repost goes, before any request is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<W> {
    Webhook { webhook: W, thread: Option<ChannelId> },
    Channel(ChannelId),
}

pub fn may_use_webhooks(permissions: Permissions) -> bool {
    permissions.contains(Permissions::MANAGE_WEBHOOKS)
}

/// Picks the webhook when we may use one and one was found, otherwise a
/// plain message in the channel the original was posted in.
pub fn route<W>(origin: Origin, permissions: Permissions, webhook: Option<W>) -> Route<W> {
    match webhook {
        Some(webhook) if may_use_webhooks(permissions) => Route::Webhook {
            webhook,
            thread: origin.thread(),
        },
        _ => Route::Channel(origin.channel_id),
    }
}

pub enum Courier {
    Webhook(WebhookDelivery),
    Channel(ChannelDelivery),
}

impl Courier {
    pub async fn select(
        ctx: &Context,
        registry: &WebhookRegistry,
        origin: Origin,
        permissions: Permissions,
        webhook_name: &str,
    ) -> Courier {
        let webhook = if may_use_webhooks(permissions) {
            registry
                .get_or_create(ctx, origin.home(), webhook_name)
                .await
                .trace_warn_ok("Falling back to plain reposts")
        } else {
            None
        };

        match route(origin, permissions, webhook) {
            Route::Webhook { webhook, thread } => {
                Courier::Webhook(WebhookDelivery { webhook, thread })
            }
            Route::Channel(channel_id) => Courier::Channel(ChannelDelivery { channel_id }),
        }
    }
}

impl Delivery for Courier {
    async fn deliver(&self, ctx: &Context, persona: &Persona, post: Post) -> Result<()> {
        match self {
            Courier::Webhook(delivery) => delivery.deliver(ctx, persona, post).await,
            Courier::Channel(delivery) => delivery.deliver(ctx, persona, post).await,
        }
    }
}

/// Reposts one message. The courier is only chosen once something actually
/// needs posting, so messages without fixable links cost no requests.
pub struct DiscordReposter<'a> {
    ctx: &'a Context,
    message: &'a Message,
    origin: Origin,
    permissions: Permissions,
    registry: &'a WebhookRegistry,
    webhook_name: &'a str,
    persona: Persona,
    courier: OnceCell<Courier>,
}

impl<'a> DiscordReposter<'a> {
    pub fn new(
        ctx: &'a Context,
        message: &'a Message,
        origin: Origin,
        permissions: Permissions,
        registry: &'a WebhookRegistry,
        webhook_name: &'a str,
    ) -> Self {
        Self {
            ctx,
            message,
            origin,
            permissions,
            registry,
            webhook_name,
            persona: Persona::of(message),
            courier: OnceCell::new(),
        }
    }

    async fn send(&self, post: Post) -> Result<()> {
        let courier = self
            .courier
            .get_or_init(|| {
                Courier::select(
                    self.ctx,
                    self.registry,
                    self.origin,
                    self.permissions,
                    self.webhook_name,
                )
            })
            .await;

        let result = courier.deliver(self.ctx, &self.persona, post).await;

        if let (Err(e), Courier::Webhook(_)) = (&result, courier) {
            if report_http_status(e) == Some(404) {
                tracing::info!("Webhook in {} is gone, forgetting it", self.origin.home());
                self.registry.forget(self.origin.home());
            }
        }

        result
    }
}

impl Reposter for DiscordReposter<'_> {
    async fn repost_media(&self, url: &str, file: &Path) -> Result<()> {
        let attachment = CreateAttachment::path(file)
            .await
            .wrap_err("Failed to read downloaded media")?;

        self.send(Post {
            content: media_caption(&self.message.author.mention().to_string(), url),
            attachment: Some(attachment),
        })
        .await
    }

    async fn repost_text(&self, text: &str) -> Result<()> {
        self.send(Post {
            content: text.to_owned(),
            attachment: None,
        })
        .await
    }

    async fn delete_original(&self) -> Result<()> {
        self.message
            .delete(self.ctx)
            .await
            .wrap_err("Failed to delete original message")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CHANNEL: ChannelId = ChannelId::new(10);
    const THREAD: ChannelId = ChannelId::new(11);

    fn in_channel() -> Origin {
        Origin {
            channel_id: CHANNEL,
            parent_id: None,
        }
    }

    fn in_thread() -> Origin {
        Origin {
            channel_id: THREAD,
            parent_id: Some(CHANNEL),
        }
    }

    #[test]
    fn names() {
        assert_eq!(display_name(Some("Hatter"), Some("Mad"), "hatter99"), "Hatter");
        assert_eq!(display_name(None, Some("Mad"), "hatter99"), "Mad");
        assert_eq!(display_name(None, None, "hatter99"), "hatter99");
        assert_eq!(display_name(Some("  "), Some("Mad"), "hatter99"), "Mad");
        assert_eq!(display_name(Some("  "), None, "hatter99"), "hatter99");
        assert_eq!(
            display_name(Some(&"a".repeat(100)), None, "x").chars().count(),
            80
        );
    }

    #[test]
    fn reserved_words_are_removed_from_names() {
        assert_eq!(display_name(Some("DiscordCat"), None, "cat"), "Cat");
        assert_eq!(display_name(None, Some("Mr CLYDE"), "cat"), "Mr");
        assert_eq!(display_name(Some("clclydeyde"), None, "cat"), "cat");
        assert_eq!(display_name(Some("Discord"), Some("clyde"), "discord"), FALLBACK_NAME);
    }

    #[test]
    fn caption_suppresses_embed() {
        assert_eq!(
            media_caption("<@42>", "https://www.instagram.com/reel/abc/"),
            "<@42> shared: <https://www.instagram.com/reel/abc/>"
        );
    }

    #[test]
    fn webhook_needs_permission_and_a_hook() {
        let both = Permissions::MANAGE_WEBHOOKS | Permissions::MANAGE_MESSAGES;

        assert_eq!(
            route(in_channel(), both, Some("hook")),
            Route::Webhook {
                webhook: "hook",
                thread: None
            }
        );
        assert_eq!(
            route(in_channel(), both, None::<&str>),
            Route::Channel(CHANNEL)
        );
        assert_eq!(
            route(in_channel(), Permissions::MANAGE_MESSAGES, Some("hook")),
            Route::Channel(CHANNEL)
        );
        assert!(!may_use_webhooks(Permissions::MANAGE_MESSAGES));
    }

    #[test]
    fn threads_post_into_the_thread() {
        assert_eq!(
            route(in_thread(), Permissions::MANAGE_WEBHOOKS, Some("hook")),
            Route::Webhook {
                webhook: "hook",
                thread: Some(THREAD)
            }
        );
        assert_eq!(
            route(in_thread(), Permissions::empty(), Some("hook")),
            Route::Channel(THREAD)
        );
    }

    #[test]
    fn reposts_only_ping_users() {
        let mentions = serde_json::to_value(user_mentions_only()).unwrap();

        assert_eq!(mentions["parse"], serde_json::json!(["users"]));
        assert_eq!(mentions["roles"], serde_json::json!([]));
    }
}
