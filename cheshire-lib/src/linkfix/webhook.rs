use ahash::AHashMap;
use color_eyre::eyre::{Result, WrapErr};
use parking_lot::Mutex;
use poise::serenity_prelude::{ChannelId, Context, CreateWebhook, Webhook};

/// Per-channel delivery identities, resolved lazily and then reused.
///
/// Creation is not locked: two messages racing in a channel without a
/// webhook may both create one. The extra webhook is harmless and the last
/// one stored wins.
#[derive(Default)]
pub struct WebhookRegistry {
    hooks: Mutex<AHashMap<ChannelId, Webhook>>,
}

impl WebhookRegistry {
    pub async fn get_or_create(
        &self,
        ctx: &Context,
        channel_id: ChannelId,
        name: &str,
    ) -> Result<Webhook> {
        if let Some(hook) = self.hooks.lock().get(&channel_id).cloned() {
            return Ok(hook);
        }

        let me = ctx.cache.current_user().id;

        let existing = channel_id
            .webhooks(ctx)
            .await
            .wrap_err("Failed to list webhooks")?
            .into_iter()
            .find(|hook| hook.token.is_some() && hook.user.as_ref().is_some_and(|u| u.id == me));

        let hook = match existing {
            Some(hook) => hook,
            None => {
                tracing::info!("Creating webhook `{}` in {}", name, channel_id);

                channel_id
                    .create_webhook(ctx, CreateWebhook::new(name))
                    .await
                    .wrap_err("Failed to create webhook")?
            }
        };

        self.hooks.lock().insert(channel_id, hook.clone());

        Ok(hook)
    }

    /// Drops a cached webhook, e.g. after it was deleted out from under us.
    pub fn forget(&self, channel_id: ChannelId) {
        self.hooks.lock().remove(&channel_id);
    }
}
