use crate::{
    audit::{self, log_delete, log_edit},
    autoclean::autoclean,
    automod::automod,
    data::State,
    linkfix::fix_links,
    roles::{Toggle, reaction_role},
};
use cheshire_traits::ForwardRefToTracing;
use color_eyre::eyre::Result;
use poise::serenity_prelude as serenity;

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: State,
) -> Result<()> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            audit::remember(&data, new_message);

            {
                let ctx = ctx.clone();
                let data = data.clone();
                let message = new_message.clone();

                tokio::spawn(async move {
                    let removed = automod(&ctx, &data, &message)
                        .await
                        .trace_err_ok()
                        .unwrap_or(false);

                    if !removed {
                        fix_links(&ctx, &data, &message).await.trace_err_ok();
                    }
                });
            }

            {
                let ctx = ctx.clone();
                let message = new_message.clone();

                tokio::spawn(async move { autoclean(&ctx, &data, &message).await });
            }
        }
        serenity::FullEvent::MessageUpdate {
            old_if_available,
            event,
            ..
        } => {
            log_edit(ctx, &data, old_if_available.as_ref(), event)
                .await
                .trace_err_ok();
        }
        serenity::FullEvent::MessageDelete {
            channel_id,
            deleted_message_id,
            guild_id,
        } => {
            log_delete(ctx, &data, *guild_id, *channel_id, *deleted_message_id)
                .await
                .trace_err_ok();
        }
        serenity::FullEvent::MessageDeleteBulk {
            multiple_deleted_messages_ids,
            ..
        } => {
            audit::forget(&data, multiple_deleted_messages_ids);
        }
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            reaction_role(ctx, &data, add_reaction, Toggle::On)
                .await
                .trace_err_ok();
        }
        serenity::FullEvent::ReactionRemove { removed_reaction } => {
            reaction_role(ctx, &data, removed_reaction, Toggle::Off)
                .await
                .trace_err_ok();
        }
        serenity::FullEvent::Ready { data_about_bot } => {
            tracing::info!("Connected as {}", data_about_bot.user.tag());
        }
        serenity::FullEvent::Ratelimit { data } => {
            tracing::warn!("Ratelimited: {:?}", data);
        }
        _ => {}
    };

    Ok(())
}
