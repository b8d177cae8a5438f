use crate::{data::State, utils::http_status};
use poise::serenity_prelude::{Context, Message};

/// Removes a member's prefix command a few seconds after it was sent, so
/// channels keep only the bot's answer.
pub async fn autoclean(ctx: &Context, data: &State, message: &Message) {
    if message.author.bot || message.guild_id.is_none() {
        return;
    }

    let delay = {
        let config = data.config.read().await;

        if config.autoclean.exempt_channel_ids.contains(&message.channel_id)
            || !is_prefix_command(&message.content, &config.command_prefix)
        {
            return;
        }

        config.autoclean.delay
    };

    tokio::time::sleep(delay).await;

    match message.delete(ctx).await {
        Ok(()) => tracing::debug!("Cleaned up command {}", message.link()),
        Err(e) => match http_status(&e) {
            Some(404) => {}
            Some(403) => tracing::warn!("Missing permission to clean up {}", message.link()),
            _ => tracing::error!("Failed to clean up {}: {:?}", message.link(), e),
        },
    }
}

fn is_prefix_command(content: &str, prefix: &str) -> bool {
    !prefix.is_empty() && content.starts_with(prefix)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_prefixed_messages_are_commands() {
        assert!(is_prefix_command("!help", "!"));
        assert!(is_prefix_command("c!warn", "c!"));
        assert!(!is_prefix_command("hello !help", "!"));
        assert!(!is_prefix_command("!help", ""));
    }
}
