use crate::{config::ReactionRole, data::State};
use color_eyre::eyre::{Result, WrapErr};
use itertools::Itertools;
use poise::serenity_prelude::{Context, Reaction, RoleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

/// The configured id, else whatever `by_name` finds for the configured name.
pub fn resolve_role(
    reaction: &ReactionRole,
    by_name: impl FnOnce(&str) -> Option<RoleId>,
) -> Option<RoleId> {
    reaction
        .role_id
        .or_else(|| reaction.role_name.as_deref().and_then(by_name))
}

/// Body of the role menu, one `emoji → label` line per role.
pub fn menu(reactions: &[ReactionRole]) -> String {
    let lines = reactions
        .iter()
        .map(|reaction| format!("{} → {}", reaction.emoji, reaction.label))
        .join("\n");

    format!("React below to opt into various pings / channels.\n\n{lines}")
}

/// Gives or takes a role when someone reacts in the roles channel.
#[tracing::instrument(skip_all, fields(emoji = %reaction.emoji))]
pub async fn reaction_role(
    ctx: &Context,
    data: &State,
    reaction: &Reaction,
    toggle: Toggle,
) -> Result<()> {
    let (Some(guild_id), Some(user_id)) = (reaction.guild_id, reaction.user_id) else {
        return Ok(());
    };

    if user_id == ctx.cache.current_user().id
        || reaction.member.as_ref().is_some_and(|member| member.user.bot)
    {
        return Ok(());
    }

    let offered = data
        .config
        .read()
        .await
        .roles
        .reaction_role(reaction.channel_id, &reaction.emoji.to_string())
        .cloned();

    let Some(offered) = offered else {
        return Ok(());
    };

    let role_id = resolve_role(&offered, |name| {
        ctx.cache
            .guild(guild_id)?
            .role_by_name(name)
            .map(|role| role.id)
    });

    let Some(role_id) = role_id else {
        tracing::warn!("No role found for `{}`", offered.label);
        return Ok(());
    };

    match toggle {
        Toggle::On => ctx
            .http
            .add_member_role(guild_id, user_id, role_id, Some("Reaction role opt-in"))
            .await
            .wrap_err("Failed to add reaction role")?,
        Toggle::Off => ctx
            .http
            .remove_member_role(guild_id, user_id, role_id, Some("Reaction role opt-out"))
            .await
            .wrap_err("Failed to remove reaction role")?,
    }

    tracing::info!("Turned {:?} `{}` for {}", toggle, offered.label, user_id);

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn offered(role_id: Option<u64>, role_name: Option<&str>) -> ReactionRole {
        ReactionRole {
            emoji: "🎥".to_owned(),
            label: "movies".to_owned(),
            role_id: role_id.map(RoleId::new),
            role_name: role_name.map(str::to_owned),
        }
    }

    #[test]
    fn ids_win_over_names() {
        assert_eq!(
            resolve_role(&offered(Some(5), Some("movies")), |_| Some(RoleId::new(6))),
            Some(RoleId::new(5))
        );
        assert_eq!(
            resolve_role(&offered(None, Some("movies")), |name| {
                (name == "movies").then(|| RoleId::new(6))
            }),
            Some(RoleId::new(6))
        );
        assert_eq!(resolve_role(&offered(None, Some("movies")), |_| None), None);
        assert_eq!(resolve_role(&offered(None, None), |_| Some(RoleId::new(6))), None);
    }

    #[test]
    fn menu_lists_every_role() {
        let mut nsfw = offered(None, Some("NSFW"));
        nsfw.emoji = "🔞".to_owned();
        nsfw.label = "NSFW access".to_owned();

        assert_eq!(
            menu(&[offered(Some(5), None), nsfw]),
            "React below to opt into various pings / channels.\n\n🎥 → movies\n🔞 → NSFW access"
        );
    }
}
