pub mod birthday;
pub mod moderation;
pub mod ping;
pub mod register;
pub mod roles;
pub mod warns;

use crate::{data::PoiseContext, data::State, permissions::Standing};
use color_eyre::eyre::{Error, Result};

pub fn all() -> Vec<poise::Command<State, Error>> {
    vec![
        ping::ping(),
        register::register(),
        warns::warn(),
        warns::warnings(),
        warns::clearwarns(),
        moderation::purge(),
        moderation::slowmode(),
        moderation::lock(),
        moderation::unlock(),
        moderation::quick_timeout(),
        birthday::birthday(),
        roles::post_roles(),
    ]
}

async fn author_standing(ctx: PoiseContext<'_>) -> Option<Standing> {
    let member = ctx.author_member().await?;
    Standing::of(ctx.cache(), &member)
}

/// Staff: moderating permissions or one of the admin roles.
pub async fn is_mod(ctx: PoiseContext<'_>) -> Result<bool> {
    let admin_role_names = ctx.data().config.read().await.admin_role_names.clone();

    Ok(author_standing(ctx)
        .await
        .is_some_and(|standing| standing.is_mod(&admin_role_names)))
}

/// Administrators or holders of one of the admin roles.
pub async fn is_admin(ctx: PoiseContext<'_>) -> Result<bool> {
    let admin_role_names = ctx.data().config.read().await.admin_role_names.clone();

    Ok(author_standing(ctx)
        .await
        .is_some_and(|standing| standing.is_admin(&admin_role_names)))
}
