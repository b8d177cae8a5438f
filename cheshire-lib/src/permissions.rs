use poise::serenity_prelude::{Cache, Member, Permissions};

/// What the bot knows about a member's rank in their guild.
#[derive(Debug, Clone, Default)]
pub struct Standing {
    pub permissions: Permissions,
    pub role_names: Vec<String>,
}

impl Standing {
    /// Reads permissions and role names from the cache. `None` if the guild
    /// is not cached.
    pub fn of(cache: &Cache, member: &Member) -> Option<Standing> {
        let guild = cache.guild(member.guild_id)?;

        let role_names = member
            .roles
            .iter()
            .filter_map(|role_id| guild.roles.get(role_id))
            .map(|role| role.name.clone())
            .collect();

        Some(Standing {
            permissions: guild.member_permissions(member),
            role_names,
        })
    }

    pub fn is_admin(&self, admin_role_names: &[String]) -> bool {
        self.permissions.administrator() || has_any_role(&self.role_names, admin_role_names)
    }

    /// Staff are never touched by automod and cannot be warned.
    pub fn is_mod(&self, admin_role_names: &[String]) -> bool {
        let moderating = Permissions::ADMINISTRATOR
            | Permissions::MANAGE_GUILD
            | Permissions::MANAGE_MESSAGES
            | Permissions::KICK_MEMBERS
            | Permissions::BAN_MEMBERS;

        self.permissions.intersects(moderating) || has_any_role(&self.role_names, admin_role_names)
    }
}

pub fn has_any_role(role_names: &[String], wanted: &[String]) -> bool {
    role_names.iter().any(|name| wanted.contains(name))
}
