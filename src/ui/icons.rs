use crate::entity::Entity;

pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const SEARCH: &str = "🔍";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const STATS: &str = "📊";
    pub const DATABASE: &str = "🗄️";
    pub const CLOCK: &str = "⏱️";
    pub const DEL: &str = "🗑️";
    pub const PAUSE: &str = "⏸️";
    pub const EXPORT: &str = "📤";
    pub const IMPORT: &str = "📥";
    pub const CALENDAR: &str = "📅";
    pub const MEDAL: &str = "🏅";

    pub const ACCOUNT: &str = "👥";
    pub const TEAM: &str = "🏆";
    pub const PLAYER: &str = "👤";
    pub const TOURNAMENT: &str = "🎯";
    pub const MATCH: &str = "⚔️";

    pub fn for_entity(entity: Entity) -> &'static str {
        match entity {
            Entity::Account => Self::ACCOUNT,
            Entity::Team => Self::TEAM,
            Entity::Player => Self::PLAYER,
            Entity::Tournament => Self::TOURNAMENT,
            Entity::Match => Self::MATCH,
        }
    }
}
