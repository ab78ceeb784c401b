use crate::domain::{ObjectId, Reference, UserSummary};

/// 显示名提取策略 / Display name extraction strategy
pub type NameStrategy = fn(&UserSummary) -> Option<String>;

/// 按顺序尝试，首个成功即停止 / Tried in order, first success wins
pub const STRATEGIES: [NameStrategy; 3] = [full_name, username, email_local_part];

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

pub fn full_name(user: &UserSummary) -> Option<String> {
    let parts: Vec<&str> = [user.first_name.as_deref(), user.last_name.as_deref()]
        .into_iter()
        .filter_map(non_blank)
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

pub fn username(user: &UserSummary) -> Option<String> {
    non_blank(user.username.as_deref()).map(str::to_string)
}

pub fn email_local_part(user: &UserSummary) -> Option<String> {
    let email = non_blank(user.email.as_deref())?;
    let local = email.split('@').next()?;
    (!local.is_empty()).then(|| local.to_string())
}

pub fn placeholder(id: ObjectId) -> String {
    format!("User {}", &id.to_hex()[..6])
}

pub fn name_of(user: &UserSummary) -> String {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(user))
        .unwrap_or_else(|| placeholder(user.id))
}

/// 引用的显示名；未展开时退回占位名 / Display name of a reference, placeholder when unpopulated
pub fn display_name(reference: &Reference<UserSummary>) -> String {
    match reference {
        Reference::Resolved { value } => name_of(value),
        Reference::Id { id } => placeholder(*id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_apply_in_order() {
        let id = ObjectId::new();
        let user = UserSummary::new(id)
            .with_name("Ada", "Lovelace")
            .with_username("ada")
            .with_email("ada@example.com");
        assert_eq!(name_of(&user), "Ada Lovelace");

        let user = UserSummary::new(id).with_username("ada").with_email("ada@example.com");
        assert_eq!(name_of(&user), "ada");

        let user = UserSummary::new(id).with_email("countess@example.com");
        assert_eq!(name_of(&user), "countess");
    }

    #[test]
    fn blank_fields_fall_through_to_placeholder() {
        let id: ObjectId = "64b7f0c2a1b2c3d4e5f60718".parse().unwrap();
        let user = UserSummary::new(id).with_name(" ", "").with_username("  ");
        assert_eq!(name_of(&user), "User 64b7f0");
        assert_eq!(display_name(&Reference::Id { id }), "User 64b7f0");
    }

    #[test]
    fn single_name_part_is_enough() {
        let mut user = UserSummary::new(ObjectId::new());
        user.first_name = Some("Grace".into());
        assert_eq!(name_of(&user), "Grace");
    }
}
