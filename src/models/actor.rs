use serde::{Deserialize, Serialize};

/// The acting user as vouched for by the upstream identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    pub user_id: String,
    pub is_beberia_member: bool,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, is_beberia_member: bool) -> Self {
        Self {
            user_id: user_id.into(),
            is_beberia_member,
        }
    }
}
