use crate::types::{Role, SessionId};

/// One device acting in one role of a transaction.
///
/// A device may appear twice, once per role.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Participant {
    pub session_id: SessionId,
    pub role: Role,
}

impl Participant {
    pub fn source(session_id: &SessionId) -> Self {
        Self {
            session_id: session_id.clone(),
            role: Role::Source,
        }
    }

    pub fn target(session_id: &SessionId) -> Self {
        Self {
            session_id: session_id.clone(),
            role: Role::Target,
        }
    }
}
