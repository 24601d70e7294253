use mashup_shared::{DeviceProfile, SessionId, UserId};

/// A runtime container known to this device
#[derive(Clone, Debug)]
pub struct Device {
    profile: DeviceProfile,
    user: Option<UserId>,
}

impl Device {
    pub fn new(profile: DeviceProfile) -> Self {
        Self {
            profile,
            user: None,
        }
    }

    /// The user operating the device, who owns what it shares
    pub fn with_user(mut self, user: impl Into<UserId>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn session_id(&self) -> &SessionId {
        self.profile.session_id()
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }
}
