use bitflags::bitflags;

bitflags! {
    /// Change-notification streams the deck can be asked to push.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NotifyFlags: u8 {
        /// Media inserted or removed.
        const SLOT = 0b001;
        /// Remote-control enable changes.
        const REMOTE = 0b010;
        /// Configuration changes.
        const CONFIGURATION = 0b100;
    }
}

impl NotifyFlags {
    pub fn from_bools(slot: bool, remote: bool, configuration: bool) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::SLOT, slot);
        flags.set(Self::REMOTE, remote);
        flags.set(Self::CONFIGURATION, configuration);
        flags
    }
}

impl Default for NotifyFlags {
    fn default() -> Self {
        Self::all()
    }
}
