//! ATT server configuration
use super::constants::*;
use super::error::{AttError, AttResult};

/// ATT Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttServerConfig {
    /// Largest MTU this server accepts
    pub local_mtu: u16,
    /// Entry cap for Find Information Responses
    pub max_find_info_entries: usize,
    /// Entry cap for Read By Type and Find By Type Value Responses
    pub max_handle_value_entries: usize,
    /// Entry cap for Read By Group Type Responses
    pub max_group_entries: usize,
    /// Most handles accepted in one Read Multiple Request
    pub max_read_multiple: usize,
    /// Prepare-write slots per session
    pub write_queue_slots: usize,
    /// Prepare-write arena bytes per session
    pub write_queue_arena: usize,
    /// Check fixed-size requests against the length table
    pub validate_pdu_len: bool,
    /// Serve Prepare Write and Execute Write
    pub queued_writes: bool,
    /// Serve Signed Write Command
    pub signed_writes: bool,
}

impl Default for AttServerConfig {
    fn default() -> Self {
        Self {
            local_mtu: ATT_DEFAULT_MTU,
            max_find_info_entries: ATT_DEFAULT_MAX_FIND_INFO_ENTRIES,
            max_handle_value_entries: ATT_DEFAULT_MAX_HANDLE_VALUE_ENTRIES,
            max_group_entries: ATT_DEFAULT_MAX_GROUP_ENTRIES,
            max_read_multiple: ATT_DEFAULT_MAX_READ_MULTIPLE,
            write_queue_slots: ATT_DEFAULT_WRITE_QUEUE_SLOTS,
            write_queue_arena: ATT_DEFAULT_WRITE_QUEUE_ARENA,
            validate_pdu_len: true,
            queued_writes: true,
            signed_writes: true,
        }
    }
}

impl AttServerConfig {
    /// Set the local MTU
    pub fn with_local_mtu(mut self, mtu: u16) -> Self {
        self.local_mtu = mtu;
        self
    }

    /// Set the Find Information entry cap
    pub fn with_max_find_info_entries(mut self, entries: usize) -> Self {
        self.max_find_info_entries = entries;
        self
    }

    /// Set the Read By Type / Find By Type Value entry cap
    pub fn with_max_handle_value_entries(mut self, entries: usize) -> Self {
        self.max_handle_value_entries = entries;
        self
    }

    /// Set the Read By Group Type entry cap
    pub fn with_max_group_entries(mut self, entries: usize) -> Self {
        self.max_group_entries = entries;
        self
    }

    /// Set the Read Multiple handle cap
    pub fn with_max_read_multiple(mut self, handles: usize) -> Self {
        self.max_read_multiple = handles;
        self
    }

    /// Size the per-session prepare-write queue
    pub fn with_write_queue(mut self, slots: usize, arena: usize) -> Self {
        self.write_queue_slots = slots;
        self.write_queue_arena = arena;
        self
    }

    /// Enable or disable the request length table
    pub fn with_pdu_len_validation(mut self, enabled: bool) -> Self {
        self.validate_pdu_len = enabled;
        self
    }

    /// Enable or disable Prepare/Execute Write
    pub fn with_queued_writes(mut self, enabled: bool) -> Self {
        self.queued_writes = enabled;
        self
    }

    /// Enable or disable Signed Write Command
    pub fn with_signed_writes(mut self, enabled: bool) -> Self {
        self.signed_writes = enabled;
        self
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> AttResult<()> {
        if !(ATT_DEFAULT_MTU..=ATT_MAX_MTU).contains(&self.local_mtu) {
            return Err(AttError::InvalidParameter(format!(
                "local_mtu {} outside {}..={}",
                self.local_mtu, ATT_DEFAULT_MTU, ATT_MAX_MTU
            )));
        }
        let caps = [
            ("max_find_info_entries", self.max_find_info_entries),
            ("max_handle_value_entries", self.max_handle_value_entries),
            ("max_group_entries", self.max_group_entries),
        ];
        for (name, value) in caps {
            if value == 0 {
                return Err(AttError::InvalidParameter(format!("{} must be non-zero", name)));
            }
        }
        if self.max_read_multiple < 2 {
            return Err(AttError::InvalidParameter(
                "max_read_multiple must allow at least two handles".into(),
            ));
        }
        if self.queued_writes && (self.write_queue_slots == 0 || self.write_queue_arena == 0) {
            return Err(AttError::InvalidParameter(
                "queued writes need a non-empty write queue".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AttServerConfig::default();
        assert_eq!(config.local_mtu, 23);
        assert_eq!(config.write_queue_slots, 10);
        assert_eq!(config.write_queue_arena, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_mtu() {
        assert!(AttServerConfig::default().with_local_mtu(22).validate().is_err());
        assert!(AttServerConfig::default().with_local_mtu(518).validate().is_err());
        assert!(AttServerConfig::default().with_local_mtu(517).validate().is_ok());
    }

    #[test]
    fn empty_queue_only_allowed_without_queued_writes() {
        let config = AttServerConfig::default().with_write_queue(0, 0);
        assert!(config.validate().is_err());
        assert!(config.with_queued_writes(false).validate().is_ok());
    }
}
