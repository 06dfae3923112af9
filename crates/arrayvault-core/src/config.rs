//! Tiered configuration presets
//!
//! Three presets mirror the ambient configuration surface of the surrounding
//! engine family, adapted to what an ArrayFile needs at open time: default
//! element width, default `IoMode`, and whether `force()` runs after every
//! commit or only on an explicit checkpoint. `flush()` always runs at every
//! step of the durable update protocol regardless of this setting — this only governs
//! the additional fsync.

use crate::entry::ElementWidth;
use crate::error::{ArrayFileError, ArrayFileResult};
use crate::io::IoMode;

/// When `Writer::force()` is invoked relative to a committed `update`/`reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcePolicy {
    /// Force after every commit.
    Always,
    /// Force only when the caller explicitly checkpoints.
    OnCheckpoint,
}

/// Tiered configuration. `element_size` is kept as a raw `i32` (rather than
/// an `ElementWidth`) so `validate()` has something to actually reject —
/// a caller building a `Config` by hand can set it to anything.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub io_mode: IoMode,
    pub element_size: i32,
    pub force_policy: ForcePolicy,
}

impl Config {
    /// Mapped I/O, force on every commit — a long-lived server process with
    /// room to keep the body paged in.
    pub fn server() -> Self {
        Self { io_mode: IoMode::Mapped, element_size: ElementWidth::Int64.size(), force_policy: ForcePolicy::Always }
    }

    /// Buffered I/O, force on every commit — a desktop-scale process without
    /// the address space or lifetime to justify a persistent mapping.
    pub fn desktop() -> Self {
        Self { io_mode: IoMode::Buffered, element_size: ElementWidth::Int32.size(), force_policy: ForcePolicy::Always }
    }

    /// Buffered I/O, force only on checkpoint — throwaway or rebuildable
    /// files such as test fixtures or derived indexes.
    pub fn scratch() -> Self {
        Self {
            io_mode: IoMode::Buffered,
            element_size: ElementWidth::Int32.size(),
            force_policy: ForcePolicy::OnCheckpoint,
        }
    }

    /// Override the element size, possibly to an invalid one — `validate()`
    /// is what catches that, not this setter.
    pub fn with_element_size(mut self, element_size: i32) -> Self {
        self.element_size = element_size;
        self
    }

    /// The validated `ElementWidth` for `element_size`, or the same error
    /// `validate()` would return.
    pub fn element_width(&self) -> ArrayFileResult<ElementWidth> {
        ElementWidth::from_size(self.element_size)
    }

    pub fn validate(&self) -> ArrayFileResult<()> {
        match self.element_size {
            2 | 4 | 8 => Ok(()),
            other => Err(ArrayFileError::InvalidElementSize { requested: other }),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::desktop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_preset_uses_mapped_io() {
        let c = Config::server();
        assert_eq!(c.io_mode, IoMode::Mapped);
        assert_eq!(c.force_policy, ForcePolicy::Always);
    }

    #[test]
    fn test_desktop_preset_uses_buffered_io() {
        let c = Config::desktop();
        assert_eq!(c.io_mode, IoMode::Buffered);
        assert_eq!(c.force_policy, ForcePolicy::Always);
    }

    #[test]
    fn test_scratch_preset_forces_on_checkpoint_only() {
        let c = Config::scratch();
        assert_eq!(c.io_mode, IoMode::Buffered);
        assert_eq!(c.force_policy, ForcePolicy::OnCheckpoint);
    }

    #[test]
    fn test_validate_accepts_all_presets() {
        assert!(Config::server().validate().is_ok());
        assert!(Config::desktop().validate().is_ok());
        assert!(Config::scratch().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nonsensical_element_size() {
        let c = Config::desktop().with_element_size(3);
        assert!(matches!(
            c.validate(),
            Err(ArrayFileError::InvalidElementSize { requested: 3 })
        ));
    }

    #[test]
    fn test_element_width_reflects_element_size() {
        let c = Config::server();
        assert_eq!(c.element_width().unwrap(), ElementWidth::Int64);
    }
}
