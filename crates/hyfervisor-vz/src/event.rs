//! Virtual machine state and lifecycle events.
//!
//! These types are platform independent so that code consuming them can be
//! compiled and tested on any host.

use std::fmt;

// ============================================================================
// VM State
// ============================================================================

/// The execution state of a virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum VirtualMachineState {
    /// The VM is stopped.
    Stopped = 0,
    /// The VM is running.
    Running = 1,
    /// The VM is paused.
    Paused = 2,
    /// The VM is in an error state.
    Error = 3,
    /// The VM is starting.
    Starting = 4,
    /// The VM is pausing.
    Pausing = 5,
    /// The VM is resuming.
    Resuming = 6,
    /// The VM is stopping.
    Stopping = 7,
    /// The VM is saving state (macOS 14+).
    Saving = 8,
    /// The VM is restoring state (macOS 14+).
    Restoring = 9,
}

impl From<i64> for VirtualMachineState {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::Stopped,
            1 => Self::Running,
            2 => Self::Paused,
            4 => Self::Starting,
            5 => Self::Pausing,
            6 => Self::Resuming,
            7 => Self::Stopping,
            8 => Self::Saving,
            9 => Self::Restoring,
            _ => Self::Error,
        }
    }
}

impl VirtualMachineState {
    /// Returns true if the VM is in a transitional state.
    pub fn is_transitioning(self) -> bool {
        matches!(
            self,
            Self::Starting
                | Self::Pausing
                | Self::Resuming
                | Self::Stopping
                | Self::Saving
                | Self::Restoring
        )
    }
}

// ============================================================================
// Delegate Events
// ============================================================================

/// A lifecycle notification delivered by the VM delegate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualMachineEvent {
    /// The guest operating system stopped the virtual machine.
    GuestStopped,

    /// The virtual machine stopped because of an error.
    StoppedWithError {
        /// Error code from NSError.
        code: i32,
        /// Localized error description.
        message: String,
    },

    /// A network device attachment was disconnected. The VM keeps running.
    NetworkAttachmentDisconnected {
        /// Error code from NSError.
        code: i32,
        /// Localized error description.
        message: String,
    },
}

impl VirtualMachineEvent {
    /// Returns true if the VM is no longer running after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GuestStopped | Self::StoppedWithError { .. })
    }
}

impl fmt::Display for VirtualMachineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GuestStopped => write!(f, "guest stopped the virtual machine"),
            Self::StoppedWithError { code, message } => {
                write!(f, "virtual machine stopped with error (code={code}): {message}")
            }
            Self::NetworkAttachmentDisconnected { code, message } => {
                write!(f, "network attachment disconnected (code={code}): {message}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_raw() {
        assert_eq!(VirtualMachineState::from(0), VirtualMachineState::Stopped);
        assert_eq!(VirtualMachineState::from(1), VirtualMachineState::Running);
        assert_eq!(VirtualMachineState::from(3), VirtualMachineState::Error);
        assert_eq!(VirtualMachineState::from(9), VirtualMachineState::Restoring);
        assert_eq!(VirtualMachineState::from(42), VirtualMachineState::Error);
        assert_eq!(VirtualMachineState::from(-1), VirtualMachineState::Error);
    }

    #[test]
    fn test_transitioning() {
        assert!(VirtualMachineState::Starting.is_transitioning());
        assert!(VirtualMachineState::Stopping.is_transitioning());
        assert!(!VirtualMachineState::Running.is_transitioning());
        assert!(!VirtualMachineState::Stopped.is_transitioning());
    }

    #[test]
    fn test_event_terminal() {
        assert!(VirtualMachineEvent::GuestStopped.is_terminal());
        assert!(
            VirtualMachineEvent::StoppedWithError {
                code: 1,
                message: "internal".into(),
            }
            .is_terminal()
        );
        assert!(
            !VirtualMachineEvent::NetworkAttachmentDisconnected {
                code: 2,
                message: "cable".into(),
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_event_display() {
        let event = VirtualMachineEvent::StoppedWithError {
            code: 1,
            message: "Internal Virtualization error.".into(),
        };
        assert_eq!(
            event.to_string(),
            "virtual machine stopped with error (code=1): Internal Virtualization error."
        );
    }
}
