//! Running an installed macOS guest.

use crate::error::{CoreError, Result};
use hyfervisor_vz::{VZError, VirtualMachineEvent};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The guest shut itself down.
    GuestStopped,
    /// The VM was stopped from the host.
    ForceStopped,
}

/// Maps a delegate event to the end of the run, or `None` to keep running.
pub fn outcome_for(event: &VirtualMachineEvent) -> Option<Result<RunOutcome>> {
    match event {
        VirtualMachineEvent::GuestStopped => Some(Ok(RunOutcome::GuestStopped)),
        VirtualMachineEvent::StoppedWithError { code, message } => {
            Some(Err(CoreError::Vz(VZError::Internal {
                code: *code,
                message: message.clone(),
            })))
        }
        VirtualMachineEvent::NetworkAttachmentDisconnected { message, .. } => {
            tracing::warn!("network attachment disconnected: {}", message);
            None
        }
    }
}

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
pub use vz::run;

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
mod vz {
    use super::{RunOutcome, outcome_for};
    use crate::bundle::VmBundle;
    use crate::config::MachineConfig;
    use crate::error::{CoreError, Result};
    use crate::machine::{MachineSpec, build_configuration, load_platform};
    use crate::resources::{Limits, host_cpu_count};
    use hyfervisor_vz::VZError;

    /// Boots the installed bundle and waits until the guest stops.
    ///
    /// The first Ctrl-C asks the guest to shut down; a second one stops the
    /// VM immediately.
    pub async fn run(bundle: &VmBundle, machine: &MachineConfig) -> Result<RunOutcome> {
        let platform = load_platform(bundle)?;
        let spec = MachineSpec::from_config(machine, &Limits::from_framework(), host_cpu_count());
        let vm = build_configuration(&spec, platform, bundle)?.build()?;

        let mut events = vm.events()?;
        vm.start().await?;
        tracing::info!(
            cpus = spec.cpu_count,
            memory = spec.memory_size,
            "virtual machine started"
        );

        let mut stop_requested = false;
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        return Err(CoreError::Vz(VZError::Cancelled(
                            "virtual machine event stream closed".into(),
                        )));
                    };
                    if let Some(outcome) = outcome_for(&event) {
                        return outcome;
                    }
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    if stop_requested {
                        tracing::warn!("stopping virtual machine");
                        vm.stop().await?;
                        return Ok(RunOutcome::ForceStopped);
                    }
                    stop_requested = true;
                    match vm.request_stop() {
                        Ok(()) => tracing::info!("asked guest to shut down; Ctrl-C again to force"),
                        Err(e) => {
                            tracing::warn!("guest stop request failed: {}; stopping", e);
                            vm.stop().await?;
                            return Ok(RunOutcome::ForceStopped);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_stop_ends_run() {
        let outcome = outcome_for(&VirtualMachineEvent::GuestStopped);
        assert!(matches!(outcome, Some(Ok(RunOutcome::GuestStopped))));
    }

    #[test]
    fn test_stop_error_ends_run_with_error() {
        let event = VirtualMachineEvent::StoppedWithError {
            code: 2,
            message: "internal error".into(),
        };
        match outcome_for(&event) {
            Some(Err(CoreError::Vz(VZError::Internal { code, message }))) => {
                assert_eq!(code, 2);
                assert_eq!(message, "internal error");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_network_disconnect_keeps_running() {
        let event = VirtualMachineEvent::NetworkAttachmentDisconnected {
            code: 1,
            message: "gone".into(),
        };
        assert!(outcome_for(&event).is_none());
    }
}
