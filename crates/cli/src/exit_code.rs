// Consistent exit codes for the pushgate CLI.
//
//   0   = success, push may proceed
//   1   = general error
//   2   = usage/argument error
//   10  = policy violation (non-fast-forward, immutable tag)
//   11  = resource busy, retry later
//   12  = infrastructure error (remote state or lock store unreachable)
//   13  = configuration error
//   130 = interrupted

use std::process;

use pushgate_gate::config::ConfigError;
use pushgate_gate::error::GateError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    Policy = 10,
    Busy = 11,
    Infrastructure = 12,
    Config = 13,
    Interrupted = 130,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(gate_err) = cause.downcast_ref::<GateError>() {
                return Self::from_gate_error(gate_err);
            }
            if cause.downcast_ref::<ConfigError>().is_some() {
                return Self::Config;
            }
            if cause.downcast_ref::<clap::Error>().is_some() {
                return Self::Usage;
            }
        }
        Self::Error
    }

    pub fn from_gate_error(err: &GateError) -> Self {
        match err {
            GateError::PolicyViolation { .. } => Self::Policy,
            GateError::ResourceBusy { .. } => Self::Busy,
            GateError::Infrastructure { .. } => Self::Infrastructure,
        }
    }

    /// Stable code printed in front of the error line.
    pub fn label(err: &anyhow::Error) -> &'static str {
        for cause in err.chain() {
            if let Some(gate_err) = cause.downcast_ref::<GateError>() {
                return gate_err.code();
            }
            if cause.downcast_ref::<ConfigError>().is_some() {
                return "CONFIG";
            }
        }
        "ERROR"
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use pushgate_common::types::{DenyReason, LeaseScope};
    use std::time::Duration;

    #[test]
    fn exit_code_values() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::Error.code(), 1);
        assert_eq!(ExitCode::Usage.code(), 2);
        assert_eq!(ExitCode::Policy.code(), 10);
        assert_eq!(ExitCode::Busy.code(), 11);
        assert_eq!(ExitCode::Infrastructure.code(), 12);
        assert_eq!(ExitCode::Config.code(), 13);
        assert_eq!(ExitCode::Interrupted.code(), 130);
    }

    #[test]
    fn policy_violation_maps_to_policy() {
        let err = anyhow::Error::new(GateError::PolicyViolation {
            reference: "refs/tags/v1".into(),
            reason: DenyReason::ImmutableTagViolation,
        });
        assert_eq!(ExitCode::from_error(&err), ExitCode::Policy);
        assert_eq!(ExitCode::label(&err), "IMMUTABLE_TAG");
    }

    #[test]
    fn busy_inside_context_maps_to_busy() {
        let result: Result<(), GateError> = Err(GateError::ResourceBusy {
            scope: LeaseScope::Global,
            retry_after: Duration::from_secs(30),
        });
        let err = result.context("push gate refused").unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::Busy);
        assert_eq!(ExitCode::label(&err), "RESOURCE_BUSY");
    }

    #[test]
    fn config_error_maps_to_config() {
        let result: Result<(), ConfigError> = Err(ConfigError::MissingLockRoot);
        let err = result.context("failed to load configuration").unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::Config);
        assert_eq!(ExitCode::label(&err), "CONFIG");
    }

    #[test]
    fn from_error_generic_is_error() {
        let err = anyhow::anyhow!("something went wrong");
        assert_eq!(ExitCode::from_error(&err), ExitCode::Error);
        assert_eq!(ExitCode::label(&err), "ERROR");
    }

    #[test]
    fn exit_code_to_process_exit_code() {
        // process::ExitCode hides its value; the conversion compiling is the check.
        let code: process::ExitCode = ExitCode::Busy.into();
        let _ = code;
    }
}
