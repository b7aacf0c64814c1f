//! picotool Command Engine
//!
//! Composition and execution of picotool invocations.
//!
//! # Architecture
//!
//! - `params.rs`: typed, defaulted parameter sets per operation
//! - `composer.rs`: pure translation of an operation into an argument vector
//! - `executor.rs`: binary resolution, subprocess execution, outcome classification
//!
//! The composer never spawns anything and the executor never looks at what the
//! tokens mean; [`run`] is the only place the two meet.

pub mod composer;
pub mod executor;
pub mod params;

pub use composer::{compose, CommandTokens, Invocation};
pub use executor::{
    CommandRunner, ExecutionOutcome, Executor, FailureKind, PicotoolBinary, PicotoolError,
    ProcessOutput, TokioRunner,
};
pub use params::{
    DeviceSelector, EraseParams, ForceMode, ForceOptions, InfoParams, Operation, ParamsError,
    PartitionInfoParams, RebootParams,
};

/// Compose and execute a single operation.
pub async fn run(executor: &Executor, operation: &Operation) -> ExecutionOutcome {
    let tokens = compose(operation);
    tracing::debug!(tool = operation.tool_name(), ?tokens, "Composed picotool command");
    executor.execute(&tokens).await
}

#[cfg(test)]
mod tests {
    use super::executor::tests::StubRunner;
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_version_operation_success() {
        let exec = Executor::with_runner(
            PicotoolBinary::Resolved(PathBuf::from("picotool")),
            Arc::new(StubRunner::exit(0, "2.0.0", "")),
        );
        assert_eq!(run(&exec, &Operation::Version).await, Ok("2.0.0".to_string()));
    }

    #[tokio::test]
    async fn test_any_operation_reports_command_failure() {
        let exec = Executor::with_runner(
            PicotoolBinary::Resolved(PathBuf::from("picotool")),
            Arc::new(StubRunner::exit(1, "", "no device found")),
        );
        let ops = [
            Operation::Version,
            Operation::Info(InfoParams::default()),
            Operation::Reboot(RebootParams::default()),
            Operation::PartitionInfo(PartitionInfoParams::default()),
            Operation::Erase(EraseParams::default()),
        ];
        for op in ops {
            assert_eq!(
                run(&exec, &op).await,
                Err(PicotoolError::CommandFailed("no device found".to_string()))
            );
        }
    }
}
