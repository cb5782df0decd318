use crate::domain::model::{AntaCommand, TestResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// A device tests can run on.
#[async_trait]
pub trait EosDevice: Send + Sync {
    fn name(&self) -> &str;
    fn host(&self) -> &str;
    fn port(&self) -> u16;
    fn tags(&self) -> &BTreeSet<String>;
    fn hw_model(&self) -> Option<String>;
    fn is_online(&self) -> bool;
    fn established(&self) -> bool;

    /// Updates reachability and hardware model.
    async fn refresh(&self);

    /// Fills `command.output`, or `command.errors` on failure.
    async fn collect(&self, command: &mut AntaCommand);
}

pub trait AntaTest: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn categories(&self) -> &'static [&'static str];

    /// Commands to collect, templates rendered against the test inputs.
    fn commands(&self) -> Result<Vec<AntaCommand>>;

    fn skipped_platforms(&self) -> &'static [&'static str] {
        &[]
    }

    /// Checks that span several input fields.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Evaluates collected commands, in the order `commands()` returned them.
    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()>;
}
