//! Device configuration tests.

use crate::checks::{build, TestFactory, TestModule};
use crate::domain::model::{AntaCommand, TestResult};
use crate::domain::ports::AntaTest;
use crate::utils::error::Result;
use crate::utils::tools::JsonExt;
use serde::{Deserialize, Serialize};

pub const MODULE: TestModule = TestModule {
    name: "anta.tests.configuration",
    tests: &[
        ("VerifyZeroTouch", build::<VerifyZeroTouch> as TestFactory),
        ("VerifyRunningConfigDiffs", build::<VerifyRunningConfigDiffs> as TestFactory),
    ],
};

/// Verifies ZeroTouch is disabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyZeroTouch {}

impl AntaTest for VerifyZeroTouch {
    fn name(&self) -> &'static str {
        "VerifyZeroTouch"
    }

    fn description(&self) -> &'static str {
        "Verifies ZeroTouch is disabled"
    }

    fn categories(&self) -> &'static [&'static str] {
        &["configuration"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::new("show zerotouch")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = commands[0].json_output()?;
        if output.field("mode")?.text()? == "disabled" {
            result.is_success();
        } else {
            result.is_failure("ZTP is NOT disabled");
        }
        Ok(())
    }
}

/// Verifies there is no difference between the running-config and the
/// startup-config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyRunningConfigDiffs {}

impl AntaTest for VerifyRunningConfigDiffs {
    fn name(&self) -> &'static str {
        "VerifyRunningConfigDiffs"
    }

    fn description(&self) -> &'static str {
        "Verifies there is no difference between the running-config and the startup-config"
    }

    fn categories(&self) -> &'static [&'static str] {
        &["configuration"]
    }

    fn commands(&self) -> Result<Vec<AntaCommand>> {
        Ok(vec![AntaCommand::text("show running-config diffs")])
    }

    fn test(&self, commands: &[AntaCommand], result: &mut TestResult) -> Result<()> {
        let output = commands[0].text_output()?;
        if output.is_empty() {
            result.is_success();
        } else {
            result.is_failure(output);
        }
        Ok(())
    }
}
