use crate::core::catalog::AntaTestDefinition;
use crate::domain::model::TestResult;
use crate::domain::ports::EosDevice;

/// Result of `definition` before anything runs, with its overwrites applied.
pub fn init_result(device: &dyn EosDevice, definition: &AntaTestDefinition) -> TestResult {
    let test = &definition.test;
    let overwrite = definition.inputs.result_overwrite.as_ref();

    let categories = overwrite
        .and_then(|o| o.categories.clone())
        .unwrap_or_else(|| test.categories().iter().map(|c| c.to_string()).collect());
    let description = overwrite
        .and_then(|o| o.description.clone())
        .unwrap_or_else(|| test.description().to_string());
    let custom_field = overwrite.and_then(|o| o.custom_field.clone());

    TestResult::new(device.name(), test.name(), categories, description, custom_field)
}

/// Runs one test on one device. Failures end up in the returned result.
pub async fn execute(device: &dyn EosDevice, definition: &AntaTestDefinition) -> TestResult {
    let test = &definition.test;
    let mut result = init_result(device, definition);

    let mut commands = match test.commands() {
        Ok(commands) => commands,
        Err(e) => {
            tracing::error!("Cannot render commands of {} for {}: {}", test.name(), device.name(), e);
            result.is_error(e.to_string());
            return result;
        }
    };

    let hw_model = device.hw_model().unwrap_or_else(|| "unknown".to_string());
    if test.skipped_platforms().contains(&hw_model.as_str()) {
        result.is_skipped(format!("{} test is not supported on {}.", test.name(), hw_model));
        return result;
    }

    for command in commands.iter_mut() {
        device.collect(command).await;
    }

    let failed: Vec<_> = commands.iter().filter(|c| !c.collected()).collect();
    if !failed.is_empty() {
        let unsupported: Vec<_> = failed.iter().filter(|c| !c.supported()).collect();
        if unsupported.is_empty() {
            for command in failed {
                result.is_error(format!("{} has failed: {}", command.command, command.errors.join(", ")));
            }
        } else {
            for command in unsupported {
                result.is_skipped(format!("'{}' is not supported on {}", command.command, hw_model));
            }
        }
        return result;
    }

    if let Err(e) = test.test(&commands, &mut result) {
        tracing::error!(
            "Exception raised for test {} (on device {}): {}",
            test.name(),
            device.name(),
            e
        );
        result.is_error(e.to_string());
    }
    result
}


#[cfg(test)]
mod tests {
    use super::fake::FakeDevice;
    use super::*;
    use crate::core::catalog::AntaCatalog;
    use crate::domain::model::TestStatus;
    use serde_json::{json, Value};

    fn definition(test: &str, inputs: Value) -> AntaTestDefinition {
        AntaCatalog::from_list([(test, inputs)]).unwrap().tests()[0].clone()
    }

    #[tokio::test]
    async fn test_execute_success() {
        let device = FakeDevice::new("leaf1", &[]).with_output("show zerotouch", json!({"mode": "disabled"}));
        let result = execute(&device, &definition("VerifyZeroTouch", Value::Null)).await;
        assert_eq!(result.result, TestStatus::Success);
        assert_eq!(result.name, "leaf1");
        assert_eq!(result.categories, vec!["configuration"]);
    }

    #[tokio::test]
    async fn test_result_overwrite() {
        let definition = definition(
            "VerifyZeroTouch",
            json!({"result_overwrite": {"description": "ZTP off", "categories": ["ztp"], "custom_field": "ticket-42"}}),
        );
        let device = FakeDevice::new("leaf1", &[]).with_output("show zerotouch", json!({"mode": "enabled"}));
        let result = execute(&device, &definition).await;
        assert_eq!(result.result, TestStatus::Failure);
        assert_eq!(result.description, "ZTP off");
        assert_eq!(result.categories, vec!["ztp"]);
        assert_eq!(result.custom_field.as_deref(), Some("ticket-42"));
    }

    #[tokio::test]
    async fn test_skipped_platform() {
        let mut device = FakeDevice::new("ceos1", &[]);
        device.hw_model = Some("cEOSLab".to_string());
        let result = execute(&device, &definition("VerifyStormControlDrops", Value::Null)).await;
        assert_eq!(result.result, TestStatus::Skipped);
        assert_eq!(result.messages, vec!["VerifyStormControlDrops test is not supported on cEOSLab."]);
        assert!(device.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_command_skips() {
        let device = FakeDevice::new("leaf1", &[])
            .with_error("show zerotouch", "Unavailable command (not supported on this hardware platform)");
        let result = execute(&device, &definition("VerifyZeroTouch", Value::Null)).await;
        assert_eq!(result.result, TestStatus::Skipped);
        assert_eq!(result.messages, vec!["'show zerotouch' is not supported on DCS-7280CR3-32P4"]);
    }

    #[tokio::test]
    async fn test_failed_command_errors() {
        let device = FakeDevice::new("leaf1", &[]).with_error("show zerotouch", "Authorization denied");
        let result = execute(&device, &definition("VerifyZeroTouch", Value::Null)).await;
        assert_eq!(result.result, TestStatus::Error);
        assert_eq!(result.messages, vec!["show zerotouch has failed: Authorization denied"]);
    }

    #[tokio::test]
    async fn test_unexpected_output_errors() {
        let device = FakeDevice::new("leaf1", &[]).with_output("show zerotouch", json!({}));
        let result = execute(&device, &definition("VerifyZeroTouch", Value::Null)).await;
        assert_eq!(result.result, TestStatus::Error);
        assert!(result.messages[0].contains("missing key 'mode'"));
    }
}
