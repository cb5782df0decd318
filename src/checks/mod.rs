//! Test registry.
//!
//! Every module registers its tests under a dotted name such as
//! `anta.tests.stp`. A test is built from its JSON inputs by a
//! [`TestFactory`]; the test struct itself carries the inputs.

pub mod configuration;
pub mod connectivity;
pub mod interfaces;
pub mod logging;
pub mod security;
pub mod stp;

use crate::domain::ports::AntaTest;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub type TestFactory = fn(Value) -> std::result::Result<Box<dyn AntaTest>, serde_json::Error>;

#[derive(Debug, Clone, Copy)]
pub struct TestModule {
    pub name: &'static str,
    pub tests: &'static [(&'static str, TestFactory)],
}

impl TestModule {
    pub fn factory(&self, test: &str) -> Option<TestFactory> {
        self.tests
            .iter()
            .find(|(name, _)| *name == test)
            .map(|(_, factory)| *factory)
    }

    pub fn test_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tests.iter().map(|(name, _)| *name)
    }
}

/// Deserializes `T` from its inputs.
pub fn build<T>(inputs: Value) -> std::result::Result<Box<dyn AntaTest>, serde_json::Error>
where
    T: AntaTest + DeserializeOwned + 'static,
{
    Ok(Box::new(serde_json::from_value::<T>(inputs)?))
}

pub static MODULES: &[TestModule] = &[
    configuration::MODULE,
    connectivity::MODULE,
    interfaces::MODULE,
    logging::MODULE,
    security::MODULE,
    stp::MODULE,
];

pub fn find_module(name: &str) -> Option<&'static TestModule> {
    MODULES.iter().find(|m| m.name == name)
}

/// Module registering `test`, searched across every module.
pub fn find_test(test: &str) -> Option<(&'static TestModule, TestFactory)> {
    MODULES
        .iter()
        .find_map(|m| m.factory(test).map(|factory| (m, factory)))
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::domain::model::{OutputFormat, TestResult, TestStatus};
    use crate::domain::ports::AntaTest;
    use serde::de::DeserializeOwned;
    use serde_json::Value;

    pub fn inputs<T: DeserializeOwned>(value: Value) -> T {
        serde_json::from_value(value).expect("valid test inputs")
    }

    /// Runs `test` against `outputs`, one per command, the way the executor
    /// does once every command is collected.
    pub fn evaluate(test: &dyn AntaTest, outputs: Vec<Value>) -> TestResult {
        let mut commands = test.commands().expect("commands render");
        assert_eq!(commands.len(), outputs.len(), "one output per command");
        for (command, output) in commands.iter_mut().zip(outputs) {
            if command.ofmt == OutputFormat::Text {
                assert!(output.is_string(), "text commands take string outputs");
            }
            command.output = Some(output);
        }
        let mut result = TestResult::new(
            "dut",
            test.name(),
            test.categories().iter().map(|c| c.to_string()).collect(),
            test.description(),
            None,
        );
        if let Err(e) = test.test(&commands, &mut result) {
            result.is_error(e.to_string());
        }
        result
    }

    pub fn assert_result(result: &TestResult, status: TestStatus, messages: &[&str]) {
        assert_eq!(result.result, status, "messages: {:?}", result.messages);
        assert_eq!(result.messages, messages);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_names_are_unique() {
        let mut names: Vec<&str> = MODULES.iter().flat_map(|m| m.test_names()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 44);
    }

    #[test]
    fn test_factory_builds_named_test() {
        let module = find_module("anta.tests.configuration").unwrap();
        let factory = module.factory("VerifyZeroTouch").unwrap();
        let test = factory(json!({})).unwrap();
        assert_eq!(test.name(), "VerifyZeroTouch");
        assert!(module.factory("VerifyUnknown").is_none());
    }

    #[test]
    fn test_find_test_across_modules() {
        let (module, _) = find_test("VerifySTPMode").unwrap();
        assert_eq!(module.name, "anta.tests.stp");
        assert!(find_test("VerifyNothing").is_none());
    }
}
