use crate::domain::model::{TestResult, TestStatus};
use crate::utils::error::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Number of results per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub unset: usize,
    pub success: usize,
    pub failure: usize,
    pub error: usize,
    pub skipped: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: TestStatus) {
        match status {
            TestStatus::Unset => self.unset += 1,
            TestStatus::Success => self.success += 1,
            TestStatus::Failure => self.failure += 1,
            TestStatus::Error => self.error += 1,
            TestStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.unset + self.success + self.failure + self.error + self.skipped
    }
}

/// Collects test results and computes the overall status of a run.
///
/// The status follows the first result, then only moves from `skipped` to
/// `success` and from `success` to `failure`. Errors are tracked apart so
/// callers can choose to ignore them.
#[derive(Debug, Clone, Default)]
pub struct ResultManager {
    results: Vec<TestResult>,
    status: TestStatus,
    error_status: bool,
}

impl ResultManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: TestResult) {
        self.update_status(result.result);
        self.results.push(result);
    }

    pub fn add_results(&mut self, results: impl IntoIterator<Item = TestResult>) {
        for result in results {
            self.add(result);
        }
    }

    fn update_status(&mut self, status: TestStatus) {
        match (self.status, status) {
            (_, TestStatus::Error) => self.error_status = true,
            (TestStatus::Unset, status) => self.status = status,
            (TestStatus::Skipped, TestStatus::Success) => self.status = TestStatus::Success,
            (TestStatus::Skipped | TestStatus::Success, TestStatus::Failure) => self.status = TestStatus::Failure,
            _ => {}
        }
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get_status(&self, ignore_error: bool) -> TestStatus {
        if self.error_status && !ignore_error {
            TestStatus::Error
        } else {
            self.status
        }
    }

    fn filtered(&self, keep: impl Fn(&TestResult) -> bool) -> Self {
        let mut manager = Self::new();
        manager.add_results(self.results.iter().filter(|r| keep(r)).cloned());
        manager
    }

    /// Copy without the results whose status is in `hide`.
    pub fn filter(&self, hide: &[TestStatus]) -> Self {
        self.filtered(|r| !hide.contains(&r.result))
    }

    pub fn filter_by_tests(&self, tests: &[String]) -> Self {
        self.filtered(|r| tests.contains(&r.test))
    }

    pub fn filter_by_devices(&self, devices: &[String]) -> Self {
        self.filtered(|r| devices.contains(&r.name))
    }

    pub fn get_tests(&self) -> BTreeSet<String> {
        self.results.iter().map(|r| r.test.clone()).collect()
    }

    pub fn get_devices(&self) -> BTreeSet<String> {
        self.results.iter().map(|r| r.name.clone()).collect()
    }

    pub fn json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.results)?)
    }

    pub fn summary_by_device(&self) -> BTreeMap<String, StatusCounts> {
        let mut summary: BTreeMap<String, StatusCounts> = BTreeMap::new();
        for result in &self.results {
            summary.entry(result.name.clone()).or_default().add(result.result);
        }
        summary
    }

    pub fn summary_by_test(&self) -> BTreeMap<String, StatusCounts> {
        let mut summary: BTreeMap<String, StatusCounts> = BTreeMap::new();
        for result in &self.results {
            summary.entry(result.test.clone()).or_default().add(result.result);
        }
        summary
    }

    pub fn summary_by_category(&self) -> BTreeMap<String, StatusCounts> {
        let mut summary: BTreeMap<String, StatusCounts> = BTreeMap::new();
        for result in &self.results {
            for category in &result.categories {
                summary.entry(category.clone()).or_default().add(result.result);
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(device: &str, test: &str, status: TestStatus) -> TestResult {
        let mut result = TestResult::new(device, test, vec!["interfaces".to_string()], "", None);
        result.result = status;
        result
    }

    #[test]
    fn test_status_transitions() {
        let mut manager = ResultManager::new();
        assert_eq!(manager.get_status(false), TestStatus::Unset);

        manager.add(result("leaf1", "VerifyZeroTouch", TestStatus::Skipped));
        assert_eq!(manager.get_status(false), TestStatus::Skipped);
        manager.add(result("leaf1", "VerifyZeroTouch", TestStatus::Success));
        assert_eq!(manager.get_status(false), TestStatus::Success);
        manager.add(result("leaf2", "VerifyZeroTouch", TestStatus::Skipped));
        assert_eq!(manager.get_status(false), TestStatus::Success);
        manager.add(result("leaf2", "VerifySSHStatus", TestStatus::Failure));
        assert_eq!(manager.get_status(false), TestStatus::Failure);
        manager.add(result("leaf2", "VerifySSHStatus", TestStatus::Success));
        assert_eq!(manager.get_status(false), TestStatus::Failure);

        manager.add(result("leaf3", "VerifySSHStatus", TestStatus::Error));
        assert_eq!(manager.get_status(false), TestStatus::Error);
        assert_eq!(manager.get_status(true), TestStatus::Failure);
    }

    #[test]
    fn test_failure_after_skipped() {
        let mut manager = ResultManager::new();
        manager.add(result("leaf1", "VerifyStormControlDrops", TestStatus::Skipped));
        manager.add(result("leaf2", "VerifyStormControlDrops", TestStatus::Failure));
        assert_eq!(manager.get_status(false), TestStatus::Failure);
        manager.add(result("leaf3", "VerifyStormControlDrops", TestStatus::Skipped));
        assert_eq!(manager.get_status(false), TestStatus::Failure);
    }

    #[test]
    fn test_first_failure_sticks() {
        let mut manager = ResultManager::new();
        manager.add(result("leaf1", "VerifyZeroTouch", TestStatus::Failure));
        manager.add(result("leaf1", "VerifySSHStatus", TestStatus::Success));
        assert_eq!(manager.get_status(false), TestStatus::Failure);
    }

    #[test]
    fn test_filters() {
        let mut manager = ResultManager::new();
        manager.add_results([
            result("leaf1", "VerifyZeroTouch", TestStatus::Success),
            result("leaf2", "VerifyZeroTouch", TestStatus::Failure),
            result("leaf2", "VerifySSHStatus", TestStatus::Error),
        ]);

        let hidden = manager.filter(&[TestStatus::Success, TestStatus::Error]);
        assert_eq!(hidden.len(), 1);
        assert_eq!(hidden.get_status(false), TestStatus::Failure);

        let leaf2 = manager.filter_by_devices(&["leaf2".to_string()]);
        assert_eq!(leaf2.get_tests().into_iter().collect::<Vec<_>>(), vec!["VerifySSHStatus", "VerifyZeroTouch"]);

        let ztp = manager.filter_by_tests(&["VerifyZeroTouch".to_string()]);
        assert_eq!(ztp.get_devices().len(), 2);
    }

    #[test]
    fn test_summaries() {
        let mut manager = ResultManager::new();
        manager.add_results([
            result("leaf1", "VerifyZeroTouch", TestStatus::Success),
            result("leaf1", "VerifySSHStatus", TestStatus::Failure),
            result("leaf2", "VerifyZeroTouch", TestStatus::Skipped),
        ]);

        let by_device = manager.summary_by_device();
        assert_eq!(by_device["leaf1"].success, 1);
        assert_eq!(by_device["leaf1"].failure, 1);
        assert_eq!(by_device["leaf2"].total(), 1);

        let by_test = manager.summary_by_test();
        assert_eq!(by_test["VerifyZeroTouch"].skipped, 1);
        assert_eq!(manager.summary_by_category()["interfaces"].total(), 3);
    }

    #[test]
    fn test_json() {
        let mut manager = ResultManager::new();
        manager.add(result("leaf1", "VerifyZeroTouch", TestStatus::Success));
        let value: serde_json::Value = serde_json::from_str(&manager.json().unwrap()).unwrap();
        assert_eq!(value[0]["name"], "leaf1");
        assert_eq!(value[0]["result"], "success");
    }
}
