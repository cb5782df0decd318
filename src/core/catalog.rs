use crate::checks::{find_module, find_test, TestFactory};
use crate::config::substitute_env_vars;
use crate::domain::model::CommonInputs;
use crate::domain::ports::AntaTest;
use crate::utils::error::{AntaError, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One test of the catalog with its validated inputs.
#[derive(Clone)]
pub struct AntaTestDefinition {
    /// Registry module the test was declared under, e.g. `anta.tests.stp`.
    pub module: &'static str,
    pub test: Arc<dyn AntaTest>,
    pub inputs: CommonInputs,
}

impl fmt::Debug for AntaTestDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AntaTestDefinition")
            .field("module", &self.module)
            .field("test", &self.test.name())
            .field("inputs", &self.inputs)
            .finish()
    }
}

impl AntaTestDefinition {
    /// Builds a definition from raw inputs: `null` or a table holding the
    /// common keys and the test's own inputs.
    pub fn new(module: &'static str, name: &str, factory: TestFactory, inputs: Value) -> Result<Self> {
        let invalid = |message: String| AntaError::InvalidInputs {
            test: name.to_string(),
            message,
        };

        let mut inputs = match inputs {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(invalid(format!(
                    "Could not instantiate inputs as {} is not a table",
                    other
                )))
            }
        };

        let mut common = Map::new();
        for key in CommonInputs::KEYS {
            if let Some(value) = inputs.remove(key) {
                common.insert(key.to_string(), value);
            }
        }
        let common: CommonInputs =
            serde_json::from_value(Value::Object(common)).map_err(|e| invalid(e.to_string()))?;
        let test = factory(Value::Object(inputs)).map_err(|e| invalid(e.to_string()))?;
        test.validate().map_err(|e| match e {
            AntaError::InvalidInputs { .. } => e,
            other => invalid(other.to_string()),
        })?;

        Ok(Self {
            module,
            test: Arc::from(test),
            inputs: common,
        })
    }

    pub fn name(&self) -> &'static str {
        self.test.name()
    }

    pub fn tags(&self) -> Option<&[String]> {
        self.inputs.tags()
    }
}

/// Ordered list of test definitions, usually loaded from a catalog file.
#[derive(Debug, Clone, Default)]
pub struct AntaCatalog {
    tests: Vec<AntaTestDefinition>,
    filename: Option<PathBuf>,
}

impl AntaCatalog {
    pub fn new(tests: Vec<AntaTestDefinition>, filename: Option<PathBuf>) -> Self {
        Self { tests, filename }
    }

    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading catalog from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            AntaError::catalog(format!(
                "Unable to parse ANTA Test Catalog file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut catalog = Self::from_toml_str(&content)?;
        catalog.filename = Some(path.to_path_buf());
        Ok(catalog)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;
        let data: Value = toml::from_str(&processed_content)
            .map_err(|e| AntaError::catalog(format!("Catalog file is not valid TOML: {}", e)))?;
        Self::from_value(data)
    }

    /// Builds a catalog from the `{module: [{Test: inputs}]}` structure.
    pub fn from_value(data: Value) -> Result<Self> {
        let root = match data {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(AntaError::catalog(format!(
                    "Wrong input type for catalog data, must be a table, got {}",
                    other
                )))
            }
        };
        if root.is_empty() {
            tracing::warn!("Catalog input data is empty");
            return Ok(Self::default());
        }

        let mut modules = Vec::new();
        flatten_modules(root, None, &mut modules)?;

        let mut tests = Vec::new();
        for (module_name, definitions) in modules {
            let module = find_module(&module_name).ok_or_else(|| {
                AntaError::catalog(format!(
                    "Module named {} cannot be imported. Verify that the module exists.",
                    module_name
                ))
            })?;
            for definition in definitions {
                let entry = match definition {
                    Value::Object(entry) => entry,
                    other => {
                        return Err(AntaError::catalog(format!(
                            "Syntax error when parsing: {}\nIt must be a dictionary. Check the test catalog.",
                            other
                        )))
                    }
                };
                if entry.len() != 1 {
                    return Err(AntaError::catalog(format!(
                        "Syntax error when parsing: {}\nIt must be a dictionary with a single entry. Check the test catalog.",
                        Value::Object(entry)
                    )));
                }
                for (test_name, inputs) in entry {
                    let factory = module.factory(&test_name).ok_or_else(|| {
                        AntaError::catalog(format!(
                            "{} is not defined in module {}",
                            test_name, module.name
                        ))
                    })?;
                    tests.push(AntaTestDefinition::new(module.name, &test_name, factory, inputs)?);
                }
            }
        }

        tracing::debug!("Catalog loaded with {} test(s)", tests.len());
        Ok(Self::new(tests, None))
    }

    /// Builds a catalog from `(test name, inputs)` pairs, looking each test
    /// up across every module.
    pub fn from_list<I, S>(data: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let mut tests = Vec::new();
        for (name, inputs) in data {
            let name = name.as_ref();
            let (module, factory) = find_test(name)
                .ok_or_else(|| AntaError::catalog(format!("{} is not a known ANTA test", name)))?;
            tests.push(AntaTestDefinition::new(module.name, name, factory, inputs)?);
        }
        Ok(Self::new(tests, None))
    }

    pub fn tests(&self) -> &[AntaTestDefinition] {
        &self.tests
    }

    pub fn set_tests(&mut self, tests: Vec<AntaTestDefinition>) {
        self.tests = tests;
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Appends the tests of `other`.
    pub fn merge(mut self, other: AntaCatalog) -> Self {
        self.tests.extend(other.tests);
        self
    }

    /// Tests whose filter tags match `tags`; tests without filters are left
    /// out. With `strict`, every filter tag must be in `tags`.
    pub fn get_tests_by_tags(&self, tags: &[String], strict: bool) -> Vec<&AntaTestDefinition> {
        self.tests
            .iter()
            .filter(|definition| match definition.tags() {
                Some(filter) if strict => filter.iter().all(|t| tags.contains(t)),
                Some(filter) => filter.iter().any(|t| tags.contains(t)),
                None => false,
            })
            .collect()
    }
}

/// Walks nested tables, joining keys with `.`, down to the test lists.
fn flatten_modules(data: Map<String, Value>, package: Option<&str>, modules: &mut Vec<(String, Vec<Value>)>) -> Result<()> {
    for (key, value) in data {
        let name = match package {
            Some(package) => format!("{}.{}", package, key),
            None => key,
        };
        match value {
            Value::Object(inner) => flatten_modules(inner, Some(&name), modules)?,
            Value::Array(tests) => modules.push((name, tests)),
            other => {
                return Err(AntaError::catalog(format!(
                    "Syntax error when parsing: {}\nIt must be a list of ANTA tests. Check the test catalog.",
                    other
                )))
            }
        }
    }
    Ok(())
}
