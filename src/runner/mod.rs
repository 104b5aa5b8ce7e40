//! Inspection context handed to every rule.
//!
//! A [`Runner`] owns the loaded module tree (the root module plus, in module
//! mode, every child module) and the optional provider client used by
//! deep-check rules. Rules read from it; they never mutate it.

mod loader;
mod source;

pub use loader::{load, LoadError};

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::issue::{Issue, Range, RuleRef};
use crate::provider::ProviderApi;
use crate::rules::Rule;

static VAR_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{\s*var\.([A-Za-z_][A-Za-z0-9_-]*)\s*\}$").unwrap());

/// A declared input variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    pub decl_range: Range,
}

/// A declared output value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub decl_range: Range,
}

/// A single attribute of a block, with the location of its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Value,
    pub range: Range,
}

/// A managed resource block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub attributes: BTreeMap<String, Attribute>,
    pub decl_range: Range,
}

impl Resource {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

/// A `module` block calling a child module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCall {
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub version: Option<String>,
    pub arguments: BTreeMap<String, Attribute>,
    pub decl_range: Range,
    pub source_range: Range,
}

/// Declarations from every configuration file of one directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub dir: String,
    pub variables: BTreeMap<String, Variable>,
    pub outputs: BTreeMap<String, Output>,
    pub resources: Vec<Resource>,
    pub module_calls: Vec<ModuleCall>,
}

/// A module together with the variable values it was instantiated with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleInstance {
    /// Module call names from the root; empty for the root module.
    pub path: Vec<String>,
    pub module: Module,
    /// Known variable values. A declared variable missing here is unknown.
    pub values: BTreeMap<String, Value>,
    /// Call sites leading to this module, outermost first.
    pub callers: Vec<Range>,
    pub children: Vec<ModuleInstance>,
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Known(Value),
    /// Depends on something that is not known statically.
    Unknown,
}

impl Evaluated {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Evaluated::Known(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Evaluated::Known(Value::Null))
    }
}

impl ModuleInstance {
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Evaluate an attribute value in this module's scope.
    ///
    /// Only whole-string `${var.name}` references are resolved; any other
    /// interpolation is unknown.
    pub fn evaluate(&self, value: &Value) -> Evaluated {
        match value {
            Value::String(s) => {
                if let Some(caps) = VAR_REFERENCE.captures(s) {
                    return match self.values.get(&caps[1]) {
                        Some(v) => Evaluated::Known(v.clone()),
                        None => Evaluated::Unknown,
                    };
                }
                if s.contains("${") {
                    Evaluated::Unknown
                } else {
                    Evaluated::Known(value.clone())
                }
            }
            other => Evaluated::Known(other.clone()),
        }
    }

    /// Build an issue located in this module.
    pub fn issue(&self, rule: &dyn Rule, message: impl Into<String>, range: &Range) -> Issue {
        Issue {
            rule: RuleRef {
                name: rule.name().to_string(),
                severity: rule.severity(),
                link: rule.link().unwrap_or_default().to_string(),
            },
            message: message.into(),
            range: range.clone(),
            callers: self.callers.clone(),
        }
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a ModuleInstance>) {
        out.push(self);
        for child in &self.children {
            child.collect(out);
        }
    }
}

/// A resource together with the module it was declared in.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRef<'a> {
    pub module: &'a ModuleInstance,
    pub resource: &'a Resource,
}

impl<'a> ResourceRef<'a> {
    /// Look up and evaluate an attribute.
    pub fn attribute(&self, name: &str) -> Option<(&'a Attribute, Evaluated)> {
        let attr = self.resource.attribute(name)?;
        Some((attr, self.module.evaluate(&attr.value)))
    }

    /// Evaluate an attribute to a string, skipping unknown and non-string values.
    pub fn string_attribute(&self, name: &str) -> Option<(&'a Attribute, String)> {
        let (attr, value) = self.attribute(name)?;
        value.as_str().map(|s| (attr, s.to_string()))
    }

    pub fn issue(&self, rule: &dyn Rule, message: impl Into<String>, range: &Range) -> Issue {
        self.module.issue(rule, message, range)
    }
}

/// Inspection context passed to [`Rule::check`].
pub struct Runner {
    root: ModuleInstance,
    provider: Option<Arc<dyn ProviderApi>>,
    snapshot: OnceCell<Box<RawValue>>,
}

impl Runner {
    pub fn new(root: ModuleInstance) -> Self {
        Self {
            root,
            provider: None,
            snapshot: OnceCell::new(),
        }
    }

    /// Attach the provider client used by deep-check rules.
    pub fn with_provider(mut self, provider: Arc<dyn ProviderApi>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Rebuild a runner from the snapshot sent over the plugin protocol.
    pub fn from_snapshot(snapshot: Value) -> anyhow::Result<Self> {
        let root: ModuleInstance = serde_json::from_value(snapshot)?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &ModuleInstance {
        &self.root
    }

    /// All module instances, root first, depth-first.
    pub fn modules(&self) -> Vec<&ModuleInstance> {
        let mut out = Vec::new();
        self.root.collect(&mut out);
        out
    }

    /// All resources of the given type across every module.
    pub fn resources(&self, kind: &str) -> Vec<ResourceRef<'_>> {
        self.modules()
            .into_iter()
            .flat_map(|module| {
                module
                    .module
                    .resources
                    .iter()
                    .filter(move |r| r.kind == kind)
                    .map(move |resource| ResourceRef { module, resource })
            })
            .collect()
    }

    /// The provider client, or an error when deep check has no endpoint.
    pub fn provider(&self) -> anyhow::Result<&dyn ProviderApi> {
        self.provider.as_deref().ok_or_else(|| {
            anyhow::anyhow!("deep check requires a provider endpoint (set provider.endpoint or --endpoint)")
        })
    }

    /// Serialized module tree, computed once and shared by every plugin call.
    pub fn snapshot(&self) -> anyhow::Result<&RawValue> {
        let raw = self.snapshot.get_or_try_init(|| {
            let json = serde_json::to_string(&self.root)?;
            RawValue::from_string(json)
        })?;
        Ok(&**raw)
    }
}
