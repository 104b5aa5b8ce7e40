//! Checks on the `source` of module calls.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::issue::{Issue, Severity};
use crate::rules::{doc_link, Rule};
use crate::runner::{ModuleCall, Runner};

static SEMVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^v?\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?$").unwrap()
});

/// Version control system a source points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vcs {
    Git,
    Mercurial,
}

impl Vcs {
    fn detect(source: &str) -> Option<Self> {
        let lower = source.to_ascii_lowercase();
        if lower.starts_with("git::")
            || lower.starts_with("git://")
            || lower.starts_with("github.com")
            || lower.starts_with("bitbucket.org")
        {
            Some(Vcs::Git)
        } else if lower.starts_with("hg::") {
            Some(Vcs::Mercurial)
        } else {
            None
        }
    }

    fn ref_key(self) -> &'static str {
        match self {
            Vcs::Git => "ref",
            Vcs::Mercurial => "rev",
        }
    }

    fn default_ref(self) -> &'static str {
        match self {
            Vcs::Git => "master",
            Vcs::Mercurial => "default",
        }
    }
}

/// The `ref`/`rev` query parameter of a source address.
fn source_ref(source: &str, key: &str) -> Option<String> {
    let (_, query) = source.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        k.eq_ignore_ascii_case(key).then(|| v.to_string())
    })
}

fn root_calls(runner: &Runner) -> impl Iterator<Item = &ModuleCall> {
    runner.root().module.module_calls.iter()
}

/// Version-control module sources must pin a ref other than the default branch.
pub struct ModulePinnedSourceRule {
    link: String,
}

impl ModulePinnedSourceRule {
    const NAME: &'static str = "terraform_module_pinned_source";

    pub fn new() -> Self {
        Self {
            link: doc_link(Self::NAME),
        }
    }

    fn problem(call: &ModuleCall) -> Option<String> {
        let vcs = Vcs::detect(&call.source)?;
        match source_ref(&call.source, vcs.ref_key()) {
            None => Some(format!("Module source \"{}\" is not pinned", call.source)),
            Some(r) if r.eq_ignore_ascii_case(vcs.default_ref()) => Some(format!(
                "Module source \"{}\" uses default {} \"{}\"",
                call.source,
                vcs.ref_key(),
                vcs.default_ref()
            )),
            Some(_) => None,
        }
    }
}

impl Default for ModulePinnedSourceRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for ModulePinnedSourceRule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn enabled(&self) -> bool {
        true
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn link(&self) -> Option<&str> {
        Some(self.link.as_str())
    }

    fn check(&self, runner: &Runner) -> anyhow::Result<Vec<Issue>> {
        let root = runner.root();
        Ok(root_calls(runner)
            .filter_map(|call| {
                Self::problem(call).map(|message| root.issue(self, message, &call.source_range))
            })
            .collect())
    }
}

/// Pinned version-control refs must look like a semantic version.
pub struct ModuleSemverSourceRule {
    link: String,
}

impl ModuleSemverSourceRule {
    const NAME: &'static str = "terraform_module_semver_source";

    pub fn new() -> Self {
        Self {
            link: doc_link(Self::NAME),
        }
    }
}

impl Default for ModuleSemverSourceRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for ModuleSemverSourceRule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn enabled(&self) -> bool {
        false
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn link(&self) -> Option<&str> {
        Some(self.link.as_str())
    }

    fn check(&self, runner: &Runner) -> anyhow::Result<Vec<Issue>> {
        let root = runner.root();
        let mut issues = Vec::new();
        for call in root_calls(runner) {
            let Some(vcs) = Vcs::detect(&call.source) else {
                continue;
            };
            // Unpinned sources are reported by the pinned-source rule.
            let Some(r) = source_ref(&call.source, vcs.ref_key()) else {
                continue;
            };
            if !SEMVER.is_match(&r) {
                issues.push(root.issue(
                    self,
                    format!(
                        "Module source \"{}\" uses a {} which is not a version string",
                        call.source,
                        vcs.ref_key()
                    ),
                    &call.source_range,
                ));
            }
        }
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::awsrules::testing::runner;

    const MODULES: &str = r#"{ "module": {
        "a_unpinned": { "source": "git://hashicorp.com/consul.git" },
        "b_master": { "source": "github.com/hashicorp/consul?ref=master" },
        "c_tag": { "source": "git::https://hashicorp.com/consul.git?ref=v1.2.0" },
        "d_branch": { "source": "bitbucket.org/hashicorp/consul?ref=feature" },
        "e_hg_default": { "source": "hg::http://hashicorp.com/consul.hg?rev=default" },
        "f_registry": { "source": "hashicorp/consul/aws", "version": "0.1.0" }
    } }"#;

    #[test]
    fn test_pinned_source() {
        let runner = runner(MODULES);
        let issues = ModulePinnedSourceRule::new().check(&runner).unwrap();
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Module source \"git://hashicorp.com/consul.git\" is not pinned",
                "Module source \"github.com/hashicorp/consul?ref=master\" uses default ref \"master\"",
                "Module source \"hg::http://hashicorp.com/consul.hg?rev=default\" uses default rev \"default\"",
            ]
        );
    }

    #[test]
    fn test_semver_source() {
        let runner = runner(MODULES);
        let issues = ModuleSemverSourceRule::new().check(&runner).unwrap();
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Module source \"github.com/hashicorp/consul?ref=master\" uses a ref which is not a version string",
                "Module source \"bitbucket.org/hashicorp/consul?ref=feature\" uses a ref which is not a version string",
                "Module source \"hg::http://hashicorp.com/consul.hg?rev=default\" uses a rev which is not a version string",
            ]
        );
    }

    #[test]
    fn test_source_ref() {
        assert_eq!(source_ref("x?depth=1&ref=v1.0.0", "ref").as_deref(), Some("v1.0.0"));
        assert_eq!(source_ref("x", "ref"), None);
    }
}
