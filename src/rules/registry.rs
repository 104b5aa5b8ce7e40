//! Rule registry assembly, name validation and enablement resolution.

use std::collections::BTreeMap;
use thiserror::Error;

use super::{Catalog, PluginRules, RuleHandle, RuleOrigin};
use crate::config::Config;
use crate::plugin::{PluginError, PluginLoader, PluginSource};

/// Errors raised while assembling or querying the rule registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("rule `{name}` is duplicated: defined by {first} and by {second}; rule names must be unique")]
    DuplicateRule {
        name: String,
        first: RuleOrigin,
        second: RuleOrigin,
    },
    #[error("rule not found: {0}")]
    RuleNotFound(String),
    #[error("{0} defines a rule with an empty name")]
    EmptyRuleName(RuleOrigin),
    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// A rule together with its origin.
#[derive(Clone)]
pub struct RuleEntry {
    pub rule: RuleHandle,
    pub origin: RuleOrigin,
}

/// Rules keyed by name. Every key equals its rule's `name()`.
#[derive(Clone, Default)]
pub struct RuleSet {
    entries: BTreeMap<String, RuleEntry>,
}

impl RuleSet {
    /// Insert a rule, failing if its name is empty or already taken.
    fn insert(&mut self, rule: RuleHandle, origin: RuleOrigin) -> Result<(), RegistryError> {
        let name = rule.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyRuleName(origin));
        }
        if let Some(existing) = self.entries.get(&name) {
            return Err(RegistryError::DuplicateRule {
                name,
                first: existing.origin.clone(),
                second: origin,
            });
        }
        self.entries.insert(name, RuleEntry { rule, origin });
        Ok(())
    }

    fn extend<'a>(
        &mut self,
        rules: impl IntoIterator<Item = &'a RuleHandle>,
        origin: RuleOrigin,
    ) -> Result<(), RegistryError> {
        for rule in rules {
            self.insert(rule.clone(), origin.clone())?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RuleEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rule names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of rules whose intrinsic default is enabled.
    pub fn enabled_by_default(&self) -> usize {
        self.entries.values().filter(|e| e.rule.enabled()).count()
    }
}

/// Assemble the rule set for one invocation.
///
/// Deep-check rules are only included when `deep_check` is set. Built-in
/// rules are inserted first, then plugin rules; any name collision fails.
pub fn assemble(
    catalog: &Catalog,
    plugins: &[PluginRules],
    deep_check: bool,
) -> Result<RuleSet, RegistryError> {
    tracing::info!("preparing rules");
    if deep_check {
        tracing::debug!("deep check mode is enabled, adding deep check rules");
    }
    collect(catalog, plugins, deep_check)
}

fn collect(
    catalog: &Catalog,
    plugins: &[PluginRules],
    with_deep_check: bool,
) -> Result<RuleSet, RegistryError> {
    let mut set = RuleSet::default();
    set.extend(&catalog.default_rules, RuleOrigin::Default)?;
    if with_deep_check {
        set.extend(&catalog.deep_check_rules, RuleOrigin::DeepCheck)?;
    }
    for plugin in plugins {
        set.extend(&plugin.rules, RuleOrigin::Plugin(plugin.plugin.clone()))?;
    }
    Ok(set)
}

/// Check that every name in `names` is a known rule.
///
/// Known rules are all built-in rules, deep-check rules included whatever
/// the mode, plus plugin rules. Naming a deep-check rule while deep check is
/// off is accepted with a warning, since the rule will not run.
pub fn validate_rule_names<S: AsRef<str>>(
    names: &[S],
    catalog: &Catalog,
    plugins: &[PluginRules],
    deep_check: bool,
) -> Result<(), RegistryError> {
    tracing::info!("checking rules");

    let all = collect(catalog, plugins, true)?;
    tracing::info!(
        total = all.len(),
        enabled = all.enabled_by_default(),
        "{} ({}) rules total",
        all.len(),
        all.enabled_by_default()
    );

    for name in names {
        let name = name.as_ref();
        match all.get(name) {
            None => return Err(RegistryError::RuleNotFound(name.to_string())),
            Some(entry) if entry.origin == RuleOrigin::DeepCheck && !deep_check => {
                tracing::warn!(
                    rule = name,
                    "`{}` is a deep check rule and will not run unless deep check is enabled",
                    name
                );
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Resolve the rules that run for this invocation, in name order.
///
/// A configured override wins over the rule's intrinsic default. When
/// `config.only` is non-empty, exactly the listed rules are enabled.
pub fn active_rules(set: &RuleSet, config: &Config) -> Vec<RuleHandle> {
    let mut active = Vec::new();
    for (name, entry) in set.iter() {
        let enabled = if !config.only.is_empty() {
            config.only.iter().any(|n| n == name)
        } else if let Some(rc) = config.rules.get(name) {
            if rc.enabled {
                tracing::debug!("`{}` is enabled", name);
            } else {
                tracing::debug!("`{}` is disabled", name);
            }
            rc.enabled
        } else {
            entry.rule.enabled()
        };

        if enabled {
            active.push(entry.rule.clone());
        }
    }

    tracing::info!(
        total = set.len(),
        enabled = active.len(),
        "{} rules total, {} rules enabled",
        set.len(),
        active.len()
    );
    active
}

/// Built-in catalogs plus a plugin source.
pub struct Registry {
    catalog: Catalog,
    plugins: Box<dyn PluginSource>,
}

impl Registry {
    pub fn new(catalog: Catalog, plugins: impl PluginSource + 'static) -> Self {
        Self {
            catalog,
            plugins: Box::new(plugins),
        }
    }

    /// The built-in catalogs with plugins loaded from disk.
    pub fn builtin() -> Self {
        Self::new(Catalog::builtin(), PluginLoader::new())
    }

    /// Load plugins and assemble the rule set for `config`.
    pub fn rule_set(&self, config: &Config) -> Result<RuleSet, RegistryError> {
        let plugins = self.plugins.load(config)?;
        assemble(&self.catalog, &plugins, config.deep_check)
    }

    /// Check that every name in `names` is a known rule.
    pub fn check_rule_names<S: AsRef<str>>(
        &self,
        names: &[S],
        config: &Config,
    ) -> Result<(), RegistryError> {
        let plugins = self.plugins.load(config)?;
        validate_rule_names(names, &self.catalog, &plugins, config.deep_check)
    }

    /// Check every rule name the configuration refers to.
    pub fn validate_config(&self, config: &Config) -> Result<(), RegistryError> {
        let names: Vec<&str> = config
            .rules
            .keys()
            .chain(config.only.iter())
            .map(String::as_str)
            .collect();
        self.check_rule_names(&names, config)
    }

    /// The active rules for `config`.
    pub fn new_rules(&self, config: &Config) -> Result<Vec<RuleHandle>, RegistryError> {
        if !config.only.is_empty() {
            self.check_rule_names(&config.only, config)?;
        }
        let set = self.rule_set(config)?;
        Ok(active_rules(&set, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::rules::testing::rule;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Log output collected from a scoped subscriber.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn captured<T>(f: impl FnOnce() -> T) -> (T, String) {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        let logs = String::from_utf8_lossy(&capture.0.lock().unwrap()).into_owned();
        (result, logs)
    }

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                rule("default_on", true),
                rule("default_off", false),
                rule("ruleX", true),
            ],
            vec![rule("deep_on", true), rule("deep_off", false)],
        )
    }

    fn plugin(name: &str, rules: Vec<RuleHandle>) -> PluginRules {
        PluginRules {
            plugin: name.to_string(),
            rules,
        }
    }

    struct FakePlugins(Vec<PluginRules>);

    impl PluginSource for FakePlugins {
        fn load(&self, _config: &Config) -> Result<Vec<PluginRules>, PluginError> {
            Ok(self.0.clone())
        }
    }

    struct FailingPlugins;

    impl PluginSource for FailingPlugins {
        fn load(&self, _config: &Config) -> Result<Vec<PluginRules>, PluginError> {
            Err(PluginError::NotFound {
                name: "missing".to_string(),
                path: PathBuf::from("/plugins/tfcheck-ruleset-missing"),
            })
        }
    }

    fn names(rules: &[RuleHandle]) -> Vec<String> {
        rules.iter().map(|r| r.name().to_string()).collect()
    }

    fn assert_duplicate(result: Result<RuleSet, RegistryError>, expected: &str) {
        match result {
            Err(RegistryError::DuplicateRule { name, .. }) => assert_eq!(name, expected),
            Err(other) => panic!("expected duplicate error, got {other}"),
            Ok(_) => panic!("expected duplicate error, got a rule set"),
        }
    }

    #[test]
    fn test_distinct_names_assemble() {
        let plugins = vec![plugin("p1", vec![rule("p1_rule", true)])];
        let set = assemble(&catalog(), &plugins, true).unwrap();
        assert_eq!(set.len(), 6);
        for (name, entry) in set.iter() {
            assert_eq!(name, entry.rule.name());
        }
    }

    #[test]
    fn test_duplicate_between_builtins() {
        let catalog = Catalog::new(vec![rule("a", true)], vec![rule("a", true)]);
        assert_duplicate(assemble(&catalog, &[], true), "a");
    }

    #[test]
    fn test_duplicate_between_builtin_and_plugin() {
        let plugins = vec![plugin("p1", vec![rule("default_on", true)])];
        let result = assemble(&catalog(), &plugins, false);
        match result {
            Err(RegistryError::DuplicateRule {
                name,
                first,
                second,
            }) => {
                assert_eq!(name, "default_on");
                assert_eq!(first, RuleOrigin::Default);
                assert_eq!(second, RuleOrigin::Plugin("p1".to_string()));
            }
            _ => panic!("expected duplicate error"),
        }
    }

    #[test]
    fn test_duplicate_between_plugins() {
        let plugins = vec![
            plugin("p1", vec![rule("shared", true)]),
            plugin("p2", vec![rule("shared", false)]),
        ];
        assert_duplicate(assemble(&catalog(), &plugins, false), "shared");
    }

    #[test]
    fn test_plugin_colliding_with_deep_check_rule_only_fails_in_deep_mode() {
        let plugins = vec![plugin("p1", vec![rule("deep_on", true)])];
        assert!(assemble(&catalog(), &plugins, false).is_ok());
        assert_duplicate(assemble(&catalog(), &plugins, true), "deep_on");
    }

    #[test]
    fn test_empty_rule_name_is_rejected() {
        let plugins = vec![plugin("p1", vec![rule("", true)])];
        let err = assemble(&catalog(), &plugins, false).err().unwrap();
        assert!(matches!(err, RegistryError::EmptyRuleName(RuleOrigin::Plugin(_))));
    }

    #[test]
    fn test_mode_eligibility() {
        let plugins = vec![plugin("p1", vec![rule("p1_rule", true)])];

        let shallow = assemble(&catalog(), &plugins, false).unwrap();
        assert!(!shallow.contains("deep_on"));
        assert!(!shallow.contains("deep_off"));
        assert!(shallow.contains("p1_rule"));
        assert_eq!(shallow.len(), 4);

        let deep = assemble(&catalog(), &plugins, true).unwrap();
        assert!(deep.contains("deep_on"));
        assert!(deep.contains("deep_off"));
        assert_eq!(deep.len(), 6);
    }

    #[test]
    fn test_override_enables_rule() {
        let set = assemble(&catalog(), &[], false).unwrap();

        let without = active_rules(&set, &Config::default());
        assert!(!names(&without).contains(&"default_off".to_string()));

        let mut config = Config::default();
        config
            .rules
            .insert("default_off".to_string(), RuleConfig::new("default_off", true));
        let with = active_rules(&set, &config);
        assert!(names(&with).contains(&"default_off".to_string()));
    }

    #[test]
    fn test_override_disables_rule() {
        let set = assemble(&catalog(), &[], false).unwrap();
        let mut config = Config::default();
        config
            .rules
            .insert("default_on".to_string(), RuleConfig::new("default_on", false));
        let active = active_rules(&set, &config);
        assert!(!names(&active).contains(&"default_on".to_string()));
        assert!(names(&active).contains(&"ruleX".to_string()));
    }

    #[test]
    fn test_only_enables_exactly_listed_rules() {
        let set = assemble(&catalog(), &[], false).unwrap();
        let config = Config {
            only: vec!["default_off".to_string()],
            ..Default::default()
        };
        assert_eq!(names(&active_rules(&set, &config)), vec!["default_off"]);
    }

    #[test]
    fn test_validation_accepts_deep_check_name_in_shallow_mode() {
        validate_rule_names(&["deep_off"], &catalog(), &[], false).unwrap();
    }

    #[test]
    fn test_validation_rejects_unknown_name() {
        let plugins = vec![plugin("p1", vec![rule("p1_rule", true)])];
        validate_rule_names(&["p1_rule", "ruleX"], &catalog(), &plugins, false).unwrap();

        for deep_check in [false, true] {
            let err = validate_rule_names(&["nonexistent_rule"], &catalog(), &plugins, deep_check)
                .unwrap_err();
            match err {
                RegistryError::RuleNotFound(name) => assert_eq!(name, "nonexistent_rule"),
                other => panic!("expected rule not found, got {other}"),
            }
        }
    }

    #[test]
    fn test_validation_detects_duplicates() {
        let plugins = vec![plugin("p1", vec![rule("deep_on", true)])];
        let err = validate_rule_names(&["ruleX"], &catalog(), &plugins, false).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRule { .. }));
    }

    #[test]
    fn test_reassembly_is_idempotent() {
        let registry = Registry::new(
            catalog(),
            FakePlugins(vec![plugin("p1", vec![rule("p1_rule", false)])]),
        );
        let mut config = Config {
            deep_check: true,
            ..Default::default()
        };
        config
            .rules
            .insert("p1_rule".to_string(), RuleConfig::new("p1_rule", true));

        let first = registry.rule_set(&config).unwrap();
        let second = registry.rule_set(&config).unwrap();
        assert_eq!(
            first.names().collect::<Vec<_>>(),
            second.names().collect::<Vec<_>>()
        );
        assert_eq!(
            names(&active_rules(&first, &config)),
            names(&active_rules(&second, &config))
        );
    }

    #[test]
    fn test_scenario_default_config_without_plugins() {
        let registry = Registry::new(catalog(), FakePlugins(vec![]));
        let active = registry.new_rules(&Config::default()).unwrap();
        let expected = catalog()
            .default_rules
            .iter()
            .filter(|r| r.enabled())
            .count();
        assert_eq!(active.len(), expected);
    }

    #[test]
    fn test_scenario_deep_check_with_rule_disabled() {
        let registry = Registry::new(catalog(), FakePlugins(vec![]));
        let mut config = Config {
            deep_check: true,
            ..Default::default()
        };
        config
            .rules
            .insert("ruleX".to_string(), RuleConfig::new("ruleX", false));

        let active = names(&registry.new_rules(&config).unwrap());
        assert_eq!(active, vec!["deep_on", "default_on"]);
    }

    #[test]
    fn test_scenario_plugin_shadowing_default_rule() {
        let registry = Registry::new(
            catalog(),
            FakePlugins(vec![plugin("custom", vec![rule("ruleX", true)])]),
        );
        match registry.new_rules(&Config::default()) {
            Err(RegistryError::DuplicateRule { name, .. }) => assert_eq!(name, "ruleX"),
            _ => panic!("expected duplicate error"),
        }
    }

    #[test]
    fn test_plugin_errors_abort_assembly() {
        let registry = Registry::new(catalog(), FailingPlugins);
        let err = registry.rule_set(&Config::default()).err().unwrap();
        assert!(matches!(err, RegistryError::Plugin(PluginError::NotFound { .. })));
        assert!(registry.check_rule_names(&["ruleX"], &Config::default()).is_err());
    }

    #[test]
    fn test_validate_config_checks_override_names() {
        let registry = Registry::new(catalog(), FakePlugins(vec![]));
        let mut config = Config::default();
        config
            .rules
            .insert("typo_rule".to_string(), RuleConfig::new("typo_rule", true));
        match registry.validate_config(&config) {
            Err(RegistryError::RuleNotFound(name)) => assert_eq!(name, "typo_rule"),
            _ => panic!("expected rule not found"),
        }
    }

    #[test]
    fn test_enablement_logs_rule_counts() {
        let set = assemble(&catalog(), &[], false).unwrap();
        let mut config = Config::default();
        config
            .rules
            .insert("ruleX".to_string(), RuleConfig::new("ruleX", false));
        config
            .rules
            .insert("default_off".to_string(), RuleConfig::new("default_off", true));

        let (active, logs) = captured(|| active_rules(&set, &config));
        assert_eq!(names(&active), vec!["default_off", "default_on"]);
        assert!(logs.contains("3 rules total, 2 rules enabled"), "{logs}");
        assert!(logs.contains("total=3"), "{logs}");
        assert!(logs.contains("enabled=2"), "{logs}");
        assert!(logs.contains("`ruleX` is disabled"), "{logs}");
        assert!(logs.contains("`default_off` is enabled"), "{logs}");
    }

    #[test]
    fn test_validation_logs_counts_without_mode_messages() {
        let (result, logs) =
            captured(|| validate_rule_names(&["ruleX"], &catalog(), &[], false));
        result.unwrap();
        assert!(logs.contains("5 (3) rules total"), "{logs}");
        assert!(logs.contains("total=5"), "{logs}");
        assert!(logs.contains("enabled=3"), "{logs}");
        assert!(!logs.contains("deep check mode is enabled"), "{logs}");
        assert!(!logs.contains("preparing rules"), "{logs}");
    }
}
