//! Loading Terraform JSON configuration (`*.tf.json`) into module instances.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use super::source::SourceIndex;
use super::{Attribute, Evaluated, Module, ModuleCall, ModuleInstance, Output, Resource, Variable};
use crate::config::Config;

const CONFIG_SUFFIX: &str = ".tf.json";
const DEFAULT_VAR_FILE: &str = "terraform.tfvars.json";
const AUTO_VAR_SUFFIX: &str = ".auto.tfvars.json";

/// Environment variable relocating Terraform's data directory.
pub const DATA_DIR_ENV: &str = "TF_DATA_DIR";
const DEFAULT_DATA_DIR: &str = ".terraform";
const MAX_MODULE_DEPTH: usize = 32;

/// Errors raised while loading configuration files.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path}: {message}")]
    Invalid { path: PathBuf, message: String },
    #[error("files must be in a single directory, found {0} and {1}")]
    MultipleDirectories(PathBuf, PathBuf),
    #[error("module `{name}` is not found at {dir}; run `terraform init` first")]
    ModuleNotFound { name: String, dir: PathBuf },
}

/// Load the root module (and child modules in module mode) from `paths`.
///
/// `paths` is either empty (current directory), one directory, or a list of
/// configuration files in a single directory.
pub fn load(config: &Config, paths: &[PathBuf]) -> Result<ModuleInstance, LoadError> {
    let (dir, files) = resolve_targets(paths)?;
    let module = parse_module(&dir, &files)?;
    tracing::info!(
        dir = %dir.display(),
        files = files.len(),
        resources = module.resources.len(),
        "loaded root module"
    );

    let values = root_values(config, &dir, &module)?;
    let mut root = ModuleInstance {
        path: Vec::new(),
        module,
        values,
        callers: Vec::new(),
        children: Vec::new(),
    };

    if config.module {
        load_children(config, &dir, &mut root, 0)?;
    }

    Ok(root)
}

fn resolve_targets(paths: &[PathBuf]) -> Result<(PathBuf, Vec<PathBuf>), LoadError> {
    if paths.is_empty() {
        let dir = PathBuf::from(".");
        let files = list_config_files(&dir)?;
        return Ok((dir, files));
    }

    if paths.len() == 1 && paths[0].is_dir() {
        let dir = paths[0].clone();
        let files = list_config_files(&dir)?;
        return Ok((dir, files));
    }

    let mut dir: Option<PathBuf> = None;
    for path in paths {
        if !path.is_file() {
            return Err(LoadError::Invalid {
                path: path.clone(),
                message: "not a configuration file".to_string(),
            });
        }
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        match &dir {
            Some(d) if *d != parent => {
                return Err(LoadError::MultipleDirectories(d.clone(), parent));
            }
            Some(_) => {}
            None => dir = Some(parent),
        }
    }
    let dir = dir.unwrap_or_else(|| PathBuf::from("."));
    let files = paths
        .iter()
        .filter_map(|p| p.file_name().map(PathBuf::from))
        .collect();
    Ok((dir, files))
}

/// List `*.tf.json` file names (relative to `dir`) in name order.
fn list_config_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| LoadError::Read {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(CONFIG_SUFFIX) {
            files.push(PathBuf::from(entry.file_name()));
        }
    }
    Ok(files)
}

/// Path shown in issue ranges: `dir/file`, without a leading `./`.
fn display_path(dir: &Path, file: &Path) -> String {
    let joined = if dir == Path::new(".") {
        file.to_path_buf()
    } else {
        dir.join(file)
    };
    let s = joined.to_string_lossy().to_string();
    s.strip_prefix("./").map(str::to_string).unwrap_or(s)
}

fn display_dir(dir: &Path) -> String {
    let s = dir.to_string_lossy();
    match s.strip_prefix("./").unwrap_or(&*s) {
        "" => ".".to_string(),
        rest => rest.trim_end_matches('/').to_string(),
    }
}

fn read_json(path: &Path) -> Result<(String, Value), LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value = serde_json::from_str(&text).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((text, value))
}

fn as_object<'a>(
    value: &'a Value,
    path: &Path,
    what: &str,
) -> Result<&'a Map<String, Value>, LoadError> {
    value.as_object().ok_or_else(|| LoadError::Invalid {
        path: path.to_path_buf(),
        message: format!("{} must be a JSON object", what),
    })
}

/// Parse every file of one module directory.
pub(crate) fn parse_module(dir: &Path, files: &[PathBuf]) -> Result<Module, LoadError> {
    let mut module = Module {
        dir: display_dir(dir),
        ..Default::default()
    };

    for file in files {
        let path = dir.join(file);
        let filename = display_path(dir, file);
        let (text, value) = read_json(&path)?;
        let index = SourceIndex::new(&filename, &text);
        let body = as_object(&value, &path, "configuration file")?;

        if let Some(resources) = body.get("resource") {
            for (kind, blocks) in as_object(resources, &path, "resource")? {
                for (name, block) in as_object(blocks, &path, "resource type")? {
                    let block = as_object(block, &path, "resource block")?;
                    let attributes = block
                        .iter()
                        .map(|(attr, value)| {
                            let range = index.locate(&[
                                "resource",
                                kind.as_str(),
                                name.as_str(),
                                attr.as_str(),
                            ]);
                            (
                                attr.clone(),
                                Attribute {
                                    name: attr.clone(),
                                    value: value.clone(),
                                    range,
                                },
                            )
                        })
                        .collect();
                    module.resources.push(Resource {
                        kind: kind.clone(),
                        name: name.clone(),
                        attributes,
                        decl_range: index.locate(&["resource", kind.as_str(), name.as_str()]),
                    });
                }
            }
        }

        if let Some(variables) = body.get("variable") {
            for (name, block) in as_object(variables, &path, "variable")? {
                let block = as_object(block, &path, "variable block")?;
                module.variables.insert(
                    name.clone(),
                    Variable {
                        name: name.clone(),
                        default: block.get("default").cloned(),
                        description: string_field(block, "description"),
                        decl_range: index.locate(&["variable", name.as_str()]),
                    },
                );
            }
        }

        if let Some(outputs) = body.get("output") {
            for (name, block) in as_object(outputs, &path, "output")? {
                let block = as_object(block, &path, "output block")?;
                module.outputs.insert(
                    name.clone(),
                    Output {
                        name: name.clone(),
                        description: string_field(block, "description"),
                        decl_range: index.locate(&["output", name.as_str()]),
                    },
                );
            }
        }

        if let Some(calls) = body.get("module") {
            for (name, block) in as_object(calls, &path, "module")? {
                let block = as_object(block, &path, "module block")?;
                let source = string_field(block, "source").ok_or_else(|| LoadError::Invalid {
                    path: path.clone(),
                    message: format!("module `{}` has no source", name),
                })?;
                let arguments = block
                    .iter()
                    .filter(|(k, _)| !is_meta_argument(k))
                    .map(|(arg, value)| {
                        (
                            arg.clone(),
                            Attribute {
                                name: arg.clone(),
                                value: value.clone(),
                                range: index.locate(&["module", name.as_str(), arg.as_str()]),
                            },
                        )
                    })
                    .collect();
                module.module_calls.push(ModuleCall {
                    name: name.clone(),
                    source,
                    version: string_field(block, "version"),
                    arguments,
                    decl_range: index.locate(&["module", name.as_str()]),
                    source_range: index.locate(&["module", name.as_str(), "source"]),
                });
            }
        }
    }

    Ok(module)
}

fn is_meta_argument(key: &str) -> bool {
    matches!(
        key,
        "source" | "version" | "providers" | "count" | "for_each" | "depends_on"
    )
}

fn string_field(block: &Map<String, Value>, key: &str) -> Option<String> {
    block.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Variable values for the root module, lowest precedence first: declared
/// defaults, `terraform.tfvars.json`, `*.auto.tfvars.json`, `varfile`
/// entries, then `variables`.
fn root_values(
    config: &Config,
    dir: &Path,
    module: &Module,
) -> Result<BTreeMap<String, Value>, LoadError> {
    let mut values = defaults(module);

    let default_file = dir.join(DEFAULT_VAR_FILE);
    if default_file.is_file() {
        apply_var_file(&mut values, &default_file)?;
    }

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| LoadError::Read {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_file() && name.ends_with(AUTO_VAR_SUFFIX) {
            apply_var_file(&mut values, entry.path())?;
        }
    }

    for file in &config.varfile {
        apply_var_file(&mut values, file)?;
    }

    for var in &config.variables {
        if let Some((name, value)) = var.split_once('=') {
            values.insert(name.trim().to_string(), Value::String(value.to_string()));
        }
    }

    Ok(values)
}

fn defaults(module: &Module) -> BTreeMap<String, Value> {
    module
        .variables
        .values()
        .filter_map(|v| v.default.clone().map(|d| (v.name.clone(), d)))
        .collect()
}

fn apply_var_file(values: &mut BTreeMap<String, Value>, path: &Path) -> Result<(), LoadError> {
    tracing::debug!(path = %path.display(), "applying variable file");
    let (_, value) = read_json(path)?;
    for (name, v) in as_object(&value, path, "variable file")? {
        values.insert(name.clone(), v.clone());
    }
    Ok(())
}

fn is_local_source(source: &str) -> bool {
    source.starts_with("./") || source.starts_with("../")
}

fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

fn load_children(
    config: &Config,
    dir: &Path,
    parent: &mut ModuleInstance,
    depth: usize,
) -> Result<(), LoadError> {
    if depth >= MAX_MODULE_DEPTH {
        return Err(LoadError::Invalid {
            path: dir.to_path_buf(),
            message: format!("module nesting deeper than {}", MAX_MODULE_DEPTH),
        });
    }

    let calls = parent.module.module_calls.clone();
    for call in calls {
        if config.is_module_ignored(&call.source) {
            tracing::info!(module = %call.name, source = %call.source, "ignoring module");
            continue;
        }

        let mut path = parent.path.clone();
        path.push(call.name.clone());

        let child_dir = if is_local_source(&call.source) {
            dir.join(&call.source)
        } else {
            data_dir().join("modules").join(path.join("."))
        };
        if !child_dir.is_dir() {
            return Err(LoadError::ModuleNotFound {
                name: path.join("."),
                dir: child_dir,
            });
        }

        let files = list_config_files(&child_dir)?;
        let module = parse_module(&child_dir, &files)?;
        tracing::debug!(module = %path.join("."), dir = %child_dir.display(), "loaded child module");

        let mut values = defaults(&module);
        for (name, arg) in &call.arguments {
            match parent.evaluate(&arg.value) {
                Evaluated::Known(v) => {
                    values.insert(name.clone(), v);
                }
                Evaluated::Unknown => {
                    values.remove(name);
                }
            }
        }

        let mut callers = parent.callers.clone();
        callers.push(call.decl_range.clone());

        let mut child = ModuleInstance {
            path,
            module,
            values,
            callers,
            children: Vec::new(),
        };
        load_children(config, &child_dir, &mut child, depth + 1)?;
        parent.children.push(child);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        if let Some(parent) = dir.join(name).parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_load_directory_with_variables() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "main.tf.json",
            r#"{
  "variable": { "type": { "default": "t1.micro" }, "ami": {} },
  "resource": { "aws_instance": { "web": { "instance_type": "${var.type}", "ami": "${var.ami}" } } }
}"#,
        );
        write(temp.path(), "terraform.tfvars.json", r#"{ "ami": "ami-1234" }"#);
        write(temp.path(), "extra.tfvars.json", r#"{ "type": "m5.large" }"#);

        let config = Config {
            varfile: vec![temp.path().join("extra.tfvars.json")],
            variables: vec!["ami=ami-9999".to_string()],
            ..Default::default()
        };
        let root = load(&config, &[temp.path().to_path_buf()]).unwrap();

        assert_eq!(root.module.resources.len(), 1);
        assert_eq!(root.values["type"], json!("m5.large"));
        assert_eq!(root.values["ami"], json!("ami-9999"));
        let attr = root.module.resources[0].attribute("instance_type").unwrap();
        assert_eq!(root.evaluate(&attr.value), Evaluated::Known(json!("m5.large")));
        assert_eq!(attr.range.start.line, 3);
    }

    #[test]
    fn test_load_explicit_files_in_one_directory() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.tf.json", r#"{ "output": { "x": { "value": "1" } } }"#);
        write(temp.path(), "b.tf.json", r#"{ "output": { "y": { "value": "2" } } }"#);

        let root = load(&Config::default(), &[temp.path().join("a.tf.json")]).unwrap();
        assert_eq!(root.module.outputs.len(), 1);
        assert!(root.module.outputs.contains_key("x"));
    }

    #[test]
    fn test_files_from_two_directories_are_rejected() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a/main.tf.json", "{}");
        write(temp.path(), "b/main.tf.json", "{}");

        let err = load(
            &Config::default(),
            &[temp.path().join("a/main.tf.json"), temp.path().join("b/main.tf.json")],
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::MultipleDirectories(_, _)));
    }

    #[test]
    fn test_module_mode_loads_local_children() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "main.tf.json",
            r#"{
  "variable": { "size": { "default": "t2.micro" } },
  "module": {
    "app": { "source": "./app", "instance_type": "${var.size}" },
    "skipped": { "source": "./ignore_module" }
  }
}"#,
        );
        write(
            temp.path(),
            "app/main.tf.json",
            r#"{ "variable": { "instance_type": {} }, "resource": { "aws_instance": { "a": { "instance_type": "${var.instance_type}" } } } }"#,
        );

        let mut config = Config {
            module: true,
            ..Default::default()
        };
        config.ignore_module.insert("./ignore_module".to_string(), true);

        let root = load(&config, &[temp.path().to_path_buf()]).unwrap();
        assert_eq!(root.children.len(), 1);
        let child = &root.children[0];
        assert_eq!(child.path, vec!["app".to_string()]);
        assert_eq!(child.values["instance_type"], json!("t2.micro"));
        assert_eq!(child.callers.len(), 1);
        assert_eq!(child.callers[0].start.line, 4);
    }

    #[test]
    fn test_module_mode_reports_missing_module() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "main.tf.json",
            r#"{ "module": { "net": { "source": "./missing" } } }"#,
        );
        let config = Config {
            module: true,
            ..Default::default()
        };
        let err = load(&config, &[temp.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, LoadError::ModuleNotFound { .. }));
    }

    #[test]
    fn test_child_modules_skipped_without_module_mode() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "main.tf.json",
            r#"{ "module": { "net": { "source": "./missing" } } }"#,
        );
        let root = load(&Config::default(), &[temp.path().to_path_buf()]).unwrap();
        assert!(root.children.is_empty());
        assert_eq!(root.module.module_calls.len(), 1);
    }
}
