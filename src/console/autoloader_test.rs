use super::*;
use crate::error::{AutoloadError, Result};
use clap::{Arg, ArgMatches};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

/// Test utility for creating a project root with a commands directory
pub struct MockCommandEnvironment {
    pub temp_dir: TempDir,
    pub project_root: PathBuf,
    pub commands_dir: PathBuf,
}

impl MockCommandEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let project_root = temp_dir.path().to_path_buf();
        let commands_dir = project_root.join("commands");
        fs::create_dir_all(&commands_dir)?;

        Ok(Self {
            temp_dir,
            project_root,
            commands_dir,
        })
    }

    /// Write a command source file, creating parent directories
    pub fn add_command(&self, name: &str, content: &str) -> Result<()> {
        let file_path = self.commands_dir.join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file_path, content)?;
        Ok(())
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn registry(&self, catalog: TypeCatalog) -> CommandRegistry {
        CommandRegistry::new(
            self.project_root(),
            AutoloaderSettings::new("commands"),
            Arc::new(catalog),
        )
    }
}

macro_rules! test_command {
    ($ty:ident, $name:literal) => {
        #[derive(Default)]
        struct $ty {
            configured: bool,
        }

        impl CommandMarker for $ty {
            const NAME: &'static str = $name;
        }

        impl Command for $ty {
            fn configure(&mut self, definition: clap::Command) -> clap::Command {
                self.configured = true;
                definition.arg(Arg::new("arg").required(false))
            }

            fn execute(&mut self, matches: &ArgMatches, context: &mut CommandContext<'_>) -> Result<i32> {
                let arg = matches.get_one::<String>("arg").cloned().unwrap_or_default();
                writeln!(context.out, "{} {} {}", $name, self.configured, arg)?;
                Ok(0)
            }
        }
    };
}

test_command!(Alpha, "alpha");
test_command!(Beta, "beta");
test_command!(Gamma, "gamma");
test_command!(Deploy, "deploy");
test_command!(Other, "alpha");

fn catalog() -> TypeCatalog {
    crate::command_catalog! {
        "Alpha" => Alpha,
        "Beta" => Beta,
        "tools::Gamma" => Gamma,
        "Deploy" => Deploy,
        "Other" => Other,
    }
}

fn three_commands() -> MockCommandEnvironment {
    let env = MockCommandEnvironment::new().expect("Failed to create mock environment");
    env.add_command("alpha.rs", "pub struct Alpha { configured: bool }").unwrap();
    env.add_command("beta.rs", "#[derive(Default)]\npub struct Beta;").unwrap();
    env.add_command("nested/gamma.rs", "mod tools {\n    pub struct Gamma;\n}\n").unwrap();
    env
}

/// Records every registration it receives
#[derive(Default)]
struct RecordingListener {
    seen: Mutex<Vec<String>>,
}

impl RegistrationListener for RecordingListener {
    fn command_registered(&self, descriptor: &CommandDescriptor) {
        self.seen.lock().push(descriptor.name.clone());
    }
}

#[test]
fn test_construction_does_not_scan() {
    let env = MockCommandEnvironment::new().unwrap();
    let registry = CommandRegistry::new(
        env.project_root(),
        AutoloaderSettings::new("does-not-exist"),
        Arc::new(catalog()),
    );

    assert_eq!(registry.scan_count(), 0);
    assert_eq!(registry.state(), RegistryState::Uninitialized);
    assert!(registry.resolved_dir().is_none());
}

#[test]
fn test_every_file_registers_one_name() {
    let env = three_commands();
    let registry = env.registry(catalog());

    let names = registry.names().unwrap();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    for name in &names {
        assert!(registry.has(name), "has({}) should be true", name);
    }
    assert_eq!(registry.state(), RegistryState::Ready);
    assert_eq!(
        registry.resolved_dir().unwrap(),
        fs::canonicalize(&env.commands_dir).unwrap()
    );
}

#[test]
fn test_descriptors_carry_source_paths() {
    let env = three_commands();
    let registry = env.registry(catalog());

    let descriptors = registry.descriptors().unwrap();
    let gamma = descriptors.iter().find(|d| d.name == "gamma").unwrap();
    assert_eq!(gamma.discovered.qualified_name, "tools::Gamma");
    assert!(gamma
        .discovered
        .source_path
        .as_path()
        .ends_with(Path::new("nested").join("gamma.rs")));
}

#[test]
fn test_scan_runs_once() {
    let env = three_commands();
    let registry = env.registry(catalog());

    for _ in 0..5 {
        registry.names().unwrap();
        assert!(registry.has("alpha"));
        assert!(!registry.has("missing"));
        registry.get("beta").unwrap();
    }
    assert_eq!(registry.scan_count(), 1);
    assert_eq!(registry.discovery().scans(), 3);
}

#[test]
fn test_concurrent_first_use_scans_once() {
    let env = three_commands();
    let registry = Arc::new(env.registry(catalog()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.get("alpha").unwrap())
        })
        .collect();
    let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(registry.scan_count(), 1);
    assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn test_get_returns_single_instance() {
    let env = three_commands();
    let registry = env.registry(catalog());

    let first = registry.get("alpha").unwrap();
    let second = registry.get("alpha").unwrap();
    let with_extension = registry.get("alpha.rs").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &with_extension));
    assert!(registry.has("alpha.rs"));
}

#[test]
fn test_instance_state_persists_between_gets() {
    let env = three_commands();
    let registry = env.registry(catalog());

    registry
        .get("beta")
        .unwrap()
        .lock()
        .configure(clap::Command::new("beta"));

    let instance = registry.get("beta").unwrap();
    let matches = clap::Command::new("beta")
        .arg(Arg::new("arg"))
        .get_matches_from(["beta", "x"]);
    let mut out = Vec::new();
    let mut context = CommandContext::new(&registry, &mut out);
    instance.lock().execute(&matches, &mut context).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "beta true x\n");
}

#[test]
fn test_file_name_lookup_outside_marker_name() {
    let env = MockCommandEnvironment::new().unwrap();
    env.add_command("deploy_cmd.rs", "pub struct Deploy;").unwrap();
    let registry = env.registry(catalog());

    assert_eq!(registry.names().unwrap(), vec!["deploy"]);
    let by_marker = registry.get("deploy").unwrap();
    let by_file = registry.get("deploy_cmd").unwrap();
    assert!(Arc::ptr_eq(&by_marker, &by_file));
}

#[test]
fn test_empty_directory() {
    let env = MockCommandEnvironment::new().unwrap();
    let registry = env.registry(catalog());

    assert!(registry.names().unwrap().is_empty());
    assert!(!registry.has("alpha"));
    match registry.get("alpha") {
        Err(e) => assert!(e.is_not_found(), "Expected not found, got {:?}", e),
        Ok(_) => panic!("Expected lookup to fail"),
    }
}

#[test]
fn test_non_source_files_ignored() {
    let env = three_commands();
    env.add_command("README.md", "struct NotScanned;").unwrap();
    env.add_command(".hidden/secret.rs", "struct Hidden;").unwrap();
    let registry = env.registry(catalog());

    assert_eq!(registry.names().unwrap(), vec!["alpha", "beta", "gamma"]);
}

#[test]
fn test_custom_extension() {
    let env = MockCommandEnvironment::new().unwrap();
    env.add_command("alpha.cmd", "struct Alpha;").unwrap();
    env.add_command("beta.rs", "struct Beta;").unwrap();
    let registry = CommandRegistry::new(
        env.project_root(),
        AutoloaderSettings::new("commands").with_extension(".cmd"),
        Arc::new(catalog()),
    );

    assert_eq!(registry.names().unwrap(), vec!["alpha"]);
    assert!(Arc::ptr_eq(
        &registry.get("alpha.cmd").unwrap(),
        &registry.get("alpha").unwrap()
    ));
}

#[test]
fn test_file_without_type_fails_initialization() {
    let env = three_commands();
    env.add_command("helpers.rs", "pub fn helper() -> u32 { 1 }").unwrap();
    let registry = env.registry(catalog());

    match registry.ensure_initialized() {
        Err(AutoloadError::NoTypeFound { path }) => {
            assert_eq!(path.file_name().unwrap(), "helpers.rs")
        }
        other => panic!("Expected NoTypeFound, got {:?}", other),
    }
    assert_eq!(registry.state(), RegistryState::Uninitialized);
    assert!(!registry.has("alpha"));
    assert!(registry.names().is_err());
}

#[test]
fn test_failed_scan_is_retried() {
    let env = three_commands();
    env.add_command("helpers.rs", "pub fn helper() {}").unwrap();
    let registry = env.registry(catalog());

    assert!(registry.ensure_initialized().is_err());
    assert_eq!(registry.scan_count(), 1);

    fs::remove_file(env.commands_dir.join("helpers.rs")).unwrap();
    registry.ensure_initialized().unwrap();
    assert_eq!(registry.scan_count(), 2);
    assert_eq!(registry.state(), RegistryState::Ready);
}

#[test]
fn test_marked_type_without_command_capability() {
    let env = MockCommandEnvironment::new().unwrap();
    env.add_command("widget.rs", "pub struct Widget;").unwrap();
    let registry = env.registry(catalog().plain_type("Widget", Some("widget")));

    match registry.ensure_initialized() {
        Err(AutoloadError::InvalidCommand { type_name }) => assert_eq!(type_name, "Widget"),
        other => panic!("Expected InvalidCommand, got {:?}", other),
    }
    assert!(!registry.has("widget"));
}

#[test]
fn test_unmarked_command_rejected() {
    let env = MockCommandEnvironment::new().unwrap();
    env.add_command("bare.rs", "pub struct Bare;").unwrap();
    let registry = env.registry(catalog().unmarked_command::<Alpha>("Bare"));

    match registry.ensure_initialized() {
        Err(AutoloadError::NotACommand { type_name }) => assert_eq!(type_name, "Bare"),
        other => panic!("Expected NotACommand, got {:?}", other),
    }
}

#[test]
fn test_unknown_type_rejected() {
    let env = MockCommandEnvironment::new().unwrap();
    env.add_command("ghost.rs", "pub enum Ghost { Boo }").unwrap();
    let registry = env.registry(catalog());

    match registry.ensure_initialized() {
        Err(AutoloadError::TypeNotResolvable { name }) => assert_eq!(name, "Ghost"),
        other => panic!("Expected TypeNotResolvable, got {:?}", other),
    }
}

#[test]
fn test_duplicate_command_names() {
    let env = MockCommandEnvironment::new().unwrap();
    env.add_command("alpha.rs", "struct Alpha;").unwrap();
    env.add_command("other.rs", "struct Other;").unwrap();
    let registry = env.registry(catalog());

    match registry.ensure_initialized() {
        Err(AutoloadError::DuplicateCommand { name, first, second }) => {
            assert_eq!(name, "alpha");
            assert_eq!(first.file_name().unwrap(), "alpha.rs");
            assert_eq!(second.file_name().unwrap(), "other.rs");
        }
        other => panic!("Expected DuplicateCommand, got {:?}", other),
    }
}

#[test]
fn test_missing_commands_directory_fails_lazily() {
    let env = MockCommandEnvironment::new().unwrap();
    let registry = CommandRegistry::new(
        env.project_root(),
        AutoloaderSettings::new("missing"),
        Arc::new(catalog()),
    );

    assert!(!registry.has("alpha"));
    match registry.names() {
        Err(e) => assert!(e.is_not_found()),
        Ok(names) => panic!("Expected failure, got {:?}", names),
    }
}

#[test]
fn test_derive_command_name_uses_marker() {
    let env = three_commands();
    let registry = env.registry(catalog());
    let discovered = DiscoveredType {
        qualified_name: "tools::Gamma".to_string(),
        source_path: crate::filesystem::PathResolver::new(&env.commands_dir)
            .unwrap()
            .resolve(["nested", "gamma.rs"])
            .unwrap(),
    };

    let descriptor = registry.derive_command_name(&discovered).unwrap();
    assert_eq!(descriptor.name, "gamma");
    assert_eq!(descriptor.discovered, discovered);
    // Nothing was scanned to answer
    assert_eq!(registry.scan_count(), 0);
}

#[test]
fn test_listeners_notified_in_order_once() {
    let env = three_commands();
    let listener = Arc::new(RecordingListener::default());
    let registry = env.registry(catalog()).with_listener(listener.clone());

    registry.names().unwrap();
    registry.names().unwrap();
    assert_eq!(*listener.seen.lock(), vec!["alpha", "beta", "gamma"]);
}

#[test]
fn test_listeners_not_notified_on_failure() {
    let env = three_commands();
    env.add_command("zz_helpers.rs", "fn nothing() {}").unwrap();
    let listener = Arc::new(RecordingListener::default());
    let registry = env.registry(catalog()).with_listener(listener.clone());

    assert!(registry.ensure_initialized().is_err());
    assert!(listener.seen.lock().is_empty());
}

#[test]
fn test_from_config() {
    let env = three_commands();
    fs::create_dir_all(env.project_root().join("config")).unwrap();
    fs::write(
        env.project_root().join("config/global.yaml"),
        "autoloader:\n  paths:\n    commands: commands\n",
    )
    .unwrap();

    let config = crate::config::ConfigRepository::new(env.project_root());
    let registry =
        CommandRegistry::from_config(env.project_root(), &config, Arc::new(catalog())).unwrap();

    assert_eq!(registry.commands_dir(), env.project_root().join("commands"));
    assert_eq!(registry.names().unwrap().len(), 3);
}

#[test]
fn test_application_end_to_end() {
    let env = three_commands();
    let app = Application::new("tool", "0.1.0");
    let registry = env.registry(catalog()).with_listener(app.listener());
    let app = app.with_loader(Arc::new(registry));

    let mut out = Vec::new();
    assert_eq!(app.run(["tool", "gamma", "now"], &mut out).unwrap(), 0);
    assert_eq!(String::from_utf8(out).unwrap(), "gamma true now\n");
    assert_eq!(app.registered(), vec!["alpha", "beta", "gamma"]);
}

#[test]
fn test_hidden_file_not_served_by_name() {
    let env = three_commands();
    env.add_command(".hidden/impostor.rs", "struct Other;").unwrap();
    let registry = env.registry(catalog());

    let alpha = registry.get("alpha").unwrap();
    match registry.get(".hidden/impostor") {
        Err(e) => assert!(e.is_not_found(), "Expected not found, got {:?}", e),
        Ok(_) => panic!("Hidden file must not be served"),
    }
    assert!(!registry.has(".hidden/impostor.rs"));
    assert!(Arc::ptr_eq(&alpha, &registry.get("alpha").unwrap()));
    assert_eq!(registry.names().unwrap(), vec!["alpha", "beta", "gamma"]);
}

#[test]
fn test_late_file_cannot_take_over_registered_name() {
    let env = three_commands();
    let registry = env.registry(catalog());
    registry.ensure_initialized().unwrap();

    // Added after the scan, declaring a type registered as "alpha"
    env.add_command("other.rs", "struct Other;").unwrap();

    match registry.get("other") {
        Err(AutoloadError::DuplicateCommand { name, first, second }) => {
            assert_eq!(name, "alpha");
            assert_eq!(first.file_name().unwrap(), "alpha.rs");
            assert_eq!(second.file_name().unwrap(), "other.rs");
        }
        other => panic!("Expected DuplicateCommand, got {:?}", other.map(|_| ())),
    }
    assert!(!registry.has("other"));

    let instance = registry.get("alpha").unwrap();
    let descriptors = registry.descriptors().unwrap();
    assert_eq!(descriptors[0].discovered.qualified_name, "Alpha");
    assert!(Arc::ptr_eq(&instance, &registry.get("alpha.rs").unwrap()));
}

#[cfg(unix)]
#[test]
fn test_symlinked_command_reachable_by_path() {
    let env = MockCommandEnvironment::new().unwrap();
    let real = env.project_root().join("real");
    fs::create_dir_all(&real).unwrap();
    fs::write(real.join("alpha.rs"), "pub struct Alpha;").unwrap();
    std::os::unix::fs::symlink(&real, env.commands_dir.join("shared")).unwrap();
    let registry = env.registry(catalog());

    assert_eq!(registry.names().unwrap(), vec!["alpha"]);
    let by_name = registry.get("alpha").unwrap();
    let by_path = registry.get("shared/alpha").unwrap();
    assert!(Arc::ptr_eq(&by_name, &by_path));
    assert_eq!(registry.discovery().cached(), 1);
}

#[test]
fn test_traversal_names_never_resolve() {
    let env = three_commands();
    env.add_command(".hidden/secret.rs", "struct Beta;").unwrap();
    fs::create_dir_all(env.project_root().join("config")).unwrap();
    fs::write(env.project_root().join("config/global.rs"), "struct Beta;").unwrap();
    let registry = env.registry(catalog());

    let absolute = env.commands_dir.join("alpha");
    let inputs = [
        "../config/global",
        "../config/global.rs",
        "/etc/passwd",
        absolute.to_str().unwrap(),
        "",
        ".rs",
        "nested/../alpha",
        "./.hidden/secret",
        "nested/",
    ];

    for input in inputs {
        assert!(!registry.has(input), "has({:?}) should be false", input);
        match registry.get(input) {
            Err(e) => assert!(e.is_not_found(), "get({:?}) failed with {:?}", input, e),
            Ok(_) => panic!("get({:?}) should fail", input),
        }
    }
    assert!(registry.has("./alpha"));
    assert!(registry.has("nested/gamma"));
}

proptest! {
    #[test]
    fn prop_unknown_names_never_resolve(name in "\\PC*") {
        let env = MockCommandEnvironment::new().unwrap();
        let registry = env.registry(catalog());
        prop_assert!(!registry.has(&name));
    }

    #[test]
    fn prop_escaping_names_never_resolve(name in "(\\.\\./|/)\\PC*") {
        let env = three_commands();
        let registry = env.registry(catalog());
        prop_assert!(!registry.has(&name));
    }
}
