//! End-to-end loader scenarios driving discovery, building, and forwarding
//! against real temp-directory trees with a scripted frontend.

use quill_diagnostics::{Diagnostic, DiagnosticSink};
use quill_loader::forwarding::ForwardingModule;
use quill_loader::serialization::{serialize_module, validate_serialized_module};
use quill_loader::{
    build_module_from_interface, dependency::mod_time_ticks, diag, CollectingTracker,
    FileDependency, FrontendInstance, HostContext, LoadError, LoadMode, ModuleFrontend,
    ModuleLoader, SubInvocation,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A scripted frontend: records every setup, "reads" a fixed extra
/// dependency list, and serializes a fixed payload.
#[derive(Default)]
struct FakeFrontend {
    payload: Vec<u8>,
    extra_deps: Vec<PathBuf>,
    fail_sema: bool,
    panic_in_sema: bool,
    fail_passes: bool,
    setups: AtomicUsize,
}

impl FakeFrontend {
    fn with_payload(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            ..Self::default()
        }
    }

    fn builds(&self) -> usize {
        self.setups.load(Ordering::SeqCst)
    }
}

struct FakeInstance<'a> {
    frontend: &'a FakeFrontend,
    diags: &'a DiagnosticSink,
}

impl ModuleFrontend for FakeFrontend {
    fn setup<'a>(
        &'a self,
        _invocation: &SubInvocation,
        diags: &'a DiagnosticSink,
    ) -> Option<Box<dyn FrontendInstance + 'a>> {
        self.setups.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(FakeInstance {
            frontend: self,
            diags,
        }))
    }
}

impl FrontendInstance for FakeInstance<'_> {
    fn perform_sema(&mut self) -> bool {
        if self.frontend.panic_in_sema {
            panic!("scripted sema crash");
        }
        if self.frontend.fail_sema {
            self.diags.emit(Diagnostic::error(
                diag::SUB_COMPILATION_FAILED,
                "scripted sema failure",
            ));
        }
        self.frontend.fail_sema
    }

    fn lower(&mut self) -> bool {
        false
    }

    fn dependencies(&self) -> Vec<PathBuf> {
        self.frontend.extra_deps.clone()
    }

    fn run_passes(&mut self, serialize: &mut dyn FnMut(&[u8])) -> bool {
        if self.frontend.fail_passes {
            return true;
        }
        serialize(&self.frontend.payload);
        false
    }
}

struct World {
    _root: tempfile::TempDir,
    src: PathBuf,
    cache: PathBuf,
    prebuilt: PathBuf,
    sdk: PathBuf,
    host: HostContext,
}

impl World {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("src");
        let cache = root.path().join("cache");
        let prebuilt = root.path().join("prebuilt");
        let sdk = root.path().join("sdk");
        for dir in [&src, &prebuilt, &sdk] {
            fs::create_dir_all(dir).unwrap();
        }

        let host = HostContext {
            toolchain_version: "quill-test-1.0".to_string(),
            target_triple: "x86_64-unknown-linux".to_string(),
            sdk_path: sdk.clone(),
            ..HostContext::default()
        };

        Self {
            _root: root,
            src,
            cache,
            prebuilt,
            sdk,
            host,
        }
    }

    fn write_interface(&self, dir: &Path, module_name: &str) -> PathBuf {
        let path = dir.join(format!("{module_name}.qi"));
        fs::write(
            &path,
            format!(
                "// quill-interface-format-version: 1.0\n\
                 // quill-module-flags: -module-name {module_name}\n\
                 public struct Marker\n"
            ),
        )
        .unwrap();
        path
    }

    fn loader<'a>(
        &'a self,
        frontend: &'a FakeFrontend,
        diags: &'a DiagnosticSink,
        prebuilt: bool,
    ) -> ModuleLoader<'a> {
        ModuleLoader::new(
            &self.host,
            frontend,
            diags,
            self.cache.clone(),
            prebuilt.then(|| self.prebuilt.clone()),
            LoadMode::PreferBinary,
            None,
        )
    }

    fn cache_entries(&self) -> Vec<PathBuf> {
        match fs::read_dir(&self.cache) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Serializes a prebuilt module for an SDK interface, recording the
    /// interface as an SDK-relative dependency.
    fn write_prebuilt(&self, module_name: &str, interface_path: &Path) -> PathBuf {
        let meta = fs::metadata(interface_path).unwrap();
        let relative = interface_path.strip_prefix(&self.sdk).unwrap();
        let deps = vec![FileDependency::mod_time_based(
            relative.to_string_lossy().into_owned(),
            true,
            meta.len(),
            mod_time_ticks(&meta),
        )];
        let bytes = serialize_module(module_name, "quill-test-1.0", &deps, b"prebuilt payload")
            .unwrap();
        let path = self.prebuilt.join(format!("{module_name}.qmod"));
        fs::write(&path, bytes).unwrap();
        path
    }
}

#[test]
fn s1_cold_build_then_cache_hit() {
    let world = World::new();
    world.write_interface(&world.src, "Foo");
    let frontend = FakeFrontend::with_payload(b"compiled Foo");
    let diags = DiagnosticSink::new();

    let loader = world.loader(&frontend, &diags, false);
    let found = loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap();
    assert_eq!(frontend.builds(), 1);
    assert!(found.doc_buffer.is_none());

    // Exactly one cache entry, named <module>-<key>.qmod.
    let entries = world.cache_entries();
    assert_eq!(entries.len(), 1);
    let name = entries[0].file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("Foo-"));
    assert!(name.ends_with(".qmod"));

    // The buffer is a valid serialized module recording the interface.
    let header = validate_serialized_module(&found.buffer).unwrap();
    assert_eq!(header.module_name, "Foo");
    assert!(header
        .dependencies
        .iter()
        .any(|d| d.path.ends_with("Foo.qi")));

    // A second load is served from the cache without rebuilding.
    let again = loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap();
    assert_eq!(frontend.builds(), 1);
    assert_eq!(again.buffer, found.buffer);
    assert!(!diags.has_errors());
}

#[test]
fn s2_touched_dependency_triggers_rebuild() {
    let world = World::new();
    let interface_path = world.write_interface(&world.src, "Foo");
    let frontend = FakeFrontend::with_payload(b"compiled Foo");
    let diags = DiagnosticSink::new();
    let loader = world.loader(&frontend, &diags, false);

    loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap();
    assert_eq!(frontend.builds(), 1);

    // Advance the interface's mtime without changing its size.
    let original = fs::read(&interface_path).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    fs::write(&interface_path, original).unwrap();

    loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap();
    assert_eq!(frontend.builds(), 2);

    // The rebuild reused the cache slot instead of adding an entry.
    assert_eq!(world.cache_entries().len(), 1);
}

#[test]
fn s3_prebuilt_hit_writes_forwarding_module() {
    let world = World::new();
    let interface_path = world.write_interface(&world.sdk, "Foo");
    let prebuilt_path = world.write_prebuilt("Foo", &interface_path);
    let frontend = FakeFrontend::default();
    let diags = DiagnosticSink::new();
    let loader = world.loader(&frontend, &diags, true);

    let found = loader
        .find_module(&world.sdk, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap();
    assert_eq!(frontend.builds(), 0);
    assert_eq!(found.buffer, fs::read(&prebuilt_path).unwrap());

    // The hit was pinned into the user cache as a forwarding record.
    let entries = world.cache_entries();
    assert_eq!(entries.len(), 1);
    let fwd = ForwardingModule::load(&fs::read(&entries[0]).unwrap()).unwrap();
    assert_eq!(fwd.path, prebuilt_path.to_string_lossy());
    assert_eq!(fwd.version, 1);
    // Snapshot lists the underlying module plus its expanded dependencies.
    assert_eq!(fwd.dependencies.len(), 2);
    assert_eq!(fwd.dependencies[0].path, prebuilt_path.to_string_lossy());
    assert_eq!(fwd.dependencies[1].path, interface_path.to_string_lossy());

    // Subsequent loads resolve through the forwarding record, still without
    // building anything.
    let again = loader
        .find_module(&world.sdk, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap();
    assert_eq!(frontend.builds(), 0);
    assert_eq!(again.buffer, found.buffer);
}

#[test]
fn s4_adjacent_binary_defers() {
    let world = World::new();
    world.write_interface(&world.src, "Foo");
    fs::write(world.src.join("Foo.qmod"), "an adjacent binary module").unwrap();
    let frontend = FakeFrontend::default();
    let diags = DiagnosticSink::new();
    let loader = world.loader(&frontend, &diags, false);

    let err = loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap_err();
    assert_eq!(err, LoadError::NotSupported);
    assert_eq!(frontend.builds(), 0);
    assert!(world.cache_entries().is_empty());
}

#[test]
fn s5_module_name_mismatch_fails_the_build() {
    let world = World::new();
    // The file is named Foo.qi but its flags declare module Bar.
    let path = world.src.join("Foo.qi");
    fs::write(
        &path,
        "// quill-interface-format-version: 1.0\n\
         // quill-module-flags: -module-name Bar\n",
    )
    .unwrap();
    let frontend = FakeFrontend::default();
    let diags = DiagnosticSink::new();
    let loader = world.loader(&frontend, &diags, false);

    let err = loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap_err();
    assert_eq!(err, LoadError::InvalidArgument);
    assert!(diags
        .diagnostics()
        .iter()
        .any(|d| d.code == diag::MODULE_NAME_MISMATCH));
    assert!(!world.cache_entries().iter().any(|p| p.is_file()));
}

#[test]
fn s6_unsupported_format_version_fails_the_build() {
    let world = World::new();
    let path = world.src.join("Foo.qi");
    fs::write(
        &path,
        "// quill-interface-format-version: 2.0\n\
         // quill-module-flags: -module-name Foo\n",
    )
    .unwrap();
    let frontend = FakeFrontend::default();
    let diags = DiagnosticSink::new();
    let loader = world.loader(&frontend, &diags, false);

    let err = loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap_err();
    assert_eq!(err, LoadError::InvalidArgument);
    assert!(diags
        .diagnostics()
        .iter()
        .any(|d| d.code == diag::UNSUPPORTED_FORMAT_VERSION));
    assert!(!world.cache_entries().iter().any(|p| p.is_file()));
}

#[test]
fn missing_interface_is_not_found() {
    let world = World::new();
    let frontend = FakeFrontend::default();
    let diags = DiagnosticSink::new();
    let loader = world.loader(&frontend, &diags, false);

    let err = loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap_err();
    assert_eq!(err, LoadError::NotFound);
    assert_eq!(frontend.builds(), 0);
}

#[test]
fn user_cache_wins_over_prebuilt() {
    let world = World::new();
    let interface_path = world.write_interface(&world.sdk, "Foo");
    world.write_prebuilt("Foo", &interface_path);
    let frontend = FakeFrontend::with_payload(b"freshly built");
    let diags = DiagnosticSink::new();

    // Build once with the prebuilt cache disabled to seed the user cache.
    let seeding_loader = world.loader(&frontend, &diags, false);
    let built = seeding_loader
        .find_module(&world.sdk, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap();
    assert_eq!(frontend.builds(), 1);

    // With both caches populated, the user cache entry is served.
    let loader = world.loader(&frontend, &diags, true);
    let found = loader
        .find_module(&world.sdk, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap();
    assert_eq!(frontend.builds(), 1);
    assert_eq!(found.buffer, built.buffer);
}

#[test]
fn doc_sidecar_is_returned_when_present() {
    let world = World::new();
    world.write_interface(&world.src, "Foo");
    fs::write(world.src.join("Foo.qdoc"), "docs for Foo").unwrap();
    let frontend = FakeFrontend::with_payload(b"compiled Foo");
    let diags = DiagnosticSink::new();
    let loader = world.loader(&frontend, &diags, false);

    let found = loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap();
    assert_eq!(found.doc_buffer.as_deref(), Some(b"docs for Foo".as_ref()));
}

#[test]
fn sema_failure_surfaces_as_invalid_argument() {
    let world = World::new();
    world.write_interface(&world.src, "Foo");
    let frontend = FakeFrontend {
        fail_sema: true,
        ..FakeFrontend::default()
    };
    let diags = DiagnosticSink::new();
    let loader = world.loader(&frontend, &diags, false);

    let err = loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap_err();
    assert_eq!(err, LoadError::InvalidArgument);
    assert!(diags.has_errors());
}

#[test]
fn sub_compilation_panic_is_contained() {
    let world = World::new();
    world.write_interface(&world.src, "Foo");
    let frontend = FakeFrontend {
        panic_in_sema: true,
        ..FakeFrontend::default()
    };
    let diags = DiagnosticSink::new();
    let loader = world.loader(&frontend, &diags, false);

    let err = loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap_err();
    assert_eq!(err, LoadError::InvalidArgument);
    assert!(diags
        .diagnostics()
        .iter()
        .any(|d| d.code == diag::SUB_COMPILATION_FAILED));
}

#[test]
fn failed_passes_surface_as_invalid_argument() {
    let world = World::new();
    world.write_interface(&world.src, "Foo");
    let frontend = FakeFrontend {
        fail_passes: true,
        ..FakeFrontend::default()
    };
    let diags = DiagnosticSink::new();
    let loader = world.loader(&frontend, &diags, false);

    let err = loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap_err();
    assert_eq!(err, LoadError::InvalidArgument);
}

#[test]
fn hash_mode_survives_touches_but_not_edits() {
    let world = World::new();
    let interface_path = world.write_interface(&world.src, "Foo");
    let frontend = FakeFrontend::with_payload(b"compiled Foo");
    let diags = DiagnosticSink::new();

    let out_path = world.src.join("out.qmod");
    let buffer = build_module_from_interface(
        &world.host,
        &frontend,
        &diags,
        &world.cache,
        None,
        "Foo",
        &interface_path,
        &out_path,
        true,
        false,
    )
    .unwrap();

    let header = validate_serialized_module(&buffer).unwrap();
    assert!(header.dependencies.iter().all(|d| !d.is_mod_time_based()));

    // A touch that preserves content leaves hash-based records fresh.
    let original = fs::read(&interface_path).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    fs::write(&interface_path, original).unwrap();
    let checker = quill_loader::FreshnessChecker::new(&world.host.sdk_path, None);
    assert!(checker.deps_up_to_date(&header.dependencies));

    // An edit that changes content is caught even if the size is kept.
    let mut edited = fs::read(&interface_path).unwrap();
    let last = edited.len() - 1;
    edited[last] ^= 0x20;
    fs::write(&interface_path, edited).unwrap();
    assert!(!checker.deps_up_to_date(&header.dependencies));
}

#[test]
fn cached_module_dependencies_are_flattened() {
    let world = World::new();
    let core_interface = world.write_interface(&world.src, "Core");
    let diags = DiagnosticSink::new();

    // Build Core into the user cache.
    let core_frontend = FakeFrontend::with_payload(b"compiled Core");
    fs::create_dir_all(&world.cache).unwrap();
    let core_out = world.cache.join("Core-testkey.qmod");
    build_module_from_interface(
        &world.host,
        &core_frontend,
        &diags,
        &world.cache,
        None,
        "Core",
        &core_interface,
        &core_out,
        false,
        false,
    )
    .unwrap();

    // App's compilation reads Core's cached binary module.
    let app_interface = world.write_interface(&world.src, "App");
    let app_frontend = FakeFrontend {
        payload: b"compiled App".to_vec(),
        extra_deps: vec![core_out.clone()],
        ..FakeFrontend::default()
    };
    let app_out = world.cache.join("App-testkey.qmod");
    let buffer = build_module_from_interface(
        &world.host,
        &app_frontend,
        &diags,
        &world.cache,
        None,
        "App",
        &app_interface,
        &app_out,
        false,
        false,
    )
    .unwrap();

    // The cached module was replaced by its own leaf dependencies: App
    // records Core.qi, never Core's .qmod cache entry.
    let header = validate_serialized_module(&buffer).unwrap();
    let paths: Vec<&str> = header.dependencies.iter().map(|d| d.path.as_str()).collect();
    assert!(paths.iter().any(|p| p.ends_with("Core.qi")));
    assert!(paths.iter().any(|p| p.ends_with("App.qi")));
    assert!(!paths.iter().any(|p| p.ends_with(".qmod")));
}

#[test]
fn dependency_tracker_observes_loads() {
    let world = World::new();
    world.write_interface(&world.src, "Foo");
    let frontend = FakeFrontend::with_payload(b"compiled Foo");
    let diags = DiagnosticSink::new();
    let tracker = CollectingTracker::new();

    let loader = ModuleLoader::new(
        &world.host,
        &frontend,
        &diags,
        world.cache.clone(),
        None,
        LoadMode::PreferBinary,
        Some(&tracker),
    );

    // The build reports the interface; the cache-hit load reports the
    // recorded dependencies it revalidated.
    loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap();
    loader
        .find_module(&world.src, "Foo", "Foo.qmod", "Foo.qdoc")
        .unwrap();

    let entries = tracker.entries();
    assert!(entries.len() >= 2);
    assert!(entries.iter().all(|e| !e.is_system));
    assert!(entries.iter().any(|e| e.path.ends_with("Foo.qi")));
}
