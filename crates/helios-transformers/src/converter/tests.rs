use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use super::*;
use crate::collab::MemoryReporter;
use crate::config::HeliosConfig;
use crate::error::ProcessError;
use crate::process::{ProcessLauncher, ProcessOutput};

/// Launcher that records templates and replies with a canned result.
struct FakeLauncher {
    launched: Mutex<Vec<ProcessTemplate>>,
    reply: fn() -> Result<ProcessOutput, ProcessError>,
}

impl FakeLauncher {
    fn new(reply: fn() -> Result<ProcessOutput, ProcessError>) -> Arc<Self> {
        Arc::new(Self {
            launched: Mutex::new(Vec::new()),
            reply,
        })
    }

    fn succeeding() -> Arc<Self> {
        Self::new(|| {
            Ok(ProcessOutput {
                exit_code: 0,
                stderr: String::new(),
                duration: Duration::from_millis(12),
            })
        })
    }

    fn launched(&self) -> Vec<ProcessTemplate> {
        self.launched.lock().clone()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(
        &self,
        template: &ProcessTemplate,
        _options: &InvokeOptions,
    ) -> Result<ProcessOutput, ProcessError> {
        self.launched.lock().push(template.clone());
        (self.reply)()
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    tool: PathBuf,
    env: Arc<Environment>,
    reporter: Arc<MemoryReporter>,
    launcher: Arc<FakeLauncher>,
}

/// Environment whose python3 and dex2jar point at an existing file, with
/// discovery disabled so the host's tools never leak in.
fn fixture(launcher: Arc<FakeLauncher>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let tool = dir.path().join("tool");
    std::fs::write(&tool, "").unwrap();

    let config = HeliosConfig {
        python3_location: Some(tool.clone()),
        dex2jar_location: Some(tool.clone()),
        enjarify_dir: Some(dir.path().to_path_buf()),
        discover_tools: false,
        ..Default::default()
    };
    let reporter = Arc::new(MemoryReporter::new());
    let env = Environment::new(config)
        .with_reporter(reporter.clone())
        .with_launcher(launcher.clone());

    Fixture {
        _dir: dir,
        tool,
        env: Arc::new(env),
        reporter,
        launcher,
    }
}

fn unconfigured() -> (Arc<Environment>, Arc<MemoryReporter>, Arc<FakeLauncher>) {
    let launcher = FakeLauncher::succeeding();
    let reporter = Arc::new(MemoryReporter::new());
    let config = HeliosConfig {
        discover_tools: false,
        ..Default::default()
    };
    let env = Environment::new(config)
        .with_reporter(reporter.clone())
        .with_launcher(launcher.clone());
    (Arc::new(env), reporter, launcher)
}

fn os(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

#[test]
fn test_status_display_and_success() {
    let done = ConversionStatus::Completed {
        exit_code: 0,
        duration: Duration::from_millis(1500),
    };
    assert!(done.is_success());
    assert_eq!(done.to_string(), "completed (exit code 0, 1.50s)");

    let skipped = ConversionStatus::Skipped {
        reason: "no python".to_string(),
    };
    assert!(!skipped.is_success());
    assert_eq!(skipped.to_string(), "skipped: no python");
    assert!(!ConversionStatus::NoOp.is_success());
}

#[test]
fn test_enjarify_template() {
    let template = Enjarify::template(
        Path::new("/usr/bin/python3"),
        Some(Path::new("/opt/enjarify")),
        Path::new("/tmp/app.apk"),
        Path::new("/tmp/app.jar"),
    );
    assert_eq!(template.program, PathBuf::from("/usr/bin/python3"));
    assert_eq!(
        template.args,
        os(&["-O", "-m", "enjarify.main", "/tmp/app.apk", "-o", "/tmp/app.jar", "-f"])
    );
    assert_eq!(template.working_dir, Some(PathBuf::from("/opt/enjarify")));
}

#[test]
fn test_dex2jar_template() {
    let template = Dex2Jar::template(
        Path::new("/opt/dex2jar/d2j-dex2jar.sh"),
        Path::new("/tmp/classes.dex"),
        Path::new("/tmp/classes.jar"),
    );
    assert_eq!(
        template.args,
        os(&["-o", "/tmp/classes.jar", "--force", "/tmp/classes.dex"])
    );
    assert_eq!(template.working_dir, None);
}

#[test]
fn test_applicability() {
    let (env, _, _) = unconfigured();
    let enjarify = Converter::new(ENJARIFY, "Enjarify", Enjarify, env.clone()).unwrap();
    let dex2jar = Converter::new(DEX2JAR, "Dex2Jar", Dex2Jar, env.clone()).unwrap();
    let jar2dex = Converter::new(JAR2DEX, "Jar2Dex", Jar2Dex, env.clone()).unwrap();
    let none = Converter::new(NONE, "None", NoConversion, env).unwrap();

    assert!(enjarify.is_applicable("Foo.class"));
    assert!(enjarify.is_applicable(""));
    assert!(dex2jar.is_applicable("classes.dex"));
    assert!(!dex2jar.is_applicable("classes.jar"));
    assert!(jar2dex.is_applicable("app.jar"));
    assert!(!jar2dex.is_applicable("app.dex"));
    for name in ["", "none", "Foo.class", "classes.dex"] {
        assert!(!none.is_applicable(name));
    }
}

#[test]
fn test_enjarify_launches_configured_python() {
    let fx = fixture(FakeLauncher::succeeding());
    let converter = Converter::new(ENJARIFY, "Enjarify", Enjarify, fx.env.clone()).unwrap();

    let status = converter
        .convert(
            Path::new("app.apk"),
            Path::new("app.jar"),
            &InvokeOptions::default(),
        )
        .unwrap();
    assert_eq!(
        status,
        ConversionStatus::Completed {
            exit_code: 0,
            duration: Duration::from_millis(12)
        }
    );

    let launched = fx.launcher.launched();
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].program, fx.tool);
    assert!(Path::new(&launched[0].args[3]).is_absolute());
    assert!(fx.reporter.is_empty());
}

#[test]
fn test_missing_prerequisite_skips_without_launch() {
    let (env, reporter, launcher) = unconfigured();
    let enjarify = Converter::new(ENJARIFY, "Enjarify", Enjarify, env.clone()).unwrap();
    let dex2jar = Converter::new(DEX2JAR, "Dex2Jar", Dex2Jar, env).unwrap();

    for converter in [&enjarify as &dyn Transformer, &dex2jar] {
        let outcome = converter
            .transform(Operation::convert("classes.dex", "classes.jar"))
            .unwrap();
        assert!(matches!(
            outcome.conversion_status(),
            Some(ConversionStatus::Skipped { .. })
        ));
    }
    assert!(launcher.launched().is_empty());
    assert!(reporter.is_empty());
}

#[test]
fn test_process_failure_is_reported_and_returned() {
    let fx = fixture(FakeLauncher::new(|| {
        Err(ProcessError::NonZeroExit {
            exit_code: 2,
            stderr: "bad dex".to_string(),
        })
    }));
    let converter = Converter::new(DEX2JAR, "Dex2Jar", Dex2Jar, fx.env.clone()).unwrap();

    let status = converter
        .convert(
            Path::new("classes.dex"),
            Path::new("classes.jar"),
            &InvokeOptions::default(),
        )
        .unwrap();
    match status {
        ConversionStatus::Failed { message } => assert!(message.contains("bad dex")),
        other => panic!("unexpected status: {other}"),
    }

    let reports = fx.reporter.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("transformer 'dex2jar' failed"));
}

#[test]
fn test_timeout_is_reported() {
    let fx = fixture(FakeLauncher::new(|| {
        Err(ProcessError::Timeout { timeout_secs: 1 })
    }));
    let converter = Converter::new(ENJARIFY, "Enjarify", Enjarify, fx.env.clone()).unwrap();

    let status = converter
        .convert(
            Path::new("app.apk"),
            Path::new("app.jar"),
            &InvokeOptions::default().with_timeout(Duration::from_secs(1)),
        )
        .unwrap();
    assert!(matches!(status, ConversionStatus::Failed { .. }));
    assert_eq!(fx.reporter.len(), 1);
}

#[test]
fn test_jar2dex_is_unimplemented() {
    let (env, reporter, _) = unconfigured();
    let converter = Converter::new(JAR2DEX, "Jar2Dex", Jar2Dex, env).unwrap();

    let err = converter
        .transform(Operation::convert("app.jar", "classes.dex"))
        .unwrap_err();
    assert!(matches!(err, TransformerError::UnimplementedOperation { .. }));
    assert!(reporter.is_empty());
}

#[test]
fn test_none_is_noop() {
    let (env, _, launcher) = unconfigured();
    let converter = Converter::new(NONE, "None", NoConversion, env).unwrap();
    let outcome = converter
        .transform(Operation::convert("a", "b"))
        .unwrap();
    assert_eq!(outcome, Outcome::Converted(ConversionStatus::NoOp));
    assert!(launcher.launched().is_empty());
}

#[test]
fn test_converter_rejects_other_operations() {
    let (env, _, _) = unconfigured();
    let converter = Converter::new(ENJARIFY, "Enjarify", Enjarify, env).unwrap();
    let err = converter
        .transform(Operation::View { bytes: vec![1] })
        .unwrap_err();
    assert!(matches!(
        err,
        TransformerError::UnsupportedOperation { operation: "view", .. }
    ));
}

#[test]
fn test_output_parent_is_created() {
    let fx = fixture(FakeLauncher::succeeding());
    let out_dir = fx._dir.path().join("out").join("nested");
    let converter = Converter::new(DEX2JAR, "Dex2Jar", Dex2Jar, fx.env.clone()).unwrap();

    converter
        .convert(
            Path::new("classes.dex"),
            &out_dir.join("classes.jar"),
            &InvokeOptions::default(),
        )
        .unwrap();
    assert!(out_dir.is_dir());
}

#[test]
fn test_register_family_order() {
    let (env, _, _) = unconfigured();
    let registry = TransformerRegistry::new();
    register_family(&registry, &env).unwrap();

    let ids: Vec<String> = registry.all().iter().map(|t| t.id().to_string()).collect();
    assert_eq!(ids, BUILTIN_IDS.to_vec());
    assert_eq!(
        registry.get_by_name("Enjarify").unwrap(),
        registry.get_by_id(ENJARIFY).unwrap()
    );
}
