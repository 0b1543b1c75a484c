use anyhow::Result;
use parking_lot::Mutex;
use romaudit::console::{FrameInfo, RegisterWrite, Signal};
use romaudit::core::{AttachError, CheckerError, ConsoleError};
use romaudit::{
    AuditConfig, AuditEngine, AuditError, CartridgeBuilder, CheckStatus, Checker, CheckerRegistry,
    Classification, Console, Hook, HookRegistrar, Image, Observer, ReportFormat, Reporter,
    TraceConsole, Verdict,
};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Buffer {
    fn records(&self) -> Vec<serde_json::Value> {
        let text = String::from_utf8(self.0.lock().clone()).unwrap();
        text.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

fn cartridge(background: u8) -> Vec<u8> {
    CartridgeBuilder::new().frame(background).jump(0).build()
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn run_jsonl<P: AsRef<Path>>(
    config: AuditConfig,
    registry: CheckerRegistry,
    roots: &[P],
) -> Result<(romaudit::RunSummary, Vec<serde_json::Value>)> {
    let buffer = Buffer::default();
    let reporter = Reporter::new(Box::new(buffer.clone()), ReportFormat::JsonLines);
    let engine = AuditEngine::new(config, Arc::new(registry))?;
    let summary = engine.run(roots, &reporter)?;
    Ok((summary, buffer.records()))
}

#[derive(Clone, Copy)]
enum Exit {
    CompleteAfter(u64),
    ErrorAfter(u64),
    Never,
}

/// Counts steps and lifecycle calls into shared counters.
struct Counting {
    exit: Exit,
    steps: u64,
    finalised: Arc<AtomicUsize>,
}

impl Observer for Counting {}

impl Checker for Counting {
    fn id(&self) -> &'static str {
        "Counting"
    }

    fn initialise(&mut self, _hooks: &mut HookRegistrar<'_>) -> Result<(), CheckerError> {
        Ok(())
    }

    fn check(&mut self, _console: &dyn Console) -> CheckStatus {
        self.steps += 1;
        match self.exit {
            Exit::CompleteAfter(n) if self.steps >= n => CheckStatus::Completed,
            Exit::ErrorAfter(n) if self.steps >= n => CheckStatus::Error("gave up".to_string()),
            _ => CheckStatus::Continue,
        }
    }

    fn finalise(&mut self) -> Verdict {
        self.finalised.fetch_add(1, Ordering::SeqCst);
        Verdict::Ok(Some(format!("steps={}", self.steps)))
    }
}

fn counting_registry(exit: Exit) -> (CheckerRegistry, Arc<AtomicUsize>) {
    let finalised = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&finalised);
    let mut registry = CheckerRegistry::new();
    registry.register(move || {
        Box::new(Counting {
            exit,
            steps: 0,
            finalised: Arc::clone(&counter),
        })
    });
    (registry, finalised)
}

#[test]
fn test_identical_payloads_are_audited_once() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("a.trc"), cartridge(0x20))?;
    std::fs::write(dir.path().join("b.trc"), cartridge(0x20))?;
    std::fs::write(dir.path().join("c.trc"), cartridge(0x30))?;

    let other = TempDir::new()?;
    std::fs::write(other.path().join("again.trc"), cartridge(0x20))?;

    let (summary, records) = run_jsonl(
        AuditConfig::default(),
        CheckerRegistry::default(),
        &[dir.path(), other.path()],
    )?;

    assert_eq!(records.len(), 2);
    assert_eq!(summary.duplicates_skipped, 2);
    assert_eq!(summary.duplicate_groups.len(), 1);
    assert_eq!(summary.duplicate_groups[0].names.len(), 3);

    let fingerprints: BTreeSet<_> = records
        .iter()
        .map(|r| r["fingerprint"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fingerprints.len(), 2);
    Ok(())
}

#[test]
fn test_finalise_runs_once_on_completion() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("cart.trc"), cartridge(0x10))?;

    let (registry, finalised) = counting_registry(Exit::CompleteAfter(50));
    let (_, records) = run_jsonl(AuditConfig::default(), registry, &[dir.path()])?;

    assert_eq!(finalised.load(Ordering::SeqCst), 1);
    assert_eq!(records[0]["classification"], "ok");
    assert_eq!(records[0]["message"], "steps=50");
    Ok(())
}

#[test]
fn test_finalise_runs_once_on_checker_error() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("cart.trc"), cartridge(0x10))?;

    let (registry, finalised) = counting_registry(Exit::ErrorAfter(5));
    let (summary, records) = run_jsonl(AuditConfig::default(), registry, &[dir.path()])?;

    assert_eq!(finalised.load(Ordering::SeqCst), 1);
    assert_eq!(summary.tally.get(Classification::Error), 1);
    assert_eq!(records[0]["message"], "gave up");
    Ok(())
}

#[test]
fn test_frame_ceiling_stops_a_checker_that_never_completes() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("cart.trc"), cartridge(0x10))?;

    let (registry, finalised) = counting_registry(Exit::Never);
    let config = AuditConfig::default().with_frame_ceiling(2);
    let (summary, records) = run_jsonl(config, registry, &[dir.path()])?;

    assert_eq!(finalised.load(Ordering::SeqCst), 1);
    assert_eq!(summary.tally.get(Classification::Ok), 1);
    assert!(records[0]["message"].as_str().unwrap().starts_with("steps="));
    Ok(())
}

#[test]
fn test_ceiling_reached_before_checker_budget() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("cart.trc"), cartridge(0x10))?;

    // A standard frame is a few hundred steps; a million is never reached.
    let (registry, finalised) = counting_registry(Exit::CompleteAfter(1_000_000));
    let config = AuditConfig::default().with_frame_ceiling(3);
    let (_, records) = run_jsonl(config, registry, &[dir.path()])?;

    assert_eq!(finalised.load(Ordering::SeqCst), 1);
    let steps: u64 = records[0]["message"]
        .as_str()
        .unwrap()
        .trim_start_matches("steps=")
        .parse()?;
    assert!(steps < 1_000_000);
    Ok(())
}

#[test]
fn test_serial_and_concurrent_runs_agree() -> Result<()> {
    let dir = TempDir::new()?;
    for (i, background) in [0x00u8, 0x12, 0x46, 0x88, 0xe4, 0xf0].iter().enumerate() {
        std::fs::write(dir.path().join(format!("cart{i}.trc")), cartridge(*background))?;
    }
    std::fs::write(dir.path().join("broken.trc"), b"not a cartridge")?;

    let rows = |concurrent: bool| -> Result<BTreeSet<(String, String, String)>> {
        let config = AuditConfig::default()
            .with_checker("highhue")
            .with_concurrent(concurrent);
        let (_, records) = run_jsonl(config, CheckerRegistry::default(), &[dir.path()])?;
        Ok(records
            .iter()
            .map(|r| {
                (
                    r["report_name"].as_str().unwrap().to_string(),
                    r["classification"].as_str().unwrap().to_string(),
                    r["message"].as_str().unwrap().to_string(),
                )
            })
            .collect())
    };

    let serial = rows(false)?;
    let concurrent = rows(true)?;
    assert_eq!(serial.len(), 7);
    assert_eq!(serial, concurrent);
    Ok(())
}

#[test]
fn test_malformed_payload_does_not_stop_the_run() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("a-bad.trc"), b"\x7fELF")?;
    std::fs::write(dir.path().join("b-good.trc"), cartridge(0x22))?;

    let (summary, records) =
        run_jsonl(AuditConfig::default(), CheckerRegistry::default(), &[dir.path()])?;

    assert_eq!(records.len(), 2);
    assert_eq!(summary.tally.get(Classification::AttachFailed), 1);
    assert_eq!(summary.tally.get(Classification::Ok), 1);

    let bad = records
        .iter()
        .find(|r| r["report_name"] == "a-bad.trc")
        .unwrap();
    assert_eq!(bad["classification"], "attach-failed");
    assert!(bad["message"].as_str().unwrap().contains("TRC1"));
    Ok(())
}

#[test]
fn test_nested_containers_need_recursion() -> Result<()> {
    let dir = TempDir::new()?;
    let outer = zip_bytes(&[("inner.trc", &cartridge(0x50))]);
    std::fs::write(dir.path().join("pack.zip"), outer)?;
    std::fs::create_dir(dir.path().join("sub"))?;
    std::fs::write(dir.path().join("sub").join("deep.trc"), cartridge(0x60))?;
    std::fs::write(dir.path().join("top.trc"), cartridge(0x70))?;

    let (_, shallow) =
        run_jsonl(AuditConfig::default(), CheckerRegistry::default(), &[dir.path()])?;
    assert_eq!(shallow.len(), 1);
    assert_eq!(shallow[0]["report_name"], "top.trc");

    let config = AuditConfig::default().with_recurse(true);
    let (_, deep) = run_jsonl(config, CheckerRegistry::default(), &[dir.path()])?;
    let names: BTreeSet<_> = deep
        .iter()
        .map(|r| r["report_name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        BTreeSet::from([
            "pack.zip/inner.trc".to_string(),
            "sub/deep.trc".to_string(),
            "top.trc".to_string(),
        ])
    );
    Ok(())
}

#[test]
fn test_zip_root_members_are_first_level() -> Result<()> {
    let dir = TempDir::new()?;
    let inner = zip_bytes(&[("nested.trc", &cartridge(0x02))]);
    let archive = zip_bytes(&[("one.trc", &cartridge(0x04)), ("inner.zip", &inner)]);
    let path = dir.path().join("roms.zip");
    std::fs::write(&path, archive)?;

    let (_, shallow) = run_jsonl(AuditConfig::default(), CheckerRegistry::default(), &[&path])?;
    assert_eq!(shallow.len(), 1);
    assert_eq!(shallow[0]["report_name"], "one.trc");

    let config = AuditConfig::default().with_recurse(true);
    let (_, deep) = run_jsonl(config, CheckerRegistry::default(), &[&path])?;
    assert_eq!(deep.len(), 2);
    Ok(())
}

#[test]
fn test_entries_below_the_limit_are_never_opened() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("top.trc"), cartridge(0x70))?;
    std::fs::create_dir(dir.path().join("sub"))?;
    std::fs::write(dir.path().join("sub").join("broken.zip"), b"PK\x03\x04 not really a zip")?;

    let (summary, records) =
        run_jsonl(AuditConfig::default(), CheckerRegistry::default(), &[dir.path()])?;
    assert_eq!(summary.tally.total(), 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["report_name"], "top.trc");

    let config = AuditConfig::default().with_recurse(true);
    let reporter = Reporter::new(Box::new(Buffer::default()), ReportFormat::Table);
    let engine = AuditEngine::new(config, Arc::new(CheckerRegistry::default()))?;
    let err = engine.run(&[dir.path()], &reporter).unwrap_err();
    assert!(matches!(err, AuditError::Container { .. }));
    Ok(())
}

#[test]
fn test_nested_members_below_the_limit_are_never_opened() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = zip_bytes(&[
        ("one.trc", &cartridge(0x04)[..]),
        ("inner.zip", &b"PK\x03\x04 not really a zip"[..]),
    ]);
    let path = dir.path().join("roms.zip");
    std::fs::write(&path, archive)?;

    let (_, records) = run_jsonl(AuditConfig::default(), CheckerRegistry::default(), &[&path])?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["report_name"], "one.trc");
    Ok(())
}

#[test]
fn test_oversized_member_aborts_the_run() -> Result<()> {
    let dir = TempDir::new()?;
    let big = vec![0u8; romaudit::core::MAX_IMAGE_SIZE + 1];
    let path = dir.path().join("roms.zip");
    std::fs::write(&path, zip_bytes(&[("big.trc", &big)]))?;

    let reporter = Reporter::new(Box::new(Buffer::default()), ReportFormat::Table);
    let engine = AuditEngine::new(AuditConfig::default(), Arc::new(CheckerRegistry::default()))?;
    let err = engine.run(&[&path], &reporter).unwrap_err();
    assert!(matches!(err, AuditError::Oversized { .. }));
    Ok(())
}

#[test]
fn test_empty_file_aborts_the_run() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("empty.trc"), b"")?;

    let reporter = Reporter::new(Box::new(Buffer::default()), ReportFormat::Table);
    let engine = AuditEngine::new(AuditConfig::default(), Arc::new(CheckerRegistry::default()))?;
    let err = engine.run(&[dir.path()], &reporter).unwrap_err();

    assert!(matches!(err, AuditError::Image { .. }));
    Ok(())
}

#[test]
fn test_missing_root_aborts_the_run() -> Result<()> {
    let dir = TempDir::new()?;
    let reporter = Reporter::new(Box::new(Buffer::default()), ReportFormat::Table);
    let engine = AuditEngine::new(AuditConfig::default(), Arc::new(CheckerRegistry::default()))?;

    let err = engine
        .run(&[dir.path().join("missing")], &reporter)
        .unwrap_err();
    assert!(matches!(err, AuditError::Io { .. }));
    Ok(())
}

/// A trace console that refuses the pixel hook.
struct NoPixels(TraceConsole);

impl Console for NoPixels {
    fn supports(&self, hook: Hook) -> bool {
        hook != Hook::PixelStream
    }

    fn attach(&mut self, image: &Image) -> Result<(), AttachError> {
        self.0.attach(image)
    }

    fn reset(&mut self) {
        self.0.reset()
    }

    fn step(&mut self, observer: &mut dyn Observer) -> Result<(), ConsoleError> {
        self.0.step(observer)
    }

    fn frame_info(&self) -> FrameInfo {
        self.0.frame_info()
    }

    fn last_signal(&self) -> Signal {
        self.0.last_signal()
    }

    fn last_write(&self) -> Option<RegisterWrite> {
        self.0.last_write()
    }
}

#[test]
fn test_unsupported_hook_is_a_job_error() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("cart.trc"), cartridge(0xe0))?;

    let buffer = Buffer::default();
    let reporter = Reporter::new(Box::new(buffer.clone()), ReportFormat::JsonLines);
    let engine = AuditEngine::new(
        AuditConfig::default().with_checker("HighHue"),
        Arc::new(CheckerRegistry::default()),
    )?
    .with_console_factory(|| Box::new(NoPixels(TraceConsole::new())));

    let summary = engine.run(&[dir.path()], &reporter)?;
    assert_eq!(summary.tally.get(Classification::Error), 1);

    let records = buffer.records();
    assert!(records[0]["message"].as_str().unwrap().contains("pixel-stream"));
    Ok(())
}

#[test]
fn test_table_names_are_cropped_to_suffix() -> Result<()> {
    let dir = TempDir::new()?;
    let deep = dir
        .path()
        .join("a-rather-long-directory-name")
        .join("and-another-long-one");
    std::fs::create_dir_all(&deep)?;
    std::fs::write(deep.join("cartridge-with-a-long-name.trc"), cartridge(0x08))?;

    let buffer = Buffer::default();
    let reporter = Reporter::new(Box::new(buffer.clone()), ReportFormat::Table);
    let engine = AuditEngine::new(
        AuditConfig::default().with_recurse(true),
        Arc::new(CheckerRegistry::default()),
    )?;
    engine.run(&[dir.path()], &reporter)?;

    let text = String::from_utf8(buffer.0.lock().clone())?;
    let row = text.lines().last().unwrap();
    let name = row.split('\t').next().unwrap();
    assert_eq!(name.chars().count(), 48);
    assert!(name.ends_with("long-one/cartridge-with-a-long-name.trc"));
    assert!(!name.contains("a-rather-long-directory-name"));
    Ok(())
}
