use crate::archive::SourceNode;
use crate::console::{Console, TraceConsole};
use crate::core::{AuditConfig, AuditError, Classification, Image, Outcome, OutcomeRecord, Result};
use crate::runner::dedup::{DedupRegistry, DuplicateGroup};
use crate::runner::registry::{CheckerFactory, CheckerRegistry};
use crate::runner::report::{relative_name, Reporter, Tally};
use crate::runner::session::Session;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub type ConsoleFactory = Arc<dyn Fn() -> Box<dyn Console> + Send + Sync>;

/// Walks source roots and audits every unique image found under them.
pub struct AuditEngine {
    config: AuditConfig,
    checker_id: String,
    checker: CheckerFactory,
    console: ConsoleFactory,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub tally: Tally,
    pub duplicates_skipped: usize,
    pub duplicate_groups: Vec<DuplicateGroup>,
}

/// Shared state for one call to [`AuditEngine::run`].
struct RunState<'r> {
    reporter: &'r Reporter,
    dedup: DedupRegistry,
    tally: Mutex<Tally>,
    duplicates_skipped: AtomicUsize,
    slots: Sender<()>,
    released: Receiver<()>,
}

/// Holds one pool slot and gives it back when the job ends, however it ends.
struct SlotGuard<'a> {
    released: &'a Receiver<()>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let _ = self.released.recv();
    }
}

impl AuditEngine {
    /// Fails with [`AuditError::UnknownChecker`] when the configured checker
    /// is not registered.
    pub fn new(config: AuditConfig, registry: Arc<CheckerRegistry>) -> Result<Self> {
        let checker_id = registry.resolve(&config.checker)?.to_string();
        let checker = registry.factory(&checker_id)?;
        Ok(Self {
            config,
            checker_id,
            checker,
            console: Arc::new(|| Box::new(TraceConsole::new()) as Box<dyn Console>),
        })
    }

    pub fn with_console_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Console> + Send + Sync + 'static,
    {
        self.console = Arc::new(factory);
        self
    }

    /// Canonical id of the checker every job runs.
    pub fn checker_id(&self) -> &str {
        &self.checker_id
    }

    /// Audits every root in order. Returns once all dispatched jobs have
    /// reported; a structural error stops traversal and is returned after the
    /// jobs already in flight finish.
    pub fn run<P: AsRef<Path>>(&self, roots: &[P], reporter: &Reporter) -> Result<RunSummary> {
        let workers = self.config.workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("romaudit-worker-{i}"))
            .build()?;
        let (slots, released) = crossbeam_channel::bounded(workers);

        let state = RunState {
            reporter,
            dedup: DedupRegistry::new(),
            tally: Mutex::new(Tally::default()),
            duplicates_skipped: AtomicUsize::new(0),
            slots,
            released,
        };

        info!(
            checker = %self.checker_id,
            workers,
            recurse = self.config.recurse,
            frames = self.config.frame_ceiling,
            "starting audit"
        );

        pool.in_place_scope(|scope| -> Result<()> {
            for root in roots {
                let root = root.as_ref();
                info!(root = %root.display(), "auditing root");
                self.visit(scope, &state, root, SourceNode::pending(root), 0)?;
            }
            Ok(())
        })?;

        let summary = RunSummary {
            tally: state.tally.into_inner(),
            duplicates_skipped: state.duplicates_skipped.into_inner(),
            duplicate_groups: state.dedup.duplicates(),
        };
        info!(
            audited = summary.tally.total(),
            duplicates = summary.duplicates_skipped,
            "audit finished"
        );
        Ok(summary)
    }

    fn visit<'s>(
        &'s self,
        scope: &rayon::Scope<'s>,
        state: &'s RunState<'s>,
        root: &Path,
        node: SourceNode,
        depth: usize,
    ) -> Result<()> {
        if !self.config.visits_depth(depth) {
            debug!(path = %node.display_path().display(), depth, "below recursion limit");
            return Ok(());
        }

        let node = node.resolve()?;
        if node.is_container() {
            for child in node.list()? {
                self.visit(scope, state, root, child, depth + 1)?;
            }
            return Ok(());
        }

        let display = node.display_path().to_path_buf();
        let image = Image::from_bytes(display.clone(), node.read()?)?;
        let display_name = display.to_string_lossy().into_owned();

        if !state.dedup.claim(image.fingerprint(), display_name.clone()) {
            debug!(
                path = %display_name,
                fingerprint = %image.fingerprint().short(),
                "skipping duplicate image"
            );
            state.duplicates_skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        state
            .slots
            .send(())
            .map_err(|_| AuditError::PoolClosed { path: display.clone() })?;
        let guard = SlotGuard {
            released: &state.released,
        };

        let report_name = relative_name(&display, root);
        debug!(path = %display_name, fingerprint = %image.fingerprint().short(), "dispatching");

        scope.spawn(move |_| {
            let _guard = guard;
            let outcome = self.audit(&image);
            let record =
                OutcomeRecord::new(display_name, report_name, image.fingerprint(), outcome);

            if let Err(err) = state.reporter.emit(&record) {
                error!(path = %record.display_name, "failed to write report row: {err}");
            }
            state.tally.lock().add(record.classification);
        });

        Ok(())
    }

    /// Runs one session. A panic anywhere in it becomes an `error` outcome.
    fn audit(&self, image: &Image) -> Outcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let session = Session::new((self.console)(), (self.checker)(), self.config.frame_ceiling);
            session.run(image)
        }));

        match result {
            Ok(report) => {
                debug!(
                    image = %image.name(),
                    frames = report.frames,
                    steps = report.steps,
                    stop = ?report.stop,
                    "session finished"
                );
                report.outcome
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(image = %image.name(), "session panicked: {message}");
                Outcome::new(Classification::Error, format!("emulation panicked: {message}"))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::CartridgeBuilder;
    use crate::runner::report::ReportFormat;
    use std::io::{self, Write};

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

    #[test]
    fn test_unknown_checker_is_rejected() {
        let config = AuditConfig::default().with_checker("nope");
        let err = AuditEngine::new(config, Arc::new(CheckerRegistry::default()))
            .err()
            .expect("unknown checker must fail");
        assert!(matches!(err, AuditError::UnknownChecker { .. }));
    }

    #[test]
    fn test_default_resolves_to_first_checker() {
        let engine =
            AuditEngine::new(AuditConfig::default(), Arc::new(CheckerRegistry::default())).unwrap();
        assert_eq!(engine.checker_id(), "COLUxxCount");
    }

    #[test]
    fn test_single_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solo.trc");
        std::fs::write(&path, CartridgeBuilder::new().frame(0x00).jump(0).build()).unwrap();

        let buffer = Buffer::default();
        let reporter = Reporter::new(Box::new(buffer.clone()), ReportFormat::JsonLines);
        let engine =
            AuditEngine::new(AuditConfig::default(), Arc::new(CheckerRegistry::default())).unwrap();

        let summary = engine.run(&[&path], &reporter).unwrap();
        assert_eq!(summary.tally.get(Classification::Ok), 1);

        let output = String::from_utf8(buffer.0.lock().clone()).unwrap();
        let value: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(value["report_name"], "solo.trc");
        assert_eq!(value["message"], "|    0 |    1");
    }

    #[test]
    fn test_panicking_console_is_reported_as_error() {
        struct Exploding;

        impl Console for Exploding {
            fn supports(&self, _hook: crate::console::Hook) -> bool {
                true
            }
            fn attach(&mut self, _image: &Image) -> std::result::Result<(), crate::core::AttachError> {
                Ok(())
            }
            fn reset(&mut self) {}
            fn step(
                &mut self,
                _observer: &mut dyn crate::console::Observer,
            ) -> std::result::Result<(), crate::core::ConsoleError> {
                panic!("bus conflict");
            }
            fn frame_info(&self) -> crate::console::FrameInfo {
                crate::console::FrameInfo::default()
            }
            fn last_signal(&self) -> crate::console::Signal {
                crate::console::Signal::default()
            }
            fn last_write(&self) -> Option<crate::console::RegisterWrite> {
                None
            }
        }

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("boom.trc"), b"anything").unwrap();

        let reporter = Reporter::new(Box::new(Buffer::default()), ReportFormat::Table);
        let engine = AuditEngine::new(AuditConfig::default(), Arc::new(CheckerRegistry::default()))
            .unwrap()
            .with_console_factory(|| Box::new(Exploding));

        let summary = engine.run(&[dir.path()], &reporter).unwrap();
        assert_eq!(summary.tally.get(Classification::Error), 1);
    }
}
