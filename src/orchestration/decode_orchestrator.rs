// Decode Orchestrator: main workflow coordinator
//
// Owns the full decode pass over one session: plan glyph groups, load the
// site font, render every group's canvas synchronously, then fan the
// canvases out to the OCR engine one task per group. Outcomes are applied
// to the session as they settle, so partial results are visible while
// slower groups are still in flight.

use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{FontError, FontResult, GroupContext, RenderError, RunError, RunResult};
use crate::core::notices::{Notice, NoticeBoard};
use crate::core::session::DecodeSession;
use crate::core::types::{RecognitionOutcome, RenderGroup, RunAnalytics, RunReport};
use crate::services::font_manager::FontManager;
use crate::services::grouping;
use crate::services::recognition::remote::RemoteOcrEngine;
use crate::services::recognition::{reconcile_outcome, OcrEngine};
use crate::services::rendering::GlyphRenderer;
use crate::utils::image_ops;
use crate::utils::metrics::Metrics;

/// Main decode orchestrator
pub struct DecodeOrchestrator {
    config: Arc<Config>,
    renderer: Arc<GlyphRenderer>,
    font_manager: Arc<FontManager>,
    engine: Arc<dyn OcrEngine>,
    metrics: Metrics,
}

impl DecodeOrchestrator {
    /// Create a new orchestrator with the remote recognition engine
    #[instrument(skip(config))]
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let engine: Arc<dyn OcrEngine> = Arc::new(RemoteOcrEngine::new(&config)?);
        Self::with_engine(config, engine)
    }

    /// Create a new orchestrator around a caller-supplied recognition engine
    pub fn with_engine(config: Arc<Config>, engine: Arc<dyn OcrEngine>) -> Result<Self> {
        info!("Initializing services...");

        let metrics = Metrics::new();
        let renderer = Arc::new(GlyphRenderer::new());
        let font_manager = Arc::new(FontManager::new(&config.font, Some(metrics.clone()))?);

        info!(
            "✓ Ready (engine: {}, language: {}, cell: {}px)",
            engine.name(),
            config.language(),
            config.font_size()
        );

        Ok(Self {
            config,
            renderer,
            font_manager,
            engine,
            metrics,
        })
    }

    /// Get the recognition engine name (e.g., "remote")
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn font_manager(&self) -> &FontManager {
        &self.font_manager
    }

    /// Run one full decode pass over the session's current input.
    ///
    /// # Workflow:
    /// 1. Plan groups from the session's occurrence index (empty -> noop)
    /// 2. Load the site font; a failure degrades with a warning, never aborts
    /// 3. Render every group's canvas synchronously and PNG-encode it
    /// 4. Spawn one recognition task per group, apply outcomes as they settle
    /// 5. Join all tasks, then assemble notices and analytics
    ///
    /// Failures stay local to their group; the only run-level error is a
    /// disposed session.
    #[instrument(skip(self, session))]
    pub async fn run(&self, session: &DecodeSession) -> RunResult<RunReport> {
        if session.is_disposed() {
            return Err(RunError::SessionDisposed);
        }

        let start = Instant::now();
        let chars = session.placeholder_chars();
        if chars.is_empty() {
            info!("no placeholder glyphs in input, nothing to decode");
            self.metrics.record_run_noop();
            return Ok(RunReport::noop(session.active_run()));
        }

        let groups = grouping::plan_groups(&chars);
        let run_id = session.begin_run(&groups)?;
        self.metrics.record_run_dispatched(groups.len());
        info!(
            run_id,
            "Decoding {} distinct glyphs across {} groups",
            chars.len(),
            groups.len()
        );

        let mut notices = NoticeBoard::new();
        self.prepare_font(session, &mut notices).await;

        // Render pass: synchronous, before any task is spawned. A group that
        // fails to render is settled as Failed right here and never dispatched.
        let render_start = Instant::now();
        let mut rendered: Vec<(RenderGroup, Vec<u8>)> = Vec::with_capacity(groups.len());
        let mut groups_failed = 0usize;
        for group in &groups {
            match self.render_png(group) {
                Ok(png) => rendered.push((group.clone(), png)),
                Err(e) => {
                    warn!("{}", e);
                    session.apply_group_outcome(
                        run_id,
                        group.index,
                        RecognitionOutcome::Failed {
                            error: e.to_string(),
                        },
                    );
                    notices.push(Notice::warning(format!(
                        "OCR Failed for group {}",
                        group.index + 1
                    )));
                    groups_failed += 1;
                }
            }
        }
        let render_elapsed = render_start.elapsed();
        self.metrics.record_render_duration(render_elapsed);
        info!(
            "✓ Rendered {} canvases in {:.2}ms",
            rendered.len(),
            render_elapsed.as_secs_f64() * 1000.0
        );

        notices.push(Notice::info("Running OCR on all characters..."));

        let language = session
            .language()
            .unwrap_or_else(|| self.config.language().to_string());

        // One task per group. Each task applies its own outcome so slower
        // groups never hold back faster ones; join_all only gates the report.
        let mut tasks = Vec::with_capacity(rendered.len());
        for (group, png) in rendered {
            let engine = Arc::clone(&self.engine);
            let task_session = session.clone();
            let task_metrics = self.metrics.clone();
            let language = language.clone();

            let group_index = group.index;
            let handle = tokio::spawn(async move {
                let call_start = Instant::now();
                let result = engine.recognize(&png, &language).await;
                let outcome = reconcile_outcome(&group, result);
                task_metrics.record_engine_call(&outcome, call_start.elapsed());
                let applied = task_session.apply_group_outcome(run_id, group.index, outcome.clone());
                (outcome, applied)
            });
            tasks.push((group_index, handle));
        }

        let (indexes, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let mut groups_succeeded = 0usize;
        let mut groups_mismatched = 0usize;
        for (group_index, settled) in indexes.into_iter().zip(join_all(handles).await) {
            match settled {
                Ok((outcome, applied)) => {
                    if !applied {
                        // A newer run took over while this group was in
                        // flight; its outcome was discarded, so this report
                        // has nothing to say about it.
                        continue;
                    }
                    match outcome {
                        RecognitionOutcome::Success(_) => groups_succeeded += 1,
                        RecognitionOutcome::Mismatch { .. } => {
                            groups_mismatched += 1;
                            notices.push(Notice::warning(format!(
                                "OCR Failed or Detected Extra Content for group {}",
                                group_index + 1
                            )));
                        }
                        RecognitionOutcome::Failed { .. } => {
                            groups_failed += 1;
                            notices.push(Notice::warning(format!(
                                "OCR Failed for group {}",
                                group_index + 1
                            )));
                        }
                    }
                }
                Err(join_err) => {
                    let err = RunError::TaskJoinFailed(join_err.to_string());
                    error!("group {} task aborted: {}", group_index + 1, err);
                    session.apply_group_outcome(
                        run_id,
                        group_index,
                        RecognitionOutcome::Failed {
                            error: err.to_string(),
                        },
                    );
                    notices.push(Notice::warning(format!(
                        "OCR Failed for group {}",
                        group_index + 1
                    )));
                    groups_failed += 1;
                }
            }
        }

        notices.push(Notice::completion("OCR Complete"));

        let glyph_grid = session.glyph_grid();
        let glyphs_resolved = glyph_grid.iter().filter(|g| g.mapping.is_some()).count();
        let analytics = RunAnalytics {
            groups_total: groups.len(),
            groups_succeeded,
            groups_mismatched,
            groups_failed,
            glyphs_total: glyph_grid.len(),
            glyphs_resolved,
            glyphs_unresolved: glyph_grid.len() - glyphs_resolved,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            run_id,
            "✓ Run complete: {} ok, {} mismatched, {} failed in {:.2}ms",
            groups_succeeded,
            groups_mismatched,
            groups_failed,
            start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(RunReport {
            run_id,
            noop: false,
            groups: session.group_statuses(),
            notices: notices.into_notices(),
            analytics,
        })
    }

    /// Load the session's site font into the renderer. Missing or unusable
    /// fonts degrade the run (blank cells, OCR garbage) but never abort it;
    /// the warning notice is the user's cue to check the font key.
    async fn prepare_font(&self, session: &DecodeSession, notices: &mut NoticeBoard) {
        match session.font_key() {
            Some(key) => match self.load_site_font(&key).await {
                Ok(faces) => info!("✓ Site font '{}' loaded ({} faces)", key, faces),
                Err(e) => {
                    warn!("site font '{}' unavailable: {}", key, e);
                    notices.push(Notice::warning(format!(
                        "Font load failed for '{}'; recognition may be unreliable",
                        key
                    )));
                }
            },
            None => {
                if self.renderer.faces_loaded() == 0 {
                    warn!("no font loaded, glyph cells will render blank");
                    notices.push(Notice::warning(
                        "No obfuscation font loaded; recognition may be unreliable",
                    ));
                }
            }
        }
    }

    async fn load_site_font(&self, key: &str) -> FontResult<usize> {
        let font_data = self.font_manager.ensure_font(key).await?;
        let faces = self.renderer.load_site_font(font_data);
        if faces == 0 {
            return Err(FontError::UnusableFont {
                key: key.to_string(),
            });
        }
        Ok(faces)
    }

    fn render_png(&self, group: &RenderGroup) -> RunResult<Vec<u8>> {
        let canvas = self
            .renderer
            .render_group(group, &self.config.rendering)
            .with_group_context(group.index)?;
        image_ops::encode_png(&canvas)
            .map_err(RenderError::from)
            .with_group_context(group.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{
        FontConfig, PlaceholderConfig, RecognitionConfig, RenderingConfig, ServerConfig,
    };
    use crate::core::errors::{EngineError, EngineResult};
    use crate::core::types::{GroupState, PlaceholderRange};
    use crate::services::recognition::RecognizedText;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // Two groups: [E001 E002 E003] and [E004 E005]
    const INPUT_FIVE: &str = "a\u{E001}\u{E002}\u{E003}\u{E004}\u{E005}b";

    fn test_config(cache_dir: &std::path::Path) -> Arc<Config> {
        Arc::new(Config {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                log_level: tracing::Level::INFO,
            },
            placeholder: PlaceholderConfig {
                range_start: 0xE000,
                range_end: 0xF8FF,
            },
            rendering: RenderingConfig {
                font_size: 40,
                char_margin: 10,
                side_padding: 10,
                font_family: "jjwxcfont".to_string(),
            },
            recognition: RecognitionConfig {
                language: "chi_sim".to_string(),
                engine_endpoint: "http://127.0.0.1:8884/recognize".to_string(),
                request_timeout_secs: 5,
            },
            font: FontConfig {
                url_template: "https://static.example.net/fonts/jjwxcfont_{key}.woff2"
                    .to_string(),
                cache_dir: cache_dir.display().to_string(),
                memory_cache_size: 4,
            },
        })
    }

    /// Scripted engine keyed on the canvas's glyph cell count, recovered
    /// from the canvas width, so replies stay deterministic no matter which
    /// order the tasks run in.
    struct SizedEngine {
        replies: HashMap<usize, Result<String, String>>,
        delays_ms: HashMap<usize, u64>,
        calls: AtomicUsize,
        languages: std::sync::Mutex<Vec<String>>,
    }

    impl SizedEngine {
        fn new(replies: &[(usize, Result<&str, &str>)]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|(n, r)| (*n, (*r).map(|s| s.to_string()).map_err(|s| s.to_string())))
                    .collect(),
                delays_ms: HashMap::new(),
                calls: AtomicUsize::new(0),
                languages: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn with_delays(mut self, delays: &[(usize, u64)]) -> Self {
            self.delays_ms = delays.iter().copied().collect();
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Invert the canvas width formula from `test_config`'s rendering
        /// parameters to recover the number of cells
        fn cell_count(png: &[u8]) -> usize {
            let img = image::load_from_memory(png).expect("engine received invalid png");
            ((img.width() - 2 * 10 + 10) / (40 + 10)) as usize
        }
    }

    #[async_trait]
    impl OcrEngine for SizedEngine {
        async fn recognize(&self, image_png: &[u8], language: &str) -> EngineResult<RecognizedText> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.languages.lock().unwrap().push(language.to_string());
            let cells = Self::cell_count(image_png);
            if let Some(ms) = self.delays_ms.get(&cells) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            match self.replies.get(&cells) {
                Some(Ok(text)) => Ok(RecognizedText { text: text.clone() }),
                Some(Err(message)) => Err(EngineError::Unavailable(message.clone())),
                None => Err(EngineError::Unavailable(format!(
                    "no reply scripted for {} cells",
                    cells
                ))),
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn session_with(input: &str) -> DecodeSession {
        let session = DecodeSession::new(PlaceholderRange::default());
        session.set_input(input);
        session
    }

    #[tokio::test]
    async fn test_run_resolves_all_groups() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SizedEngine::new(&[(3, Ok("好了吗")), (2, Ok("的地"))]));
        let orch = DecodeOrchestrator::with_engine(test_config(dir.path()), engine.clone()).unwrap();
        let session = session_with(INPUT_FIVE);

        let report = orch.run(&session).await.unwrap();

        assert!(!report.noop);
        assert_eq!(report.analytics.groups_total, 2);
        assert_eq!(report.analytics.groups_succeeded, 2);
        assert_eq!(report.analytics.groups_failed, 0);
        assert_eq!(report.analytics.glyphs_total, 5);
        assert_eq!(report.analytics.glyphs_resolved, 5);
        assert_eq!(report.analytics.glyphs_unresolved, 0);
        assert_eq!(engine.calls(), 2);
        assert_eq!(session.plain_output(), "a好了吗的地b");
        assert!(report
            .groups
            .iter()
            .all(|g| matches!(g.state, GroupState::Recognized { .. })));
        assert!(report
            .notices
            .iter()
            .any(|n| n.message == "Running OCR on all characters..."));
        assert!(report.notices.iter().any(|n| n.message == "OCR Complete"));
    }

    #[tokio::test]
    async fn test_plain_input_is_noop_with_zero_engine_calls() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SizedEngine::new(&[]));
        let orch = DecodeOrchestrator::with_engine(test_config(dir.path()), engine.clone()).unwrap();
        let session = session_with("just ordinary text, nothing hidden");

        let report = orch.run(&session).await.unwrap();

        assert!(report.noop);
        assert_eq!(engine.calls(), 0);
        assert!(report.groups.is_empty());
        assert!(report.notices.is_empty());
        assert_eq!(report.analytics.groups_total, 0);
        assert_eq!(session.active_run(), 0);
    }

    #[tokio::test]
    async fn test_failed_group_leaves_others_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SizedEngine::new(&[
            (3, Ok("好了吗")),
            (2, Err("engine offline")),
        ]));
        let orch = DecodeOrchestrator::with_engine(test_config(dir.path()), engine).unwrap();
        let session = session_with(INPUT_FIVE);

        let report = orch.run(&session).await.unwrap();

        assert_eq!(report.analytics.groups_succeeded, 1);
        assert_eq!(report.analytics.groups_failed, 1);
        assert_eq!(report.analytics.glyphs_resolved, 3);
        assert_eq!(report.analytics.glyphs_unresolved, 2);
        assert!(session.plain_output().contains("好了吗"));
        assert_eq!(session.output().unresolved_count(), 2);
        assert!(report
            .notices
            .iter()
            .any(|n| n.message == "OCR Failed for group 2"));
        // The failed pair stays unmapped but keeps its status row
        let statuses = session.group_statuses();
        assert!(matches!(statuses[0].state, GroupState::Recognized { .. }));
        assert!(matches!(statuses[1].state, GroupState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_short_result_is_mismatch_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SizedEngine::new(&[(3, Ok("好")), (2, Ok("的地"))]));
        let orch = DecodeOrchestrator::with_engine(test_config(dir.path()), engine).unwrap();
        let session = session_with(INPUT_FIVE);

        let report = orch.run(&session).await.unwrap();

        assert_eq!(report.analytics.groups_mismatched, 1);
        assert_eq!(report.analytics.glyphs_resolved, 2);
        assert_eq!(session.output().unresolved_count(), 3);
        let statuses = session.group_statuses();
        assert!(
            matches!(&statuses[0].state, GroupState::Mismatch { partial } if partial == "好")
        );
        assert!(report
            .notices
            .iter()
            .any(|n| n.message == "OCR Failed or Detected Extra Content for group 1"));
    }

    #[tokio::test]
    async fn test_outcomes_apply_even_when_groups_settle_out_of_order() {
        let dir = tempfile::tempdir().unwrap();
        // The first-planned group is the slowest; the pair settles first
        let engine = Arc::new(
            SizedEngine::new(&[(3, Ok("好了吗")), (2, Ok("的地"))])
                .with_delays(&[(3, 80), (2, 5)]),
        );
        let orch = DecodeOrchestrator::with_engine(test_config(dir.path()), engine).unwrap();
        let session = session_with(INPUT_FIVE);

        let report = orch.run(&session).await.unwrap();

        assert_eq!(report.analytics.groups_succeeded, 2);
        assert_eq!(session.plain_output(), "a好了吗的地b");
    }

    #[tokio::test]
    async fn test_takeover_run_discards_late_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(
            SizedEngine::new(&[(3, Ok("好了吗")), (2, Ok("的地"))])
                .with_delays(&[(3, 300), (2, 300)]),
        );
        let orch = Arc::new(DecodeOrchestrator::with_engine(test_config(dir.path()), engine).unwrap());
        let session = session_with(INPUT_FIVE);

        let run_orch = Arc::clone(&orch);
        let run_session = session.clone();
        let handle = tokio::spawn(async move { run_orch.run(&run_session).await });

        // Take over the session mid-flight; the old run's outcomes must land
        // in the void, not in the store the new run just cleared
        tokio::time::sleep(Duration::from_millis(50)).await;
        let replacement = grouping::plan_groups(&session.placeholder_chars());
        session.begin_run(&replacement).unwrap();

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.analytics.groups_succeeded, 0);
        assert_eq!(session.output().unresolved_count(), 5);
        assert!(session
            .group_statuses()
            .iter()
            .all(|g| matches!(g.state, GroupState::Pending)));
    }

    #[tokio::test]
    async fn test_unusable_font_degrades_but_still_recognizes() {
        let dir = tempfile::tempdir().unwrap();
        // Seed the disk cache with bytes no font parser will accept
        tokio::fs::write(dir.path().join("zzzz.woff2"), b"definitely not a font")
            .await
            .unwrap();
        let engine = Arc::new(SizedEngine::new(&[(3, Ok("好了吗")), (2, Ok("的地"))]));
        let orch = DecodeOrchestrator::with_engine(test_config(dir.path()), engine).unwrap();
        let session = session_with(INPUT_FIVE);
        session.set_font_key(Some("zzzz".to_string()));

        let report = orch.run(&session).await.unwrap();

        assert_eq!(report.analytics.groups_succeeded, 2);
        assert!(report
            .notices
            .iter()
            .any(|n| n.message.contains("Font load failed for 'zzzz'")));
    }

    #[tokio::test]
    async fn test_missing_font_key_warns_and_still_recognizes() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SizedEngine::new(&[(3, Ok("好了吗")), (2, Ok("的地"))]));
        let orch = DecodeOrchestrator::with_engine(test_config(dir.path()), engine.clone()).unwrap();
        // No font key set and nothing in the renderer: the cells render
        // blank, the run finishes, and the warning tells the user why
        let session = session_with(INPUT_FIVE);

        let report = orch.run(&session).await.unwrap();

        assert_eq!(report.analytics.groups_succeeded, 2);
        assert_eq!(engine.calls(), 2);
        assert_eq!(session.plain_output(), "a好了吗的地b");
        assert!(report
            .notices
            .iter()
            .any(|n| n.message == "No obfuscation font loaded; recognition may be unreliable"));
    }

    #[tokio::test]
    async fn test_repeated_occurrences_resolve_from_one_group_result() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SizedEngine::new(&[(1, Ok("好"))]));
        let orch = DecodeOrchestrator::with_engine(test_config(dir.path()), engine.clone()).unwrap();
        let session = session_with("A\u{E123}B\u{E123}C");

        let report = orch.run(&session).await.unwrap();

        // One distinct glyph, one group, one engine call; every occurrence
        // picks up the mapping
        assert_eq!(report.analytics.glyphs_total, 1);
        assert_eq!(engine.calls(), 1);
        assert_eq!(session.plain_output(), "A好B好C");
        assert_eq!(session.output().unresolved_count(), 0);
    }

    #[tokio::test]
    async fn test_single_glyph_input_dispatches_one_group() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SizedEngine::new(&[(1, Ok("好"))]));
        let orch = DecodeOrchestrator::with_engine(test_config(dir.path()), engine.clone()).unwrap();
        let session = session_with("x\u{E009}y");

        let report = orch.run(&session).await.unwrap();

        assert_eq!(report.analytics.groups_total, 1);
        assert_eq!(report.analytics.groups_succeeded, 1);
        assert_eq!(engine.calls(), 1);
        assert_eq!(session.plain_output(), "x好y");
    }

    #[tokio::test]
    async fn test_session_language_overrides_configured_default() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SizedEngine::new(&[(1, Ok("好"))]));
        let orch = DecodeOrchestrator::with_engine(test_config(dir.path()), engine.clone()).unwrap();
        let session = session_with("x\u{E009}y");
        session.set_language(Some("jpn".to_string()));

        orch.run(&session).await.unwrap();

        assert_eq!(
            engine.languages.lock().unwrap().clone(),
            vec!["jpn".to_string()]
        );
    }

    #[tokio::test]
    async fn test_disposed_session_is_a_run_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SizedEngine::new(&[]));
        let orch = DecodeOrchestrator::with_engine(test_config(dir.path()), engine.clone()).unwrap();
        let session = session_with(INPUT_FIVE);
        session.dispose();

        let err = orch.run(&session).await.unwrap_err();
        assert!(matches!(err, RunError::SessionDisposed));
        assert_eq!(engine.calls(), 0);
    }
}
