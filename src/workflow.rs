//! One daily run: fetch, generate, render, publish.
//!
//! The run is a strictly linear state machine tracked by [`WorkflowRun`]:
//!
//! ```text
//! Idle -> Fetching -> Generating -> Rendering -> Publishing -> Done
//!            |                          |             |
//!            +-> Done(skipped)          +-> Done(failed)
//!                                                     +-> Done(success|failed)
//! ```
//!
//! Every file a run writes is named after its run id and removed once the
//! publish attempt is over, whatever its result.

use crate::generator::ContentGenerator;
use crate::generator::retry::TextBackend;
use crate::models::{Artifact, ContentBundle, MediaKind, Outcome, Stage, WorkflowRun};
use crate::publish::Publisher;
use crate::render::{MediaRenderer, Narrator};
use crate::sources::NewsSource;
use crate::utils::run_id;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// Per-run limits and the working directory for transient files.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub work_dir: PathBuf,
    pub max_articles: usize,
    pub recency_window: chrono::Duration,
}

/// Paths written during one run.
#[derive(Debug, Default)]
struct RunFiles(Vec<PathBuf>);

impl RunFiles {
    fn track(&mut self, path: PathBuf) -> PathBuf {
        self.0.push(path.clone());
        path
    }

    async fn remove_all(self) {
        for path in self.0 {
            match fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "Removed run file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Could not remove run file"),
            }
        }
    }
}

/// The daily pipeline wired to its collaborators.
pub struct DailyWorkflow<S, B, N, R, P> {
    source: S,
    generator: ContentGenerator<B>,
    narrator: Option<N>,
    renderer: R,
    publisher: P,
    settings: WorkflowSettings,
}

impl<S, B, N, R, P> DailyWorkflow<S, B, N, R, P>
where
    S: NewsSource,
    B: TextBackend,
    N: Narrator,
    R: MediaRenderer,
    P: Publisher,
{
    pub fn new(
        source: S,
        generator: ContentGenerator<B>,
        narrator: Option<N>,
        renderer: R,
        publisher: P,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            source,
            generator,
            narrator,
            renderer,
            publisher,
            settings,
        }
    }

    /// Execute one run to completion and return its record.
    ///
    /// Never fails: every problem ends up as the run's outcome and reason.
    pub async fn run(&self) -> WorkflowRun {
        let t0 = Instant::now();
        let mut run = WorkflowRun::new(run_id(Utc::now()));
        self.execute(&mut run).await;
        debug_assert!(run.is_done(), "run {} left at {}", run.run_id, run.stage);

        let elapsed_ms = t0.elapsed().as_millis();
        let outcome = run.outcome.unwrap_or(Outcome::Failed);
        let failed_stage = run.failed_stage.map(|s| s.to_string()).unwrap_or_default();
        let reason = run.reason.as_deref().unwrap_or("");
        match outcome {
            Outcome::Success => info!(
                run_id = %run.run_id,
                started_at = %run.started_at,
                %outcome,
                elapsed_ms,
                "Run finished"
            ),
            Outcome::Skipped => info!(
                run_id = %run.run_id,
                started_at = %run.started_at,
                %outcome,
                stage = %failed_stage,
                reason,
                elapsed_ms,
                "Run finished"
            ),
            Outcome::Failed => error!(
                run_id = %run.run_id,
                started_at = %run.started_at,
                %outcome,
                stage = %failed_stage,
                reason,
                elapsed_ms,
                "Run finished"
            ),
        }
        run
    }

    #[instrument(level = "info", skip_all, fields(run_id = %run.run_id))]
    async fn execute(&self, run: &mut WorkflowRun) {
        run.advance(Stage::Fetching);
        let articles = self
            .source
            .fetch(self.settings.max_articles, self.settings.recency_window)
            .await;
        if articles.is_empty() {
            run.finish(Outcome::Skipped, Some("no fresh articles from any source".to_string()));
            return;
        }
        info!(count = articles.len(), "Fetched articles");

        run.advance(Stage::Generating);
        let bundle = self.generator.generate(&articles).await;

        run.advance(Stage::Rendering);
        let mut files = RunFiles::default();
        let artifact = match self.render(&run.run_id, &bundle, &mut files).await {
            Ok(artifact) => artifact,
            Err(reason) => {
                files.remove_all().await;
                run.finish(Outcome::Failed, Some(reason));
                return;
            }
        };

        run.advance(Stage::Publishing);
        let published = self.publisher.publish(&artifact, &bundle.caption).await;
        files.remove_all().await;

        match published {
            Ok(receipt) => {
                info!(message_id = receipt.message_id, "Artifact delivered");
                run.finish(Outcome::Success, None);
            }
            Err(e) => run.finish(Outcome::Failed, Some(format!("publish: {e}"))),
        }
    }

    /// Narrate (video only, when a narrator is configured) and render.
    ///
    /// A narration failure downgrades to a silent video.
    async fn render(&self, run_id: &str, bundle: &ContentBundle, files: &mut RunFiles) -> Result<Artifact, String> {
        let kind = self.renderer.kind();
        let output = files.track(
            self.settings
                .work_dir
                .join(format!("ai_news_{run_id}.{}", kind.extension())),
        );

        let narration = match (&self.narrator, kind) {
            (Some(narrator), MediaKind::Video) => {
                let voice = files.track(
                    self.settings
                        .work_dir
                        .join(format!("ai_news_{run_id}_voice.{}", MediaKind::Audio.extension())),
                );
                match narrator.narrate(&bundle.script, &voice).await {
                    Ok(audio) => Some(audio),
                    Err(e) => {
                        warn!(error = %e, "Narration failed; rendering without audio");
                        None
                    }
                }
            }
            _ => None,
        };

        self.renderer
            .render(bundle, narration.as_ref(), &output)
            .await
            .map_err(|e| format!("render: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BackendError, PublishError, RenderError};
    use crate::generator::retry::RetryPolicy;
    use crate::generator::retry::tests::ScriptedBackend;
    use crate::generator::tests::articles;
    use crate::generator::{GeneratorSettings, fallback_bundle};
    use crate::models::Article;
    use crate::publish::PublishReceipt;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    const GOOD: &str = r#"{"headline":"AI Today","bullets":["One","Two"],
        "script":"First point. Second point.","caption":"Big day","hashtags":["AI"]}"#;

    struct FakeSource(Vec<Article>);

    impl NewsSource for FakeSource {
        async fn fetch(&self, max_items: usize, _window: chrono::Duration) -> Vec<Article> {
            self.0.iter().take(max_items).cloned().collect()
        }
    }

    struct FakeNarrator {
        fail: bool,
    }

    impl Narrator for FakeNarrator {
        async fn narrate(&self, _script: &str, output: &Path) -> Result<Artifact, RenderError> {
            if self.fail {
                return Err(RenderError::Speech("quota exceeded".to_string()));
            }
            fs::write(output, b"mp3").await?;
            Ok(Artifact::new(output, MediaKind::Audio, Some(Duration::from_millis(42_500))))
        }
    }

    #[derive(Default)]
    struct FakeRenderer {
        fail: bool,
        calls: Mutex<Vec<Option<Duration>>>,
    }

    impl MediaRenderer for FakeRenderer {
        fn kind(&self) -> MediaKind {
            MediaKind::Video
        }

        async fn render(
            &self,
            _bundle: &ContentBundle,
            narration: Option<&Artifact>,
            output: &Path,
        ) -> Result<Artifact, RenderError> {
            let audio = narration.and_then(|a| a.duration);
            self.calls.lock().unwrap().push(audio);
            if self.fail {
                return Err(RenderError::Tool {
                    tool: "ffmpeg",
                    status: "exit status: 1".to_string(),
                    stderr: "Unknown encoder 'libx264'".to_string(),
                });
            }
            fs::write(output, b"mp4").await?;
            Ok(Artifact::new(output, MediaKind::Video, Some(audio.unwrap_or(Duration::from_secs(16)))))
        }
    }

    #[derive(Default)]
    struct FakePublisher {
        reject: bool,
        /// (artifact, caption, file existed at publish time)
        calls: Mutex<Vec<(Artifact, String, bool)>>,
    }

    impl Publisher for FakePublisher {
        async fn publish(&self, artifact: &Artifact, caption: &str) -> Result<PublishReceipt, PublishError> {
            let exists = artifact.path().exists();
            self.calls
                .lock()
                .unwrap()
                .push((artifact.clone(), caption.to_string(), exists));
            if self.reject {
                Err(PublishError::Rejected {
                    status: 400,
                    description: "Bad Request: chat not found".to_string(),
                })
            } else {
                Ok(PublishReceipt { message_id: 1 })
            }
        }
    }

    type TestWorkflow = DailyWorkflow<FakeSource, ScriptedBackend, FakeNarrator, FakeRenderer, FakePublisher>;

    fn workflow(
        dir: &Path,
        input: Vec<Article>,
        backend: ScriptedBackend,
        narrator: Option<FakeNarrator>,
        renderer: FakeRenderer,
        publisher: FakePublisher,
    ) -> TestWorkflow {
        DailyWorkflow::new(
            FakeSource(input),
            ContentGenerator::new(backend, RetryPolicy::default(), GeneratorSettings::default()),
            narrator,
            renderer,
            publisher,
            WorkflowSettings {
                work_dir: dir.to_path_buf(),
                max_articles: 5,
                recency_window: chrono::Duration::hours(48),
            },
        )
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_narrated_run_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let wf = workflow(
            tmp.path(),
            articles(5),
            ScriptedBackend::new(vec![Ok(GOOD.to_string())]),
            Some(FakeNarrator { fail: false }),
            FakeRenderer::default(),
            FakePublisher::default(),
        );

        let run = wf.run().await;

        assert_eq!(run.outcome, Some(Outcome::Success));
        assert!(run.is_done());
        assert_eq!(wf.generator.backend().call_count(), 1);
        let calls = wf.publisher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (artifact, caption, existed) = &calls[0];
        assert_eq!(artifact.duration, Some(Duration::from_millis(42_500)));
        assert_eq!(caption, "Big day\n\n#AI");
        assert!(existed);
        assert!(dir_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn test_empty_fetch_skips_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let wf = workflow(
            tmp.path(),
            Vec::new(),
            ScriptedBackend::new(vec![Ok(GOOD.to_string())]),
            Some(FakeNarrator { fail: false }),
            FakeRenderer::default(),
            FakePublisher::default(),
        );

        let run = wf.run().await;

        assert_eq!(run.outcome, Some(Outcome::Skipped));
        assert_eq!(run.failed_stage, Some(Stage::Fetching));
        assert_eq!(wf.generator.backend().call_count(), 0);
        assert!(wf.renderer.calls.lock().unwrap().is_empty());
        assert!(wf.publisher.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overloaded_backend_publishes_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let input = articles(4);
        let wf = workflow(
            tmp.path(),
            input.clone(),
            ScriptedBackend::always(Err(BackendError::Overloaded("503".into()))),
            None,
            FakeRenderer::default(),
            FakePublisher::default(),
        );

        let started = tokio::time::Instant::now();
        let run = wf.run().await;

        assert_eq!(run.outcome, Some(Outcome::Success));
        assert_eq!(wf.generator.backend().call_count(), 4);
        assert!(started.elapsed() >= Duration::from_secs(30));
        let calls = wf.publisher.calls.lock().unwrap();
        assert_eq!(calls[0].1, fallback_bundle(&input, 1024).caption);
        assert_eq!(calls[0].0.duration, Some(Duration::from_secs(16)));
    }

    #[tokio::test]
    async fn test_publish_failure_discards_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let wf = workflow(
            tmp.path(),
            articles(5),
            ScriptedBackend::new(vec![Ok(GOOD.to_string())]),
            Some(FakeNarrator { fail: false }),
            FakeRenderer::default(),
            FakePublisher {
                reject: true,
                ..Default::default()
            },
        );

        let run = wf.run().await;

        assert_eq!(run.outcome, Some(Outcome::Failed));
        assert_eq!(run.failed_stage, Some(Stage::Publishing));
        assert!(run.reason.as_deref().unwrap().contains("chat not found"));
        let calls = wf.publisher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].0.path().exists());
        assert!(dir_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn test_render_failure_stops_before_publish() {
        let tmp = tempfile::tempdir().unwrap();
        let wf = workflow(
            tmp.path(),
            articles(2),
            ScriptedBackend::new(vec![Ok(GOOD.to_string())]),
            Some(FakeNarrator { fail: false }),
            FakeRenderer {
                fail: true,
                ..Default::default()
            },
            FakePublisher::default(),
        );

        let run = wf.run().await;

        assert_eq!(run.outcome, Some(Outcome::Failed));
        assert_eq!(run.failed_stage, Some(Stage::Rendering));
        assert!(run.reason.as_deref().unwrap().starts_with("render:"));
        assert!(wf.publisher.calls.lock().unwrap().is_empty());
        assert!(dir_is_empty(tmp.path()));
    }

    #[tokio::test]
    async fn test_narration_failure_renders_silent_video() {
        let tmp = tempfile::tempdir().unwrap();
        let wf = workflow(
            tmp.path(),
            articles(3),
            ScriptedBackend::new(vec![Ok(GOOD.to_string())]),
            Some(FakeNarrator { fail: true }),
            FakeRenderer::default(),
            FakePublisher::default(),
        );

        let run = wf.run().await;

        assert_eq!(run.outcome, Some(Outcome::Success));
        assert_eq!(*wf.renderer.calls.lock().unwrap(), vec![None]);
    }
}
