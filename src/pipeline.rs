use anyhow::{Context, Result};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, warn};

use crate::error::ZoneError;
use crate::ocr::{self, OcrEngine};
use crate::pattern::PatternSet;
use crate::segment::{self, BannedTokens, Label, Segment, Zone};
use crate::session::{Page, SegmentationJob};
use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct SegmentOptions {
    pub min_zone_height: u32,
    pub upscale: u32,
    pub label_lift: u32,
    pub page_timeout: Duration,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for SegmentOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            min_zone_height: settings.min_zone_height,
            upscale: settings.ocr_upscale,
            label_lift: settings.label_lift,
            page_timeout: settings.page_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Segment(Segment),
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { pages: usize, segments: usize },
    Disconnected,
}

/// Label-side configuration shared by every page of a run.
struct PageContext {
    engine: Arc<dyn OcrEngine>,
    zone: Zone,
    patterns: PatternSet,
    banned: BannedTokens,
    options: SegmentOptions,
}

enum Flow {
    Continue(usize),
    Disconnected,
}

/// Processes every page of `job` in upload order, pushing segments into `tx` as
/// they are produced and `Done` after the last page. Stops as soon as the
/// receiving side goes away.
pub async fn run(
    job: SegmentationJob,
    engine: Arc<dyn OcrEngine>,
    options: SegmentOptions,
    tx: Sender<PipelineEvent>,
) -> RunOutcome {
    let SegmentationJob {
        pages,
        zone,
        patterns,
        banned,
    } = job;
    let total = pages.len();
    let ctx = Arc::new(PageContext {
        engine,
        zone,
        patterns,
        banned,
        options,
    });
    info!(pages = total, "segmentation run started");

    let mut segments = 0usize;
    for page in pages {
        if tx.is_closed() {
            info!(page = page.index, "consumer disconnected; stopping run");
            return RunOutcome::Disconnected;
        }
        let index = page.index;
        let Some((image, labels)) = detect_page(ctx.clone(), page).await else {
            continue;
        };
        let lift = ctx.options.label_lift;
        let page_tx = tx.clone();
        let flow = tokio::task::spawn_blocking(move || {
            emit_segments(&image, index, &labels, lift, &page_tx)
        })
        .await;
        match flow {
            Ok(Flow::Continue(count)) => {
                info!(page = index, segments = count, "page segmented");
                segments += count;
            }
            Ok(Flow::Disconnected) => {
                info!(page = index, "consumer disconnected; stopping run");
                return RunOutcome::Disconnected;
            }
            Err(err) => {
                error!(page = index, error = %err, "segment task failed");
            }
        }
    }

    if tx.send(PipelineEvent::Done).await.is_err() {
        return RunOutcome::Disconnected;
    }
    info!(pages = total, segments, "segmentation run finished");
    RunOutcome::Completed {
        pages: total,
        segments,
    }
}

/// Zone extraction, OCR and label filtering for one page, under the page timeout.
/// Every failure here only skips the page. A timed-out page is still waited for, so
/// OCR for the next page never starts while this one is running.
async fn detect_page(ctx: Arc<PageContext>, page: Page) -> Option<(DynamicImage, Vec<Label>)> {
    let index = page.index;
    let timeout = ctx.options.page_timeout;
    let mut task = tokio::task::spawn_blocking(move || find_labels(&ctx, &page));
    let joined = match tokio::time::timeout(timeout, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            warn!(
                page = index,
                timeout_ms = timeout.as_millis() as u64,
                "page timed out"
            );
            if let Err(err) = task.await {
                error!(page = index, error = %err, "timed out page task failed");
            }
            debug!(page = index, "timed out page released");
            return None;
        }
    };
    match joined {
        Ok(Ok(PageLabels::Found(image, labels))) => {
            debug!(page = index, labels = labels.len(), "labels detected");
            Some((image, labels))
        }
        Ok(Ok(PageLabels::ZoneRejected(err))) => {
            warn!(page = index, "{}", err);
            None
        }
        Ok(Ok(PageLabels::None)) => {
            warn!(page = index, "no question numbers detected");
            None
        }
        Ok(Err(err)) => {
            error!(page = index, error = %format!("{:#}", err), "page failed");
            None
        }
        Err(err) => {
            error!(page = index, error = %err, "page task failed");
            None
        }
    }
}

enum PageLabels {
    Found(DynamicImage, Vec<Label>),
    ZoneRejected(ZoneError),
    None,
}

fn find_labels(ctx: &PageContext, page: &Page) -> Result<PageLabels> {
    let image = image::load_from_memory(&page.bytes)
        .with_context(|| format!("failed to decode page {}", page.index))?;
    let zone_image = match segment::extract_zone(&image, &ctx.zone, ctx.options.min_zone_height) {
        Ok(zone_image) => zone_image,
        Err(err) => return Ok(PageLabels::ZoneRejected(err)),
    };
    let tokens = ocr::detect_tokens(ctx.engine.as_ref(), &zone_image, ctx.options.upscale)
        .with_context(|| format!("ocr failed on page {}", page.index))?;
    let labels = segment::filter_and_sort(tokens, &ctx.banned, &ctx.patterns);
    if labels.is_empty() {
        return Ok(PageLabels::None);
    }
    Ok(PageLabels::Found(image, labels))
}

fn emit_segments(
    image: &DynamicImage,
    index: usize,
    labels: &[Label],
    lift: u32,
    tx: &Sender<PipelineEvent>,
) -> Flow {
    let mut count = 0;
    for result in segment::segment(image, index, labels, lift) {
        if tx.is_closed() {
            return Flow::Disconnected;
        }
        match result {
            Ok(seg) => {
                if tx.blocking_send(PipelineEvent::Segment(seg)).is_err() {
                    return Flow::Disconnected;
                }
                count += 1;
            }
            Err(err) => warn!(page = index, error = %format!("{:#}", err), "segment skipped"),
        }
    }
    Flow::Continue(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{DetectionLevel, RawToken};
    use crate::session::{Session, SessionConfig};
    use crate::test_util::{blank_page, png_bytes};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Replays one token list per `recognize` call, in order.
    struct ScriptedOcr {
        pages: Mutex<Vec<Vec<RawToken>>>,
    }

    impl ScriptedOcr {
        fn new(mut pages: Vec<Vec<RawToken>>) -> Arc<Self> {
            pages.reverse();
            Arc::new(Self {
                pages: Mutex::new(pages),
            })
        }
    }

    impl OcrEngine for ScriptedOcr {
        fn recognize(&self, _image: &DynamicImage) -> Result<Vec<RawToken>> {
            Ok(self.pages.lock().expect("pages lock").pop().unwrap_or_default())
        }
    }

    struct FailingOcr;

    impl OcrEngine for FailingOcr {
        fn recognize(&self, _image: &DynamicImage) -> Result<Vec<RawToken>> {
            Err(anyhow::anyhow!("engine crashed"))
        }
    }

    /// Sleeps through every call and records how many calls overlap.
    #[derive(Default)]
    struct SlowOcr {
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl OcrEngine for SlowOcr {
        fn recognize(&self, _image: &DynamicImage) -> Result<Vec<RawToken>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![RawToken::word("Q.1", 20)])
        }
    }

    fn job(pages: &[(u32, u32)]) -> SegmentationJob {
        let mut session = Session::default();
        for (width, height) in pages {
            session.push_page(png_bytes(&blank_page(*width, *height)));
        }
        session
            .configure(SessionConfig {
                zone: Some(Zone::new(0.0, 200.0).expect("zone")),
                templates: vec!["Q.1".to_string()],
                banned_words: Vec::new(),
            })
            .expect("configure");
        session.into_job().expect("job")
    }

    async fn collect(
        job: SegmentationJob,
        engine: Arc<dyn OcrEngine>,
    ) -> (RunOutcome, Vec<PipelineEvent>) {
        collect_with(job, engine, SegmentOptions::default()).await
    }

    async fn collect_with(
        job: SegmentationJob,
        engine: Arc<dyn OcrEngine>,
        options: SegmentOptions,
    ) -> (RunOutcome, Vec<PipelineEvent>) {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = tokio::spawn(run(job, engine, options, tx));
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (handle.await.expect("run task"), events)
    }

    fn labels(events: &[PipelineEvent]) -> Vec<String> {
        events
            .iter()
            .map(|event| match event {
                PipelineEvent::Segment(seg) => format!("{}@{}", seg.label, seg.page_index),
                PipelineEvent::Done => "done".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn emits_segments_in_page_order_then_done() {
        let engine = ScriptedOcr::new(vec![
            vec![
                RawToken {
                    level: DetectionLevel::Line,
                    text: "Q.1 Solve".to_string(),
                    top: 220,
                },
                RawToken::word("Q.2", 800),
                RawToken::word("Q.1", 220),
                RawToken::word("Solve", 220),
            ],
            vec![RawToken::word("Q.3", 100)],
        ]);
        let (outcome, events) = collect(job(&[(300, 600), (300, 600)]), engine).await;
        assert_eq!(labels(&events), vec!["q1@0", "q2@0", "q3@1", "done"]);
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                pages: 2,
                segments: 3
            }
        );
        let PipelineEvent::Segment(first) = &events[0] else {
            panic!("expected segment");
        };
        assert_eq!((first.span.top, first.span.bottom), (105, 400));
    }

    #[tokio::test]
    async fn short_page_is_skipped_and_run_continues() {
        let engine = ScriptedOcr::new(vec![vec![RawToken::word("Q.7", 40)]]);
        let (outcome, events) = collect(job(&[(300, 50), (300, 400)]), engine).await;
        assert_eq!(labels(&events), vec!["q7@1", "done"]);
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                pages: 2,
                segments: 1
            }
        );
    }

    #[tokio::test]
    async fn page_without_labels_or_with_failures_contributes_nothing() {
        let mut broken = job(&[(300, 400)]);
        broken.pages.push(Page {
            index: 1,
            bytes: b"not an image".to_vec(),
        });
        let engine = ScriptedOcr::new(vec![vec![RawToken::word("Marks", 30)]]);
        let (outcome, events) = collect(broken, engine).await;
        assert_eq!(labels(&events), vec!["done"]);
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                pages: 2,
                segments: 0
            }
        );

        let (_, events) = collect(job(&[(300, 400)]), Arc::new(FailingOcr)).await;
        assert_eq!(labels(&events), vec!["done"]);
    }

    #[tokio::test]
    async fn dropped_receiver_stops_the_run() {
        let engine = ScriptedOcr::new(vec![
            vec![RawToken::word("Q.1", 20), RawToken::word("Q.2", 200)],
            vec![RawToken::word("Q.3", 20)],
        ]);
        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn(run(
            job(&[(300, 400), (300, 400)]),
            engine,
            SegmentOptions::default(),
            tx,
        ));
        let first = rx.recv().await.expect("first event");
        assert!(matches!(first, PipelineEvent::Segment(_)));
        drop(rx);
        assert_eq!(handle.await.expect("run task"), RunOutcome::Disconnected);
    }

    #[tokio::test]
    async fn timed_out_pages_are_skipped_one_at_a_time() {
        let engine = Arc::new(SlowOcr {
            delay: Duration::from_millis(300),
            ..SlowOcr::default()
        });
        let options = SegmentOptions {
            page_timeout: Duration::from_millis(50),
            ..SegmentOptions::default()
        };
        let (outcome, events) = collect_with(
            job(&[(300, 400), (300, 400), (300, 400)]),
            engine.clone(),
            options,
        )
        .await;

        assert_eq!(labels(&events), vec!["done"]);
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                pages: 3,
                segments: 0
            }
        );
        assert_eq!(engine.peak.load(Ordering::SeqCst), 1);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.active.load(Ordering::SeqCst), 0);
    }
}
