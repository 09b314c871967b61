use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::cache::TranslationCache;
use crate::catalog::PoCatalog;
use crate::config::{BatchConfig, FailurePolicy};
use crate::error::{Result, PotransError};
use crate::translate::Translator;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub limit: Option<usize>,
    pub inter_batch_delay: Duration,
    pub failure_policy: FailurePolicy,
}

impl From<&BatchConfig> for BatchOptions {
    fn from(config: &BatchConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            limit: config.limit,
            inter_batch_delay: config.inter_batch_delay(),
            failure_policy: config.failure_policy,
        }
    }
}

/// Untranslated work found in a catalog: unique source texts in
/// first-seen order, and every position each of them occupies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkPlan {
    pub scanned: usize,
    pub untranslated: usize,
    pub unique_texts: Vec<String>,
    pub positions: HashMap<String, Vec<usize>>,
}

impl WorkPlan {
    pub fn scan(catalog: &PoCatalog, limit: Option<usize>) -> Self {
        let mut plan = WorkPlan::default();

        for entry in catalog.entries().into_iter().take(limit.unwrap_or(usize::MAX)) {
            plan.scanned += 1;
            if !entry.is_untranslated() {
                continue;
            }
            plan.untranslated += 1;

            let positions = plan.positions.entry(entry.source_text.clone()).or_default();
            if positions.is_empty() {
                plan.unique_texts.push(entry.source_text);
            }
            positions.push(entry.position);
        }

        plan
    }

    pub fn batches(&self, batch_size: usize) -> std::slice::Chunks<'_, String> {
        self.unique_texts.chunks(batch_size.max(1))
    }

    pub fn batch_count(&self, batch_size: usize) -> usize {
        self.unique_texts.len().div_ceil(batch_size.max(1))
    }
}

/// Counters for one processed catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub scanned: usize,
    pub untranslated: usize,
    pub unique_texts: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub translated_texts: usize,
    pub cache_hits: usize,
    pub failed_texts: usize,
}

pub struct BatchOrchestrator {
    translator: Translator,
    options: BatchOptions,
}

impl BatchOrchestrator {
    pub fn new(translator: Translator, options: BatchOptions) -> Self {
        Self { translator, options }
    }

    /// Translate the untranslated entries of `catalog`, writing a checkpoint
    /// to `output_path` after every batch.
    pub async fn process_catalog(
        &self,
        catalog: &mut PoCatalog,
        output_path: &Path,
        cache: &mut TranslationCache,
    ) -> Result<FileReport> {
        if self.options.batch_size == 0 {
            return Err(PotransError::Config("batch_size must be at least 1".to_string()));
        }

        let plan = WorkPlan::scan(catalog, self.options.limit);
        let batch_count = plan.batch_count(self.options.batch_size);

        info!(
            "Found {} untranslated entries ({} unique) in the first {} of {} entries",
            plan.untranslated,
            plan.unique_texts.len(),
            plan.scanned,
            catalog.len()
        );

        let mut report = FileReport {
            scanned: plan.scanned,
            untranslated: plan.untranslated,
            unique_texts: plan.unique_texts.len(),
            batches: batch_count,
            ..FileReport::default()
        };

        if batch_count == 0 {
            catalog.save(output_path)?;
            info!("Nothing to translate, copied catalog to {}", output_path.display());
            return Ok(report);
        }

        let progress = batch_progress(batch_count as u64);

        for (idx, batch) in plan.batches(self.options.batch_size).enumerate() {
            let pending: Vec<String> = batch
                .iter()
                .filter(|text| !cache.contains(text))
                .cloned()
                .collect();
            report.cache_hits += batch.len() - pending.len();

            if !pending.is_empty() {
                info!("Translating batch {}/{} ({} texts)", idx + 1, batch_count, pending.len());
                debug!("Current batch: {:?}", pending);

                let result = self.translator.translate_batch(&pending).await;
                if result.failed {
                    report.failed_batches += 1;
                }
                debug!("Translations received: {:?}", result.translations);

                for (text, translation) in pending.iter().zip(result.translations) {
                    if translation.is_empty() {
                        report.failed_texts += 1;
                        if self.options.failure_policy == FailurePolicy::Skip {
                            continue;
                        }
                    }
                    cache.insert(text.clone(), translation);
                }
            } else {
                debug!("Batch {}/{} served from cache", idx + 1, batch_count);
            }

            let assignments = self.assignments_for(batch, &plan, cache, &mut report);
            catalog.apply(&assignments);
            catalog.save(output_path)?;

            progress.inc(1);
            info!(
                "Progress: {}/{} unique messages ({:.1}%)",
                report.translated_texts,
                plan.unique_texts.len(),
                report.translated_texts as f64 / plan.unique_texts.len() as f64 * 100.0
            );

            let is_last = idx + 1 == batch_count;
            if !pending.is_empty() && !is_last && !self.options.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.options.inter_batch_delay).await;
            }
        }

        progress.finish_and_clear();

        if report.failed_texts > 0 {
            warn!(
                "{} texts could not be translated and were {}",
                report.failed_texts,
                match self.options.failure_policy {
                    FailurePolicy::Skip => "left untranslated",
                    FailurePolicy::WriteEmpty => "written empty",
                }
            );
        }
        info!("Output saved to {}", output_path.display());

        Ok(report)
    }

    /// Fan each translated text of `batch` out to every position sharing it.
    fn assignments_for(
        &self,
        batch: &[String],
        plan: &WorkPlan,
        cache: &TranslationCache,
        report: &mut FileReport,
    ) -> BTreeMap<usize, String> {
        let mut assignments = BTreeMap::new();

        for text in batch {
            let Some(translation) = cache.get(text) else {
                continue;
            };
            if translation.is_empty() && self.options.failure_policy == FailurePolicy::Skip {
                continue;
            }
            if !translation.is_empty() {
                report.translated_texts += 1;
            }
            for position in plan.positions.get(text).into_iter().flatten() {
                assignments.insert(*position, translation.to_string());
            }
        }

        assignments
    }
}

fn batch_progress(total: u64) -> ProgressBar {
    let progress = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] batch {pos}/{len} ({eta})",
    ) {
        progress.set_style(style.progress_chars("#>-"));
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::catalog::tests::{pairs, write_po};
    use crate::config::TranslateConfig;
    use crate::translate::client::MockCompletionClient;

    const HEADER: &str = r#"# Chinese, Traditional translation of Example module
# Copyright (c) 2024 Example translators
#
msgid ""
msgstr ""
"Project-Id-Version: example (1.0.0)\n"
"POT-Creation-Date: 2024-03-01 12:00+0800\n"
"PO-Revision-Date: 2024-03-02 09:30+0800\n"
"Language-Team: Chinese, Traditional\n"
"MIME-Version: 1.0\n"
"Content-Type: text/plain; charset=utf-8\n"
"Content-Transfer-Encoding: 8bit\n"
"Plural-Forms: nplurals=1; plural=0;\n"
"X-Generator: Poedit 3.4\n"

"#;

    fn po(entries: &[(Option<&str>, &str, &str)]) -> String {
        let mut content = HEADER.to_string();
        for (context, msgid, msgstr) in entries {
            if let Some(context) = context {
                content.push_str(&format!("msgctxt \"{}\"\n", context));
            }
            content.push_str(&format!("msgid \"{}\"\nmsgstr \"{}\"\n\n", msgid, msgstr));
        }
        content
    }

    fn options(batch_size: usize, failure_policy: FailurePolicy) -> BatchOptions {
        BatchOptions {
            batch_size,
            limit: None,
            inter_batch_delay: Duration::ZERO,
            failure_policy,
        }
    }

    fn orchestrator(mock: MockCompletionClient, options: BatchOptions) -> BatchOrchestrator {
        let config = TranslateConfig {
            retry_base_delay_ms: 0,
            ..TranslateConfig::default()
        };
        BatchOrchestrator::new(Translator::new(Box::new(mock), &config), options)
    }

    fn owned(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
    }

    #[tokio::test]
    async fn test_shared_source_text_is_translated_once() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_po(dir.path(), "in.po", &po(&[
            (None, "Hello", ""),
            (Some("greeting"), "Hello", ""),
            (None, "Bye", ""),
        ]));
        let output = dir.path().join("out.po");

        let mut mock = MockCompletionClient::new();
        mock.expect_complete()
            .withf(|_, user| user.ends_with("1. Hello\n2. Bye"))
            .times(1)
            .returning(|_, _| Ok("1. 你好\n2. 再見".to_string()));

        let mut catalog = PoCatalog::load(&input).unwrap();
        let mut cache = TranslationCache::new();
        let report = orchestrator(mock, options(5, FailurePolicy::Skip))
            .process_catalog(&mut catalog, &output, &mut cache)
            .await
            .unwrap();

        assert_eq!(report.unique_texts, 2);
        assert_eq!(report.batches, 1);
        assert_eq!(report.translated_texts, 2);

        let written = PoCatalog::load(&output).unwrap();
        assert_eq!(pairs(&written), owned(&[("Hello", "你好"), ("Hello", "你好"), ("Bye", "再見")]));
        assert!(std::fs::read_to_string(&output).unwrap().starts_with(HEADER));
    }

    #[tokio::test]
    async fn test_translated_catalog_is_copied_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = po(&[
            (None, "Save", "儲存"),
            (None, "Cancel", "取消"),
        ]);
        content.push_str("# Reviewed\n#, fuzzy\nmsgid \"Close\"\nmsgstr \"關閉\"\n\n");
        content.push_str("#~ msgid \"Quit\"\n#~ msgstr \"離開\"\n");
        let input = write_po(dir.path(), "in.po", &content);
        let output = dir.path().join("out.po");

        let mut mock = MockCompletionClient::new();
        mock.expect_complete().never();

        let mut catalog = PoCatalog::load(&input).unwrap();
        let report = orchestrator(mock, options(5, FailurePolicy::Skip))
            .process_catalog(&mut catalog, &output, &mut TranslationCache::new())
            .await
            .unwrap();

        assert_eq!(report.batches, 0);
        assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&input).unwrap());
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_po(dir.path(), "in.po", &po(&[
            (None, "One", ""),
            (None, "Two", ""),
            (None, "Three", ""),
            (None, "Four", ""),
        ]));
        let output = dir.path().join("out.po");

        let mut mock = MockCompletionClient::new();
        mock.expect_complete()
            .returning(|_, user| {
                if user.contains("1. One") {
                    Err(PotransError::Translation("timeout".to_string()))
                } else {
                    Ok("1. 四".to_string())
                }
            });

        let mut catalog = PoCatalog::load(&input).unwrap();
        let report = orchestrator(mock, options(3, FailurePolicy::Skip))
            .process_catalog(&mut catalog, &output, &mut TranslationCache::new())
            .await
            .unwrap();

        assert_eq!(report.batches, 2);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.failed_texts, 3);
        assert_eq!(report.translated_texts, 1);

        let written = PoCatalog::load(&output).unwrap();
        assert_eq!(
            pairs(&written),
            owned(&[("One", ""), ("Two", ""), ("Three", ""), ("Four", "四")])
        );
    }

    #[tokio::test]
    async fn test_skip_policy_retries_failed_text_later() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_po(dir.path(), "in.po", &po(&[(None, "Save", "")]));
        let output = dir.path().join("out.po");

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut mock = MockCompletionClient::new();
        mock.expect_complete()
            .returning(move |_, _| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok("Sorry, no.".to_string())
                } else {
                    Ok("1. 儲存".to_string())
                }
            });

        let orchestrator = orchestrator(mock, options(5, FailurePolicy::Skip));
        let mut cache = TranslationCache::new();

        let mut catalog = PoCatalog::load(&input).unwrap();
        let first = orchestrator.process_catalog(&mut catalog, &output, &mut cache).await.unwrap();
        assert_eq!(first.failed_texts, 1);
        assert!(cache.is_empty());

        let mut catalog = PoCatalog::load(&input).unwrap();
        let second = orchestrator.process_catalog(&mut catalog, &output, &mut cache).await.unwrap();
        assert_eq!(second.translated_texts, 1);
        assert_eq!(cache.get("Save"), Some("儲存"));
    }

    #[tokio::test]
    async fn test_write_empty_policy_caches_failures() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_po(dir.path(), "in.po", &po(&[(None, "Save", "")]));
        let output = dir.path().join("out.po");

        let mut mock = MockCompletionClient::new();
        mock.expect_complete()
            .times(3)
            .returning(|_, _| Err(PotransError::Translation("unavailable".to_string())));

        let orchestrator = orchestrator(mock, options(5, FailurePolicy::WriteEmpty));
        let mut cache = TranslationCache::new();

        for _ in 0..2 {
            let mut catalog = PoCatalog::load(&input).unwrap();
            orchestrator.process_catalog(&mut catalog, &output, &mut cache).await.unwrap();
        }

        assert_eq!(cache.get("Save"), Some(""));
        let written = PoCatalog::load(&output).unwrap();
        assert_eq!(pairs(&written), owned(&[("Save", "")]));
    }

    #[tokio::test]
    async fn test_checkpoint_after_each_batch() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_po(dir.path(), "in.po", &po(&[
            (None, "Save", ""),
            (None, "Cancel", ""),
            (None, "Delete", ""),
        ]));
        let output = dir.path().join("out.po");

        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let seen = snapshots.clone();
        let checkpoint = output.clone();

        let mut mock = MockCompletionClient::new();
        mock.expect_complete()
            .times(3)
            .returning(move |_, user| {
                if checkpoint.exists() {
                    let catalog = PoCatalog::load(&checkpoint).unwrap();
                    seen.lock().unwrap().push(pairs(&catalog));
                }
                let reply = if user.contains("1. Save") {
                    "1. 儲存"
                } else if user.contains("1. Cancel") {
                    "1. 取消"
                } else {
                    "1. 刪除"
                };
                Ok(reply.to_string())
            });

        let mut catalog = PoCatalog::load(&input).unwrap();
        orchestrator(mock, options(1, FailurePolicy::Skip))
            .process_catalog(&mut catalog, &output, &mut TranslationCache::new())
            .await
            .unwrap();

        let snapshots = snapshots.lock().unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0], owned(&[("Save", "儲存"), ("Cancel", ""), ("Delete", "")]));
        assert_eq!(snapshots[1], owned(&[("Save", "儲存"), ("Cancel", "取消"), ("Delete", "")]));

        let written = PoCatalog::load(&output).unwrap();
        assert_eq!(
            pairs(&written),
            owned(&[("Save", "儲存"), ("Cancel", "取消"), ("Delete", "刪除")])
        );
    }

    #[tokio::test]
    async fn test_cache_is_shared_across_catalogs() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_po(dir.path(), "a.po", &po(&[(None, "Save", "")]));
        let second = write_po(dir.path(), "b.po", &po(&[(None, "Save", ""), (None, "Open", "")]));

        let mut mock = MockCompletionClient::new();
        mock.expect_complete()
            .withf(|_, user| user.ends_with("1. Save"))
            .times(1)
            .returning(|_, _| Ok("1. 儲存".to_string()));
        mock.expect_complete()
            .withf(|_, user| user.ends_with("1. Open"))
            .times(1)
            .returning(|_, _| Ok("1. 開啟".to_string()));

        let orchestrator = orchestrator(mock, options(5, FailurePolicy::Skip));
        let mut cache = TranslationCache::new();

        let mut catalog = PoCatalog::load(&first).unwrap();
        orchestrator.process_catalog(&mut catalog, &dir.path().join("a.out.po"), &mut cache).await.unwrap();

        let mut catalog = PoCatalog::load(&second).unwrap();
        let report = orchestrator
            .process_catalog(&mut catalog, &dir.path().join("b.out.po"), &mut cache)
            .await
            .unwrap();

        assert_eq!(report.cache_hits, 1);
        let written = PoCatalog::load(dir.path().join("b.out.po")).unwrap();
        assert_eq!(pairs(&written), owned(&[("Save", "儲存"), ("Open", "開啟")]));
    }

    #[tokio::test]
    async fn test_limit_bounds_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_po(dir.path(), "in.po", &po(&[
            (None, "One", ""),
            (None, "Two", ""),
            (None, "Three", ""),
        ]));
        let output = dir.path().join("out.po");

        let mut mock = MockCompletionClient::new();
        mock.expect_complete()
            .withf(|_, user| user.ends_with("1. One\n2. Two"))
            .times(1)
            .returning(|_, _| Ok("1. 一\n2. 二".to_string()));

        let mut options = options(5, FailurePolicy::Skip);
        options.limit = Some(2);

        let mut catalog = PoCatalog::load(&input).unwrap();
        let report = orchestrator(mock, options)
            .process_catalog(&mut catalog, &output, &mut TranslationCache::new())
            .await
            .unwrap();

        assert_eq!(report.scanned, 2);
        let written = PoCatalog::load(&output).unwrap();
        assert_eq!(pairs(&written), owned(&[("One", "一"), ("Two", "二"), ("Three", "")]));
    }

    #[test]
    fn test_plan_batches_in_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_po(dir.path(), "in.po", &po(&[
            (None, "a", ""),
            (None, "b", "B"),
            (Some("x"), "a", ""),
            (None, "c", ""),
            (None, "d", ""),
        ]));

        let plan = WorkPlan::scan(&PoCatalog::load(&input).unwrap(), None);

        assert_eq!(plan.untranslated, 4);
        assert_eq!(plan.unique_texts, vec!["a", "c", "d"]);
        assert_eq!(plan.positions["a"], vec![0, 2]);
        assert_eq!(plan.batch_count(2), 2);
        let batches: Vec<&[String]> = plan.batches(2).collect();
        assert_eq!(batches[0], ["a".to_string(), "c".to_string()]);
        assert_eq!(batches[1], ["d".to_string()]);
    }
}
