//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置文档 -> 快照 -> GrandOutput -> 文件 Sink 的完整链路
//! - 请求守卫 (SwallowErrors) 的故障捕获
//! - 配置热更新与并发写入

#[cfg(test)]
mod support {
    use std::path::Path;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader, SectionPath};
    use contracts::{LogLine, OutputConfig};
    use dispatcher::{log_files, read_binary_log, GrandOutput, BINARY_FILE_EXTENSION, TEXT_FILE_EXTENSION};

    /// Snapshot of a JSON document, `Monitoring` section
    pub fn snapshot(doc: &str) -> OutputConfig {
        ConfigLoader::load_from_str(doc, ConfigFormat::Json, &SectionPath::default())
            .unwrap()
            .config
    }

    pub fn handlers(handlers: &str) -> String {
        format!(r#"{{ "Monitoring": {{ "GrandOutput": {{ "Handlers": {handlers} }} }} }}"#)
    }

    /// Every line of every text log in `dir` (none when it does not exist)
    pub fn text_lines(dir: &Path) -> Vec<String> {
        log_files(dir, TEXT_FILE_EXTENSION)
            .unwrap_or_default()
            .iter()
            .flat_map(|file| {
                std::fs::read_to_string(file)
                    .unwrap()
                    .lines()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn binary_lines(dir: &Path) -> Vec<LogLine> {
        log_files(dir, BINARY_FILE_EXTENSION)
            .unwrap_or_default()
            .iter()
            .flat_map(|file| read_binary_log(file).unwrap())
            .collect()
    }

    /// `hello-*` texts found in the text logs of `dir`
    pub fn text_hellos(dir: &Path) -> Vec<String> {
        text_lines(dir)
            .iter()
            .filter_map(|l| l.find("hello-").map(|i| l[i..].to_string()))
            .collect()
    }

    pub fn binary_hellos(dir: &Path) -> Vec<String> {
        binary_lines(dir)
            .into_iter()
            .filter(|l| l.text.starts_with("hello-"))
            .map(|l| l.text)
            .collect()
    }

    pub async fn wait_for_sinks(output: &GrandOutput, expected: &[&str]) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while output.sink_names() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("sinks never became {expected:?}"));
    }
}

#[cfg(test)]
mod reconfiguration_tests {
    use super::support::*;
    use contracts::{LogLevel, DEFAULT_TEXT_PATH};
    use dispatcher::GrandOutput;

    /// A = TextFile@pathX, B = BinaryFile@pathY, C = TextFile@pathZ
    #[tokio::test]
    async fn test_hello_lines_follow_the_active_snapshot() {
        let root = tempfile::tempdir().unwrap();
        let output = GrandOutput::new(root.path());
        let monitor = output.create_monitor();

        output
            .apply_configuration(snapshot(&handlers(r#"{ "TextFile": { "Path": "pathX" } }"#)))
            .await
            .unwrap();
        monitor.info("hello-1");
        output
            .apply_configuration(snapshot(&handlers(r#"{ "BinaryFile": { "Path": "pathY" } }"#)))
            .await
            .unwrap();
        monitor.info("hello-2");
        output
            .apply_configuration(snapshot(&handlers(r#"{ "TextFile": { "Path": "pathZ" } }"#)))
            .await
            .unwrap();
        monitor.info("hello-3");
        output.dispose().await;

        assert_eq!(text_hellos(&root.path().join("pathX")), vec!["hello-1"]);
        assert_eq!(binary_hellos(&root.path().join("pathY")), vec!["hello-2"]);
        assert_eq!(text_hellos(&root.path().join("pathZ")), vec!["hello-3"]);
        assert!(text_hellos(&root.path().join("pathY")).is_empty());
    }

    #[tokio::test]
    async fn test_empty_configuration_switches_to_default_text() {
        let root = tempfile::tempdir().unwrap();
        let output = GrandOutput::new(root.path());
        let monitor = output.create_monitor();

        output
            .apply_configuration(snapshot(&handlers(r#"{ "TextFile": { "Path": "custom" } }"#)))
            .await
            .unwrap();
        monitor.info("hello-before");

        for empty in ["{}", r#"{ "Monitoring": { "GrandOutput": {} } }"#] {
            output.apply_configuration(snapshot(empty)).await.unwrap();
            assert_eq!(output.sink_names(), vec!["TextFile"]);
        }
        monitor.info("hello-after");
        output.dispose().await;

        assert_eq!(text_hellos(&root.path().join("custom")), vec!["hello-before"]);
        assert_eq!(
            text_hellos(&root.path().join(DEFAULT_TEXT_PATH)),
            vec!["hello-after"]
        );
    }

    #[tokio::test]
    async fn test_same_name_text_to_binary() {
        let root = tempfile::tempdir().unwrap();
        let output = GrandOutput::new(root.path());
        let monitor = output.create_monitor();

        output
            .apply_configuration(snapshot(&handlers(
                r#"{ "Handler1": { "ConfigurationType": "TextFile", "Path": "h1" } }"#,
            )))
            .await
            .unwrap();
        monitor.info("hello-text");

        let report = output
            .apply_configuration(snapshot(&handlers(
                r#"{ "Handler1": { "ConfigurationType": "BinaryFile", "Path": "h1" } }"#,
            )))
            .await
            .unwrap();
        assert_eq!(report.applied, vec!["Handler1"]);
        monitor.info("hello-binary");
        output.dispose().await;

        let dir = root.path().join("h1");
        assert_eq!(text_hellos(&dir), vec!["hello-text"]);
        assert_eq!(binary_hellos(&dir), vec!["hello-binary"]);
        let binary = binary_lines(&dir);
        assert!(binary.iter().any(|l| l.level == LogLevel::Info
            && l.text
                == r#"Applying: TextFile {"Path":"h1"} => BinaryFile {"Path":"h1"}."#));
    }

    #[tokio::test]
    async fn test_unknown_kind_falls_back_to_the_name() {
        let root = tempfile::tempdir().unwrap();
        let output = GrandOutput::new(root.path());

        let report = output
            .apply_configuration(snapshot(&handlers(
                r#"{ "TextFile": { "ConfigurationType": "Nope", "Path": "fallback" } }"#,
            )))
            .await
            .unwrap();
        assert!(report.is_clean());
        output.external_log(LogLevel::Warn, "hello-fallback", None);
        output.dispose().await;

        assert_eq!(
            text_hellos(&root.path().join("fallback")),
            vec!["hello-fallback"]
        );
    }

    #[tokio::test]
    async fn test_malformed_entry_is_dropped_others_apply() {
        let root = tempfile::tempdir().unwrap();
        let output = GrandOutput::new(root.path());

        output
            .apply_configuration(snapshot(&handlers(
                r#"{ "Broken": "not an object", "BinaryFile": { "Path": "kept" } }"#,
            )))
            .await
            .unwrap();
        assert_eq!(output.sink_names(), vec!["BinaryFile"]);
        output.dispose().await;
    }
}

#[cfg(test)]
mod guard_tests {
    use anyhow::anyhow;
    use contracts::{LogLevel, OutputConfig, SinkEntry};
    use dispatcher::{GrandOutput, MemoryStore, MEMORY_KIND};
    use http::{Request, Response, StatusCode};
    use request_guard::{
        GuardError, RequestMonitorLayer, REQUEST_ERROR_REASON, SYNCHRONOUS_ERROR_TEXT,
    };
    use tower::{service_fn, Layer, ServiceExt};

    async fn memory_output(root: &std::path::Path) -> (GrandOutput, MemoryStore) {
        let store = MemoryStore::new();
        let output = GrandOutput::builder()
            .root_log_path(root)
            .register(MEMORY_KIND, store.factory())
            .build();
        output
            .apply_configuration(
                OutputConfig::new().with_entry(SinkEntry::new("mem").with_kind(MEMORY_KIND)),
            )
            .await
            .unwrap();
        (output, store)
    }

    /// Synchronous (panic before any future exists) and asynchronous throws,
    /// both swallow policies: one Fatal line per request, always a 500.
    #[tokio::test]
    async fn test_faults_logged_once_under_both_policies() {
        const REQUESTS: usize = 3;

        for swallow in [true, false] {
            for asynchronous in [false, true] {
                let root = tempfile::tempdir().unwrap();
                let (output, store) = memory_output(root.path()).await;
                let service = RequestMonitorLayer::new(output.clone())
                    .swallow_errors(swallow)
                    .layer(service_fn(move |_req: Request<String>| {
                        if !asynchronous {
                            panic!("Bug!");
                        }
                        async move {
                            tokio::task::yield_now().await;
                            Err::<Response<String>, _>(anyhow!("Bug!"))
                        }
                    }));

                let mut outer_errors = 0;
                for _ in 0..REQUESTS {
                    match service.clone().oneshot(Request::new(String::new())).await {
                        Ok(response) => {
                            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR)
                        }
                        Err(e) => {
                            assert!(matches!(e, GuardError::Faulted(_)));
                            assert_eq!(e.status_code(), Some(StatusCode::INTERNAL_SERVER_ERROR));
                            outer_errors += 1;
                        }
                    }
                }
                output.dispose().await;

                assert_eq!(outer_errors, if swallow { 0 } else { REQUESTS });
                let lines = store.lines("mem");
                let fatal: Vec<_> = lines
                    .iter()
                    .filter(|l| l.level == LogLevel::Fatal && l.monitor_id.is_some())
                    .collect();
                assert_eq!(fatal.len(), REQUESTS, "swallow={swallow} async={asynchronous}");
                assert!(fatal
                    .iter()
                    .all(|l| l.error.as_ref().unwrap().message.contains("Bug!")));
                let expected_text = if asynchronous { "Bug!" } else { SYNCHRONOUS_ERROR_TEXT };
                assert!(fatal.iter().all(|l| l.text == expected_text));
                let closes = lines.iter().filter(|l| l.text == REQUEST_ERROR_REASON).count();
                assert_eq!(closes, REQUESTS);
            }
        }
    }
}

#[cfg(test)]
mod critical_error_tests {
    use super::support::*;
    use contracts::ErrorInfo;
    use dispatcher::{GrandOutput, CRITICAL_ERROR_TAG};

    #[tokio::test]
    async fn test_critical_errors_enabled_by_configuration() {
        let root = tempfile::tempdir().unwrap();
        let output = GrandOutput::new(root.path());
        assert!(!output.report_critical_error("dropped", ErrorInfo::new("off by default")));

        output
            .apply_configuration(snapshot(
                r#"{ "Monitoring": { "GrandOutput": {
                    "HandleCriticalErrors": true,
                    "Handlers": { "TextFile": { "Path": "crit" } }
                } } }"#,
            ))
            .await
            .unwrap();
        output
            .spawn_background("poller", async {
                Err::<(), _>(anyhow::anyhow!("background boom"))
            })
            .await
            .unwrap();
        output.dispose().await;

        let lines = text_lines(&root.path().join("crit"));
        let tag = format!("[{CRITICAL_ERROR_TAG}]");
        let critical: Vec<_> = lines.iter().filter(|l| l.contains(&tag)).collect();
        assert_eq!(critical.len(), 1);
        assert!(critical[0].contains(" -------- F "));
        assert!(lines.iter().any(|l| l.ends_with("| background boom")));
        assert!(!lines.iter().any(|l| l.contains("off by default")));
    }
}

#[cfg(test)]
mod watcher_tests {
    use super::support::*;
    use std::collections::BTreeSet;

    use config_loader::{ConfigWatcher, DynamicSource, SectionPath};
    use contracts::{LogLine, OutputConfig, SinkEntry};
    use dispatcher::{GrandOutput, MemoryStore, MEMORY_KIND};

    fn memory_doc(name: &str) -> String {
        handlers(&format!(r#"{{ "{name}": {{ "ConfigurationType": "Memory" }} }}"#))
    }

    #[tokio::test]
    async fn test_watcher_feeds_the_output() {
        let root = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let output = GrandOutput::builder()
            .root_log_path(root.path())
            .register(MEMORY_KIND, store.factory())
            .build();

        let source = DynamicSource::json(&memory_doc("m1"));
        let (watcher, rx) = ConfigWatcher::new(SectionPath::default());
        let _source_task = watcher.watch_source(&source);
        let follower = output.follow(rx);
        let monitor = output.create_monitor();

        wait_for_sinks(&output, &["m1"]).await;
        monitor.info("one");

        source.set(memory_doc("m2"));
        wait_for_sinks(&output, &["m2"]).await;
        monitor.info("two");

        source.delete();
        wait_for_sinks(&output, &["TextFile"]).await;
        monitor.info("hello-default");

        output.dispose().await;
        source.set(memory_doc("m3"));
        tokio::time::timeout(std::time::Duration::from_secs(5), follower)
            .await
            .unwrap()
            .unwrap();

        let texts = |name| {
            store
                .lines(name)
                .into_iter()
                .filter(|l| l.monitor_id.is_some())
                .map(|l| l.text)
                .collect::<Vec<_>>()
        };
        assert_eq!(texts("m1"), vec!["one"]);
        assert_eq!(texts("m2"), vec!["two"]);
        assert!(texts("m3").is_empty());
        assert_eq!(text_hellos(&root.path().join("Text")), vec!["hello-default"]);
    }

    /// Lines emitted while reconfiguring land in exactly one sink, in order.
    #[tokio::test]
    async fn test_no_loss_nor_duplicate_during_swaps() {
        const LINES: usize = 2000;

        let root = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let output = GrandOutput::builder()
            .root_log_path(root.path())
            .register(MEMORY_KIND, store.factory())
            .build();
        let sink = |i: usize| SinkEntry::new(format!("m{i}")).with_kind(MEMORY_KIND);
        output
            .apply_configuration(OutputConfig::new().with_entry(sink(0)))
            .await
            .unwrap();

        let monitor = output.create_monitor();
        let emitter = {
            let monitor = monitor.clone();
            tokio::spawn(async move {
                for i in 0..LINES {
                    monitor.info(format!("{i}"));
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };
        for i in 1..=10 {
            output
                .apply_configuration(OutputConfig::new().with_entry(sink(i)))
                .await
                .unwrap();
            tokio::task::yield_now().await;
        }
        emitter.await.unwrap();
        output.dispose().await;

        let mut seen = BTreeSet::new();
        let mut total = 0;
        for name in store.names() {
            let lines: Vec<LogLine> = store
                .lines(&name)
                .into_iter()
                .filter(|l| l.monitor_id == Some(monitor.id()))
                .collect();
            assert!(lines.windows(2).all(|w| w[0].time < w[1].time), "{name} reordered");
            total += lines.len();
            seen.extend(lines.iter().map(|l| l.text.parse::<usize>().unwrap()));
        }
        assert_eq!(total, LINES);
        assert_eq!(seen.len(), LINES);
    }

    /// Same name, changed options: each replacement retires the old
    /// instance before activating the new one, and no line is lost.
    #[tokio::test]
    async fn test_no_loss_while_replacing_same_name() {
        const LINES: usize = 2000;

        let root = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let output = GrandOutput::builder()
            .root_log_path(root.path())
            .register(MEMORY_KIND, store.factory())
            .build();
        let sink = |generation: usize| {
            SinkEntry::new("m")
                .with_kind(MEMORY_KIND)
                .with_option("Generation", generation)
        };
        output
            .apply_configuration(OutputConfig::new().with_entry(sink(0)))
            .await
            .unwrap();

        let monitor = output.create_monitor();
        let emitter = {
            let monitor = monitor.clone();
            tokio::spawn(async move {
                for i in 0..LINES {
                    monitor.info(format!("{i}"));
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };
        for generation in 1..=10 {
            let report = output
                .apply_configuration(OutputConfig::new().with_entry(sink(generation)))
                .await
                .unwrap();
            assert_eq!(report.applied, vec!["m"]);
            tokio::task::yield_now().await;
        }
        emitter.await.unwrap();
        output.dispose().await;

        let texts: Vec<usize> = store
            .lines("m")
            .into_iter()
            .filter(|l| l.monitor_id == Some(monitor.id()))
            .map(|l| l.text.parse().unwrap())
            .collect();
        assert_eq!(texts, (0..LINES).collect::<Vec<_>>());
    }
}
