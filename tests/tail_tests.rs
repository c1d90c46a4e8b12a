//! Tail 服务集成测试

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reallog::{Error, LogPathSource, TailEvent, TailService, TruncateReason};
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::{sleep, timeout};

const INTERVAL: Duration = Duration::from_millis(50);

/// 创建临时日志文件
fn setup_file(initial: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("app.log");
    fs::write(&path, initial).unwrap();
    (tmp, path)
}

fn append(path: &Path, data: &str) {
    let mut f = fs::OpenOptions::new().append(true).open(path).unwrap();
    f.write_all(data.as_bytes()).unwrap();
}

fn service_for(path: &Path) -> (TailService, UnboundedReceiver<TailEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let service = TailService::new(
        LogPathSource::Fixed(path.to_path_buf()),
        INTERVAL,
        Arc::new(tx),
    );
    (service, rx)
}

async fn next_event(rx: &mut UnboundedReceiver<TailEvent>) -> TailEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for tail event")
        .expect("event channel closed")
}

/// 跳过截断事件，返回下一段内容
async fn next_content(rx: &mut UnboundedReceiver<TailEvent>) -> String {
    loop {
        match next_event(rx).await {
            TailEvent::ContentAppended { content } => return content,
            TailEvent::Truncated(_) => continue,
            TailEvent::TailError { message } => panic!("unexpected error: {}", message),
        }
    }
}

/// 一段时间内没有任何事件
async fn assert_quiet(rx: &mut UnboundedReceiver<TailEvent>) {
    sleep(INTERVAL * 6).await;
    assert!(rx.try_recv().is_err(), "unexpected tail event");
}

// ==================== 生命周期 ====================

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_start_returns_absolute_path() {
        let (_tmp, path) = setup_file("");
        let (service, _rx) = service_for(&path);

        let resolved = service.start().unwrap();

        assert_eq!(resolved, fs::canonicalize(&path).unwrap());
        assert!(service.is_running());
        assert_eq!(service.current_path(), resolved);
        assert_eq!(service.display_name(), "app.log");
    }

    #[tokio::test]
    async fn test_start_missing_file_fails_with_one_error_event() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.log");
        let (service, mut rx) = service_for(&path);

        let result = service.start();

        assert!(matches!(result, Err(Error::FileNotFound(_))));
        assert!(!service.is_running());
        match next_event(&mut rx).await {
            TailEvent::TailError { message } => {
                // 只暴露文件名，不暴露本地目录
                assert_eq!(message, "错误: 日志文件不存在 (missing.log)\n");
                assert!(!message.contains(&tmp.path().display().to_string()));
            }
            other => panic!("expected TailError, got {:?}", other),
        }
        assert_quiet(&mut rx).await;
    }

    #[tokio::test]
    async fn test_stop_silences_triggers() {
        let (_tmp, path) = setup_file("");
        let (service, mut rx) = service_for(&path);
        service.start().unwrap();

        assert!(service.stop());
        assert!(!service.stop());
        assert!(!service.is_running());
        assert_eq!(service.offset(), None);

        append(&path, "after stop\n");
        assert_quiet(&mut rx).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_nothing_written_after_stop_is_delivered() {
        let (_tmp, path) = setup_file("");
        let (service, mut rx) = service_for(&path);

        let writing = Arc::new(AtomicBool::new(true));
        let writer = {
            let path = path.clone();
            let writing = writing.clone();
            std::thread::spawn(move || {
                let mut i = 0u64;
                while writing.load(Ordering::Relaxed) {
                    append(&path, &format!("line {}\n", i));
                    i += 1;
                    std::thread::sleep(Duration::from_micros(200));
                }
            })
        };

        for round in 0..20 {
            service.restart().unwrap();
            for _ in 0..20 {
                service.trigger();
                sleep(Duration::from_millis(1)).await;
            }

            service.stop();
            let content_at_stop = fs::read_to_string(&path).unwrap();

            // 等待 stop 之前已完成的 check 投递事件
            sleep(INTERVAL * 2).await;
            let mut received = String::new();
            while let Ok(event) = rx.try_recv() {
                match event {
                    TailEvent::ContentAppended { content } => received.push_str(&content),
                    other => panic!("unexpected event: {:?}", other),
                }
            }

            assert!(
                content_at_stop.contains(&received),
                "round {} delivered content written after stop",
                round
            );
        }

        writing.store(false, Ordering::Relaxed);
        writer.join().unwrap();
    }

    #[tokio::test]
    async fn test_restart_starts_from_current_size() {
        let (_tmp, path) = setup_file("");
        let (service, mut rx) = service_for(&path);
        service.start().unwrap();

        append(&path, "a\n");
        assert_eq!(next_content(&mut rx).await, "a\n");

        service.stop();
        append(&path, "b\n");

        service.restart().unwrap();
        assert_eq!(service.offset(), Some(4));
        // 重启前写入的内容不回放
        assert_quiet(&mut rx).await;

        append(&path, "c\n");
        assert_eq!(next_content(&mut rx).await, "c\n");
    }

    #[tokio::test]
    async fn test_restart_re_resolves_configured_path() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first.log");
        let second = tmp.path().join("second.log");
        fs::write(&first, "").unwrap();
        fs::write(&second, "").unwrap();

        let var = "REALLOG_TAIL_TEST_RESTART_PATH";
        std::env::set_var(var, &first);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = TailService::new(
            LogPathSource::Env {
                var: var.to_string(),
                default: PathBuf::from("unused.log"),
            },
            INTERVAL,
            Arc::new(tx),
        );

        service.start().unwrap();
        assert_eq!(service.display_name(), "first.log");

        std::env::set_var(var, &second);
        let resolved = service.restart().unwrap();
        std::env::remove_var(var);

        assert_eq!(resolved, fs::canonicalize(&second).unwrap());
        assert_eq!(service.display_name(), "second.log");

        append(&first, "old file\n");
        append(&second, "new file\n");
        assert_eq!(next_content(&mut rx).await, "new file\n");
    }
}

// ==================== 增量读取 ====================

mod delivery_tests {
    use super::*;

    #[tokio::test]
    async fn test_append_is_delivered_once() {
        let (_tmp, path) = setup_file("");
        let (service, mut rx) = service_for(&path);
        service.start().unwrap();

        append(&path, "hello\n");

        assert_eq!(next_content(&mut rx).await, "hello\n");
        assert_quiet(&mut rx).await;
        assert_eq!(service.offset(), Some(6));
    }

    #[tokio::test]
    async fn test_existing_content_is_not_replayed() {
        let (_tmp, path) = setup_file("line before start\n");
        let (service, mut rx) = service_for(&path);
        service.start().unwrap();

        assert_quiet(&mut rx).await;
        assert_eq!(service.offset(), Some(18));

        append(&path, "new\n");
        assert_eq!(next_content(&mut rx).await, "new\n");
    }

    #[tokio::test]
    async fn test_truncation_resets_and_rereads() {
        let (_tmp, path) = setup_file("");
        let (service, mut rx) = service_for(&path);
        service.start().unwrap();

        append(&path, "hello\nworld\n");
        assert_eq!(next_content(&mut rx).await, "hello\nworld\n");

        fs::write(&path, "abc\n").unwrap();

        match next_event(&mut rx).await {
            TailEvent::Truncated(t) => {
                assert_eq!(t.previous_offset, 12);
                assert_eq!(t.reason, TruncateReason::Shrunk);
            }
            other => panic!("expected Truncated, got {:?}", other),
        }
        assert_eq!(next_content(&mut rx).await, "abc\n");
        assert_eq!(service.offset(), Some(4));
    }

    #[tokio::test]
    async fn test_coalesced_triggers_never_overlap() {
        let (_tmp, path) = setup_file("");
        let (service, mut rx) = service_for(&path);
        service.start().unwrap();

        let mut expected = String::new();
        for i in 0..200 {
            let line = format!("line {}\n", i);
            append(&path, &line);
            expected.push_str(&line);
            // 额外的触发与定时器 / 文件监听竞争
            service.trigger();
            service.trigger();
        }

        let mut received = String::new();
        while received.len() < expected.len() {
            received.push_str(&next_content(&mut rx).await);
        }

        assert_eq!(received, expected);
        assert_quiet(&mut rx).await;
        assert_eq!(service.offset(), Some(expected.len() as u64));
    }

    #[tokio::test]
    async fn test_removed_file_reports_error_and_keeps_offset() {
        let (_tmp, path) = setup_file("");
        let (service, mut rx) = service_for(&path);
        service.start().unwrap();

        append(&path, "hello\n");
        assert_eq!(next_content(&mut rx).await, "hello\n");

        fs::remove_file(&path).unwrap();

        match next_event(&mut rx).await {
            TailEvent::TailError { message } => {
                assert!(message.starts_with("错误: 读取日志文件失败"));
            }
            other => panic!("expected TailError, got {:?}", other),
        }
        assert_eq!(service.offset(), Some(6));
        assert!(service.is_running());
    }
}
