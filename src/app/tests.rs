use super::{set_log_session, set_logging_for_tests};
use super::{init_logging, log_debug, log_debug_content, log_file_path, log_timing};
use crate::config::AppConfig;
use clap::Parser;
use std::env;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

static LOG_TEST_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn with_log_lock(action: impl FnOnce()) {
    let _guard = LOG_TEST_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .expect("log test lock");
    action();
    set_logging_for_tests(false, false);
}

fn clear_log_env() {
    env::remove_var("VOXLIVE_LOGS");
    env::remove_var("VOXLIVE_NO_LOGS");
    env::remove_var("VOXLIVE_LOG_CONTENT");
}

fn read_log() -> String {
    std::fs::read_to_string(log_file_path()).unwrap_or_default()
}

#[test]
fn logging_disabled_by_default() {
    with_log_lock(|| {
        clear_log_env();
        let config = AppConfig::parse_from(["voxlive-tests"]);
        init_logging(&config);
        let _ = std::fs::remove_file(log_file_path());
        log_debug("should-not-write");
        assert!(!read_log().contains("should-not-write"));
    });
}

#[test]
fn logging_enabled_writes_log() {
    with_log_lock(|| {
        clear_log_env();
        let mut config = AppConfig::parse_from(["voxlive-tests"]);
        config.logs = true;
        init_logging(&config);
        log_debug("log-enabled");
        assert!(read_log().contains("log-enabled"));
    });
}

#[test]
fn no_logs_overrides_logs() {
    with_log_lock(|| {
        clear_log_env();
        let mut config = AppConfig::parse_from(["voxlive-tests"]);
        config.logs = true;
        config.no_logs = true;
        init_logging(&config);
        log_debug("suppressed-by-no-logs");
        assert!(!read_log().contains("suppressed-by-no-logs"));
    });
}

#[test]
fn log_content_requires_flag() {
    with_log_lock(|| {
        clear_log_env();
        let mut config = AppConfig::parse_from(["voxlive-tests"]);
        config.logs = true;
        init_logging(&config);
        log_debug_content("device-name-secret");
        assert!(
            !read_log().contains("device-name-secret"),
            "content should not be logged without --log-content"
        );

        set_logging_for_tests(true, true);
        log_debug_content("device-name-allowed");
        assert!(read_log().contains("device-name-allowed"));
    });
}

#[test]
fn timings_only_with_flag() {
    with_log_lock(|| {
        clear_log_env();
        let mut config = AppConfig::parse_from(["voxlive-tests"]);
        config.logs = true;
        init_logging(&config);
        log_timing("quiet_step", Duration::from_millis(3));
        assert!(!read_log().contains("quiet_step"));

        config.log_timings = true;
        init_logging(&config);
        log_timing("timed_step", Duration::from_millis(3));
        assert!(read_log().contains("timing timed_step"));
    });
}

#[test]
fn lines_carry_the_live_session_tag() {
    with_log_lock(|| {
        clear_log_env();
        set_logging_for_tests(true, false);
        set_log_session("s-tagged", crate::session::SessionState::Active);
        log_debug("inside-session");
        set_log_session("s-tagged", crate::session::SessionState::Closed);
        log_debug("after-session");

        let log = read_log();
        let inside = log
            .lines()
            .find(|line| line.contains("inside-session"))
            .expect("tagged line");
        assert!(inside.contains("[s-tagged active] inside-session"), "{inside}");
        let after = log
            .lines()
            .find(|line| line.contains("after-session"))
            .expect("untagged line");
        assert!(after.contains("[-] after-session"), "{after}");
    });
}
