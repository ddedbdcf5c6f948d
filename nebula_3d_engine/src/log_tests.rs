/// Tests for log entry construction and severity ordering
///
/// Logger-replacement behavior is covered by the logging integration tests,
/// which serialize access to the process-wide logger.

use super::*;

#[test]
fn test_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_entry_without_location() {
    let entry = LogEntry {
        severity: LogSeverity::Info,
        timestamp: SystemTime::now(),
        source: "nebula3d::test".to_string(),
        message: "hello".to_string(),
        file: None,
        line: None,
    };
    assert!(entry.file.is_none());
    assert!(entry.line.is_none());
}

#[test]
fn test_default_logger_accepts_detailed_entry() {
    // Smoke test: DefaultLogger must not panic on either entry shape.
    let logger = DefaultLogger;
    logger.log(&LogEntry {
        severity: LogSeverity::Error,
        timestamp: SystemTime::now(),
        source: "nebula3d::test".to_string(),
        message: "with location".to_string(),
        file: Some(file!()),
        line: Some(line!()),
    });
    logger.log(&LogEntry {
        severity: LogSeverity::Trace,
        timestamp: SystemTime::now(),
        source: "nebula3d::test".to_string(),
        message: "without location".to_string(),
        file: None,
        line: None,
    });
}
