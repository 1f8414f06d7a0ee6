// Logging initialization is process-global, so everything lives in one test
// function to keep ordering deterministic.

use oersted::config::LoggingConfig;
use oersted::logging::{get_logger_with_context, init_logging, LogContext};

#[test]
fn init_is_idempotent_and_context_loggers_work() {
    // Keep the integration binary from writing rolling log files
    unsafe { std::env::set_var("OERSTED_DISABLE_FILE_LOG", "1") };

    let config = LoggingConfig::default();
    assert!(init_logging(&config).is_ok());
    // Second call is a no-op, not an error
    assert!(init_logging(&config).is_ok());

    let logger = get_logger_with_context(
        LogContext::new("client")
            .with_mpid("571313180000000000".to_string())
            .with_field("price_code", "DK_NORDPOOL_SPOT_DK2".to_string()),
    );
    logger.info("price refresh complete");
    logger.debug("cache state updated");
}
