/// Sends log output from the crate under test to the test harness
///
/// The log level is configured with the `RUST_LOG` environment variable, e.g.
/// `RUST_LOG=ptrkit::lifecycle=trace`. It's safe to call this from multiple tests.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
    log::debug!("test logging initialized");
}
