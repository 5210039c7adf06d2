use log::{Level, LevelFilter, Log, Metadata, Record};
use ptrkit::{SharedHandle, make_shared};
use std::sync::Mutex;

// Collects lifecycle records, the test binary contains a single test so the records don't mix
struct RecordingLogger {
    records: Mutex<Vec<String>>,
}

impl RecordingLogger {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.records.lock().unwrap())
    }
}

impl Log for RecordingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target() == "ptrkit::lifecycle" && metadata.level() == Level::Trace
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.records.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: RecordingLogger = RecordingLogger {
    records: Mutex::new(Vec::new()),
};

fn assert_records(records: &[String], expected: &[&str]) {
    assert_eq!(records.len(), expected.len(), "unexpected records: {records:#?}");
    for (record, expected) in records.iter().zip(expected) {
        assert!(
            record.ends_with(expected),
            "expected '{record}' to end with '{expected}'"
        );
    }
}

#[test]
fn control_block_lifecycle_is_logged() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let handle = make_shared(1);
    let weak = SharedHandle::downgrade(&handle);
    let records = LOGGER.take();
    assert_eq!(records.len(), 1);
    assert!(records[0].contains("allocated value at"));

    drop(handle);
    assert_records(
        &LOGGER.take(),
        &[
            "Live -> Releasing",
            "dropping Inline value",
            "Releasing -> StrongReleased",
        ],
    );

    drop(weak);
    assert_records(&LOGGER.take(), &["freeing Inline block"]);

    let adopted = SharedHandle::from_box(Box::new(2));
    drop(adopted);
    let records = LOGGER.take();
    assert!(records[0].contains("adopted value at"));
    assert_records(
        &records[1..],
        &[
            "Live -> Releasing",
            "dropping Pointer value",
            "Releasing -> StrongReleased",
            "freeing Pointer block",
        ],
    );
}
