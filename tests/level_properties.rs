//! Property tests for level resolution and threshold admission.

mod common;

use clientlog::core::host::SendMode;
use clientlog::LogLevel;
use proptest::prelude::*;

fn any_level() -> impl Strategy<Value = LogLevel> {
    (0u8..=5).prop_map(LogLevel::from_index)
}

proptest! {
    #[test]
    fn off_threshold_admits_nothing(level in any_level()) {
        prop_assert!(!LogLevel::Off.admits(level));
    }

    #[test]
    fn admission_follows_ordering(threshold in 1u8..=5, level in 1u8..=5) {
        let threshold = LogLevel::from_index(threshold);
        let level = LogLevel::from_index(level);
        prop_assert_eq!(threshold.admits(level), level <= threshold);
    }

    #[test]
    fn numeric_levels_clamp_into_range(value in -1000.0f64..1000.0) {
        let level = LogLevel::from_number(value);
        if value < 1.0 {
            prop_assert_eq!(level, LogLevel::Off);
        } else if value >= 5.0 {
            prop_assert_eq!(level, LogLevel::Trace);
        } else {
            prop_assert_eq!(level.as_number(), value.floor() as u8);
        }
    }

    #[test]
    fn names_parse_back(level in any_level()) {
        prop_assert_eq!(LogLevel::parse(level.name()), level);
        prop_assert_eq!(LogLevel::parse(&level.name().to_uppercase()), level);
    }

    #[test]
    fn unknown_names_resolve_to_error(name in "[g-z]{6,12}") {
        prop_assert_eq!(LogLevel::parse(&name), LogLevel::Error);
    }

    #[test]
    fn logger_sends_exactly_admitted_levels(threshold in any_level(), level in 1u8..=5) {
        let level = LogLevel::from_index(level);
        let page = common::Page::new();
        let logger = page.init(&format!(
            r#"{{"url":"/log","collectionType":"unload","logLevel":"{}"}}"#,
            threshold.name()
        ));

        logger.log(level, "sample");
        logger.flush(SendMode::Sync);

        prop_assert_eq!(page.sent().len(), usize::from(threshold.admits(level)));
    }
}

#[test]
fn off_threshold_sends_nothing_from_any_path() {
    let page = common::Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"single","logLevel":"off"}"#);

    logger.error("e");
    logger.trace("t");
    page.raise("uncaught", "a.js", 1);

    assert!(page.sent().is_empty());
    assert_eq!(logger.uncaught_error_count(), 1);
}
