//! Type-Safe Wrappers Module
//!
//! - `file_size`: 文件大小类型安全包装

pub mod file_size;

pub use file_size::FileSize;

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    // ========================================================================
    // FileSize display always carries a unit and never loses the magnitude
    // class of the value.
    // ========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn file_size_display_unit_property(bytes in 0u64..(4 * FileSize::GB)) {
            let display = FileSize::new(bytes).display();
            let expected_unit = if bytes >= FileSize::GB {
                " GB"
            } else if bytes >= FileSize::MB {
                " MB"
            } else if bytes >= FileSize::KB {
                " KB"
            } else {
                " B"
            };
            prop_assert!(display.ends_with(expected_unit),
                "{} bytes displayed as '{}', expected unit '{}'", bytes, display, expected_unit);
        }

        #[test]
        fn file_size_as_mb_property(bytes in 0u64..u64::MAX / 2) {
            let mb = FileSize::new(bytes).as_mb();
            prop_assert!(mb >= 0.0);
            prop_assert!((mb * FileSize::MB as f64 - bytes as f64).abs() <= bytes as f64 * 1e-9 + 1.0);
        }
    }
}
