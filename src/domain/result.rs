//! Result type alias for eob-curator
//!
//! This module provides a convenient Result type alias that uses [`EtlError`]
//! as the error type.

use super::errors::EtlError;

/// Result type alias for pipeline operations
///
/// # Examples
///
/// ```
/// use eob_curator::domain::result::Result;
/// use eob_curator::domain::errors::EtlError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(EtlError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{DecodeError, EtlError};

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(EtlError::Validation("test error".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_result_with_question_mark() {
        fn inner() -> std::result::Result<i32, DecodeError> {
            Err(DecodeError::NotAnObject("a string"))
        }

        fn outer() -> Result<i32> {
            Ok(inner()?)
        }

        assert!(matches!(outer(), Err(EtlError::Decode(_))));
    }
}
