//! Result type alias for Caduceus
//!
//! This module provides a convenient Result type alias that uses
//! [`CaduceusError`] as the error type.

use super::errors::CaduceusError;

/// Result type alias for Caduceus operations
///
/// # Examples
///
/// ```
/// use caduceus::domain::result::Result;
/// use caduceus::domain::errors::CaduceusError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(CaduceusError::InvalidInput("quantity must be positive".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, CaduceusError>;
