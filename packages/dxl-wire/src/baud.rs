use thiserror::Error;

/// Returned when a baud index does not name a supported rate.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("no valid baud index given: {index}")]
pub struct BaudIndexError {
    pub index: u8,
}

/// Converts the value of a device's baud rate register into bits per second.
///
/// # Errors
///
/// Returns a [`BaudIndexError`] for indices above 252.
pub const fn baud_index_to_baudrate(index: u8) -> Result<u32, BaudIndexError> {
    match index {
        0..250 => Ok(2_000_000 / (index as u32 + 1)),
        250 => Ok(2_250_000),
        251 => Ok(2_500_000),
        252 => Ok(3_000_000),
        _ => Err(BaudIndexError { index }),
    }
}

#[cfg(test)]
mod tests {
    use super::{BaudIndexError, baud_index_to_baudrate};

    #[test]
    fn table() {
        assert_eq!(baud_index_to_baudrate(0), Ok(2_000_000));
        assert_eq!(baud_index_to_baudrate(1), Ok(1_000_000));
        assert_eq!(baud_index_to_baudrate(34), Ok(57_142));
        assert_eq!(baud_index_to_baudrate(249), Ok(8_000));
        assert_eq!(baud_index_to_baudrate(250), Ok(2_250_000));
        assert_eq!(baud_index_to_baudrate(251), Ok(2_500_000));
        assert_eq!(baud_index_to_baudrate(252), Ok(3_000_000));
        assert_eq!(
            baud_index_to_baudrate(253),
            Err(BaudIndexError { index: 253 })
        );
        assert!(baud_index_to_baudrate(255).is_err());
    }
}
