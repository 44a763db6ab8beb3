//! Rotary position sensor capability

use crate::error::SensorError;

/// Source of raw dial positions
///
/// Positions share the domain of the channel table's position column.
pub trait PositionSensor: Send {
    /// Read the current dial position
    fn read_position(&mut self) -> Result<i32, SensorError>;
}

impl<T: PositionSensor + ?Sized> PositionSensor for Box<T> {
    fn read_position(&mut self) -> Result<i32, SensorError> {
        (**self).read_position()
    }
}
