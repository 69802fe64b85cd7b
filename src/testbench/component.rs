use super::signals::SignalBus;
use crate::error::HarnessError;

/// a clocked task: stepped once per rising edge, samples the latched
/// snapshot and drives the next values.
pub trait ClockedComponent {
    fn edge(&mut self, bus: &mut SignalBus) -> Result<(), HarnessError>;
}
