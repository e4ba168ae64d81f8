use crate::domain::ports::SimulationLibrary;

/// Stands in for libsumo when the bindings are not linked into this build.
/// Every call fails, so library-backed instances never start.
#[derive(Debug, Clone, Default)]
pub struct UnavailableLibrary;

const UNAVAILABLE: &str = "libsumo bindings are not available in this build";

impl SimulationLibrary for UnavailableLibrary {
    fn start(&self, _args: &[String]) -> Result<(), String> {
        Err(UNAVAILABLE.to_string())
    }

    fn simulation_step(&self) -> Result<(), String> {
        Err(UNAVAILABLE.to_string())
    }

    fn close(&self) -> Result<(), String> {
        Err(UNAVAILABLE.to_string())
    }
}
