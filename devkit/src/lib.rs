/*!
# Kitchen DevKit - stubs and helpers for working on the kernel

Lets the kernel run end to end without a panel, a calendar export or the
network:
- render surface stub with scripted failures
- calendar source stub and event builder
- loopback forecast server
- `TestHarness` driving ticks over a manual clock
*/

pub mod calendar_stub;
pub mod forecast_stub;
pub mod surface_stub;
pub mod test_utils;

pub use calendar_stub::{EventBuilder, StubCalendar};
pub use forecast_stub::{forecast_json, ForecastStub};
pub use surface_stub::StubSurface;
pub use test_utils::TestHarness;
