pub mod confidence;
pub mod imaging;
pub mod timing;

pub use confidence::aggregate;
pub use imaging::{classify_signal, how_much_worse, resolve, what_is_worse, ImagingThresholds};
pub use timing::{days_between, radiation_timing};
