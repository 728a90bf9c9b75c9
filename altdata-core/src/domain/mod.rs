//! Domain types shared by every dataset pipeline.

pub mod observation;
pub mod table;

pub use observation::{DailyBar, Observation, PanelKey, RawPoint};
pub use table::{KeyCollision, Row, WideTable};
