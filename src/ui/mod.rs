pub mod icons;
pub mod output;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, error, header, info, success, warn};
pub use theme::{Theme, theme};
