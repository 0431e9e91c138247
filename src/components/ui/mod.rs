pub mod alert;
pub mod avatar;
pub mod button;
pub mod card;
pub mod input;
pub mod label;
pub mod spinner;

pub use alert::*;
pub use avatar::*;
pub use button::*;
pub use card::*;
pub use input::*;
pub use label::*;
pub use spinner::*;
