pub mod enums;
pub(crate) mod lenient;
pub mod interaction;
pub mod medical_info;
pub mod medicine;
pub mod ocr;
pub mod prescription;
pub mod profile;
pub mod search;

pub use interaction::*;
pub use medical_info::*;
pub use medicine::*;
pub use ocr::*;
pub use prescription::*;
pub use profile::*;
pub use search::*;
