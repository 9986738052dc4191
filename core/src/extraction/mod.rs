pub mod resolver;
pub mod tags;
pub mod values;

pub use resolver::TagResolver;
pub use tags::*;
pub use values::{format_person_name, normalize_date, normalize_time, parse_date, parse_first};
