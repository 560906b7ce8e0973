mod call_record;
mod patient;

pub use call_record::*;
pub use patient::*;
