mod property_tail;
pub(crate) mod utils;
