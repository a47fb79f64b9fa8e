mod call;
mod result_set;
mod row;

pub use call::CallOutcome;
pub use result_set::ResultSet;
pub use row::Row;
