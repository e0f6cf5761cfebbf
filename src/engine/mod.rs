pub mod grouper;
pub mod stream;
pub mod transaction;
