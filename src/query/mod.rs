pub mod builder;

pub use builder::{Paginated, ProductQuery};
