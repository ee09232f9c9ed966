mod category_store;
mod pg_store;

pub use category_store::{CategoryStore, PersistError};
pub use pg_store::PgCategoryStore;
