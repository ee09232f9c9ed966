mod category;

pub use category::{
    Category, CategoryStatus, CategoryUpdate, KeyAssignment, NewCategory, OrderingPatch,
};
