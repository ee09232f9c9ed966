pub mod category_handler;

pub use category_handler::{
    __path_create_category, __path_delete_category, __path_get_category,
    __path_get_category_by_slug, __path_list_categories, __path_move_category,
    __path_preview_drop, __path_update_category, create_category, delete_category, get_category,
    get_category_by_slug, list_categories, move_category, preview_drop, update_category,
};
