pub mod create;
pub mod delete;
pub mod force_merge;
pub mod index;
pub mod list;
pub mod lock_status;
pub mod search;
