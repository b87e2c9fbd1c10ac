pub mod action;
pub mod file_record;
pub mod folder_record;
pub mod item;

pub use action::{ActionKind, ActionRecord};
pub use file_record::{finite_or_zero, FileRecord};
pub use folder_record::FolderRecord;
pub use item::{ItemOutcome, ListItem, MutationStatus, SortKey, SortOrder};
