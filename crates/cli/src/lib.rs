//! Organizer, journal and rollback for the devsort CLI.
pub mod apply;
pub mod fs_apply;
pub mod journal;
pub mod paths;
pub mod undo;
