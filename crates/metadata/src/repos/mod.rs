//! Repository traits for change store operations.

pub mod changes;
pub mod sandboxes;

pub use changes::ChangeRepo;
pub use sandboxes::SandboxRepo;
