pub mod task;
pub mod user;

pub use task::{Task, TaskCreate, TaskStatus, TaskUpdate};
pub use user::{User, UserOut};
