pub mod task;

pub use task::{parse_due_date, parse_due_input, parse_due_time, NewTask, Priority, Task, TaskId, TaskPatch};
