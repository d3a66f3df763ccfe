pub(crate) mod async_task;

pub use async_task::spawn_task;

#[cfg(test)]
mod async_task_test;
