pub mod db;
pub mod task_llm;
