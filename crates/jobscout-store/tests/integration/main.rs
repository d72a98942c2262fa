mod common;
mod queue_tests;
mod store_tests;
