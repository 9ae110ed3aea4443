pub mod level_tests;
pub mod manager_tests;
