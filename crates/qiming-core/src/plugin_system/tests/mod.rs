pub mod descriptor_tests;
pub mod manifest_tests;
