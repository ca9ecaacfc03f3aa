pub mod classify_tests;
pub mod policy_tests;
