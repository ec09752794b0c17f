mod bridge;
mod lifecycle_tests;
mod supervisor;
