mod fixture;

mod registry_tests;
mod restore_tests;
mod service_tests;
mod txlog_tests;
