
mod assert_test;
mod engine_test;
mod send_test;
mod status_test;
mod verify_test;
