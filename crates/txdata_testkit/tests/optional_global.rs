//! The process-wide optional switch. Kept in its own test binary so that no
//! other test observes it.

use std::thread;
use txdata_core::{is_optional, set_global_optional, Value};
use txdata_testkit::Team;

#[test]
fn global_switch_reaches_every_thread() {
    assert!(!is_optional());
    set_global_optional(true);

    let team = Team::new(1);
    let remote = team.clone();
    thread::spawn(move || remote.title().set("from another thread").unwrap())
        .join()
        .unwrap();
    assert_eq!(team.title().get(), Value::from("from another thread"));

    set_global_optional(false);
    assert!(!thread::spawn(is_optional).join().unwrap());
}
