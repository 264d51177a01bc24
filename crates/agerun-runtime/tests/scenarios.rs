//! End-to-end scenarios exercising the interpreter, scheduler and
//! persistence layer together, one per documented runtime behavior.

use agerun_core::Value;
use agerun_runtime::{Agency, Methodology};
use std::fs;
use tempfile::tempdir;

#[test]
fn echo_method_processes_wake_then_reply() {
    let mut agency = Agency::new();
    let mut methodology = Methodology::new();
    methodology.register_method("echo", "send(0, message)", "1.0.0", &mut agency).unwrap();
    let agent = agency.create_agent(&methodology, "echo", "1.0.0", None).unwrap();

    agency.send(agent, Value::string("hi"));
    let processed = agency.process_all_messages(&mut methodology);

    assert!(processed >= 2);
    assert!(agency.agent(agent).is_some());
}

#[test]
fn integer_path_assignment_through_a_running_method() {
    let mut agency = Agency::new();
    let mut methodology = Methodology::new();
    methodology
        .register_method("calc", "memory.x := 2 + 3 * 4", "1.0.0", &mut agency)
        .unwrap();
    let agent = agency.create_agent(&methodology, "calc", "1.0.0", None).unwrap();

    agency.process_all_messages(&mut methodology);

    assert_eq!(agency.agent(agent).unwrap().memory().get_path("x"), Some(&Value::int(14)));
}

#[test]
fn string_concat_and_assign_reads_the_dispatched_message() {
    let mut agency = Agency::new();
    let mut methodology = Methodology::new();
    methodology
        .register_method("greeter", r#"memory.greeting := "Hello, " + message.name"#, "1.0.0", &mut agency)
        .unwrap();
    let agent = agency.create_agent(&methodology, "greeter", "1.0.0", None).unwrap();
    agency.process_next_message(&mut methodology); // drain __wake__

    let mut msg = Value::empty_map();
    msg.map_set("name", Value::string("Alice")).unwrap();
    agency.send(agent, msg);
    agency.process_all_messages(&mut methodology);

    assert_eq!(
        agency.agent(agent).unwrap().memory().get_path("greeting"),
        Some(&Value::string("Hello, Alice"))
    );
}

#[test]
fn if_expression_picks_the_true_or_false_branch_by_truthiness() {
    let mut agency = Agency::new();
    let mut methodology = Methodology::new();
    methodology
        .register_method(
            "branch",
            "memory.r := if(0, \"yes\", \"no\")\nmemory.s := if(\"x\", 1, 0)",
            "1.0.0",
            &mut agency,
        )
        .unwrap();
    let agent = agency.create_agent(&methodology, "branch", "1.0.0", None).unwrap();
    agency.process_all_messages(&mut methodology);

    let memory = agency.agent(agent).unwrap().memory();
    assert_eq!(memory.get_path("r"), Some(&Value::string("no")));
    assert_eq!(memory.get_path("s"), Some(&Value::int(1)));
}

#[test]
fn method_upgrade_migrates_agents_only_within_the_same_major() {
    let mut agency = Agency::new();
    let mut methodology = Methodology::new();
    methodology.register_method("echo", "send(0, message)", "1.0.0", &mut agency).unwrap();
    let agent = agency.create_agent(&methodology, "echo", "1.0.0", None).unwrap();
    agency.process_next_message(&mut methodology); // drain __wake__
    assert!(!agency.agent(agent).unwrap().has_messages());

    methodology.register_method("echo", "send(0, message)", "1.1.0", &mut agency).unwrap();
    assert_eq!(agency.agent(agent).unwrap().method().version.to_string(), "1.1.0");

    let mut a = agency.agent_mut(agent).unwrap();
    assert_eq!(a.get_message(), Some(Value::string("__sleep__")));
    assert_eq!(a.get_message(), Some(Value::string("__wake__")));
    drop(a);

    methodology.register_method("echo", "send(0, message)", "2.0.0", &mut agency).unwrap();
    a = agency.agent_mut(agent).unwrap();
    assert_eq!(a.method().version.to_string(), "1.1.0");
}

#[test]
fn corrupted_methodology_file_is_backed_up_and_replaced_with_empty_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(agerun_runtime::persistence::METHODOLOGY_FILE_NAME);
    fs::write(&path, "garbage\n").unwrap();

    let methodology = agerun_runtime::persistence::load_methodology(&path).unwrap();

    assert_eq!(methodology.all_methods().count(), 0);
    assert!(!path.exists());
    assert!(dir.path().join(format!("{}.bak", agerun_runtime::persistence::METHODOLOGY_FILE_NAME)).exists());
}
