//! Reconciliation engine tests against the in-memory mock driver.
//!
//! State codes follow the driver's mapping table: 1 = running, 3 = paused,
//! 5 = shut off.

use serde_json::json;
use virtstate_core::{
    ChangeReason, Command, CoreError, DesiredState, Reconciler, UndefineFlag, VirtRequest,
};
use virtstate_driver::{DriverError, MockDriver};

fn reconciler(driver: MockDriver) -> Reconciler<MockDriver> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Reconciler::new(driver)
}

// -- desired-state reconciliation --------------------------------------------

#[tokio::test]
async fn running_vm_requested_running_is_a_noop() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 1));

    let outcome = engine
        .run(&VirtRequest::new().name("alpha").state(DesiredState::Running))
        .await
        .unwrap();

    assert!(!outcome.changed);
    assert_eq!(engine.driver().call_count("start"), 0);
    assert_eq!(engine.driver().call_count("resume"), 0);
}

#[tokio::test]
async fn paused_vm_requested_running_is_resumed_once() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 3));

    let outcome = engine
        .run(&VirtRequest::new().name("alpha").state(DesiredState::Running))
        .await
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(engine.driver().call_count("resume"), 1);
    assert_eq!(engine.driver().call_count("start"), 0);
}

#[tokio::test]
async fn shut_off_vm_requested_running_is_started() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 5));

    let outcome = engine
        .run(&VirtRequest::new().name("alpha").state(DesiredState::Running))
        .await
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(engine.driver().call_count("start"), 1);
    assert_eq!(engine.driver().call_count("resume"), 0);
}

#[tokio::test]
async fn requested_shutdown_is_graceful_and_idempotent() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 1));
    let req = VirtRequest::new().name("alpha").state(DesiredState::Shutdown);

    let outcome = engine.run(&req).await.unwrap();
    assert!(outcome.changed);
    assert_eq!(engine.driver().call_count("shutdown"), 1);
    assert_eq!(engine.driver().call_count("destroy"), 0);

    let outcome = engine.run(&req).await.unwrap();
    assert!(!outcome.changed);
    assert_eq!(engine.driver().call_count("shutdown"), 1);
}

#[tokio::test]
async fn requested_destroyed_forces_stop_then_converges() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 3));
    let req = VirtRequest::new()
        .name("alpha")
        .state(DesiredState::Destroyed);

    let outcome = engine.run(&req).await.unwrap();
    assert!(outcome.changed);
    assert_eq!(engine.driver().call_count("destroy"), 1);

    // Second run: already shut off, nothing to force.
    let outcome = engine.run(&req).await.unwrap();
    assert!(!outcome.changed);
    assert_eq!(engine.driver().call_count("destroy"), 1);
}

#[tokio::test]
async fn requested_paused_only_acts_on_a_running_vm() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 1).with_vm("beta", 5));

    let outcome = engine
        .run(&VirtRequest::new().name("alpha").state(DesiredState::Paused))
        .await
        .unwrap();
    assert!(outcome.changed);
    assert_eq!(engine.driver().call_count("suspend"), 1);

    // A shut-off VM is left alone.
    let outcome = engine
        .run(&VirtRequest::new().name("beta").state(DesiredState::Paused))
        .await
        .unwrap();
    assert!(!outcome.changed);
    assert_eq!(engine.driver().call_count("suspend"), 1);
}

#[tokio::test]
async fn state_change_requires_a_name() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 1));

    let err = engine
        .run(&VirtRequest::new().state(DesiredState::Running))
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::MissingIdentity(_)));
    assert!(engine.driver().calls().is_empty());
}

#[tokio::test]
async fn missing_vm_is_fatal_in_state_mode() {
    let engine = reconciler(MockDriver::new());

    let err = engine
        .run(&VirtRequest::new().name("ghost").state(DesiredState::Running))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::Driver(DriverError::VmNotFound(_))
    ));
}

// -- autostart ----------------------------------------------------------------

#[tokio::test]
async fn autostart_toggle_is_idempotent() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 1));

    let outcome = engine
        .run(&VirtRequest::new().name("alpha").autostart(true))
        .await
        .unwrap();
    assert!(outcome.changed);
    assert_eq!(engine.driver().call_count("set_autostart"), 1);

    // Setting it to its current value changes nothing.
    let outcome = engine
        .run(&VirtRequest::new().name("alpha").autostart(true))
        .await
        .unwrap();
    assert!(!outcome.changed);
    assert_eq!(engine.driver().call_count("set_autostart"), 1);
}

#[tokio::test]
async fn autostart_is_converged_even_when_state_is_already_met() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 1));

    let outcome = engine
        .run(
            &VirtRequest::new()
                .name("alpha")
                .state(DesiredState::Running)
                .autostart(true),
        )
        .await
        .unwrap();

    // State was converged already, but the autostart diff still counts.
    assert!(outcome.changed);
    assert_eq!(engine.driver().call_count("set_autostart"), 1);
    assert_eq!(engine.driver().call_count("start"), 0);
}

#[tokio::test]
async fn autostart_requires_a_name_and_an_existing_vm() {
    let engine = reconciler(MockDriver::new());

    let err = engine
        .run(&VirtRequest::new().autostart(true))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::MissingIdentity(_)));

    let err = engine
        .run(&VirtRequest::new().name("ghost").autostart(true))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Driver(DriverError::VmNotFound(_))
    ));
}

// -- define -------------------------------------------------------------------

const ALPHA_XML: &str = "<domain type='test'><name>alpha</name><memory>512</memory></domain>";
const ALPHA_XML_V2: &str = "<domain type='test'><name>alpha</name><memory>1024</memory></domain>";

#[tokio::test]
async fn defining_a_new_vm_reports_created() {
    let engine = reconciler(MockDriver::new());

    let outcome = engine
        .run(&VirtRequest::new().command(Command::Define).xml(ALPHA_XML))
        .await
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.reason, Some(ChangeReason::Created));
    assert_eq!(outcome.detail("created"), Some(&json!("alpha")));
    assert!(engine.driver().vm("alpha").is_some());
}

#[tokio::test]
async fn redefining_identical_xml_is_a_noop() {
    let engine = reconciler(MockDriver::new().with_vm_xml("alpha", 5, ALPHA_XML));

    let outcome = engine
        .run(&VirtRequest::new().command(Command::Define).xml(ALPHA_XML))
        .await
        .unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.reason, None);
}

#[tokio::test]
async fn redefining_different_xml_reports_config_changed() {
    let engine = reconciler(MockDriver::new().with_vm_xml("alpha", 5, ALPHA_XML));

    let outcome = engine
        .run(&VirtRequest::new().command(Command::Define).xml(ALPHA_XML_V2))
        .await
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.reason, Some(ChangeReason::ConfigChanged));
}

#[tokio::test]
async fn define_treats_domain_exists_error_as_benign() {
    // This backend refuses to override; the define call fails with the
    // "already exists" code, the definition stays as it was, and the XML
    // diff reports no change.
    let engine = reconciler(
        MockDriver::new()
            .with_vm_xml("alpha", 5, ALPHA_XML)
            .rejecting_redefine(),
    );

    let outcome = engine
        .run(&VirtRequest::new().command(Command::Define).xml(ALPHA_XML_V2))
        .await
        .unwrap();

    assert!(!outcome.changed);
    assert_eq!(engine.driver().vm("alpha").unwrap().inactive_xml, ALPHA_XML);
}

#[tokio::test]
async fn define_takes_the_name_from_the_xml() {
    let engine = reconciler(MockDriver::new());

    // The name argument is ignored in favor of the embedded one.
    let outcome = engine
        .run(
            &VirtRequest::new()
                .name("not-alpha")
                .command(Command::Define)
                .xml(ALPHA_XML),
        )
        .await
        .unwrap();

    assert_eq!(outcome.detail("created"), Some(&json!("alpha")));
    assert!(engine.driver().vm("not-alpha").is_none());
}

#[tokio::test]
async fn define_without_xml_or_without_embedded_name_fails_early() {
    let engine = reconciler(MockDriver::new());

    let err = engine
        .run(&VirtRequest::new().command(Command::Define))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::MissingXml));

    let err = engine
        .run(
            &VirtRequest::new()
                .command(Command::Define)
                .xml("<domain><memory>1</memory></domain>"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::XmlNameMissing));

    assert!(engine.driver().calls().is_empty());
}

#[tokio::test]
async fn define_with_autostart_reports_the_autostart_change() {
    let engine = reconciler(MockDriver::new());

    let outcome = engine
        .run(
            &VirtRequest::new()
                .command(Command::Define)
                .xml(ALPHA_XML)
                .autostart(true),
        )
        .await
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.reason, Some(ChangeReason::Autostart));
    assert!(engine.driver().vm("alpha").unwrap().autostart);
}

// -- undefine -----------------------------------------------------------------

#[tokio::test]
async fn undefine_passes_the_composed_mask() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 5));

    let outcome = engine
        .run(
            &VirtRequest::new()
                .name("alpha")
                .command(Command::Undefine)
                .flags([UndefineFlag::ManagedSave, UndefineFlag::Nvram]),
        )
        .await
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(engine.driver().calls(), vec!["undefine alpha 5"]);
    assert!(engine.driver().vm("alpha").is_none());
}

#[tokio::test]
async fn undefine_with_force_uses_the_full_mask() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 5));

    engine
        .run(
            &VirtRequest::new()
                .name("alpha")
                .command(Command::Undefine)
                .force(true),
        )
        .await
        .unwrap();

    assert_eq!(engine.driver().calls(), vec!["undefine alpha 23"]);
}

#[tokio::test]
async fn undefine_with_conflicting_flags_never_reaches_the_driver() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 5));

    let err = engine
        .run(
            &VirtRequest::new()
                .name("alpha")
                .command(Command::Undefine)
                .flags([UndefineFlag::Nvram, UndefineFlag::KeepNvram]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::ConflictingFlags));
    assert!(engine.driver().calls().is_empty());
    assert!(engine.driver().vm("alpha").is_some());
}

// -- direct VM commands -------------------------------------------------------

#[tokio::test]
async fn status_command_reports_the_mapped_token() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 3));

    let outcome = engine
        .run(&VirtRequest::new().name("alpha").command(Command::Status))
        .await
        .unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.detail("status"), Some(&json!("paused")));
}

#[tokio::test]
async fn get_xml_command_returns_the_definition() {
    let engine = reconciler(MockDriver::new().with_vm_xml("alpha", 1, ALPHA_XML));

    let outcome = engine
        .run(&VirtRequest::new().name("alpha").command(Command::GetXml))
        .await
        .unwrap();

    assert_eq!(outcome.detail("get_xml"), Some(&json!(ALPHA_XML)));
}

#[tokio::test]
async fn direct_commands_wrap_the_driver_return_under_the_command_key() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 5));

    let outcome = engine
        .run(&VirtRequest::new().name("alpha").command(Command::Start))
        .await
        .unwrap();

    assert_eq!(outcome.detail("start"), Some(&json!(0)));
    assert_eq!(engine.driver().call_count("start"), 1);
}

#[tokio::test]
async fn create_is_an_alias_for_start() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 5));

    engine
        .run(&VirtRequest::new().name("alpha").command(Command::Create))
        .await
        .unwrap();

    assert_eq!(engine.driver().call_count("start"), 1);
    assert_eq!(engine.driver().vm("alpha").unwrap().state_code, 1);
}

#[tokio::test]
async fn vm_commands_without_a_name_fail_before_any_driver_call() {
    for command in [Command::Start, Command::Destroy, Command::Undefine] {
        let engine = reconciler(MockDriver::new().with_vm("alpha", 1));
        let err = engine
            .run(&VirtRequest::new().command(command))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingIdentity(_)));
        assert!(engine.driver().calls().is_empty());
    }
}

// -- host commands ------------------------------------------------------------

#[tokio::test]
async fn list_vms_returns_all_names() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 1).with_vm("beta", 5));

    let outcome = engine
        .run(&VirtRequest::new().command(Command::ListVms))
        .await
        .unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.detail("list_vms"), Some(&json!(["alpha", "beta"])));
}

#[tokio::test]
async fn list_vms_with_state_filters_and_swallows_lookup_failures() {
    let engine = reconciler(
        MockDriver::new()
            .with_vm("alpha", 1)
            .with_vm("beta", 5)
            .with_vm("gamma", 1)
            .with_failing_status("gamma"),
    );

    let outcome = engine
        .run(
            &VirtRequest::new()
                .command(Command::ListVms)
                .state(DesiredState::Running),
        )
        .await
        .unwrap();

    // beta is shut off, gamma's lookup failed: both omitted, no error.
    assert_eq!(outcome.detail("list_vms"), Some(&json!(["alpha"])));
}

#[tokio::test]
async fn list_vms_with_state_is_read_only_even_for_mutating_states() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 1));

    let outcome = engine
        .run(
            &VirtRequest::new()
                .command(Command::ListVms)
                .state(DesiredState::Destroyed),
        )
        .await
        .unwrap();

    // `destroyed` matches no observable status and triggers nothing.
    assert_eq!(outcome.detail("list_vms"), Some(&json!([])));
    assert_eq!(engine.driver().call_count("destroy"), 0);
    assert!(!outcome.changed);
}

#[tokio::test]
async fn host_commands_need_no_name() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 1));

    let outcome = engine
        .run(&VirtRequest::new().command(Command::Freemem))
        .await
        .unwrap();
    assert!(outcome.detail("freemem").unwrap().is_u64());

    let outcome = engine
        .run(&VirtRequest::new().command(Command::Virttype))
        .await
        .unwrap();
    assert_eq!(outcome.detail("virttype"), Some(&json!("TEST")));

    let outcome = engine
        .run(&VirtRequest::new().command(Command::Nodeinfo))
        .await
        .unwrap();
    assert!(outcome.detail("nodeinfo").unwrap()["cpu_model"].is_string());
}

#[tokio::test]
async fn info_reports_a_per_vm_snapshot() {
    let engine = reconciler(
        MockDriver::new()
            .with_vm("alpha", 1)
            .with_autostart_vm("beta", 5, true),
    );

    let outcome = engine
        .run(&VirtRequest::new().command(Command::Info))
        .await
        .unwrap();

    let info = outcome.detail("info").unwrap();
    assert_eq!(info["vms"]["alpha"]["status"], json!("running"));
    assert_eq!(info["vms"]["beta"]["status"], json!("shutdown"));
    assert_eq!(info["vms"]["beta"]["autostart"], json!(true));
}

// -- request validation -------------------------------------------------------

#[tokio::test]
async fn empty_request_is_rejected() {
    let engine = reconciler(MockDriver::new());

    let err = engine.run(&VirtRequest::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::MissingAction));
    assert!(engine.driver().calls().is_empty());
}

#[tokio::test]
async fn unknown_command_token_is_rejected_at_parse_time() {
    // The command enum is closed; an unknown token never produces a request,
    // so no driver call can happen for it.
    let err = "dominate".parse::<Command>().unwrap_err();
    assert!(matches!(err, CoreError::UnrecognizedCommand(t) if t == "dominate"));
}

#[tokio::test]
async fn state_mode_wins_over_a_non_listing_command() {
    let engine = reconciler(MockDriver::new().with_vm("alpha", 5));

    let outcome = engine
        .run(
            &VirtRequest::new()
                .name("alpha")
                .state(DesiredState::Running)
                .command(Command::Destroy),
        )
        .await
        .unwrap();

    // The state transition ran; the command was never dispatched.
    assert!(outcome.changed);
    assert_eq!(engine.driver().call_count("start"), 1);
    assert_eq!(engine.driver().call_count("destroy"), 0);
}
