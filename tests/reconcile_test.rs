use pretty_assertions::assert_eq;
use serde_json::json;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{prelude::*, EnvFilter};

use dynostate::dyno::DynoType::*;
use dynostate::error::ValidationError;
use dynostate::formation::Formation;
use dynostate::options::{ApiKey, Region, Stack, TargetState};
use dynostate::platform::{
    Call, CallKind, FormationUpdate, MemoryApp, MemoryPlatform, MemoryState,
};
use dynostate::{run, run_json, Error, ErrorKind, Options};

fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(false)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE),
        )
        .with(EnvFilter::from_default_env())
        .try_init()
        .unwrap_or(());
}

fn opts(state: TargetState) -> Options {
    Options::new(ApiKey::new("secret"), "my-app").state(state)
}

fn update(process_type: &str, size: dynostate::dyno::DynoType, quantity: u32) -> FormationUpdate {
    FormationUpdate {
        process_type: process_type.to_string(),
        size,
        quantity,
    }
}

fn platform_with(app: MemoryApp) -> MemoryPlatform {
    MemoryPlatform::from(MemoryState::new().with_app(app))
}

#[tokio::test]
async fn absent_deletes_an_existing_app() {
    init();
    let platform = platform_with(MemoryApp::new("my-app"));

    let outcome = run(opts(TargetState::Absent), &platform).await.unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.message, "App 'my-app' successfully deleted");
    assert_eq!(outcome.app, None);
    assert_eq!(platform.calls().await, vec![Call::Delete("my-app".to_string())]);
    assert_eq!(platform.app("my-app").await, None);
}

#[tokio::test]
async fn absent_does_nothing_for_a_missing_app() {
    init();
    let platform = MemoryPlatform::new();

    let outcome = run(opts(TargetState::Absent), &platform).await.unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.message, "App 'my-app' left unchanged");
    assert!(platform.calls().await.is_empty());
}

#[tokio::test]
async fn present_creates_a_missing_app() {
    init();
    let platform = MemoryPlatform::new();

    let outcome = run(
        opts(TargetState::Present)
            .region(Region::Us)
            .stack(Stack::Cedar)
            .size_and_count(Hobby, 1),
        &platform,
    )
    .await
    .unwrap();

    assert!(outcome.changed);
    assert_eq!(
        platform.calls().await,
        vec![Call::Create {
            name: "my-app".to_string(),
            region: Region::Us,
            stack: Stack::Cedar
        }]
    );

    let created = platform.app("my-app").await.unwrap().app;
    let facts = outcome.app.unwrap();
    assert_eq!(facts.id, created.id);
    assert_eq!(facts.name, "my-app");
    assert_eq!(facts.region, Region::Us);
    assert_eq!(facts.stack, Stack::Cedar);
}

#[tokio::test]
async fn present_leaves_an_existing_app_alone() {
    init();
    let platform = platform_with(MemoryApp::new("my-app").process("web", Hobby, 1));

    let opts = opts(TargetState::Present).size_and_count(Standard2X, 4);

    let outcome = run(opts, &platform).await.unwrap();

    assert!(!outcome.changed);
    assert!(platform.calls().await.is_empty());
    assert_eq!(outcome.app.unwrap().id, "my-app-id");
}

#[tokio::test]
async fn present_requires_dyno_inputs() {
    init();
    let platform = platform_with(MemoryApp::new("my-app"));

    let err = run(opts(TargetState::Present), &platform).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Validation(ValidationError::ConflictingInputs)
    ));
    assert!(platform.calls().await.is_empty());

    // a formation with zero dynos is enough to declare the app
    let outcome = run(
        opts(TargetState::Present).formation("hobby", 0),
        &platform,
    )
    .await
    .unwrap();
    assert!(!outcome.changed);
}

#[tokio::test]
async fn started_is_idempotent() {
    init();
    let platform = platform_with(
        MemoryApp::new("my-app")
            .process("web", Standard1X, 1)
            .setting("PATH", "/to/some/place"),
    );
    let opts = opts(TargetState::Started)
        .formation("standard1x", 1)
        .setting("path", "/to/some/place")
        .uppercase(true);

    let outcome = run(opts, &platform).await.unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.message, "App 'my-app' left unchanged");
    assert!(platform.calls().await.is_empty());
}

#[tokio::test]
async fn started_applies_settings_then_formation() {
    init();
    let platform = platform_with(
        MemoryApp::new("my-app")
            .process("web", Hobby, 1)
            .setting("KEEP", "me"),
    );
    let opts = opts(TargetState::Started)
        .formation("standard-1x", 3)
        .setting("variable", "value")
        .setting("workers", 4)
        .uppercase(true);

    let outcome = run(opts.clone(), &platform).await.unwrap();

    assert!(outcome.changed);
    assert_eq!(
        outcome.message,
        "App 'my-app' successfully started (started standard-1x, stopped hobby)"
    );
    assert_eq!(
        platform.calls().await,
        vec![
            Call::UpdateConfig {
                app: "my-app".to_string(),
                settings: [
                    ("VARIABLE".to_string(), "value".to_string()),
                    ("WORKERS".to_string(), "4".to_string()),
                ]
                .into(),
            },
            Call::UpdateFormation {
                app: "my-app".to_string(),
                updates: vec![update("web", Standard1X, 3)],
            },
        ]
    );

    let stored = platform.app("my-app").await.unwrap();
    assert_eq!(stored.config.get("KEEP").map(String::as_str), Some("me"));
    assert_eq!(
        outcome.app.unwrap().formation,
        Some(Formation::single(Standard1X, 3))
    );

    // applying the same declaration again changes nothing
    let again = run(opts, &platform).await.unwrap();
    assert!(!again.changed);
    assert_eq!(platform.calls().await.len(), 2);
}

#[tokio::test]
async fn started_creates_a_missing_app() {
    init();
    let platform = MemoryPlatform::new();
    let opts = opts(TargetState::Started)
        .region(Region::Eu)
        .size_and_count(Hobby, 2)
        .setting("path", "/srv");

    let outcome = run(opts, &platform).await.unwrap();

    assert!(outcome.changed);
    let calls = platform.calls().await;
    assert_eq!(calls.len(), 3);
    assert!(matches!(
        &calls[0],
        Call::Create {
            region: Region::Eu,
            ..
        }
    ));
    assert!(matches!(&calls[1], Call::UpdateConfig { .. }));
    assert_eq!(
        calls[2],
        Call::UpdateFormation {
            app: "my-app".to_string(),
            updates: vec![update("web", Hobby, 2)],
        }
    );
}

#[tokio::test]
async fn started_fails_on_missing_app_when_creation_is_disabled() {
    init();
    let platform = MemoryPlatform::new();
    let opts = opts(TargetState::Started)
        .size_and_count(Hobby, 1)
        .create_missing(false);

    let err = run(opts, &platform).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        err.to_string(),
        "application 'my-app' does not exist, cannot start it"
    );
    assert!(platform.calls().await.is_empty());
}

#[tokio::test]
async fn stopped_and_restarted_fail_on_missing_app_when_creation_is_disabled() {
    init();
    let platform = MemoryPlatform::new();

    let err = run(opts(TargetState::Stopped).create_missing(false), &platform)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        err.to_string(),
        "application 'my-app' does not exist, cannot stop it"
    );

    let opts = opts(TargetState::Restarted)
        .size_and_count(Hobby, 1)
        .create_missing(false);
    let err = run(opts, &platform).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        err.to_string(),
        "application 'my-app' does not exist, cannot restart it"
    );

    assert!(platform.calls().await.is_empty());
    assert_eq!(platform.app("my-app").await, None);
}

#[tokio::test]
async fn conflicting_inputs_fail_before_any_remote_call() {
    init();
    let platform = MemoryPlatform::from(
        MemoryState::new()
            .with_app(MemoryApp::new("my-app"))
            .fail_on(CallKind::Authenticate),
    );
    let opts = opts(TargetState::Started)
        .formation("standard-1x", 2)
        .size_and_count(Hobby, 1);

    let err = run(opts, &platform).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Validation(ValidationError::ConflictingInputs)
    ));
    assert!(platform.calls().await.is_empty());
}

#[tokio::test]
async fn stopped_scales_every_size_to_zero() {
    init();
    let platform = platform_with(
        MemoryApp::new("my-app")
            .process("web", Standard2X, 2)
            .process("worker", Hobby, 1)
            .process("clock", Free, 0),
    );

    let outcome = run(opts(TargetState::Stopped), &platform).await.unwrap();

    assert!(outcome.changed);
    assert_eq!(
        platform.calls().await,
        vec![Call::UpdateFormation {
            app: "my-app".to_string(),
            updates: vec![update("worker", Hobby, 0), update("web", Standard2X, 0)],
        }]
    );

    // nothing is running anymore
    let outcome = run(opts(TargetState::Stopped), &platform).await.unwrap();
    assert!(!outcome.changed);
    assert_eq!(platform.calls().await.len(), 1);
}

#[tokio::test]
async fn stopped_creates_an_empty_shell_for_a_missing_app() {
    init();
    let platform = MemoryPlatform::new();

    let outcome = run(opts(TargetState::Stopped), &platform).await.unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.message, "App 'my-app' successfully stopped");
    assert_eq!(platform.calls().await.len(), 1);
    assert!(platform.app("my-app").await.unwrap().processes.is_empty());
}

#[tokio::test]
async fn restarted_configures_then_restarts() {
    init();
    let platform = platform_with(
        MemoryApp::new("my-app")
            .process("web", Hobby, 1)
            .setting("path", "/srv"),
    );
    let opts = opts(TargetState::Restarted)
        .size_and_count(Hobby, 1)
        .setting("path", "/srv");

    let outcome = run(opts, &platform).await.unwrap();

    // settings are unchanged but restarting is never a no-op
    assert!(outcome.changed);
    assert_eq!(outcome.message, "App 'my-app' successfully restarted");
    assert_eq!(platform.calls().await, vec![Call::Restart("my-app".to_string())]);
    assert_eq!(platform.app("my-app").await.unwrap().restarts, 1);
}

#[tokio::test]
async fn restarted_starts_a_missing_app() {
    init();
    let platform = MemoryPlatform::new();
    let opts = opts(TargetState::Restarted).size_and_count(Standard1X, 1);

    let outcome = run(opts, &platform).await.unwrap();

    assert!(outcome.changed);
    assert_eq!(
        outcome.message,
        "App 'my-app' successfully started (started standard-1x)"
    );
    let calls = platform.calls().await;
    assert_eq!(calls.len(), 2);
    assert!(matches!(&calls[0], Call::Create { .. }));
    assert!(!calls.contains(&Call::Restart("my-app".to_string())));
}

#[tokio::test]
async fn scaling_failure_keeps_the_applied_configuration() {
    init();
    let platform = MemoryPlatform::from(
        MemoryState::new()
            .with_app(MemoryApp::new("my-app").process("web", Hobby, 1))
            .fail_on(CallKind::UpdateFormation),
    );
    let opts = opts(TargetState::Started)
        .size_and_count(Hobby, 3)
        .setting("path", "/srv");

    let err = run(opts, &platform).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    let message = err.to_string();
    assert!(message.starts_with("failed to update formation of application 'my-app'"));

    let stored = platform.app("my-app").await.unwrap();
    assert_eq!(stored.config.get("path").map(String::as_str), Some("/srv"));
    assert_eq!(stored.processes[0].quantity, 1);
}

#[tokio::test]
async fn sequential_updates_commit_up_to_the_failure() {
    init();
    let platform = MemoryPlatform::from(
        MemoryState::new()
            .with_app(
                MemoryApp::new("my-app")
                    .process("web", Hobby, 1)
                    .process("worker", Standard1X, 0),
            )
            .without_batch_updates()
            .fail_after(CallKind::UpdateFormation, 1),
    );
    let opts = opts(TargetState::Started)
        .formation("hobby", 2)
        .formation("standard-1x", 1);

    let err = run(opts, &platform).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(
        platform.calls().await,
        vec![Call::UpdateProcess {
            app: "my-app".to_string(),
            update: update("web", Hobby, 2),
        }]
    );
}

#[tokio::test]
async fn sequential_updates_are_sent_one_by_one() {
    init();
    let platform = MemoryPlatform::from(
        MemoryState::new()
            .with_app(MemoryApp::new("my-app").process("web", Hobby, 1))
            .without_batch_updates(),
    );
    let opts = opts(TargetState::Started).size_and_count(PerformanceM, 2);

    let outcome = run(opts, &platform).await.unwrap();

    assert!(outcome.changed);
    assert_eq!(
        platform.calls().await,
        vec![Call::UpdateProcess {
            app: "my-app".to_string(),
            update: update("web", PerformanceM, 2),
        }]
    );
}

#[tokio::test]
async fn unsupported_formations_are_never_mutated() {
    init();
    let platform = platform_with(
        MemoryApp::new("my-app")
            .process("web", Standard1X, 2)
            .process("worker", Standard1X, 1),
    );
    let opts = opts(TargetState::Started)
        .size_and_count(Standard1X, 1)
        .setting("path", "/srv");

    let err = run(opts, &platform).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedShape);
    assert!(platform.calls().await.is_empty());
}

#[tokio::test]
async fn transport_errors_name_the_action_and_app() {
    init();
    let platform = MemoryPlatform::from(
        MemoryState::new()
            .with_app(MemoryApp::new("my-app"))
            .fail_on(CallKind::Delete),
    );

    let err = run(opts(TargetState::Absent), &platform).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(
        err.to_string(),
        "failed to delete application 'my-app': injected Delete failure"
    );
}

#[tokio::test]
async fn failing_to_list_applications_aborts_before_any_mutation() {
    init();
    let platform = MemoryPlatform::from(
        MemoryState::new()
            .with_app(MemoryApp::new("my-app").process("web", Hobby, 1))
            .fail_on(CallKind::List),
    );
    let opts = opts(TargetState::Started)
        .size_and_count(Hobby, 2)
        .setting("path", "/srv");

    let err = run(opts, &platform).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(
        err.to_string(),
        "failed to look up application 'my-app': injected List failure"
    );
    assert!(platform.calls().await.is_empty());
}

#[tokio::test]
async fn failing_to_read_the_formation_aborts_before_any_mutation() {
    init();
    let platform = MemoryPlatform::from(
        MemoryState::new()
            .with_app(MemoryApp::new("my-app").process("web", Hobby, 1))
            .fail_on(CallKind::ReadFormation),
    );
    let opts = opts(TargetState::Started)
        .size_and_count(Hobby, 2)
        .setting("path", "/srv");

    let err = run(opts, &platform).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(
        err.to_string(),
        "failed to read formation of application 'my-app': injected ReadFormation failure"
    );
    assert!(platform.calls().await.is_empty());
    assert!(platform.app("my-app").await.unwrap().config.is_empty());
}

#[tokio::test]
async fn idle_processes_can_move_to_a_new_size() {
    init();
    let platform = platform_with(
        MemoryApp::new("my-app")
            .process("web", Hobby, 0)
            .process("worker", Hobby, 1),
    );
    let opts = opts(TargetState::Started)
        .formation("hobby", 1)
        .formation("standard-1x", 1);

    let outcome = run(opts, &platform).await.unwrap();

    assert!(outcome.changed);
    assert_eq!(
        platform.calls().await,
        vec![Call::UpdateFormation {
            app: "my-app".to_string(),
            updates: vec![update("web", Standard1X, 1)],
        }]
    );
}

#[tokio::test]
async fn bad_credentials_are_transport_errors() {
    init();
    let platform = MemoryPlatform::from(MemoryState::new().with_api_key("the-right-key"));

    let err = run_json(
        json!({
            "api_key": "the-wrong-key",
            "app": "my-app",
            "state": "present",
            "size": "hobby",
            "count": 1
        }),
        &platform,
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err
        .to_string()
        .starts_with("failed to authenticate for application 'my-app'"));
    assert!(!err.to_string().contains("the-wrong-key"));
    assert!(platform.calls().await.is_empty());
}

#[tokio::test]
async fn invalid_configuration_objects_are_rejected() {
    init();
    let platform = MemoryPlatform::new();

    let err = run_json(
        json!({"api_key": "secret", "app": "my-app", "state": "paused"}),
        &platform,
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Options);
}

#[tokio::test]
async fn outcomes_serialize_to_the_result_object() {
    init();
    let platform = MemoryPlatform::new();

    let outcome = run_json(
        json!({
            "api_key": "secret",
            "app": "my-app",
            "state": "present",
            "region": "tokyo",
            "stack": "heroku-16",
            "formation": {"hobby": 1}
        }),
        &platform,
    )
    .await
    .unwrap();

    let id = platform.app("my-app").await.unwrap().app.id;
    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({
            "changed": true,
            "message": "App 'my-app' successfully created",
            "app": {
                "id": id,
                "name": "my-app",
                "region": "tokyo",
                "stack": "heroku-16",
                "web_url": "https://my-app.example.com/"
            }
        })
    );
}
