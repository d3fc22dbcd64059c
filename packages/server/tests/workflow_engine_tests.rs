//! Integration tests for the workflow automation engine.
//!
//! Exercises the whole pipeline: graph validation on save, activation,
//! trigger dispatch from lead events (with filters and idempotency), and
//! execution with per-step run history.

mod common;

use common::{fixtures, TestHarness};
use crm_core::common::pagination::PaginationArgs;
use crm_core::common::WorkflowId;
use crm_core::domains::leads::actions::{change_lead_status, create_lead, list_activities};
use crm_core::domains::leads::data::CreateLeadInput;
use crm_core::domains::leads::models::{ActivityKind, LeadStatus};
use crm_core::domains::workflows::actions::{
    activate_workflow, archive_workflow, create_workflow, get_run, list_runs, pause_workflow,
    register_active_schedules, update_workflow, ActivateWorkflowResult, WorkflowSaveResult,
};
use crm_core::domains::workflows::commands::ExecuteWorkflowCommand;
use crm_core::domains::workflows::data::{
    ConnectionInput, CreateWorkflowInput, MappingInput, StepInput, UpdateWorkflowInput,
    WorkflowDetail, WorkflowGraphInput,
};
use crm_core::domains::workflows::dispatcher::{dispatch_trigger, TriggerEvent};
use crm_core::domains::workflows::engine::executor::execute_workflow;
use crm_core::domains::workflows::models::{RunStatus, StepKind, WorkflowStatus};
use crm_core::kernel::jobs::testing::InMemoryJobQueue;
use crm_core::kernel::TestDependencies;
use test_context::test_context;
use uuid::Uuid;

// =============================================================================
// Graph builders
// =============================================================================

fn trigger(step_type: &str) -> StepInput {
    StepInput {
        key: "trigger".to_string(),
        kind: StepKind::Trigger,
        step_type: step_type.to_string(),
        name: "Trigger".to_string(),
        config: None,
        position: 0,
    }
}

fn action(key: &str, step_type: &str, config: serde_json::Value) -> StepInput {
    StepInput {
        key: key.to_string(),
        kind: StepKind::Action,
        step_type: step_type.to_string(),
        name: key.to_string(),
        config: Some(config),
        position: 0,
    }
}

fn connect(from: &str, to: &str) -> ConnectionInput {
    ConnectionInput {
        from: from.to_string(),
        to: to.to_string(),
        condition: None,
        position: 0,
    }
}

fn connect_if(from: &str, to: &str, condition: serde_json::Value) -> ConnectionInput {
    ConnectionInput {
        from: from.to_string(),
        to: to.to_string(),
        condition: Some(condition),
        position: 0,
    }
}

fn feed(step: &str, source: &str, target: &str) -> MappingInput {
    MappingInput {
        step: step.to_string(),
        source: source.to_string(),
        target: target.to_string(),
        required: true,
    }
}

/// Workflow that reacts to new leads by writing a note on them
fn welcome_note_workflow(name: &str) -> CreateWorkflowInput {
    CreateWorkflowInput {
        name: name.to_string(),
        description: None,
        graph: WorkflowGraphInput {
            steps: vec![
                trigger("trigger.lead_created"),
                action(
                    "note",
                    "action.add_lead_note",
                    serde_json::json!({ "note": "Welcome {{lead_name}}" }),
                ),
            ],
            connections: vec![connect("trigger", "note")],
            mappings: vec![
                feed("note", "trigger/lead/id", "lead_id"),
                feed("note", "trigger/lead/name", "lead_name"),
            ],
        },
    }
}

fn saved(result: WorkflowSaveResult) -> WorkflowDetail {
    match result {
        WorkflowSaveResult::Saved(detail) => detail,
        WorkflowSaveResult::Invalid(violations) => {
            panic!("expected the graph to save, got violations: {violations:?}")
        }
    }
}

/// Execute commands enqueued for one workflow. The database is shared, so
/// other tests' active workflows may enqueue jobs into this queue too.
fn commands_for(queue: &InMemoryJobQueue, workflow_id: WorkflowId) -> Vec<ExecuteWorkflowCommand> {
    queue
        .jobs_of_type(ExecuteWorkflowCommand::JOB_TYPE)
        .into_iter()
        .filter_map(|job| job.args)
        .filter_map(|args| serde_json::from_value::<ExecuteWorkflowCommand>(args).ok())
        .filter(|command| command.workflow_id == workflow_id)
        .collect()
}

fn lead_input(name: &str) -> CreateLeadInput {
    CreateLeadInput {
        name: name.to_string(),
        email: None,
        phone: None,
        company: None,
        source: None,
        owner_id: None,
        fields: None,
    }
}

// =============================================================================
// Save and Validation Tests
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn create_workflow_saves_the_whole_graph_as_a_draft(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    let detail = saved(
        create_workflow(welcome_note_workflow("Welcome note"), author, &deps)
            .await
            .unwrap(),
    );

    assert_eq!(detail.workflow.status, WorkflowStatus::Draft);
    assert_eq!(detail.workflow.version, 1);
    assert_eq!(detail.workflow.created_by, author);
    assert_eq!(detail.steps.len(), 2);
    assert_eq!(detail.connections.len(), 1);
    assert_eq!(detail.mappings.len(), 2);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn create_workflow_with_a_broken_graph_stores_nothing(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    let name = format!("broken-{}", Uuid::new_v4().simple());
    let input = CreateWorkflowInput {
        name: name.clone(),
        description: None,
        graph: WorkflowGraphInput {
            steps: vec![
                trigger("trigger.lead_created"),
                action("loose", "action.no_such_thing", serde_json::json!({})),
            ],
            // "loose" is never connected, and its action type is unknown
            connections: vec![],
            mappings: vec![],
        },
    };

    let result = create_workflow(input, author, &deps).await.unwrap();

    let WorkflowSaveResult::Invalid(violations) = result else {
        panic!("expected validation to fail");
    };
    assert!(violations.iter().any(|v| v.contains("unknown action type")));
    assert!(violations
        .iter()
        .any(|v| v.contains("not reachable from the trigger")));

    let stored = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM workflows WHERE name = $1")
        .bind(&name)
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(stored, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn a_workflow_needs_exactly_one_trigger(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    let mut input = welcome_note_workflow("Two triggers");
    let mut second = trigger("trigger.lead_assigned");
    second.key = "trigger2".to_string();
    input.graph.steps.push(second);

    let result = create_workflow(input, author, &deps).await.unwrap();

    let WorkflowSaveResult::Invalid(violations) = result else {
        panic!("expected validation to fail");
    };
    assert!(violations
        .iter()
        .any(|v| v.contains("exactly one trigger")));
}

// =============================================================================
// Dispatch and Execution Tests
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn lead_created_event_runs_the_workflow_end_to_end(ctx: &TestHarness) {
    let test_deps = TestDependencies::new();
    let queue = test_deps.job_queue.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    let detail = saved(
        create_workflow(welcome_note_workflow("Welcome note"), author, &deps)
            .await
            .unwrap(),
    );
    let workflow_id = detail.workflow.id;

    let activated = activate_workflow(workflow_id, &deps).await.unwrap();
    assert!(matches!(activated, ActivateWorkflowResult::Activated(_)));

    // Creating a lead dispatches the trigger into the job queue
    let lead = create_lead(lead_input("Dana"), None, &deps).await.unwrap();

    let commands = commands_for(&queue, workflow_id);
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].trigger_type, "trigger.lead_created");

    // Run the job the way a worker would
    execute_workflow(commands[0].clone(), &deps).await.unwrap();

    let runs = list_runs(workflow_id, None, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    assert_eq!(runs.items.len(), 1);
    assert_eq!(runs.items[0].status, RunStatus::Succeeded);
    assert_eq!(runs.items[0].workflow_version, 1);

    let run_detail = get_run(runs.items[0].id, &deps).await.unwrap();
    assert_eq!(run_detail.steps.len(), 1);
    assert_eq!(run_detail.steps[0].step_type, "action.add_lead_note");
    assert_eq!(run_detail.steps[0].status, RunStatus::Succeeded);
    assert_eq!(
        run_detail.steps[0].output["note"],
        serde_json::json!("Welcome Dana")
    );

    // The action left its mark on the lead's trail
    let trail = list_activities(lead.id, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    assert_eq!(trail.items[0].kind, ActivityKind::WorkflowAction);
    assert_eq!(
        trail.items[0].detail["note"],
        serde_json::json!("Welcome Dana")
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn draft_workflows_never_receive_dispatches(ctx: &TestHarness) {
    let test_deps = TestDependencies::new();
    let queue = test_deps.job_queue.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    let detail = saved(
        create_workflow(welcome_note_workflow("Still a draft"), author, &deps)
            .await
            .unwrap(),
    );

    create_lead(lead_input("Early"), None, &deps).await.unwrap();

    assert!(commands_for(&queue, detail.workflow.id).is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn trigger_filters_select_matching_events_only(ctx: &TestHarness) {
    let test_deps = TestDependencies::new();
    let queue = test_deps.job_queue.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    // Only fire when a lead lands on "qualified". Trigger filters see the
    // bare event payload, so the path has no "trigger/" prefix.
    let mut filtered = trigger("trigger.lead_status_changed");
    filtered.config = Some(serde_json::json!({
        "filter": { "field": "to", "op": "eq", "value": "qualified" }
    }));
    let input = CreateWorkflowInput {
        name: "Qualified only".to_string(),
        description: None,
        graph: WorkflowGraphInput {
            steps: vec![
                filtered,
                action(
                    "note",
                    "action.add_lead_note",
                    serde_json::json!({ "note": "Qualified!" }),
                ),
            ],
            connections: vec![connect("trigger", "note")],
            mappings: vec![feed("note", "trigger/lead/id", "lead_id")],
        },
    };
    let detail = saved(create_workflow(input, author, &deps).await.unwrap());
    activate_workflow(detail.workflow.id, &deps).await.unwrap();

    let lead = create_lead(lead_input("Fence-sitter"), None, &deps).await.unwrap();

    change_lead_status(lead.id, LeadStatus::Contacted, None, &deps)
        .await
        .unwrap();
    assert!(commands_for(&queue, detail.workflow.id).is_empty());

    change_lead_status(lead.id, LeadStatus::Qualified, None, &deps)
        .await
        .unwrap();
    assert_eq!(commands_for(&queue, detail.workflow.id).len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn redelivered_events_enqueue_only_one_execution(ctx: &TestHarness) {
    let test_deps = TestDependencies::new();
    let queue = test_deps.job_queue.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    let detail = saved(
        create_workflow(welcome_note_workflow("Once only"), author, &deps)
            .await
            .unwrap(),
    );
    activate_workflow(detail.workflow.id, &deps).await.unwrap();

    let event = TriggerEvent::new(
        "trigger.lead_created",
        Uuid::new_v4(),
        serde_json::json!({ "lead": { "id": Uuid::new_v4(), "name": "Dana" } }),
    );

    dispatch_trigger(&event, &deps).await.unwrap();
    dispatch_trigger(&event, &deps).await.unwrap();

    // Same event id twice: the idempotency key absorbs the second dispatch
    assert_eq!(commands_for(&queue, detail.workflow.id).len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn edge_conditions_route_between_branches(ctx: &TestHarness) {
    let test_deps = TestDependencies::new();
    let queue = test_deps.job_queue.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    // Edge conditions see the full run context, trigger payload included
    let input = CreateWorkflowInput {
        name: "Branching".to_string(),
        description: None,
        graph: WorkflowGraphInput {
            steps: vec![
                trigger("trigger.lead_created"),
                action(
                    "fresh",
                    "action.add_lead_note",
                    serde_json::json!({ "note": "fresh lead" }),
                ),
                action(
                    "stale",
                    "action.add_lead_note",
                    serde_json::json!({ "note": "stale lead" }),
                ),
            ],
            connections: vec![
                connect_if(
                    "trigger",
                    "fresh",
                    serde_json::json!({ "field": "trigger/lead/status", "op": "eq", "value": "new" }),
                ),
                connect_if(
                    "trigger",
                    "stale",
                    serde_json::json!({ "field": "trigger/lead/status", "op": "eq", "value": "lost" }),
                ),
            ],
            mappings: vec![
                feed("fresh", "trigger/lead/id", "lead_id"),
                feed("stale", "trigger/lead/id", "lead_id"),
            ],
        },
    };
    let detail = saved(create_workflow(input, author, &deps).await.unwrap());
    activate_workflow(detail.workflow.id, &deps).await.unwrap();

    let lead = create_lead(lead_input("Brand New"), None, &deps).await.unwrap();
    let commands = commands_for(&queue, detail.workflow.id);
    assert_eq!(commands.len(), 1);

    execute_workflow(commands[0].clone(), &deps).await.unwrap();

    let runs = list_runs(detail.workflow.id, None, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    let run_detail = get_run(runs.items[0].id, &deps).await.unwrap();

    // Only the matching branch executed
    assert_eq!(run_detail.steps.len(), 1);
    assert_eq!(
        run_detail.steps[0].output["note"],
        serde_json::json!("fresh lead")
    );

    let trail = list_activities(lead.id, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    let notes: Vec<_> = trail
        .items
        .iter()
        .filter(|a| a.kind == ActivityKind::WorkflowAction)
        .collect();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].detail["note"], serde_json::json!("fresh lead"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn diamond_joins_execute_the_shared_step_once(ctx: &TestHarness) {
    let test_deps = TestDependencies::new();
    let queue = test_deps.job_queue.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    // trigger -> left, trigger -> right, and both branches into join
    let input = CreateWorkflowInput {
        name: "Diamond".to_string(),
        description: None,
        graph: WorkflowGraphInput {
            steps: vec![
                trigger("trigger.lead_created"),
                action(
                    "left",
                    "action.add_lead_note",
                    serde_json::json!({ "note": "left" }),
                ),
                action(
                    "right",
                    "action.add_lead_note",
                    serde_json::json!({ "note": "right" }),
                ),
                action(
                    "join",
                    "action.add_lead_note",
                    serde_json::json!({ "note": "join" }),
                ),
            ],
            connections: vec![
                ConnectionInput {
                    from: "trigger".to_string(),
                    to: "left".to_string(),
                    condition: None,
                    position: 0,
                },
                ConnectionInput {
                    from: "trigger".to_string(),
                    to: "right".to_string(),
                    condition: None,
                    position: 1,
                },
                connect("left", "join"),
                connect("right", "join"),
            ],
            mappings: vec![
                feed("left", "trigger/lead/id", "lead_id"),
                feed("right", "trigger/lead/id", "lead_id"),
                feed("join", "trigger/lead/id", "lead_id"),
            ],
        },
    };
    let detail = saved(create_workflow(input, author, &deps).await.unwrap());
    activate_workflow(detail.workflow.id, &deps).await.unwrap();

    create_lead(lead_input("Split"), None, &deps).await.unwrap();
    let commands = commands_for(&queue, detail.workflow.id);
    assert_eq!(commands.len(), 1);

    execute_workflow(commands[0].clone(), &deps).await.unwrap();

    let runs = list_runs(detail.workflow.id, None, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    assert_eq!(runs.items[0].status, RunStatus::Succeeded);

    let run_detail = get_run(runs.items[0].id, &deps).await.unwrap();
    let notes: Vec<_> = run_detail
        .steps
        .iter()
        .map(|s| s.output["note"].as_str().unwrap().to_string())
        .collect();

    // Depth-first in position order: the join runs as soon as the first
    // branch reaches it, and the second arrival is skipped
    assert_eq!(notes, vec!["left", "join", "right"]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn a_failing_step_marks_the_run_failed(ctx: &TestHarness) {
    let test_deps = TestDependencies::new();
    let queue = test_deps.job_queue.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    // The required mapping points at a field the payload never carries
    let input = CreateWorkflowInput {
        name: "Doomed".to_string(),
        description: None,
        graph: WorkflowGraphInput {
            steps: vec![
                trigger("trigger.lead_created"),
                action(
                    "note",
                    "action.add_lead_note",
                    serde_json::json!({ "note": "unreachable" }),
                ),
            ],
            connections: vec![connect("trigger", "note")],
            mappings: vec![feed("note", "trigger/lead/no_such_field", "lead_id")],
        },
    };
    let detail = saved(create_workflow(input, author, &deps).await.unwrap());
    activate_workflow(detail.workflow.id, &deps).await.unwrap();

    create_lead(lead_input("Trip-wire"), None, &deps).await.unwrap();
    let commands = commands_for(&queue, detail.workflow.id);
    assert_eq!(commands.len(), 1);

    // Action failures burn the run, not the job
    execute_workflow(commands[0].clone(), &deps).await.unwrap();

    let runs = list_runs(detail.workflow.id, None, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    assert_eq!(runs.items.len(), 1);
    assert_eq!(runs.items[0].status, RunStatus::Failed);
    assert!(runs.items[0]
        .error
        .as_deref()
        .unwrap()
        .contains("no value in the run context"));

    let run_detail = get_run(runs.items[0].id, &deps).await.unwrap();
    assert_eq!(run_detail.steps.len(), 1);
    assert_eq!(run_detail.steps[0].status, RunStatus::Failed);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn executing_a_paused_workflow_records_no_run(ctx: &TestHarness) {
    let test_deps = TestDependencies::new();
    let queue = test_deps.job_queue.clone();
    let deps = test_deps.into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    let detail = saved(
        create_workflow(welcome_note_workflow("Paused mid-flight"), author, &deps)
            .await
            .unwrap(),
    );
    activate_workflow(detail.workflow.id, &deps).await.unwrap();

    create_lead(lead_input("Racer"), None, &deps).await.unwrap();
    let commands = commands_for(&queue, detail.workflow.id);
    assert_eq!(commands.len(), 1);

    // Pause lands between enqueue and claim
    pause_workflow(detail.workflow.id, &deps).await.unwrap();
    execute_workflow(commands[0].clone(), &deps).await.unwrap();

    let runs = list_runs(detail.workflow.id, None, PaginationArgs::default(), &deps)
        .await
        .unwrap();
    assert!(runs.items.is_empty());

    // And a paused workflow gets no further dispatches
    create_lead(lead_input("Latecomer"), None, &deps).await.unwrap();
    assert_eq!(commands_for(&queue, detail.workflow.id).len(), 1);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn update_workflow_replaces_the_graph_and_bumps_the_version(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    let detail = saved(
        create_workflow(welcome_note_workflow("Evolving"), author, &deps)
            .await
            .unwrap(),
    );
    let old_step_ids: Vec<_> = detail.steps.iter().map(|s| s.id).collect();

    let replacement = UpdateWorkflowInput {
        name: "Evolving v2".to_string(),
        description: Some("now with a different note".to_string()),
        graph: WorkflowGraphInput {
            steps: vec![
                trigger("trigger.lead_assigned"),
                action(
                    "note",
                    "action.add_lead_note",
                    serde_json::json!({ "note": "changed" }),
                ),
            ],
            connections: vec![connect("trigger", "note")],
            mappings: vec![feed("note", "trigger/lead/id", "lead_id")],
        },
    };
    let updated = saved(
        update_workflow(detail.workflow.id, replacement, &deps)
            .await
            .unwrap(),
    );

    assert_eq!(updated.workflow.version, 2);
    assert_eq!(updated.workflow.name, "Evolving v2");
    assert_eq!(updated.steps.len(), 2);
    // Steps are replaced wholesale, not edited in place
    for step in &updated.steps {
        assert!(!old_step_ids.contains(&step.id));
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn archived_workflows_are_frozen(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    let detail = saved(
        create_workflow(welcome_note_workflow("Retired"), author, &deps)
            .await
            .unwrap(),
    );
    let workflow_id = detail.workflow.id;

    let archived = archive_workflow(workflow_id, &deps).await.unwrap();
    assert_eq!(archived.status, WorkflowStatus::Archived);

    let edit = update_workflow(
        workflow_id,
        UpdateWorkflowInput {
            name: "Zombie".to_string(),
            description: None,
            graph: welcome_note_workflow("x").graph,
        },
        &deps,
    )
    .await;
    assert!(edit
        .unwrap_err()
        .to_string()
        .contains("Archived workflows cannot be edited"));

    let revive = activate_workflow(workflow_id, &deps).await;
    assert!(revive
        .unwrap_err()
        .to_string()
        .contains("Archived workflows cannot be activated"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn schedule_triggers_register_with_the_cron_registry(ctx: &TestHarness) {
    let deps = TestDependencies::new().into_deps(ctx.db_pool.clone()).await;
    let role_id = fixtures::create_test_role(&ctx.db_pool, "builder").await.unwrap();
    let author = fixtures::create_test_user(
        &ctx.db_pool,
        "Author",
        &fixtures::unique_email("author"),
        role_id,
    )
    .await
    .unwrap();

    let mut scheduled = trigger("trigger.schedule");
    scheduled.config = Some(serde_json::json!({ "cron": "0 0 9 * * 1" }));
    let input = CreateWorkflowInput {
        name: "Monday sweep".to_string(),
        description: None,
        graph: WorkflowGraphInput {
            steps: vec![
                scheduled,
                action(
                    "notify",
                    "action.send_notification",
                    serde_json::json!({
                        "user_id": author,
                        "title": "Weekly sweep",
                        "body": "Time to work the pipeline",
                    }),
                ),
            ],
            connections: vec![connect("trigger", "notify")],
            mappings: vec![],
        },
    };
    let detail = saved(create_workflow(input, author, &deps).await.unwrap());

    activate_workflow(detail.workflow.id, &deps).await.unwrap();
    assert!(deps.schedule_registry.registered_count().await >= 1);

    // Boot-time re-registration picks the active schedule back up
    let registered = register_active_schedules(&deps).await.unwrap();
    assert!(registered >= 1);

    // Pausing removes the cron entry for this workflow
    pause_workflow(detail.workflow.id, &deps).await.unwrap();

    let cron_is_rejected = CreateWorkflowInput {
        name: "Bad cron".to_string(),
        description: None,
        graph: WorkflowGraphInput {
            steps: vec![{
                let mut t = trigger("trigger.schedule");
                t.config = Some(serde_json::json!({ "cron": "every now and then" }));
                t
            }],
            connections: vec![],
            mappings: vec![],
        },
    };
    let result = create_workflow(cron_is_rejected, author, &deps).await.unwrap();
    assert!(matches!(result, WorkflowSaveResult::Invalid(_)));
}
