//! BDD step definitions for the pipeline steps and session state

use cucumber::{given, then, when};

use automl_client::api::validate_dataset_name;
use automl_client::session::{PipelineStep, SessionState};
use automl_client::types::UploadResponse;

use crate::world::AutomlWorld;

fn parse_step(s: &str) -> PipelineStep {
    s.parse()
        .unwrap_or_else(|e| panic!("Unknown step '{}': {}", s, e))
}

fn session(world: &mut AutomlWorld) -> &mut SessionState {
    world.session.get_or_insert_with(SessionState::new)
}

#[given(expr = "the workflow is on the {string} step")]
fn workflow_on_step(world: &mut AutomlWorld, name: String) {
    session(world).set_step(parse_step(&name));
}

#[given("a fresh session")]
fn fresh_session(world: &mut AutomlWorld) {
    world.session = Some(SessionState::new());
}

#[when("the user goes to the next step")]
fn next_step(world: &mut AutomlWorld) {
    let state = session(world);
    let next = state.current_step.next();
    state.set_step(next);
}

#[when("the user goes to the previous step")]
fn previous_step(world: &mut AutomlWorld) {
    let state = session(world);
    let previous = state.current_step.previous();
    state.set_step(previous);
}

#[given(expr = "the dataset {string} is uploaded as session {string}")]
#[when(expr = "the dataset {string} is uploaded as session {string}")]
fn dataset_uploaded(world: &mut AutomlWorld, file_name: String, session_id: String) {
    let upload: UploadResponse = serde_json::from_value(serde_json::json!({
        "session_id": session_id,
        "filename": file_name,
        "preview": [{"id": 1}],
        "schema": [{"column": "id", "dtype": "int64", "inferred_type": "numerical", "null_count": 0}]
    }))
    .expect("upload response should parse");
    session(world).apply_upload(&upload);
}

#[when("a pipeline call asks for the session")]
fn pipeline_call_needs_session(world: &mut AutomlWorld) {
    let result = session(world).require_session().map(|id| id.to_string());
    world.last_error = result.err().map(|e| e.to_string());
}

#[when("the session is reset")]
fn session_reset(world: &mut AutomlWorld) {
    session(world).reset();
}

#[when(expr = "the file {string} is checked for upload")]
fn file_checked(world: &mut AutomlWorld, file_name: String) {
    world.last_error = validate_dataset_name(&file_name).err().map(|e| e.to_string());
}

#[then(expr = "the workflow should be on the {string} step")]
fn workflow_should_be_on(world: &mut AutomlWorld, name: String) {
    assert_eq!(session(world).current_step, parse_step(&name));
}

#[then(expr = "the session id should be {string}")]
fn session_id_should_be(world: &mut AutomlWorld, expected: String) {
    let id = session(world)
        .require_session()
        .expect("no session")
        .to_string();
    assert_eq!(id, expected);
}

#[then("there should be no session")]
fn no_session(world: &mut AutomlWorld) {
    let state = session(world);
    assert!(state.session_id.is_none());
    assert!(state.preview.is_empty());
    assert!(state.file_name.is_empty());
}

#[then(expr = "the error should mention {string}")]
fn error_should_mention(world: &mut AutomlWorld, fragment: String) {
    let error = world.last_error.as_ref().expect("no error was recorded");
    assert!(
        error.contains(&fragment),
        "expected '{}' in '{}'",
        fragment,
        error
    );
}
