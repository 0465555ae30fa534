//! BDD step definitions for assistant answers

use cucumber::gherkin::Step;
use cucumber::{given, then, when};

use automl_client::chat::{format_response_chunks, ChunkKind, Conversation, StructuredChunk};

use crate::world::AutomlWorld;

fn parse_kind(s: &str) -> ChunkKind {
    match s {
        "heading" => ChunkKind::Heading,
        "bullet" => ChunkKind::Bullet,
        "paragraph" => ChunkKind::Paragraph,
        "code" => ChunkKind::Code,
        other => panic!("Unknown chunk kind: {}", other),
    }
}

fn conversation(world: &mut AutomlWorld) -> &mut Conversation {
    world
        .conversation
        .as_mut()
        .expect("no conversation started")
}

#[given("the assistant answered:")]
fn assistant_answered(world: &mut AutomlWorld, step: &Step) {
    world.answer = step.docstring.clone().expect("answer docstring missing");
}

#[when("the answer is formatted")]
fn answer_formatted(world: &mut AutomlWorld) {
    world.chunks = format_response_chunks(&world.answer);
}

#[then("the chunks should be:")]
fn chunks_should_be(world: &mut AutomlWorld, step: &Step) {
    let table = step.table.as_ref().expect("chunk table missing");
    let expected: Vec<StructuredChunk> = table
        .rows
        .iter()
        .skip(1)
        .map(|row| StructuredChunk::new(parse_kind(row[0].trim()), row[1].trim()))
        .collect();
    assert_eq!(world.chunks, expected);
}

#[then("every partial rendering should agree with the final rendering")]
fn partial_renderings_agree(world: &mut AutomlWorld) {
    let full = world.answer.as_str();
    let final_chunks = format_response_chunks(full);
    for (cut, _) in full.char_indices() {
        let partial = format_response_chunks(&full[..cut]);
        if let Some((_, settled)) = partial.split_last() {
            assert_eq!(
                settled,
                &final_chunks[..settled.len()],
                "partial answer cut at byte {} rewrote a settled chunk",
                cut
            );
        }
    }
}

#[given("a new conversation")]
fn new_conversation(world: &mut AutomlWorld) {
    world.conversation = Some(Conversation::new());
}

#[when(expr = "the user asks {string}")]
fn user_asks(world: &mut AutomlWorld, question: String) {
    conversation(world).push_question(&question);
}

#[when(expr = "the assistant replies {string}")]
fn assistant_replies(world: &mut AutomlWorld, partial: String) {
    conversation(world).update_answer(&partial);
}

#[when("the assistant fails")]
fn assistant_fails(world: &mut AutomlWorld) {
    conversation(world).push_error();
}

#[then(expr = "the conversation should have {int} messages")]
fn conversation_length(world: &mut AutomlWorld, expected: usize) {
    assert_eq!(conversation(world).messages().len(), expected);
}

#[then(expr = "the last message should read {string}")]
fn last_message_reads(world: &mut AutomlWorld, expected: String) {
    let last = conversation(world)
        .messages()
        .last()
        .expect("conversation is empty")
        .clone();
    let text: Vec<&str> = last.chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(text.join("\n"), expected);
}
