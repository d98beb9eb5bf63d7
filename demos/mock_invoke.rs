//! Example: typed invocation against a scripted backend, no API key needed.
//!
//! Run with: `cargo run --example mock_invoke`

use llm_relay::backend::{MockBackend, MockReply};
use llm_relay::events::{Event, FnEventHandler};
use llm_relay::{
    CredentialRing, FieldSpec, FieldType, MemoryStore, ModelClient, OutputContract, RetryPolicy,
    StructuredOutput,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct MovieReview {
    title: String,
    rating: f64,
}

impl StructuredOutput for MovieReview {
    fn contract() -> OutputContract {
        OutputContract::new("MovieReview")
            .required("title", FieldType::String)
            .field(FieldSpec::new("rating", FieldType::Number).with_description("0 to 10"))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The first key is rate limited, the second one gets a usable reply
    let mock = MockBackend::new(vec![
        MockReply::Status(429),
        MockReply::Text(
            "Here you go:\n```json\n{\"title\": \"Inception\", \"rating\": 9.2}\n```".into(),
        ),
    ]);

    let keys = vec!["demo-key-one".to_string(), "demo-key-two".to_string()];
    let ring = CredentialRing::from_keys(keys, Arc::new(MemoryStore::default()))?;

    let client = ModelClient::builder(Arc::new(ring))
        .backend(Arc::new(mock))
        .base_url("http://unused")
        .retry_policy(RetryPolicy::immediate(3))
        .event_handler(Arc::new(FnEventHandler(|event: Event| {
            println!("event: {:?}", event);
        })))
        .build();

    let review: MovieReview = client.invoke_as("Review the movie Inception").await?;
    println!("Movie: {}", review.title);
    println!("Rating: {}/10", review.rating);

    Ok(())
}
