//! Request/reply walkthrough: a squaring service cell.
//!
//! Run with: `cargo run --example request_reply`

use std::time::Duration;

use cellmesh::{BehaviorFn, Context, Environment, Event, Payload, Scene, Value};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = Environment::named("request-demo");

    env.start_cell(
        "svc",
        BehaviorFn::new(|_ctx: Context, event: Event| async move {
            if event.topic() == "square" {
                let n = event
                    .payload()
                    .get("n")
                    .and_then(Value::as_int)
                    .unwrap_or(0);
                if let Some(reply) = event.payload().reply() {
                    // The requester may already have timed out.
                    let _ = reply.send(n * n);
                }
            }
            Ok(())
        }),
    )
    .await?;

    let answer = env
        .request(
            "svc",
            "square",
            Payload::from_entries([("n", 7)]),
            Scene::none(),
            Duration::from_secs(1),
        )
        .await?;
    println!("7 squared is {answer:?}");

    // A request nobody answers runs into its deadline.
    let timed_out = env
        .request(
            "svc",
            "unknown-topic",
            Payload::empty(),
            Scene::none(),
            Duration::from_millis(100),
        )
        .await;
    println!("unknown topic: {timed_out:?}");

    env.stop().await?;
    Ok(())
}
