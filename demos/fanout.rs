//! Fan-out walkthrough: one echo cell feeding two sinks.
//!
//! Run with: `cargo run --example fanout`

use std::time::Duration;

use cellmesh::{BehaviorFn, Context, Environment, Event, Scene, Value};

fn printing(label: &'static str) -> impl cellmesh::Behavior {
    BehaviorFn::new(move |_ctx: Context, event: Event| async move {
        let n = event
            .payload()
            .default_value()
            .and_then(Value::as_int)
            .unwrap_or(-1);
        println!("[{label}] topic={} payload={n}", event.topic());
        Ok(())
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = Environment::named("fanout-demo");

    // The hub re-emits everything it receives to its subscribers.
    env.start_cell(
        "hub",
        BehaviorFn::new(|ctx: Context, event: Event| async move { ctx.emit(event) }),
    )
    .await?;
    env.start_cell("left", printing("left")).await?;
    env.start_cell("right", printing("right")).await?;
    env.subscribe("hub", ["left", "right"]).await?;

    for n in 0..5i64 {
        env.emit_new("hub", "tick", n, Scene::none()).await?;
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    // Topology changes apply to events emitted afterwards.
    env.unsubscribe("hub", ["right"]).await?;
    env.emit_new("hub", "tick", 99, Scene::none()).await?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    env.stop().await?;
    Ok(())
}
