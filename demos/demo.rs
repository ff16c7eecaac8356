//! Walkthrough of both protocols: fallback resolution and resumable steps.
//!
//! Run with: cargo run --example demo

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use recourse::{step, Context, Fault, Getter, RunOutcome, Sequencer};
use serde_json::{json, Value};

// ============================================================================
// Fallback resolution
// ============================================================================

async fn fallback_demo() {
    println!("== Fallback resolution ==");

    // The primary settings service is down; the local cache has a stale
    // but verifiable copy. Accepting the cache triggers a synchronizer
    // that writes the value back to the primary store.
    let synced = Arc::new(AtomicBool::new(false));

    let getter = Getter::builder("Settings")
        .primary_source(|| async {
            println!("  [primary] settings service: connection refused");
            Err(Fault::new("connection refused"))
        })
        .secondary_source(|| async {
            println!("  [secondary #1] local cache: hit");
            Ok(json!({"theme": "dark", "retries": 3}))
        })
        .verify(|value: &Value| value.get("retries").is_some())
        .synchronize({
            let synced = synced.clone();
            move |value: Value| {
                let synced = synced.clone();
                async move {
                    println!("  [synchronizer] writing {value} back to the service");
                    synced.store(true, Ordering::SeqCst);
                    Ok(Value::Null)
                }
            }
        })
        .build()
        .expect("configuration is complete");

    match getter.get().expect("no run in flight").await {
        Ok(value) => println!("  resolved with {value} (synced back: {})", synced.load(Ordering::SeqCst)),
        Err(fault) => println!("  failed:\n{}", fault.message()),
    }

    // With every source down, the composite fault narrates each attempt.
    let doomed = Getter::builder("Settings")
        .primary_source(|| async { Err(Fault::new("connection refused")) })
        .secondary_source(|| async { Err(Fault::new("cache is cold")) })
        .build()
        .expect("configuration is complete");

    if let Err(fault) = doomed.get().expect("no run in flight").await {
        println!("  exhausted:\n{}", fault.message());
    }
}

// ============================================================================
// Resumable steps
// ============================================================================

async fn sequence_demo() {
    println!("== Resumable steps ==");

    let upload_attempts = Arc::new(AtomicUsize::new(0));

    let mut deploy = Sequencer::new(vec![
        step(|_context: &Context| async move {
            println!("  [build] compiling release artifact");
            Ok(json!({"artifact": "app-1.4.2.tar.gz"}))
        }),
        step({
            let attempts = upload_attempts.clone();
            move |context: &Context| {
                let artifact = context
                    .get("artifact")
                    .cloned()
                    .unwrap_or(Value::Null);
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    println!("  [upload] pushing {artifact} (attempt {attempt})");
                    if attempt == 1 {
                        Err(Fault::new("registry timed out"))
                    } else {
                        Ok(json!({"uploaded": true}))
                    }
                }
            }
        }),
        step(|_context: &Context| async move {
            println!("  [activate] switching traffic over");
            Ok(json!({"active": true}))
        }),
    ])
    .expect("at least one step")
    .on_error(|fault: &Fault| println!("  [on_error] {}", fault.message()))
    .on_specific_error("Error in .* step: registry timed out", |fault: &Fault| {
        println!("  [on_specific_error] transient registry fault: {}", fault.message());
    })
    .expect("pattern compiles")
    .on_resume(|| println!("  [on_resume] retrying the failed step"))
    .on_success(|context: &Context| {
        println!("  [on_success] deployed with {}", Value::Object(context.clone()));
        Ok(())
    });

    let outcome = deploy
        .execute(Context::new())
        .expect("usage is valid")
        .await;
    assert!(matches!(outcome, RunOutcome::Faulted(_)));

    // The caller decides when to retry; the failed step re-runs, then the
    // remaining steps continue with the context merged exactly once.
    let outcome = deploy.resume().expect("a failure is pending").await;
    assert!(outcome.is_completed());
}

#[tokio::main]
async fn main() {
    fallback_demo().await;
    println!();
    sequence_demo().await;
}
