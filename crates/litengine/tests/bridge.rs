//! Suspendable transformers reached from synchronous callers.

use std::sync::Arc;
use std::time::Duration;

use litengine::AsyncTransformer;
use litengine::Bridge;
use litengine::Context;
use litengine::Error;
use litengine::HostKey;
use litengine::HostType;
use litengine::TypeEngine;
use litengine::Value;
use litengine::litpack::Literal;
use litengine::litpack::PrimitiveKind;
use litengine::litpack::WireType;
use tokio_util::sync::CancellationToken;

/// Integers that take a little while to convert.
struct Slow;

#[async_trait::async_trait]
impl AsyncTransformer for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    fn key(&self) -> HostKey {
        HostKey::exact("test.Slow")
    }

    fn describe(&self, _cx: &Context, _ty: &HostType) -> litengine::Result<WireType> {
        Ok(WireType::Primitive(PrimitiveKind::Integer))
    }

    fn check_value(&self, cx: &Context, _ty: &HostType, value: &Value) -> litengine::Result<()> {
        match value {
            Value::Int(_) => Ok(()),
            other => Err(cx.mismatch("test.Slow", other)),
        }
    }

    async fn encode(&self, cx: &Context, value: Value, _ty: &HostType, _expected: &WireType) -> litengine::Result<Literal> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        match value {
            Value::Int(v) => Ok(Literal::integer(v)),
            other => Err(cx.mismatch("test.Slow", &other)),
        }
    }

    async fn decode(&self, cx: &Context, literal: Literal, _ty: &HostType) -> litengine::Result<Value> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        match literal.as_primitive() {
            Some(litengine::litpack::Primitive::Integer(v)) => Ok(Value::Int(*v)),
            _ => Err(cx.decode_error("test.Slow", &literal)),
        }
    }
}

/// Never finishes on its own.
struct Hanging;

#[async_trait::async_trait]
impl AsyncTransformer for Hanging {
    fn name(&self) -> &str {
        "hanging"
    }

    fn key(&self) -> HostKey {
        HostKey::exact("test.Hanging")
    }

    fn describe(&self, _cx: &Context, _ty: &HostType) -> litengine::Result<WireType> {
        Ok(WireType::Primitive(PrimitiveKind::Integer))
    }

    fn check_value(&self, _cx: &Context, _ty: &HostType, _value: &Value) -> litengine::Result<()> {
        Ok(())
    }

    async fn encode(&self, _cx: &Context, _value: Value, _ty: &HostType, _expected: &WireType) -> litengine::Result<Literal> {
        futures::future::pending().await
    }

    async fn decode(&self, _cx: &Context, _literal: Literal, _ty: &HostType) -> litengine::Result<Value> {
        futures::future::pending().await
    }
}

/// Blocks on another conversion from inside the bridge.
struct Reentrant;

#[async_trait::async_trait]
impl AsyncTransformer for Reentrant {
    fn name(&self) -> &str {
        "reentrant"
    }

    fn key(&self) -> HostKey {
        HostKey::exact("test.Reentrant")
    }

    fn describe(&self, _cx: &Context, _ty: &HostType) -> litengine::Result<WireType> {
        Ok(WireType::Primitive(PrimitiveKind::Integer))
    }

    fn check_value(&self, _cx: &Context, _ty: &HostType, _value: &Value) -> litengine::Result<()> {
        Ok(())
    }

    async fn encode(&self, cx: &Context, value: Value, _ty: &HostType, _expected: &WireType) -> litengine::Result<Literal> {
        cx.engine().to_literal(&value, &HostType::named("test.Slow"))
    }

    async fn decode(&self, cx: &Context, literal: Literal, _ty: &HostType) -> litengine::Result<Value> {
        cx.engine().to_value(&literal, &HostType::named("test.Slow"))
    }
}

/// Bridge lifecycle events show up with `RUST_LOG=litengine=debug`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine() -> TypeEngine {
    init_tracing();
    let engine = TypeEngine::new();
    engine.register_async(Slow).expect("register slow");
    engine.register_async(Hanging).expect("register hanging");
    engine.register_async(Reentrant).expect("register reentrant");
    engine
}

// --- Happy Path Tests ---

#[test]
fn test_async_transformer_from_sync_caller() -> anyhow::Result<()> {
    let engine = engine();
    let ty = HostType::named("test.Slow");
    let literal = engine.to_literal(&Value::Int(5), &ty)?;
    assert_eq!(literal, Literal::integer(5));
    assert_eq!(engine.to_value(&literal, &ty)?, Value::Int(5));
    Ok(())
}

#[test]
fn test_async_elements_inside_generic() -> anyhow::Result<()> {
    let engine = engine();
    let ty = HostType::sequence(HostType::named("test.Slow"));
    let value = Value::list([Value::Int(3), Value::Int(1), Value::Int(2)]);
    let literal = engine.to_literal(&value, &ty)?;
    assert_eq!(engine.to_value(&literal, &ty)?, value);
    Ok(())
}

#[test]
fn test_concurrent_sync_callers() {
    let engine = engine();
    let handles: Vec<_> = (0..8i64)
        .map(|i| {
            let engine = engine.clone();
            std::thread::spawn(move || engine.to_literal(&Value::Int(i), &HostType::named("test.Slow")))
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let literal = handle.join().expect("caller thread panicked").expect("conversion failed");
        assert_eq!(literal, Literal::integer(i as i64));
    }
}

#[tokio::test]
async fn test_run_from_async_caller() -> anyhow::Result<()> {
    let bridge = Bridge::global()?;
    let out = bridge.run(async { Ok(40 + 2) }, &CancellationToken::new()).await?;
    assert_eq!(out, 42);
    Ok(())
}

#[test]
fn test_dedicated_bridge_runs_on_its_own_thread() -> anyhow::Result<()> {
    let bridge = Bridge::new("test-bridge")?;
    assert!(!bridge.is_bridge_thread());
    let name = bridge.run_sync(
        async { Ok(std::thread::current().name().map(str::to_string)) },
        &CancellationToken::new(),
    )?;
    assert_eq!(name.as_deref(), Some("test-bridge"));
    Ok(())
}

#[test]
fn test_engine_with_dedicated_bridge() -> anyhow::Result<()> {
    let engine = TypeEngine::builder().dedicated_bridge()?.build();
    engine.register_async(Slow)?;
    let bridge = engine.bridge()?;
    assert_eq!(bridge.name(), engine.config().bridge_thread_name);
    assert_eq!(engine.to_literal(&Value::Int(1), &HostType::named("test.Slow"))?, Literal::integer(1));
    Ok(())
}

// --- Failure Tests ---

#[test]
fn test_cancellation_interrupts_suspended_work() {
    let engine = engine();
    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            token.cancel();
        })
    };

    let cx = engine.context().with_cancel(token);
    let result = engine.to_literal_in(&cx, &Value::Int(1), &HostType::named("test.Hanging"));
    assert!(matches!(result, Err(Error::Cancelled)));
    canceller.join().expect("canceller panicked");
}

#[test]
fn test_already_cancelled_token() {
    let engine = engine();
    let token = CancellationToken::new();
    token.cancel();
    let cx = engine.context().with_cancel(token);
    let result = engine.to_value_in(&cx, &Literal::integer(1), &HostType::named("test.Slow"));
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[test]
fn test_blocking_call_from_bridge_is_refused() {
    let engine = engine();
    let result = engine.to_literal(&Value::Int(1), &HostType::named("test.Reentrant"));
    assert!(matches!(result, Err(Error::BridgeReentry)));
}

#[test]
fn test_shared_bridge_handle() -> anyhow::Result<()> {
    let first = Bridge::global()?;
    let second = Bridge::global()?;
    assert!(Arc::ptr_eq(&first, &second));
    Ok(())
}
