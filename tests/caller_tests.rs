#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Call lifecycle tests
//!
//! # Test Coverage
//!
//! - Exactly one write per request: late failures and late results are dropped
//! - Handler errors and panics become 500 responses
//! - Empty results end with an empty body and no content type
//! - Blocking handlers on the worker pool, ordered per route
//! - Executor refusal becomes 503
//! - Handlers that end the response themselves
//! - Default content type from negotiation, response filters

mod common;

use common::{get, router_for, send, setup_may_runtime};
use restmapper::caller::{CallParts, CallState, DefaultFailureHandler, MethodCaller};
use restmapper::context::{context_value, ContextKey, ContextValue};
use restmapper::descriptor::{Args, HandlerDescriptor, HandlerFn, MethodFlags, Param, Reply};
use restmapper::mapper::{Resource, ResourceDecl, RestMapper};
use restmapper::serializer::JsonSerializer;
use restmapper::server::{ResponseHandle, ResponseHead, RestRequest, SentResponse};
use restmapper::spec::UrlSpec;
use restmapper::worker_pool::{BlockingExecutor, Job, WorkerPool, WorkerPoolConfig};
use restmapper::RestError;
use http::Method;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Holds submitted jobs until the test runs them.
#[derive(Default)]
struct DeferredExecutor {
    jobs: Mutex<Vec<Job>>,
}

impl DeferredExecutor {
    fn run_all(&self) {
        let jobs: Vec<Job> = std::mem::take(&mut *self.jobs.lock());
        for job in jobs {
            job();
        }
    }
}

impl BlockingExecutor for DeferredExecutor {
    fn execute(&self, _ordering_key: Option<&str>, job: Job) -> Result<(), RestError> {
        self.jobs.lock().push(job);
        Ok(())
    }
}

struct RefusingExecutor;

impl BlockingExecutor for RefusingExecutor {
    fn execute(&self, _ordering_key: Option<&str>, _job: Job) -> Result<(), RestError> {
        Err(RestError::Unavailable("pool is shutting down".into()))
    }
}

fn build_caller(
    flags: MethodFlags,
    handler: HandlerFn,
    executor: Option<Arc<dyn BlockingExecutor>>,
) -> (Arc<MethodCaller>, may::sync::mpsc::Receiver<SentResponse>) {
    let descriptor = HandlerDescriptor::new("Test::call", ContextKey::of::<()>(), &[], flags, handler)
        .unwrap();
    let (response, rx) = ResponseHandle::channel();
    let caller = MethodCaller::new(CallParts {
        descriptor: Arc::new(descriptor),
        route_key: Arc::from("GET /call"),
        resource: context_value(Arc::new(())),
        args: Args::default(),
        request: Arc::new(RestRequest::new(Method::GET, "/call")),
        response,
        serializer: Arc::new(JsonSerializer),
        failure_handler: Arc::new(DefaultFailureHandler),
        executor,
    });
    caller.install_headers_end(None);
    (caller, rx)
}

fn handler<F>(f: F) -> HandlerFn
where
    F: Fn(&ContextValue, Args) -> anyhow::Result<Reply> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn counting_handler(calls: &Arc<AtomicUsize>) -> HandlerFn {
    let calls = Arc::clone(calls);
    handler(move |_, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(json!("done")))
    })
}

#[test]
fn test_failure_after_success_is_ignored() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (caller, rx) = build_caller(MethodFlags::default(), counting_handler(&calls), None);

    assert!(caller.end_with_call());
    assert_eq!(caller.state(), CallState::Ended);
    assert!(!caller.end_with_fail_status(500));
    assert!(!caller.end_with_call());

    let sent = rx.recv().unwrap();
    assert_eq!(sent.status, 200);
    assert_eq!(sent.json().unwrap(), json!("done"));
    assert!(rx.try_recv().is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failure_before_call_prevents_invocation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (caller, rx) = build_caller(MethodFlags::default(), counting_handler(&calls), None);

    assert!(caller.end_with_fail_status(403));
    assert!(!caller.end_with_call());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let sent = rx.recv().unwrap();
    assert_eq!(sent.status, 403);
    assert!(sent.body.is_empty());
    assert_eq!(sent.header("content-type"), None);
}

#[test]
fn test_late_blocking_result_is_dropped() {
    let calls = Arc::new(AtomicUsize::new(0));
    let executor = Arc::new(DeferredExecutor::default());
    let flags = MethodFlags {
        blocking: true,
        ..MethodFlags::default()
    };
    let (caller, rx) = build_caller(
        flags,
        counting_handler(&calls),
        Some(Arc::clone(&executor) as Arc<dyn BlockingExecutor>),
    );

    assert!(caller.end_with_call());
    assert_eq!(caller.state(), CallState::Invoking);
    assert!(caller.end_with_fail_status(504));
    executor.run_all();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(rx.recv().unwrap().status, 504);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_handler_error_becomes_500() {
    let (caller, rx) = build_caller(
        MethodFlags::default(),
        handler(|_, _| Err(anyhow::anyhow!("database offline"))),
        None,
    );
    caller.end_with_call();
    let sent = rx.recv().unwrap();
    assert_eq!(sent.status, 500);
    assert_eq!(sent.json().unwrap(), json!({ "error": "database offline" }));
    assert_eq!(sent.header("content-type"), Some("application/json;charset=utf-8"));
}

#[test]
fn test_handler_panic_becomes_500() {
    let (caller, rx) = build_caller(
        MethodFlags::default(),
        handler(|_, _| panic!("boom")),
        None,
    );
    caller.end_with_call();
    let sent = rx.recv().unwrap();
    assert_eq!(sent.status, 500);
    let body = sent.json().unwrap();
    assert!(body["error"].as_str().unwrap().contains("boom"));
}

#[test]
fn test_empty_result_ends_without_body() {
    let (caller, rx) = build_caller(MethodFlags::default(), handler(|_, _| Ok(None)), None);
    caller.end_with_call();
    let sent = rx.recv().unwrap();
    assert_eq!(sent.status, 200);
    assert!(sent.body.is_empty());
    assert_eq!(sent.header("content-type"), None);
}

#[test]
fn test_executor_refusal_becomes_503() {
    let flags = MethodFlags {
        blocking: true,
        ..MethodFlags::default()
    };
    let (caller, rx) = build_caller(
        flags,
        handler(|_, _| Ok(None)),
        Some(Arc::new(RefusingExecutor)),
    );
    assert!(caller.end_with_call());
    let sent = rx.recv().unwrap();
    assert_eq!(sent.status, 503);
    assert_eq!(sent.json().unwrap(), json!({ "error": "pool is shutting down" }));
    assert!(caller.is_ended());
}

#[derive(Default)]
struct BlockingResource {
    seen: Mutex<Vec<i64>>,
}

impl Resource for BlockingResource {
    fn declare(decl: &mut ResourceDecl<Self>) {
        decl.url(UrlSpec::new("/jobs"))
            .method("ordered", |m| {
                m.post()
                    .blocking(true)
                    .param(Param::query("n").shape(restmapper::coerce::Shape::i64()))
                    .handler(|resource, args| {
                        let n = args.parse::<i64>(0)?;
                        resource.seen.lock().push(n);
                        Ok(Some(json!(n)))
                    })
            })
            .method("history", |m| {
                m.get()
                    .handler(|resource, _| Ok(Some(json!(*resource.seen.lock()))))
            });
    }
}

#[test]
fn test_blocking_handlers_run_on_pool_in_order() {
    setup_may_runtime();
    let mut mapper = RestMapper::new();
    mapper.add_resource::<BlockingResource>();
    mapper.set_blocking_executor(Arc::new(WorkerPool::new(
        "caller-tests",
        WorkerPoolConfig::new(2, 2, 0x8000),
    )));
    let router = router_for(&mapper);

    let receivers: Vec<_> = (0..20)
        .map(|n| {
            let (response, rx) = ResponseHandle::channel();
            router.accept(
                RestRequest::new(Method::POST, &format!("/jobs?n={}", n)),
                &response,
            );
            rx
        })
        .collect();
    for (n, rx) in receivers.into_iter().enumerate() {
        let sent = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(sent.json().unwrap(), json!(n));
    }

    let history = send(&router, get("/jobs")).json().unwrap();
    assert_eq!(history, json!((0..20).collect::<Vec<i64>>()));
}

#[derive(Default)]
struct RawResource;

impl Resource for RawResource {
    fn declare(decl: &mut ResourceDecl<Self>) {
        decl.url(UrlSpec::new("/raw")).method("write", |m| {
            m.get()
                .handles_end()
                .param(Param::context::<ResponseHandle>())
                .handler(|_, args| {
                    let response = args
                        .context::<ResponseHandle>(0)
                        .ok_or_else(|| anyhow::anyhow!("no response handle"))?;
                    response.set_status(202);
                    response.put_header("content-type", "text/plain");
                    response.end("written by hand");
                    Ok(Some(json!("ignored")))
                })
        });
    }
}

#[test]
fn test_handler_that_ends_response_itself() {
    setup_may_runtime();
    let mut mapper = RestMapper::new();
    mapper.add_resource::<RawResource>();
    let router = router_for(&mapper);

    let sent = send(&router, get("/raw"));
    assert_eq!(sent.status, 202);
    assert_eq!(sent.text(), "written by hand");
    assert_eq!(sent.header("content-type"), Some("text/plain"));
}

#[derive(Default)]
struct NegotiatedResource;

impl Resource for NegotiatedResource {
    fn declare(decl: &mut ResourceDecl<Self>) {
        decl.url(UrlSpec::new("/doc"))
            .produces(["application/json", "text/plain"])
            .method("show", |m| m.get().handler(|_, _| Ok(Some(json!("doc")))));
    }
}

#[test]
fn test_default_content_type_follows_negotiation() {
    setup_may_runtime();
    let mut mapper = RestMapper::new();
    mapper.add_resource::<NegotiatedResource>();
    let router = router_for(&mapper);

    let sent = send(&router, get("/doc").header("accept", "text/plain"));
    assert_eq!(sent.header("content-type"), Some("text/plain;charset=utf-8"));
    let sent = send(&router, get("/doc"));
    assert_eq!(sent.header("content-type"), Some("application/json;charset=utf-8"));
}

#[test]
fn test_response_filter_sees_final_head() {
    setup_may_runtime();
    let mut mapper = RestMapper::new();
    mapper.add_resource::<NegotiatedResource>();
    mapper.set_response_filter(Some(Arc::new(
        |request: &RestRequest, head: &mut ResponseHead| {
            head.headers.set("x-request-path", request.path());
            let content_type = head.headers.get("content-type").unwrap_or("none").to_string();
            head.headers.set("x-seen-type", content_type);
        },
    )));
    let router = router_for(&mapper);

    let sent = send(&router, get("/doc"));
    assert_eq!(sent.header("x-request-path"), Some("/doc"));
    assert_eq!(sent.header("x-seen-type"), Some("application/json;charset=utf-8"));

    mapper.set_response_filter(None);
    assert_eq!(send(&router, get("/doc")).header("x-request-path"), None);
}
