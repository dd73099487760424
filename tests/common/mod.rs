#![allow(dead_code)]

use http::Method;
use restmapper::descriptor::Param;
use restmapper::mapper::{Resource, ResourceDecl, RestMapper};
use restmapper::middleware::{Interception, MethodInterceptor};
use restmapper::router::Router;
use restmapper::server::{ResponseHandle, RestRequest, SentResponse};
use restmapper::spec::UrlSpec;
use restmapper::MethodCaller;
use serde_json::json;
use std::sync::{Arc, Once};
use std::time::Duration;

static MAY_INIT: Once = Once::new();

/// Configure may coroutines once per test binary.
pub fn setup_may_runtime() {
    MAY_INIT.call_once(|| {
        may::config().set_stack_size(0x8000);
    });
}

/// Three overloads on one route: `(p1)`, `(p1, p2 = "d2")` and `()`.
#[derive(Default)]
pub struct SameUrlResource;

impl Resource for SameUrlResource {
    fn declare(decl: &mut ResourceDecl<Self>) {
        decl.url(UrlSpec::new("/same"))
            .method("one", |m| {
                m.get()
                    .param(Param::query("p1"))
                    .handler(|_, args| Ok(Some(json!({ "method": "one", "p1": args.str(0) }))))
            })
            .method("two", |m| {
                m.get()
                    .param(Param::query("p1"))
                    .param(Param::query("p2").default_value("d2"))
                    .handler(|_, args| {
                        Ok(Some(json!({
                            "method": "two",
                            "p1": args.str(0),
                            "p2": args.str(1),
                        })))
                    })
            })
            .method("none", |m| {
                m.get()
                    .handler(|_, _| Ok(Some(json!({ "method": "none" }))))
            });
    }
}

/// Deploys `ChildResource` under `/root`.
#[derive(Default)]
pub struct RootResource;

impl Resource for RootResource {
    fn declare(decl: &mut ResourceDecl<Self>) {
        decl.url(UrlSpec::new("/root").mount::<ChildResource>())
            .produces(["application/json"])
            .method("index", |m| {
                m.get().handler(|_, _| Ok(Some(json!("root"))))
            });
    }
}

/// Only reachable through `RootResource`.
#[derive(Default)]
pub struct ChildResource;

impl Resource for ChildResource {
    fn declare(decl: &mut ResourceDecl<Self>) {
        decl.url(UrlSpec::new("child").auto(false))
            .method("index", |m| {
                m.get().handler(|_, _| Ok(Some(json!("child"))))
            })
            .method("item", |m| {
                m.get()
                    .url(UrlSpec::new(":id"))
                    .param(Param::path("id").shape(restmapper::coerce::Shape::i64()))
                    .handler(|_, args| Ok(Some(json!({ "id": args.value(0) }))))
            });
    }
}

/// A resource with a method that requires authorization.
#[derive(Default)]
pub struct SecretResource;

impl Resource for SecretResource {
    fn declare(decl: &mut ResourceDecl<Self>) {
        decl.url(UrlSpec::new("/secret")).method("read", |m| {
            m.get()
                .tag("need_authorize")
                .handler(|_, _| Ok(Some(json!({ "secret": 42 }))))
        });
    }
}

/// Rejects tagged methods without `token: letmein`.
pub struct AuthInterceptor;

impl MethodInterceptor for AuthInterceptor {
    fn intercept(&self, caller: &Arc<MethodCaller>) -> Interception {
        if caller.descriptor().has_tag("need_authorize")
            && caller.request().headers().get("token") != Some("letmein")
        {
            caller.end_with_fail_status(401);
            return Interception::Handled;
        }
        Interception::Proceed
    }
}

/// Build a router from `mapper`.
pub fn router_for(mapper: &RestMapper) -> Router {
    let mut router = Router::new();
    mapper.apply_to(&mut router).expect("routes apply");
    router
}

/// Route `request` and wait for the response.
pub fn send(router: &Router, request: RestRequest) -> SentResponse {
    let (response, rx) = ResponseHandle::channel();
    router.accept(request, &response);
    rx.recv_timeout(Duration::from_secs(5))
        .expect("response within timeout")
}

pub fn get(target: &str) -> RestRequest {
    RestRequest::new(Method::GET, target)
}
